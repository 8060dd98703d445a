//! The bridge controller.
//!
//! A run moves through fixed steps, each a precondition for the next:
//! 1. The complete input is loaded
//! 2. One engine instance is initialized with it
//! 3. Its output is subscribed in the same synchronous turn as `init`
//! 4. Every line is written to the sink unchanged, in arrival order
//!
//! The run ends when the engine closes its output port and its
//! completion task (if any) has finished.

use crate::engine::{EngineError, GenerationEngine, InitError, RawInput};
use crate::input::{LoadError, load_input};
use crate::state::BridgeState;
use genbridge_port::{OutputLine, OutputStream};
use std::io::Read;
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::{debug, trace};

/// The phase of a run in which an error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Reading standard input.
    Load,
    /// Initializing the engine.
    Init,
    /// Writing lines to the sink.
    Relay,
    /// The engine failed after initialization.
    Engine,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Load => write!(f, "load"),
            Self::Init => write!(f, "init"),
            Self::Relay => write!(f, "relay"),
            Self::Engine => write!(f, "engine"),
        }
    }
}

/// Fatal bridge errors. None of them is retried.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Input load failed: {0}")]
    Load(#[from] LoadError),

    #[error("Engine initialization failed: {0}")]
    Init(#[from] InitError),

    #[error("Output relay failed: {0}")]
    Relay(#[source] std::io::Error),

    #[error("Engine failed: {0}")]
    Engine(#[from] EngineError),
}

impl BridgeError {
    /// Which phase of the run failed.
    #[must_use]
    pub fn phase(&self) -> Phase {
        match self {
            Self::Load(_) => Phase::Load,
            Self::Init(_) => Phase::Init,
            Self::Relay(_) => Phase::Relay,
            Self::Engine(_) => Phase::Engine,
        }
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Entry point the engine was started with.
    pub entry_point: String,
    /// Number of lines relayed.
    pub lines: u64,
    /// Final state of the run.
    pub state: BridgeState,
}

/// Connects one input payload, one engine instance and one output sink.
pub struct Bridge<E> {
    engine: E,
    state: BridgeState,
}

impl<E: GenerationEngine> Bridge<E> {
    /// Create a bridge for `engine`. Nothing runs until `run`.
    #[must_use]
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            state: BridgeState::NotStarted,
        }
    }

    /// Current state of the run.
    #[must_use]
    pub fn state(&self) -> BridgeState {
        self.state
    }

    /// Read `reader` to the end, then run the engine on its content.
    ///
    /// The engine is not touched until the read has completed.
    pub async fn load_and_run<R, W>(self, reader: R, sink: W) -> Result<RunReport, BridgeError>
    where
        R: Read,
        W: AsyncWrite + Unpin,
    {
        let input = load_input(reader)?;
        self.run(input, sink).await
    }

    /// Run the engine on `input` and relay its output to `sink`.
    pub async fn run<W>(mut self, input: RawInput, sink: W) -> Result<RunReport, BridgeError>
    where
        W: AsyncWrite + Unpin,
    {
        let mut sink = BufWriter::new(sink);
        match self.drive(input, &mut sink).await {
            Ok((entry_point, lines)) => {
                self.transition(BridgeState::Terminated);
                debug!("Relayed {} line(s) from {}", lines, entry_point);
                Ok(RunReport {
                    entry_point,
                    lines,
                    state: self.state,
                })
            }
            Err(e) => {
                self.transition(BridgeState::Failed);
                debug!("Run failed in {} phase: {}", e.phase(), e);
                Err(e)
            }
        }
    }

    async fn drive<W>(
        &mut self,
        input: RawInput,
        sink: &mut BufWriter<W>,
    ) -> Result<(String, u64), BridgeError>
    where
        W: AsyncWrite + Unpin,
    {
        self.transition(BridgeState::InputLoaded);

        // No await between init and subscribe.
        let mut handle = self.engine.init(&input)?;
        let mut output = handle.subscribe_output().map_err(InitError::from)?;
        self.transition(BridgeState::EngineInitialized);
        debug!("Initialized engine entry point {}", handle.entry_point());

        self.transition(BridgeState::Relaying);
        // On a relay error the handle is dropped here, which stops the engine.
        let lines = self.relay(&mut output, sink).await.map_err(BridgeError::Relay)?;
        drop(output);

        let entry_point = handle.entry_point().to_string();
        handle.finished().await?;
        Ok((entry_point, lines))
    }

    /// Write every line until the stream ends.
    ///
    /// Lines already queued are written as one batch before each flush.
    async fn relay<W>(
        &self,
        output: &mut OutputStream,
        sink: &mut BufWriter<W>,
    ) -> std::io::Result<u64>
    where
        W: AsyncWrite + Unpin,
    {
        debug_assert!(self.state.accepts_output());
        let mut lines = 0u64;
        while let Some(line) = output.next().await {
            write_line(sink, &line).await?;
            lines += 1;
            while let Some(line) = output.try_next() {
                write_line(sink, &line).await?;
                lines += 1;
            }
            sink.flush().await?;
        }
        sink.flush().await?;
        Ok(lines)
    }

    fn transition(&mut self, to: BridgeState) {
        debug_assert!(
            self.state.can_transition_to(to),
            "illegal transition {} -> {}",
            self.state,
            to
        );
        trace!("Bridge state {} -> {}", self.state, to);
        self.state = to;
    }
}

async fn write_line<W>(sink: &mut BufWriter<W>, line: &OutputLine) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    trace!("relay: {}", line);
    sink.write_all(line.as_bytes()).await?;
    sink.write_all(b"\n").await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineHandle;
    use std::collections::VecDeque;
    use std::io;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::task::{Context, Poll};
    use std::time::Duration;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    /// Emits its lines from a background task, sleeping before each one.
    struct ScriptedEngine {
        lines: Vec<String>,
        delays_ms: Vec<u64>,
    }

    impl GenerationEngine for ScriptedEngine {
        fn entry_point(&self) -> &str {
            "Scripted"
        }

        fn init(&self, _flags: &RawInput) -> Result<EngineHandle, InitError> {
            let (port, handle) = EngineHandle::open(self.entry_point());
            let lines = self.lines.clone();
            let delays = self.delays_ms.clone();
            let task = tokio::spawn(async move {
                for (i, line) in lines.into_iter().enumerate() {
                    let delay = delays.get(i % delays.len().max(1)).copied().unwrap_or(0);
                    if delay > 0 {
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                    }
                    port.send(line).map_err(|e| EngineError::Task(e.to_string()))?;
                }
                Ok::<(), EngineError>(())
            });
            Ok(handle.with_completion(task))
        }
    }

    /// Emits every line synchronously inside `init`.
    struct EagerEngine {
        lines: Vec<String>,
    }

    impl GenerationEngine for EagerEngine {
        fn entry_point(&self) -> &str {
            "Eager"
        }

        fn init(&self, _flags: &RawInput) -> Result<EngineHandle, InitError> {
            let (port, handle) = EngineHandle::open(self.entry_point());
            for line in &self.lines {
                port.send(line.as_str())?;
            }
            Ok(handle)
        }
    }

    /// Emits `GEN:<line>` for every line of its configuration.
    struct PrefixEngine;

    impl GenerationEngine for PrefixEngine {
        fn entry_point(&self) -> &str {
            "Main"
        }

        fn init(&self, flags: &RawInput) -> Result<EngineHandle, InitError> {
            let (port, handle) = EngineHandle::open(self.entry_point());
            let flags = flags.clone();
            let task = tokio::spawn(async move {
                for line in flags.as_str().lines() {
                    tokio::task::yield_now().await;
                    port.send(format!("GEN:{line}"))
                        .map_err(|e| EngineError::Task(e.to_string()))?;
                }
                Ok::<(), EngineError>(())
            });
            Ok(handle.with_completion(task))
        }
    }

    struct RejectingEngine;

    impl GenerationEngine for RejectingEngine {
        fn entry_point(&self) -> &str {
            "Rejecting"
        }

        fn init(&self, _flags: &RawInput) -> Result<EngineHandle, InitError> {
            Err(InitError::Rejected("expected a JSON object".to_string()))
        }
    }

    /// Emits one line, then reports a failure.
    struct CrashingEngine;

    impl GenerationEngine for CrashingEngine {
        fn entry_point(&self) -> &str {
            "Crashing"
        }

        fn init(&self, _flags: &RawInput) -> Result<EngineHandle, InitError> {
            let (port, handle) = EngineHandle::open(self.entry_point());
            let task = tokio::spawn(async move {
                port.send("partial").map_err(|e| EngineError::Task(e.to_string()))?;
                Err::<(), EngineError>(EngineError::Exited { code: Some(2) })
            });
            Ok(handle.with_completion(task))
        }
    }

    /// Records every configuration it is initialized with.
    #[derive(Default, Clone)]
    struct RecordingEngine {
        inits: Arc<AtomicUsize>,
        flags: Arc<Mutex<Vec<String>>>,
    }

    impl GenerationEngine for RecordingEngine {
        fn entry_point(&self) -> &str {
            "Recording"
        }

        fn init(&self, flags: &RawInput) -> Result<EngineHandle, InitError> {
            self.inits.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut seen) = self.flags.lock() {
                seen.push(flags.as_str().to_string());
            }
            let (_port, handle) = EngineHandle::open(self.entry_point());
            Ok(handle)
        }
    }

    /// Hands out its input a chunk at a time and checks that the engine
    /// has not been initialized yet.
    struct ChunkedReader {
        chunks: VecDeque<Vec<u8>>,
        inits: Arc<AtomicUsize>,
    }

    impl Read for ChunkedReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            assert_eq!(self.inits.load(Ordering::SeqCst), 0, "engine built during read");
            std::thread::sleep(Duration::from_millis(2));
            let Some(mut chunk) = self.chunks.pop_front() else {
                return Ok(0);
            };
            let n = chunk.len().min(buf.len());
            buf[..n].copy_from_slice(&chunk[..n]);
            if n < chunk.len() {
                self.chunks.push_front(chunk.split_off(n));
            }
            Ok(n)
        }
    }

    /// A sink whose reader has gone away.
    struct ClosedSink;

    impl AsyncWrite for ClosedSink {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed")))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed")))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    fn numbered(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("line {i}")).collect()
    }

    fn joined(lines: &[String]) -> String {
        lines.iter().map(|l| format!("{l}\n")).collect()
    }

    #[tokio::test]
    async fn test_end_to_end_prefix() -> TestResult {
        let mut out = Vec::new();
        let report = Bridge::new(PrefixEngine)
            .run(RawInput::from("foo\nbar\n"), &mut out)
            .await?;

        assert_eq!(String::from_utf8(out)?, "GEN:foo\nGEN:bar\n");
        assert_eq!(report.lines, 2);
        assert_eq!(report.entry_point, "Main");
        assert_eq!(report.state, BridgeState::Terminated);
        Ok(())
    }

    #[tokio::test]
    async fn test_ordering_with_delays() -> TestResult {
        let lines = numbered(25);
        let engine = ScriptedEngine {
            lines: lines.clone(),
            delays_ms: vec![0, 3, 0, 0, 1, 5, 0, 2],
        };

        let mut out = Vec::new();
        Bridge::new(engine).run(RawInput::default(), &mut out).await?;
        assert_eq!(String::from_utf8(out)?, joined(&lines));
        Ok(())
    }

    #[tokio::test]
    async fn test_completeness() -> TestResult {
        for n in [0, 1, 1000] {
            let lines = numbered(n);
            let engine = ScriptedEngine {
                lines: lines.clone(),
                delays_ms: vec![0],
            };

            let mut out = Vec::new();
            let report = Bridge::new(engine).run(RawInput::default(), &mut out).await?;
            assert_eq!(report.lines, n as u64);

            let output = String::from_utf8(out)?;
            let relayed: Vec<&str> = output.lines().collect();
            assert_eq!(relayed, lines, "mismatch for {n} line(s)");
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_lines_emitted_inside_init() -> TestResult {
        let lines = vec!["emitted during init".to_string(), String::new()];
        let mut out = Vec::new();
        let report = Bridge::new(EagerEngine { lines })
            .run(RawInput::default(), &mut out)
            .await?;

        assert_eq!(String::from_utf8(out)?, "emitted during init\n\n");
        assert_eq!(report.lines, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_input_fidelity() -> TestResult {
        let large: String = (0..100_000).map(|i| format!("{i:08x} é ✓\r\n")).collect();
        let inputs = vec![String::new(), "single line".to_string(), large];

        for payload in inputs {
            let engine = RecordingEngine::default();
            let mut out = Vec::new();
            Bridge::new(engine.clone())
                .load_and_run(std::io::Cursor::new(payload.clone().into_bytes()), &mut out)
                .await?;

            let seen = engine.flags.lock().map_err(|e| e.to_string())?;
            assert_eq!(seen.len(), 1);
            assert_eq!(seen[0].as_bytes(), payload.as_bytes());
            assert!(out.is_empty());
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_engine_built_after_read_completes() -> TestResult {
        let engine = RecordingEngine::default();
        let reader = ChunkedReader {
            chunks: VecDeque::from(vec![b"fo".to_vec(), b"o\nba".to_vec(), b"r\n".to_vec()]),
            inits: Arc::clone(&engine.inits),
        };

        let mut out = Vec::new();
        Bridge::new(engine.clone()).load_and_run(reader, &mut out).await?;

        assert_eq!(engine.inits.load(Ordering::SeqCst), 1);
        let seen = engine.flags.lock().map_err(|e| e.to_string())?;
        assert_eq!(*seen, vec!["foo\nbar\n".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn test_init_failure_is_fatal() {
        let mut out = Vec::new();
        let result = Bridge::new(RejectingEngine)
            .run(RawInput::from("not json"), &mut out)
            .await;

        let Err(err) = result else {
            panic!("expected init failure");
        };
        assert_eq!(err.phase(), Phase::Init);
        assert!(err.to_string().contains("expected a JSON object"));
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_load_failure_never_builds_engine() {
        let engine = RecordingEngine::default();
        let mut out = Vec::new();
        let result = Bridge::new(engine.clone())
            .load_and_run(std::io::Cursor::new(vec![0xc3, 0x28]), &mut out)
            .await;

        assert!(matches!(result, Err(ref e) if e.phase() == Phase::Load));
        assert_eq!(engine.inits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_relay_failure_stops_run() {
        let engine = ScriptedEngine {
            lines: numbered(10),
            delays_ms: vec![0],
        };
        let result = Bridge::new(engine).run(RawInput::default(), ClosedSink).await;

        let Err(err) = result else {
            panic!("expected relay failure");
        };
        assert_eq!(err.phase(), Phase::Relay);
    }

    #[tokio::test]
    async fn test_engine_failure_after_output() {
        let mut out = Vec::new();
        let result = Bridge::new(CrashingEngine)
            .run(RawInput::default(), &mut out)
            .await;

        assert!(matches!(result, Err(ref e) if e.phase() == Phase::Engine));
        assert_eq!(out, b"partial\n");
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::Load.to_string(), "load");
        assert_eq!(Phase::Init.to_string(), "init");
        assert_eq!(Phase::Relay.to_string(), "relay");
        assert_eq!(Phase::Engine.to_string(), "engine");
    }

    #[test]
    fn test_new_bridge_not_started() {
        let bridge = Bridge::new(RejectingEngine);
        assert_eq!(bridge.state(), BridgeState::NotStarted);
    }
}
