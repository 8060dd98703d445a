//! The generation-engine capability consumed by the bridge.
//!
//! An engine is a black box reachable through two operations:
//! - `init(flags)` builds one live instance and returns its [`EngineHandle`]
//! - `subscribe_output()` on the handle yields the stream of emitted lines
//!
//! The port channel is opened inside `init` before any engine work starts,
//! so a line emitted at any time after `init` begins, including
//! synchronously inside it, reaches the subscriber.

use genbridge_port::{OutputPort, OutputStream, PortError};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;

/// The complete input payload handed to an engine as its configuration.
///
/// Immutable once loaded. Cloning shares the underlying text.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct RawInput(Arc<str>);

impl RawInput {
    /// Wrap loaded text.
    #[must_use]
    pub fn new(text: impl Into<Arc<str>>) -> Self {
        Self(text.into())
    }

    /// The payload as text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The payload as bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// Payloads can be megabytes; keep debug output short.
impl fmt::Debug for RawInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawInput").field("len", &self.len()).finish()
    }
}

impl From<String> for RawInput {
    fn from(text: String) -> Self {
        Self(text.into())
    }
}

impl From<&str> for RawInput {
    fn from(text: &str) -> Self {
        Self(text.into())
    }
}

/// Engine initialization errors.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("Engine rejected its configuration: {0}")]
    Rejected(String),

    #[error("Failed to start generator `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Generator `{program}` has no {pipe} pipe")]
    MissingPipe { program: String, pipe: &'static str },

    #[error("Engine output is unavailable: {0}")]
    Output(#[from] PortError),
}

/// Failures of an engine after it was initialized.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Failed to deliver configuration to generator: {0}")]
    Input(#[source] std::io::Error),

    #[error("Failed to read generator output: {0}")]
    Output(#[source] std::io::Error),

    #[error("Failed to wait for generator: {0}")]
    Wait(#[source] std::io::Error),

    #[error("Generator exited with status: {}", display_code(.code))]
    Exited { code: Option<i32> },

    #[error("Engine task failed: {0}")]
    Task(String),
}

/// Render an exit code, or `signal` when the child was killed by one.
pub(crate) fn display_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |c| c.to_string())
}

/// A generation engine that can be initialized with a configuration string.
pub trait GenerationEngine {
    /// Named entry point this engine invokes.
    fn entry_point(&self) -> &str;

    /// Build one live engine instance configured by `flags`.
    ///
    /// Implementations open the output channel with [`EngineHandle::open`]
    /// before starting any work. On error nothing may be left running.
    fn init(&self, flags: &RawInput) -> Result<EngineHandle, InitError>;
}

/// Handle to one initialized engine instance.
///
/// Dropping a handle whose engine task is still running aborts that task.
#[derive(Debug)]
pub struct EngineHandle {
    entry_point: String,
    output: Option<OutputStream>,
    completion: Option<JoinHandle<Result<(), EngineError>>>,
}

impl EngineHandle {
    /// Open the output channel for a new instance.
    ///
    /// The engine keeps the returned port; the handle keeps the stream until
    /// the host subscribes.
    #[must_use]
    pub fn open(entry_point: impl Into<String>) -> (OutputPort, Self) {
        let (port, stream) = genbridge_port::channel();
        let handle = Self {
            entry_point: entry_point.into(),
            output: Some(stream),
            completion: None,
        };
        (port, handle)
    }

    /// Attach the task that drives the engine to completion.
    #[must_use]
    pub fn with_completion(mut self, task: JoinHandle<Result<(), EngineError>>) -> Self {
        self.completion = Some(task);
        self
    }

    /// Entry point this instance was started with.
    #[must_use]
    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    /// Take the output subscription. Succeeds exactly once.
    pub fn subscribe_output(&mut self) -> Result<OutputStream, PortError> {
        self.output.take().ok_or(PortError::AlreadySubscribed)
    }

    /// Wait for the engine task, if any, and report how it ended.
    pub async fn finished(mut self) -> Result<(), EngineError> {
        let Some(task) = self.completion.take() else {
            return Ok(());
        };
        match task.await {
            Ok(result) => result,
            Err(e) => Err(EngineError::Task(e.to_string())),
        }
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        if let Some(task) = self.completion.take() {
            task.abort();
        }
    }
}
