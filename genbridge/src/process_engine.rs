//! Generation engines hosted in a child process.
//!
//! A [`ProcessEngine`] bootstraps an external generator program:
//! - Spawns the program in `init`, after the output port is open
//! - Writes the flags to the child's stdin and closes it
//! - Publishes every stdout line on the port while the flags are written
//! - Awaits the child once stdout ends and reports its exit status
//!
//! The child's stderr is inherited so generator diagnostics reach the user
//! unchanged. The child is killed if the engine task is aborted.

use crate::config::GeneratorConfig;
use crate::engine::{
    EngineError, EngineHandle, GenerationEngine, InitError, RawInput, display_code,
};
use genbridge_port::OutputPort;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, info, warn};

/// Environment variable naming the registry entry being run.
pub const GENERATOR_ENV: &str = "GENBRIDGE_GENERATOR";

/// Environment variable naming the entry point to invoke.
pub const ENTRY_ENV: &str = "GENBRIDGE_ENTRY";

/// Placeholder in generator arguments replaced by the entry point.
pub const ENTRY_PLACEHOLDER: &str = "{entry}";

/// An engine backed by an external generator program.
#[derive(Debug, Clone)]
pub struct ProcessEngine {
    config: GeneratorConfig,
    entry_point: String,
}

impl ProcessEngine {
    /// Create an engine for a generator definition.
    #[must_use]
    pub fn new(config: GeneratorConfig) -> Self {
        let entry_point = config.entry_point().to_string();
        Self {
            config,
            entry_point,
        }
    }

    /// Name of the generator definition.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Program arguments with the entry placeholder substituted.
    #[must_use]
    pub fn resolved_args(&self) -> Vec<String> {
        self.config
            .args
            .iter()
            .map(|arg| arg.replace(ENTRY_PLACEHOLDER, &self.entry_point))
            .collect()
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.config.program);
        cmd.args(self.resolved_args());

        for (key, value) in &self.config.env {
            cmd.env(key, value);
        }
        cmd.env(GENERATOR_ENV, &self.config.name);
        cmd.env(ENTRY_ENV, &self.entry_point);

        if let Some(ref dir) = self.config.cwd {
            cmd.current_dir(dir);
        }

        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        cmd
    }

    fn program(&self) -> String {
        self.config.program.display().to_string()
    }
}

impl GenerationEngine for ProcessEngine {
    fn entry_point(&self) -> &str {
        &self.entry_point
    }

    fn init(&self, flags: &RawInput) -> Result<EngineHandle, InitError> {
        let (port, handle) = EngineHandle::open(&self.entry_point);

        let mut child = self.command().spawn().map_err(|source| InitError::Spawn {
            program: self.program(),
            source,
        })?;

        // A missing pipe drops `child`, which kills it.
        let stdin = child.stdin.take().ok_or_else(|| InitError::MissingPipe {
            program: self.program(),
            pipe: "stdin",
        })?;
        let stdout = child.stdout.take().ok_or_else(|| InitError::MissingPipe {
            program: self.program(),
            pipe: "stdout",
        })?;

        info!(
            "Started generator {} (pid: {:?}, entry: {})",
            self.config.name,
            child.id(),
            self.entry_point
        );

        let task = tokio::spawn(drive_child(
            self.config.name.clone(),
            child,
            stdin,
            stdout,
            flags.clone(),
            port,
        ));

        Ok(handle.with_completion(task))
    }
}

/// Feed the child and relay its output, then collect its exit status.
async fn drive_child(
    name: String,
    mut child: Child,
    stdin: ChildStdin,
    stdout: ChildStdout,
    flags: RawInput,
    port: OutputPort,
) -> Result<(), EngineError> {
    let (fed, relayed) = tokio::join!(feed_flags(stdin, &flags), publish_lines(stdout, port));

    // Both pipes are done; the child still owns its exit status.
    let status = child.wait().await.map_err(EngineError::Wait)?;
    info!(
        "Generator {} exited with status {}",
        name,
        display_code(&status.code())
    );

    relayed?;
    fed?;
    if status.success() {
        Ok(())
    } else {
        Err(EngineError::Exited {
            code: status.code(),
        })
    }
}

/// Write the complete flags to the child and close its stdin.
async fn feed_flags(mut stdin: ChildStdin, flags: &RawInput) -> Result<(), EngineError> {
    match stdin.write_all(flags.as_bytes()).await {
        Ok(()) => {}
        // The child chose not to read all of its input.
        Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
            warn!("Generator closed stdin before reading all input");
            return Ok(());
        }
        Err(e) => return Err(EngineError::Input(e)),
    }
    match stdin.shutdown().await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
        Err(e) => return Err(EngineError::Input(e)),
    }
    debug!("Delivered {} byte(s) of flags", flags.len());
    Ok(())
}

/// Publish each stdout line until end-of-stream or until nobody listens.
///
/// The port is dropped on return, which ends the host's stream.
async fn publish_lines(stdout: ChildStdout, port: OutputPort) -> Result<(), EngineError> {
    let mut lines = BufReader::new(stdout).lines();
    while let Some(line) = lines.next_line().await.map_err(EngineError::Output)? {
        // Waits while the relay is behind, which leaves the child blocked on a full pipe.
        if port.send_async(line).await.is_err() {
            debug!("Output subscriber closed; discarding remaining generator output");
            break;
        }
    }
    Ok(())
}
