//! Publisher end of the output channel.

use crate::error::PortError;
use crate::line::OutputLine;
use crate::stream::OutputStream;
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};

/// Lines an async publisher may have queued before it has to wait.
pub const DEFAULT_CAPACITY: usize = 1024;

/// A queued line and whether it holds a unit of publisher credit.
#[derive(Debug)]
pub(crate) struct Queued {
    pub(crate) line: OutputLine,
    pub(crate) credited: bool,
}

/// Create a connected port and stream with [`DEFAULT_CAPACITY`].
#[must_use]
pub fn channel() -> (OutputPort, OutputStream) {
    channel_with_capacity(DEFAULT_CAPACITY)
}

/// Create a connected port and stream.
///
/// [`OutputPort::send`] never waits and may be called from synchronous
/// engine code, including before the host has started polling the stream.
/// [`OutputPort::send_async`] waits while `capacity` of its lines are still
/// unreceived. Lines are queued in send order either way.
#[must_use]
pub fn channel_with_capacity(capacity: usize) -> (OutputPort, OutputStream) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let credit = Arc::new(Semaphore::new(capacity.max(1)));
    let port = OutputPort {
        sender,
        credit: Arc::clone(&credit),
    };
    (port, OutputStream::new(receiver, credit))
}

/// Publishing handle for engine output.
///
/// Cloning yields another publisher on the same channel. The stream ends once
/// every clone has been dropped.
#[derive(Debug, Clone)]
pub struct OutputPort {
    sender: mpsc::UnboundedSender<Queued>,
    credit: Arc<Semaphore>,
}

impl OutputPort {
    /// Publish one line without waiting.
    ///
    /// Returns [`PortError::Closed`] if the stream has been dropped or closed.
    pub fn send(&self, line: impl Into<OutputLine>) -> Result<(), PortError> {
        self.enqueue(line.into(), false)
    }

    /// Publish one line, waiting until the queue has room for it.
    ///
    /// Returns [`PortError::Closed`] if the stream has been dropped or closed,
    /// including while waiting.
    pub async fn send_async(&self, line: impl Into<OutputLine>) -> Result<(), PortError> {
        let line = line.into();
        let permit = self
            .credit
            .acquire()
            .await
            .map_err(|_| PortError::Closed)?;
        self.enqueue(line, true)?;
        // Returned by the stream when the line is received.
        permit.forget();
        Ok(())
    }

    /// Whether the subscriber end is gone.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    fn enqueue(&self, line: OutputLine, credited: bool) -> Result<(), PortError> {
        self.sender
            .send(Queued { line, credited })
            .map_err(|_| PortError::Closed)
    }
}
