//! Subscriber end of the output channel.

use crate::line::OutputLine;
use crate::port::Queued;
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};

/// An async stream of lines published on an [`OutputPort`](crate::OutputPort).
///
/// Use `next()` to receive the next line.
///
/// # Example
///
/// ```rust,ignore
/// let mut stream = handle.subscribe_output()?;
///
/// while let Some(line) = stream.next().await {
///     println!("{line}");
/// }
/// ```
#[derive(Debug)]
pub struct OutputStream {
    /// The receiver channel for emitted lines.
    receiver: mpsc::UnboundedReceiver<Queued>,
    /// Credit shared with [`OutputPort::send_async`](crate::OutputPort::send_async).
    credit: Arc<Semaphore>,
}

impl OutputStream {
    pub(crate) fn new(receiver: mpsc::UnboundedReceiver<Queued>, credit: Arc<Semaphore>) -> Self {
        Self { receiver, credit }
    }

    /// Receive the next line.
    ///
    /// Returns `None` once every publisher is dropped and the queue is drained.
    pub async fn next(&mut self) -> Option<OutputLine> {
        let queued = self.receiver.recv().await?;
        Some(self.release(queued))
    }

    /// Try to receive the next line without waiting.
    ///
    /// Returns `None` if no line is queued right now.
    pub fn try_next(&mut self) -> Option<OutputLine> {
        let queued = self.receiver.try_recv().ok()?;
        Some(self.release(queued))
    }

    /// Close the stream.
    ///
    /// Publishers see [`PortError::Closed`](crate::PortError::Closed) from
    /// then on; lines already queued can still be received.
    pub fn close(&mut self) {
        self.receiver.close();
        self.credit.close();
    }

    fn release(&self, queued: Queued) -> OutputLine {
        if queued.credited {
            self.credit.add_permits(1);
        }
        queued.line
    }
}

impl Drop for OutputStream {
    fn drop(&mut self) {
        // Wake publishers waiting for room.
        self.credit.close();
    }
}
