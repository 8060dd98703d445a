//! Error types for the output port.

use thiserror::Error;

/// Port errors.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PortError {
    /// The subscriber end is gone; the line was not delivered.
    #[error("Output port closed: no subscriber is receiving lines")]
    Closed,

    /// The output channel already has its one subscriber.
    #[error("Output port already has a subscriber")]
    AlreadySubscribed,
}
