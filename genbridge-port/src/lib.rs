//! genbridge port library
//!
//! This crate provides the engine-facing half of the genbridge protocol: a
//! single-channel publish/subscribe port through which a generation engine
//! emits its output lines.
//!
//! # Roles
//!
//! - [`OutputPort`] - held by the engine, publishes lines
//! - [`OutputStream`] - held by the host, receives lines in emission order
//!
//! Both ends come from [`channel`]. The host creates the pair before the
//! engine starts working, so a line published at any point after that,
//! including synchronously during engine initialization, is delivered.
//!
//! Synchronous [`OutputPort::send`] never waits. Producers running in their
//! own task use [`OutputPort::send_async`], which waits while the host is
//! behind, so a fast producer cannot queue without limit.
//!
//! # Example: Engine side
//!
//! ```rust,ignore
//! use genbridge_port::{channel, OutputPort};
//!
//! fn emit_all(port: &OutputPort, config: &str) -> genbridge_port::Result<()> {
//!     for line in config.lines() {
//!         port.send(format!("GEN:{line}"))?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Example: Host side
//!
//! ```rust,ignore
//! let (port, mut stream) = genbridge_port::channel();
//! engine_start(port);
//!
//! while let Some(line) = stream.next().await {
//!     println!("{line}");
//! }
//! ```

mod error;
mod line;
mod port;
mod stream;

pub use error::PortError;
pub use line::OutputLine;
pub use port::{DEFAULT_CAPACITY, OutputPort, channel, channel_with_capacity};
pub use stream::OutputStream;

/// Result type for port operations.
pub type Result<T> = std::result::Result<T, PortError>;
