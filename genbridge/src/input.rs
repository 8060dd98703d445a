//! Input loading.
//!
//! The whole of standard input is read in one blocking pass before any
//! engine is built. There is no partial read, timeout or size limit.

use crate::engine::RawInput;
use std::io::Read;
use thiserror::Error;
use tracing::debug;

/// Input loading errors.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to read input: {0}")]
    Read(#[from] std::io::Error),

    #[error("Input is not valid UTF-8: {0}")]
    Decode(#[from] std::string::FromUtf8Error),
}

/// Read `reader` to end-of-stream and decode it as UTF-8.
pub fn load_input<R: Read>(mut reader: R) -> Result<RawInput, LoadError> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    let text = String::from_utf8(bytes)?;
    debug!("Loaded {} byte(s) of input", text.len());
    Ok(RawInput::from(text))
}

/// Read the complete standard input of this process.
pub fn load_stdin() -> Result<RawInput, LoadError> {
    load_input(std::io::stdin().lock())
}
