//! Output line type.

use std::fmt;

/// One line emitted by a generation engine.
///
/// The content is opaque to the host: it is relayed exactly as emitted,
/// without its line terminator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct OutputLine(String);

impl OutputLine {
    /// Create a line from any string-like value.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Borrow the line content.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Borrow the line content as bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Take the owned content.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for OutputLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for OutputLine {
    fn from(text: String) -> Self {
        Self(text)
    }
}

impl From<&str> for OutputLine {
    fn from(text: &str) -> Self {
        Self(text.to_string())
    }
}

impl AsRef<str> for OutputLine {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
