//! Crate-level error type.
//!
//! Format-specific failures live in [`WavError`] and convert into
//! [`AudioIOError`] with `?`.

use core::fmt::{Display, Formatter, Result as FmtResult};
use std::io;

use thiserror::Error;

use crate::wav::error::WavError;

#[allow(clippy::result_large_err)]
pub type AudioIOResult<T> = Result<T, AudioIOError>;

#[derive(Debug, Error)]
pub enum AudioIOError {
    /// The caller's transport failed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Malformed container or chunk layout
    #[error("{description} at {position}: {details}")]
    CorruptedData {
        description: String,
        details: String,
        position: ErrorPosition,
    },

    #[error(transparent)]
    WavError(#[from] WavError),

    #[error("Seek failed: {0}")]
    SeekError(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Where in the stream a parse error was detected
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ErrorPosition {
    /// Absolute byte offset
    pub offset: u64,
    /// What was being read there, e.g. `"ds64 chunk"`
    pub description: String,
}

impl ErrorPosition {
    pub fn new(offset: u64) -> Self {
        Self {
            offset,
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

impl Display for ErrorPosition {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        if self.description.is_empty() {
            write!(f, "byte {}", self.offset)
        } else {
            write!(f, "{} (byte {})", self.description, self.offset)
        }
    }
}

impl AudioIOError {
    pub fn corrupted_data(
        description: impl Into<String>,
        details: impl Into<String>,
        position: ErrorPosition,
    ) -> Self {
        AudioIOError::CorruptedData {
            description: description.into(),
            details: details.into(),
            position,
        }
    }

    /// [`AudioIOError::CorruptedData`] at an unknown offset
    pub fn corrupted_data_simple(
        description: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self::corrupted_data(description, details, ErrorPosition::default())
    }

    pub fn seek_error(message: impl Into<String>) -> Self {
        AudioIOError::SeekError(message.into())
    }

    pub fn invalid_parameters(message: impl Into<String>) -> Self {
        AudioIOError::InvalidParameters(message.into())
    }

    pub fn unsupported_format(message: impl Into<String>) -> Self {
        AudioIOError::UnsupportedFormat(message.into())
    }

    /// True if the transport, not the data, caused the failure
    pub const fn is_io(&self) -> bool {
        matches!(self, AudioIOError::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_display() {
        assert_eq!(ErrorPosition::new(12).to_string(), "byte 12");
        let pos = ErrorPosition::new(12).with_description("fmt chunk header");
        assert_eq!(pos.to_string(), "fmt chunk header (byte 12)");
    }

    #[test]
    fn test_corrupted_data_message() {
        let err = AudioIOError::corrupted_data(
            "Bad magic",
            "found XXXX",
            ErrorPosition::new(0).with_description("stream start"),
        );
        assert_eq!(err.to_string(), "Bad magic at stream start (byte 0): found XXXX");
    }

    #[test]
    fn test_wav_error_is_transparent() {
        let err: AudioIOError = WavError::invalid_format("Channels cannot be zero").into();
        assert_eq!(err.to_string(), "Invalid format: Channels cannot be zero");
        assert!(!err.is_io());

        let io_err: AudioIOError = io::Error::from(io::ErrorKind::UnexpectedEof).into();
        assert!(io_err.is_io());
    }
}
