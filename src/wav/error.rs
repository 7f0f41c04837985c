use thiserror::Error;

/// Failures specific to the WAV format
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WavError {
    #[error("Malformed '{chunk}' chunk ({field}): {details}")]
    ChunkParsingError {
        chunk: String,
        /// Field or region of the chunk that failed
        field: String,
        details: String,
    },

    #[error("WAVE_FORMAT_EXTENSIBLE sub-format GUID is not a known WAV format")]
    InvalidSubFormat,

    /// Declared fmt body is shorter than the 16-byte base
    #[error("fmt chunk of {0} bytes is too small")]
    InvalidFmtChunkSize(u64),

    #[error("Unsupported sample format: {0}")]
    UnsupportedSampleFormat(String),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// A sequential writer delivered a different number of data bytes than
    /// its header promised
    #[error("Header promised {expected} data bytes but {actual} were written")]
    FinalizationMismatch { expected: u64, actual: u64 },
}

impl WavError {
    pub fn chunk_parsing(
        chunk: impl Into<String>,
        field: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        WavError::ChunkParsingError {
            chunk: chunk.into(),
            field: field.into(),
            details: details.into(),
        }
    }

    pub const fn invalid_subformat() -> Self {
        WavError::InvalidSubFormat
    }

    pub fn invalid_format(message: impl Into<String>) -> Self {
        WavError::InvalidFormat(message.into())
    }

    pub fn unsupported_sample_format(message: impl Into<String>) -> Self {
        WavError::UnsupportedSampleFormat(message.into())
    }
}
