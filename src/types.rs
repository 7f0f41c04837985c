use core::fmt::{Display, Formatter, Result as FmtResult};
use std::time::Duration;

use crate::{
    error::{AudioIOError, AudioIOResult},
    wav::FormatCode,
};

/// RIFF-family container flavours
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    /// Classic 32-bit RIFF/WAVE
    #[default]
    Riff,
    /// EBU RF64, 64-bit sizes carried in a `ds64` chunk
    Rf64,
    /// Sony Wave64, GUID chunk ids and 64-bit sizes
    Wave64,
}

impl ContainerKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            ContainerKind::Riff => "RIFF",
            ContainerKind::Rf64 => "RF64",
            ContainerKind::Wave64 => "W64",
        }
    }

    /// Chunk bodies are padded to this many bytes
    pub const fn chunk_alignment(self) -> u64 {
        match self {
            ContainerKind::Riff | ContainerKind::Rf64 => 2,
            ContainerKind::Wave64 => 8,
        }
    }

    /// Size of a chunk header (id + size field)
    pub const fn chunk_header_size(self) -> u64 {
        match self {
            ContainerKind::Riff | ContainerKind::Rf64 => 8,
            ContainerKind::Wave64 => 24,
        }
    }

    /// True if the container can carry the metadata chunk family
    pub const fn supports_metadata(self) -> bool {
        matches!(self, ContainerKind::Riff | ContainerKind::Rf64)
    }
}

impl Display for ContainerKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

/// Resolved on-disk sample encoding. Extensible tags are always resolved
/// through their sub-format GUID before they land here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleFormat {
    Pcm,
    IeeeFloat,
    ALaw,
    MuLaw,
    MsAdpcm,
    ImaAdpcm,
}

impl SampleFormat {
    pub const fn format_code(self) -> FormatCode {
        match self {
            SampleFormat::Pcm => FormatCode::Pcm,
            SampleFormat::IeeeFloat => FormatCode::IeeeFloat,
            SampleFormat::ALaw => FormatCode::ALaw,
            SampleFormat::MuLaw => FormatCode::MuLaw,
            SampleFormat::MsAdpcm => FormatCode::MsAdpcm,
            SampleFormat::ImaAdpcm => FormatCode::ImaAdpcm,
        }
    }

    /// True for the block-based ADPCM encodings
    pub const fn is_compressed(self) -> bool {
        matches!(self, SampleFormat::MsAdpcm | SampleFormat::ImaAdpcm)
    }

    pub const fn is_companded(self) -> bool {
        matches!(self, SampleFormat::ALaw | SampleFormat::MuLaw)
    }
}

impl TryFrom<FormatCode> for SampleFormat {
    type Error = AudioIOError;

    fn try_from(code: FormatCode) -> Result<Self, Self::Error> {
        match code {
            FormatCode::Pcm => Ok(SampleFormat::Pcm),
            FormatCode::IeeeFloat => Ok(SampleFormat::IeeeFloat),
            FormatCode::ALaw => Ok(SampleFormat::ALaw),
            FormatCode::MuLaw => Ok(SampleFormat::MuLaw),
            FormatCode::MsAdpcm => Ok(SampleFormat::MsAdpcm),
            FormatCode::ImaAdpcm => Ok(SampleFormat::ImaAdpcm),
            other => Err(AudioIOError::unsupported_format(format!(
                "No decoder for format {:#}",
                other
            ))),
        }
    }
}

impl Display for SampleFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.format_code())
    }
}

/// Options controlling how a stream is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenOptions {
    /// Walk and parse metadata chunks into a [`crate::wav::metadata::Metadata`] arena
    pub read_metadata: bool,
    /// Preserve chunks the metadata walker does not understand
    pub keep_unknown_chunks: bool,
    /// Path helpers map files into memory instead of buffering them
    pub use_memory_map: bool,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            read_metadata: false,
            keep_unknown_chunks: true,
            use_memory_map: true,
        }
    }
}

impl OpenOptions {
    pub fn with_metadata(mut self, read_metadata: bool) -> Self {
        self.read_metadata = read_metadata;
        self
    }

    pub fn with_unknown_chunks(mut self, keep: bool) -> Self {
        self.keep_unknown_chunks = keep;
        self
    }

    pub fn with_memory_map(mut self, use_memory_map: bool) -> Self {
        self.use_memory_map = use_memory_map;
        self
    }
}

/// Description of the stream a writer will produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteFormat {
    pub container: ContainerKind,
    pub sample_format: SampleFormat,
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
}

impl WriteFormat {
    pub const fn pcm(channels: u16, sample_rate: u32, bits_per_sample: u16) -> Self {
        Self {
            container: ContainerKind::Riff,
            sample_format: SampleFormat::Pcm,
            channels,
            sample_rate,
            bits_per_sample,
        }
    }

    pub const fn float(channels: u16, sample_rate: u32, bits_per_sample: u16) -> Self {
        Self {
            container: ContainerKind::Riff,
            sample_format: SampleFormat::IeeeFloat,
            channels,
            sample_rate,
            bits_per_sample,
        }
    }

    pub const fn alaw(channels: u16, sample_rate: u32) -> Self {
        Self {
            container: ContainerKind::Riff,
            sample_format: SampleFormat::ALaw,
            channels,
            sample_rate,
            bits_per_sample: 8,
        }
    }

    pub const fn mulaw(channels: u16, sample_rate: u32) -> Self {
        Self {
            container: ContainerKind::Riff,
            sample_format: SampleFormat::MuLaw,
            channels,
            sample_rate,
            bits_per_sample: 8,
        }
    }

    pub const fn in_container(mut self, container: ContainerKind) -> Self {
        self.container = container;
        self
    }

    pub const fn bytes_per_sample(&self) -> u16 {
        self.bits_per_sample.div_ceil(8)
    }

    pub const fn block_align(&self) -> u16 {
        self.channels * self.bytes_per_sample()
    }

    /// Reject combinations the writer cannot produce
    pub fn validate(&self) -> AudioIOResult<()> {
        if self.channels == 0 {
            return Err(AudioIOError::invalid_parameters(
                "Channel count must be at least 1",
            ));
        }
        if self.sample_rate == 0 {
            return Err(AudioIOError::invalid_parameters(
                "Sample rate must be non-zero",
            ));
        }
        match self.sample_format {
            SampleFormat::Pcm => {
                if !matches!(self.bits_per_sample, 8 | 16 | 24 | 32) {
                    return Err(AudioIOError::invalid_parameters(format!(
                        "PCM bit depth {} is not writable (8, 16, 24 or 32)",
                        self.bits_per_sample
                    )));
                }
            }
            SampleFormat::IeeeFloat => {
                if !matches!(self.bits_per_sample, 32 | 64) {
                    return Err(AudioIOError::invalid_parameters(format!(
                        "Float bit depth {} is not writable (32 or 64)",
                        self.bits_per_sample
                    )));
                }
            }
            SampleFormat::ALaw | SampleFormat::MuLaw => {
                if self.bits_per_sample != 8 {
                    return Err(AudioIOError::invalid_parameters(format!(
                        "{} requires 8 bits per sample, got {}",
                        self.sample_format, self.bits_per_sample
                    )));
                }
            }
            SampleFormat::MsAdpcm | SampleFormat::ImaAdpcm => {
                return Err(AudioIOError::invalid_parameters(format!(
                    "{} is not supported for writing",
                    self.sample_format
                )));
            }
        }
        let block_align = self.channels as u32 * self.bytes_per_sample() as u32;
        if block_align > u16::MAX as u32 {
            return Err(AudioIOError::invalid_parameters(format!(
                "Frame size of {} bytes does not fit the fmt chunk",
                block_align
            )));
        }
        Ok(())
    }
}

/// Summary of an opened stream
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct WavInfo {
    pub container: ContainerKind,
    pub sample_format: SampleFormat,
    /// Sample rate in Hz
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    /// Bytes per second as declared in the fmt chunk
    pub byte_rate: u32,
    /// Bytes per frame, or per compressed block for ADPCM
    pub block_align: u16,
    pub total_frames: u64,
    pub duration: Duration,
}

impl Display for WavInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(
            f,
            "{} {}: {} ch, {} Hz, {} bits, {} frames ({:.3}s)",
            self.container,
            self.sample_format,
            self.channels,
            self.sample_rate,
            self.bits_per_sample,
            self.total_frames,
            self.duration.as_secs_f64()
        )
    }
}
