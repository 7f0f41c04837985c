use core::fmt::{Display, Formatter, Result as FmtResult};
use std::io::{Read, Write};

use crate::{
    error::{AudioIOError, AudioIOResult},
    types::{ContainerKind, SampleFormat, WriteFormat},
    wav::{
        ExtendedFormatInfo, FormatCode,
        chunks::{FMT_CHUNK, chunk_padding, write_chunk_header},
        endian::{read_array, u16_at, u32_at, write_u16, write_u32},
        error::WavError,
    },
};

/// Size of the mandatory part of a fmt chunk
pub const BASE_FMT_SIZE: u64 = 16;
/// Size of the WAVE_FORMAT_EXTENSIBLE extension that follows `cbSize`
pub const EXTENSIBLE_EXT_SIZE: u16 = 22;

pub const MAX_CHANNELS: u16 = 256;
pub const MAX_SAMPLE_RATE: u32 = 384_000;
pub const MAX_BITS_PER_SAMPLE: u16 = 64;

/// Parsed `fmt ` chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FmtChunk {
    /// Format tag as found on disk (may be `Extensible`)
    pub format_code: FormatCode,
    pub channels: u16,
    pub sample_rate: u32,
    /// Average bytes per second
    pub byte_rate: u32,
    /// Bytes per frame, or bytes per compressed block for ADPCM
    pub block_align: u16,
    pub bits_per_sample: u16,
    /// Present when `format_code` is `Extensible`
    pub extended: Option<ExtendedFormatInfo>,
}

impl FmtChunk {
    /// Parse a fmt chunk body of `chunk_size` declared bytes.
    ///
    /// Returns the chunk and the number of body bytes consumed. The caller is
    /// responsible for skipping the remainder (and any padding).
    pub fn parse<R: Read + ?Sized>(reader: &mut R, chunk_size: u64) -> AudioIOResult<(Self, u64)> {
        if chunk_size < BASE_FMT_SIZE {
            return Err(WavError::InvalidFmtChunkSize(chunk_size).into());
        }

        let base: [u8; 16] = read_array(reader)?;
        let mut fmt = FmtChunk {
            format_code: FormatCode::const_from(u16_at(&base, 0)),
            channels: u16_at(&base, 2),
            sample_rate: u32_at(&base, 4),
            byte_rate: u32_at(&base, 8),
            block_align: u16_at(&base, 12),
            bits_per_sample: u16_at(&base, 14),
            extended: None,
        };
        let mut consumed = BASE_FMT_SIZE;

        if chunk_size >= BASE_FMT_SIZE + 2 {
            let ext_size = u16_at(&read_array::<_, 2>(reader)?, 0);
            consumed += 2;

            if fmt.format_code == FormatCode::Extensible {
                if ext_size != EXTENSIBLE_EXT_SIZE
                    || chunk_size < consumed + EXTENSIBLE_EXT_SIZE as u64
                {
                    return Err(WavError::chunk_parsing(
                        "fmt ",
                        "extension",
                        format!(
                            "WAVE_FORMAT_EXTENSIBLE requires a 22-byte extension, found cbSize {} in a {}-byte chunk",
                            ext_size, chunk_size
                        ),
                    )
                    .into());
                }
                let ext: [u8; 22] = read_array(reader)?;
                consumed += EXTENSIBLE_EXT_SIZE as u64;

                let mut sub_format = [0u8; 16];
                sub_format.copy_from_slice(&ext[6..22]);
                fmt.extended = Some(ExtendedFormatInfo::try_new(
                    u16_at(&ext, 0),
                    u32_at(&ext, 2),
                    sub_format,
                )?);
            }
        } else if fmt.format_code == FormatCode::Extensible {
            return Err(WavError::InvalidFmtChunkSize(chunk_size).into());
        }

        Ok((fmt, consumed))
    }

    /// Build the fmt chunk a writer emits for `format`
    pub const fn from_write_format(format: &WriteFormat) -> Self {
        let block_align = format.block_align();
        FmtChunk {
            format_code: format.sample_format.format_code(),
            channels: format.channels,
            sample_rate: format.sample_rate,
            byte_rate: format.sample_rate.saturating_mul(block_align as u32),
            block_align,
            bits_per_sample: format.bits_per_sample,
            extended: None,
        }
    }

    /// Format tag after resolving WAVE_FORMAT_EXTENSIBLE
    pub const fn effective_format_code(&self) -> FormatCode {
        match self.extended {
            Some(ext) => ext.format_code,
            None => self.format_code,
        }
    }

    pub fn sample_format(&self) -> AudioIOResult<SampleFormat> {
        SampleFormat::try_from(self.effective_format_code())
    }

    /// Bytes occupied by one frame of uncompressed data.
    ///
    /// Byte-aligned depths are computed from the bit depth; anything else
    /// trusts `block_align`.
    pub const fn bytes_per_frame(&self) -> u64 {
        if self.bits_per_sample % 8 == 0 {
            (self.bits_per_sample as u64 / 8) * self.channels as u64
        } else {
            self.block_align as u64
        }
    }

    /// Bytes occupied by one sample of uncompressed data
    pub const fn bytes_per_sample(&self) -> u64 {
        if self.channels == 0 {
            return 0;
        }
        self.bytes_per_frame() / self.channels as u64
    }

    /// Reject descriptors the decoders cannot handle.
    pub fn validate(&self) -> AudioIOResult<SampleFormat> {
        if self.channels == 0 {
            return Err(WavError::invalid_format("Channels cannot be zero").into());
        }
        if self.sample_rate == 0 {
            return Err(WavError::invalid_format("Sample rate cannot be zero").into());
        }
        if self.bits_per_sample == 0 {
            return Err(WavError::invalid_format("Bits per sample cannot be zero").into());
        }
        if self.block_align == 0 {
            return Err(WavError::invalid_format("Block align cannot be zero").into());
        }
        if self.channels > MAX_CHANNELS {
            return Err(WavError::invalid_format(format!(
                "Too many channels: {} (maximum {})",
                self.channels, MAX_CHANNELS
            ))
            .into());
        }
        if self.sample_rate > MAX_SAMPLE_RATE {
            return Err(WavError::invalid_format(format!(
                "Sample rate too high: {} Hz (maximum {})",
                self.sample_rate, MAX_SAMPLE_RATE
            ))
            .into());
        }
        if self.bits_per_sample > MAX_BITS_PER_SAMPLE {
            return Err(WavError::invalid_format(format!(
                "Bits per sample too high: {} (maximum {})",
                self.bits_per_sample, MAX_BITS_PER_SAMPLE
            ))
            .into());
        }

        let sample_format = self.sample_format()?;
        match sample_format {
            SampleFormat::MsAdpcm | SampleFormat::ImaAdpcm => {
                if self.channels > 2 {
                    return Err(AudioIOError::unsupported_format(format!(
                        "{} with {} channels (at most 2 are supported)",
                        sample_format, self.channels
                    )));
                }
                let header_len = match sample_format {
                    SampleFormat::MsAdpcm => 7,
                    _ => 4,
                } * self.channels as u64;
                if (self.block_align as u64) < header_len {
                    return Err(WavError::invalid_format(format!(
                        "Block align {} is smaller than the {}-byte {} block header",
                        self.block_align, header_len, sample_format
                    ))
                    .into());
                }
            }
            SampleFormat::ALaw | SampleFormat::MuLaw => {
                if self.bytes_per_frame() == 0 {
                    return Err(WavError::invalid_format(format!(
                        "{} stream with zero bytes per frame",
                        sample_format
                    ))
                    .into());
                }
                if self.bytes_per_sample() != 1 {
                    return Err(WavError::unsupported_sample_format(format!(
                        "{} with {} bytes per sample",
                        sample_format,
                        self.bytes_per_sample()
                    ))
                    .into());
                }
            }
            SampleFormat::Pcm => {
                let bps = self.bytes_per_sample();
                if bps == 0 || bps > 8 || self.bytes_per_frame() % self.channels as u64 != 0 {
                    return Err(WavError::unsupported_sample_format(format!(
                        "PCM with {} bits per sample and block align {}",
                        self.bits_per_sample, self.block_align
                    ))
                    .into());
                }
            }
            SampleFormat::IeeeFloat => {
                if !matches!(self.bits_per_sample, 32 | 64) {
                    return Err(WavError::unsupported_sample_format(format!(
                        "IEEE float with {} bits per sample",
                        self.bits_per_sample
                    ))
                    .into());
                }
            }
        }

        Ok(sample_format)
    }

    /// Serialized body size as written by [`FmtChunk::write`]
    pub const fn body_size(&self) -> u64 {
        match self.format_code {
            FormatCode::Pcm => BASE_FMT_SIZE,
            _ => BASE_FMT_SIZE + 2,
        }
    }

    /// Write the chunk (header and body). Non-PCM tags get a zero `cbSize`.
    pub fn write<W: Write + ?Sized>(
        &self,
        writer: &mut W,
        container: ContainerKind,
    ) -> AudioIOResult<()> {
        if self.extended.is_some() {
            return Err(AudioIOError::invalid_parameters(
                "WAVE_FORMAT_EXTENSIBLE is not supported for writing",
            ));
        }
        let body_size = self.body_size();
        write_chunk_header(writer, container, FMT_CHUNK, body_size)?;
        write_u16(writer, self.format_code.as_u16())?;
        write_u16(writer, self.channels)?;
        write_u32(writer, self.sample_rate)?;
        write_u32(writer, self.byte_rate)?;
        write_u16(writer, self.block_align)?;
        write_u16(writer, self.bits_per_sample)?;
        if body_size > BASE_FMT_SIZE {
            write_u16(writer, 0)?;
        }
        // Wave64 bodies pad to 8 bytes
        let padding = chunk_padding(container, body_size);
        if padding > 0 {
            writer.write_all(&[0u8; 8][..padding as usize])?;
        }
        Ok(())
    }
}

impl Display for FmtChunk {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(
            f,
            "FmtChunk {{ format: {}, channels: {}, sample_rate: {}, byte_rate: {}, block_align: {}, bits_per_sample: {} }}",
            self.effective_format_code(),
            self.channels,
            self.sample_rate,
            self.byte_rate,
            self.block_align,
            self.bits_per_sample
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn make_base_fmt_bytes(
        format_code: u16,
        channels: u16,
        sample_rate: u32,
        block_align: u16,
        bits_per_sample: u16,
    ) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(16);
        bytes.extend_from_slice(&format_code.to_le_bytes());
        bytes.extend_from_slice(&channels.to_le_bytes());
        bytes.extend_from_slice(&sample_rate.to_le_bytes());
        bytes.extend_from_slice(&(sample_rate * block_align as u32).to_le_bytes());
        bytes.extend_from_slice(&block_align.to_le_bytes());
        bytes.extend_from_slice(&bits_per_sample.to_le_bytes());
        bytes
    }

    fn parse(bytes: &[u8]) -> AudioIOResult<(FmtChunk, u64)> {
        FmtChunk::parse(&mut Cursor::new(bytes), bytes.len() as u64)
    }

    #[test]
    fn test_parse_base_pcm() {
        let bytes = make_base_fmt_bytes(1, 2, 44_100, 4, 16);
        let (fmt, consumed) = parse(&bytes).unwrap();
        assert_eq!(consumed, 16);
        assert_eq!(fmt.validate().unwrap(), SampleFormat::Pcm);
        assert_eq!(fmt.bytes_per_frame(), 4);
        assert_eq!(fmt.bytes_per_sample(), 2);
    }

    #[test]
    fn test_parse_rejects_short_chunk() {
        let bytes = make_base_fmt_bytes(1, 2, 44_100, 4, 16);
        let err = FmtChunk::parse(&mut Cursor::new(&bytes), 14).unwrap_err();
        assert!(matches!(
            err,
            AudioIOError::WavError(WavError::InvalidFmtChunkSize(14))
        ));
    }

    #[test]
    fn test_parse_extensible_float() {
        let mut bytes = make_base_fmt_bytes(0xFFFE, 2, 48_000, 8, 32);
        bytes.extend_from_slice(&22u16.to_le_bytes());
        bytes.extend_from_slice(&32u16.to_le_bytes());
        bytes.extend_from_slice(&3u32.to_le_bytes());
        bytes.extend_from_slice(&3u16.to_le_bytes());
        bytes.extend_from_slice(&ExtendedFormatInfo::WAV_SUBFORMAT_GUID_TAIL);
        let (fmt, consumed) = parse(&bytes).unwrap();
        assert_eq!(consumed, 40);
        assert_eq!(fmt.format_code, FormatCode::Extensible);
        assert_eq!(fmt.validate().unwrap(), SampleFormat::IeeeFloat);
        assert_eq!(fmt.extended.unwrap().channel_mask, 3);
    }

    #[test]
    fn test_parse_extensible_bad_cb_size() {
        let mut bytes = make_base_fmt_bytes(0xFFFE, 2, 48_000, 8, 32);
        bytes.extend_from_slice(&20u16.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 22]);
        assert!(parse(&bytes).is_err());
    }

    #[test]
    fn test_parse_leaves_trailing_bytes() {
        // IMA ADPCM carries cbSize = 2 plus samplesPerBlock
        let mut bytes = make_base_fmt_bytes(0x11, 1, 8000, 256, 4);
        bytes.extend_from_slice(&2u16.to_le_bytes());
        bytes.extend_from_slice(&505u16.to_le_bytes());
        let (fmt, consumed) = parse(&bytes).unwrap();
        assert_eq!(consumed, 18);
        assert_eq!(fmt.validate().unwrap(), SampleFormat::ImaAdpcm);
    }

    #[test]
    fn test_validate_limits() {
        let (fmt, _) = parse(&make_base_fmt_bytes(1, 0, 44_100, 4, 16)).unwrap();
        assert!(fmt.validate().unwrap_err().to_string().contains("Channels cannot be zero"));

        let (fmt, _) = parse(&make_base_fmt_bytes(1, 300, 44_100, 600, 16)).unwrap();
        assert!(fmt.validate().unwrap_err().to_string().contains("Too many channels"));

        let (fmt, _) = parse(&make_base_fmt_bytes(1, 1, 500_000, 2, 16)).unwrap();
        assert!(fmt.validate().unwrap_err().to_string().contains("Sample rate too high"));

        let (fmt, _) = parse(&make_base_fmt_bytes(1, 1, 44_100, 0, 16)).unwrap();
        assert!(fmt.validate().unwrap_err().to_string().contains("Block align"));
    }

    #[test]
    fn test_validate_rejects_multichannel_adpcm() {
        let (fmt, _) = parse(&make_base_fmt_bytes(2, 4, 22_050, 1024, 4)).unwrap();
        assert!(matches!(
            fmt.validate().unwrap_err(),
            AudioIOError::UnsupportedFormat(_)
        ));
    }

    #[test]
    fn test_non_byte_aligned_depth_uses_block_align() {
        let (fmt, _) = parse(&make_base_fmt_bytes(1, 2, 44_100, 4, 12)).unwrap();
        assert_eq!(fmt.bytes_per_frame(), 4);
        assert_eq!(fmt.validate().unwrap(), SampleFormat::Pcm);
    }

    #[test]
    fn test_write_then_parse() {
        let format = WriteFormat::mulaw(1, 8000);
        let fmt = FmtChunk::from_write_format(&format);
        let mut out = Vec::new();
        fmt.write(&mut out, ContainerKind::Riff).unwrap();
        assert_eq!(&out[0..4], b"fmt ");
        assert_eq!(u32::from_le_bytes([out[4], out[5], out[6], out[7]]), 18);
        let (parsed, _) = parse(&out[8..]).unwrap();
        assert_eq!(parsed, fmt);
    }

    #[test]
    fn test_write_wave64_pads_to_eight() {
        let fmt = FmtChunk::from_write_format(&WriteFormat::pcm(1, 8000, 16));
        let mut out = Vec::new();
        fmt.write(&mut out, ContainerKind::Wave64).unwrap();
        assert_eq!(out.len(), 24 + 16);
        let fmt = FmtChunk::from_write_format(&WriteFormat::float(1, 8000, 32));
        let mut out = Vec::new();
        fmt.write(&mut out, ContainerKind::Wave64).unwrap();
        assert_eq!(out.len(), 24 + 18 + 6);
    }
}
