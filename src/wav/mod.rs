//! WAV codec: containers, fmt parsing, sample codecs, metadata, and the
//! streaming reader and writer.

pub mod chunks;
pub mod codecs;
pub mod convert;
mod decode;
pub mod endian;
pub mod error;
pub mod fmt;
pub mod io;
pub mod metadata;
pub mod reader;
mod seek;
pub mod writer;

use core::fmt::{Display, Formatter, Result as FmtResult};

pub use io::{Seekable, Sequential};
pub use reader::WavReader;
pub use writer::WavWriter;

use crate::{error::AudioIOResult, wav::error::WavError};

/// `wFormatTag` values the codec knows by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum FormatCode {
    Pcm,
    MsAdpcm,
    IeeeFloat,
    ALaw,
    MuLaw,
    ImaAdpcm,
    Extensible,
    Unknown(u16),
}

/// Tag, short name, long name
const KNOWN_TAGS: [(u16, FormatCode, &str, &str); 7] = [
    (0x0001, FormatCode::Pcm, "PCM", "Uncompressed PCM"),
    (0x0002, FormatCode::MsAdpcm, "MS_ADPCM", "Microsoft 4-bit ADPCM"),
    (0x0003, FormatCode::IeeeFloat, "IEEE_FLOAT", "IEEE floating point"),
    (0x0006, FormatCode::ALaw, "A_LAW", "G.711 A-law"),
    (0x0007, FormatCode::MuLaw, "MU_LAW", "G.711 mu-law"),
    (0x0011, FormatCode::ImaAdpcm, "IMA_ADPCM", "IMA/DVI 4-bit ADPCM"),
    (0xFFFE, FormatCode::Extensible, "EXTENSIBLE", "WAVE_FORMAT_EXTENSIBLE"),
];

impl FormatCode {
    pub const fn as_u16(self) -> u16 {
        if let FormatCode::Unknown(tag) = self {
            return tag;
        }
        let mut i = 0;
        while i < KNOWN_TAGS.len() {
            if KNOWN_TAGS[i].1.same_variant(self) {
                return KNOWN_TAGS[i].0;
            }
            i += 1;
        }
        0
    }

    pub const fn const_from(tag: u16) -> Self {
        let mut i = 0;
        while i < KNOWN_TAGS.len() {
            if KNOWN_TAGS[i].0 == tag {
                return KNOWN_TAGS[i].1;
            }
            i += 1;
        }
        FormatCode::Unknown(tag)
    }

    const fn same_variant(self, other: FormatCode) -> bool {
        matches!(
            (self, other),
            (FormatCode::Pcm, FormatCode::Pcm)
                | (FormatCode::MsAdpcm, FormatCode::MsAdpcm)
                | (FormatCode::IeeeFloat, FormatCode::IeeeFloat)
                | (FormatCode::ALaw, FormatCode::ALaw)
                | (FormatCode::MuLaw, FormatCode::MuLaw)
                | (FormatCode::ImaAdpcm, FormatCode::ImaAdpcm)
                | (FormatCode::Extensible, FormatCode::Extensible)
        )
    }

    fn names(self) -> Option<(&'static str, &'static str)> {
        KNOWN_TAGS
            .iter()
            .find(|(_, code, _, _)| *code == self)
            .map(|&(_, _, short, long)| (short, long))
    }
}

impl From<u16> for FormatCode {
    fn from(tag: u16) -> Self {
        FormatCode::const_from(tag)
    }
}

impl From<FormatCode> for u16 {
    fn from(code: FormatCode) -> Self {
        code.as_u16()
    }
}

/// `{}` prints the short name, `{:#}` the long one
impl Display for FormatCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match (self.names(), f.alternate()) {
            (Some((_, long)), true) => f.write_str(long),
            (Some((short, _)), false) => f.write_str(short),
            (None, _) => write!(f, "UNKNOWN(0x{:04X})", self.as_u16()),
        }
    }
}

/// The 22-byte extension of a WAVE_FORMAT_EXTENSIBLE fmt chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExtendedFormatInfo {
    pub valid_bits_per_sample: u16,
    /// Speaker position bits
    pub channel_mask: u32,
    pub sub_format: [u8; 16],
    /// Tag carried in the first two GUID bytes
    pub format_code: FormatCode,
}

impl ExtendedFormatInfo {
    /// Bytes 2..16 shared by every `KSDATAFORMAT_SUBTYPE_*` WAV GUID
    pub const WAV_SUBFORMAT_GUID_TAIL: [u8; 14] = [
        0x00, 0x00, 0x10, 0x00, 0x80, 0x00, 0x00, 0xAA, 0x00, 0x38, 0x9B, 0x71, 0x00, 0x00,
    ];

    /// Resolve `sub_format` to a known tag. Fails with
    /// [`WavError::InvalidSubFormat`] for unknown or nested-extensible GUIDs.
    pub fn try_new(
        valid_bits_per_sample: u16,
        channel_mask: u32,
        sub_format: [u8; 16],
    ) -> AudioIOResult<Self> {
        let format_code = FormatCode::from(u16::from_le_bytes([sub_format[0], sub_format[1]]));
        if matches!(format_code, FormatCode::Unknown(_) | FormatCode::Extensible) {
            return Err(WavError::invalid_subformat().into());
        }
        let info = ExtendedFormatInfo {
            valid_bits_per_sample,
            channel_mask,
            sub_format,
            format_code,
        };
        if !info.is_standard_wav_subformat() {
            log::warn!(
                "Sub-format GUID for {} has a non-standard tail; decoding by tag",
                format_code
            );
        }
        Ok(info)
    }

    pub fn is_standard_wav_subformat(&self) -> bool {
        self.sub_format[2..] == Self::WAV_SUBFORMAT_GUID_TAIL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_map_both_ways() {
        for (tag, code, _, _) in KNOWN_TAGS {
            assert_eq!(FormatCode::from(tag), code);
            assert_eq!(u16::from(code), tag);
        }
        assert_eq!(FormatCode::from(0x0055), FormatCode::Unknown(0x0055));
        assert_eq!(FormatCode::Unknown(0x0055).as_u16(), 0x0055);
    }

    #[test]
    fn test_short_and_long_names() {
        assert_eq!(FormatCode::ImaAdpcm.to_string(), "IMA_ADPCM");
        assert_eq!(format!("{:#}", FormatCode::MsAdpcm), "Microsoft 4-bit ADPCM");
        assert_eq!(FormatCode::Unknown(0x55).to_string(), "UNKNOWN(0x0055)");
        assert_eq!(format!("{:#}", FormatCode::Unknown(0x55)), "UNKNOWN(0x0055)");
    }

    #[test]
    fn test_subformat_guid_resolves_tag() {
        let mut guid = [0u8; 16];
        guid[0..2].copy_from_slice(&0x0003u16.to_le_bytes());
        guid[2..].copy_from_slice(&ExtendedFormatInfo::WAV_SUBFORMAT_GUID_TAIL);
        let ext = ExtendedFormatInfo::try_new(32, 0x3, guid).unwrap();
        assert_eq!(ext.format_code, FormatCode::IeeeFloat);
        assert!(ext.is_standard_wav_subformat());

        assert!(ExtendedFormatInfo::try_new(16, 0, [0x55u8; 16]).is_err());
        let mut nested = guid;
        nested[0..2].copy_from_slice(&0xFFFEu16.to_le_bytes());
        assert!(ExtendedFormatInfo::try_new(16, 0, nested).is_err());
    }
}
