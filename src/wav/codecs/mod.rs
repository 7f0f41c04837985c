//! Sample codecs: G.711 companding tables and the two ADPCM block decoders.

pub mod ima_adpcm;
pub mod law;
pub mod ms_adpcm;

use std::io::Read;

pub use ima_adpcm::ImaAdpcmDecoder;
pub use ms_adpcm::MsAdpcmDecoder;

use crate::{error::AudioIOResult, types::SampleFormat};

/// Decoder state for the compressed formats
#[derive(Debug, Clone)]
pub enum BlockDecoder {
    MsAdpcm(MsAdpcmDecoder),
    ImaAdpcm(ImaAdpcmDecoder),
}

impl BlockDecoder {
    /// Decoder for `format`, or `None` for formats stored uncompressed
    pub fn for_format(format: SampleFormat, channels: u16, block_align: u16) -> Option<Self> {
        match format {
            SampleFormat::MsAdpcm => Some(BlockDecoder::MsAdpcm(MsAdpcmDecoder::new(
                channels,
                block_align,
            ))),
            SampleFormat::ImaAdpcm => Some(BlockDecoder::ImaAdpcm(ImaAdpcmDecoder::new(
                channels,
                block_align,
            ))),
            _ => None,
        }
    }

    pub fn read_frames<R: Read + ?Sized>(
        &mut self,
        reader: &mut R,
        out: &mut [i16],
    ) -> AudioIOResult<usize> {
        match self {
            BlockDecoder::MsAdpcm(decoder) => decoder.read_frames(reader, out),
            BlockDecoder::ImaAdpcm(decoder) => decoder.read_frames(reader, out),
        }
    }

    pub fn reset(&mut self) {
        match self {
            BlockDecoder::MsAdpcm(decoder) => decoder.reset(),
            BlockDecoder::ImaAdpcm(decoder) => decoder.reset(),
        }
    }

    /// Frames per full block, used when no `fact` chunk is present
    pub const fn frames_per_block(&self, block_align: u64, channels: u64) -> u64 {
        match self {
            BlockDecoder::MsAdpcm(_) => ms_adpcm::frames_per_block(block_align, channels),
            BlockDecoder::ImaAdpcm(_) => ima_adpcm::frames_per_block(block_align, channels),
        }
    }
}

/// Total frames of an ADPCM stream of `data_size` bytes with no `fact` chunk
pub fn adpcm_total_frames(
    format: SampleFormat,
    data_size: u64,
    block_align: u64,
    channels: u64,
) -> u64 {
    if block_align == 0 || channels == 0 {
        return 0;
    }
    let block_count = data_size.div_ceil(block_align);
    match format {
        // Each 7-byte header yields two frames, so it costs 6 bytes per channel
        SampleFormat::MsAdpcm => {
            data_size
                .saturating_sub(block_count.saturating_mul(6 * channels))
                .saturating_mul(2)
                / channels
        }
        SampleFormat::ImaAdpcm => {
            let header_bytes =
                block_count.saturating_mul(ima_adpcm::HEADER_BYTES_PER_CHANNEL as u64 * channels);
            data_size.saturating_sub(header_bytes).saturating_mul(2) / channels + block_count
        }
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adpcm_total_frames_matches_block_size() {
        // One full IMA block of 256 bytes, mono: 1 + 252 * 2
        assert_eq!(
            adpcm_total_frames(SampleFormat::ImaAdpcm, 256, 256, 1),
            ima_adpcm::frames_per_block(256, 1)
        );
        // Two MS-ADPCM stereo blocks of 512 bytes
        assert_eq!(
            adpcm_total_frames(SampleFormat::MsAdpcm, 1024, 512, 2),
            2 * ms_adpcm::frames_per_block(512, 2)
        );
    }

    #[test]
    fn test_adpcm_total_frames_degenerate() {
        assert_eq!(adpcm_total_frames(SampleFormat::ImaAdpcm, 0, 256, 1), 0);
        assert_eq!(adpcm_total_frames(SampleFormat::MsAdpcm, 3, 256, 1), 0);
    }

    #[test]
    fn test_block_decoder_dispatch() {
        assert!(BlockDecoder::for_format(SampleFormat::Pcm, 1, 2).is_none());
        let decoder = BlockDecoder::for_format(SampleFormat::ImaAdpcm, 1, 256).unwrap();
        assert_eq!(decoder.frames_per_block(256, 1), 505);
    }
}
