use std::io::{self, Read};

use crate::{error::AudioIOResult, wav::endian::read_fully};

/// Standard predictor coefficient pairs
pub const COEFF1: [i32; 7] = [256, 512, 0, 192, 240, 460, 392];
pub const COEFF2: [i32; 7] = [0, -256, 0, 64, 0, -208, -232];

/// Delta scale per nibble
pub const ADAPTATION_TABLE: [i32; 16] = [
    230, 230, 230, 230, 307, 409, 512, 614, 768, 614, 512, 409, 307, 230, 230, 230,
];

const MIN_DELTA: i32 = 16;

/// Block header bytes per channel
pub const HEADER_BYTES_PER_CHANNEL: usize = 7;

/// Frames held in one block of `block_align` bytes
pub const fn frames_per_block(block_align: u64, channels: u64) -> u64 {
    let header = HEADER_BYTES_PER_CHANNEL as u64 * channels;
    if block_align < header {
        return 0;
    }
    2 + (block_align - header) * 2 / channels
}

#[derive(Debug, Clone, Copy, Default)]
struct ChannelState {
    predictor: usize,
    delta: i32,
    /// Most recent output
    prev1: i32,
    prev2: i32,
}

impl ChannelState {
    #[inline]
    fn decode(&mut self, nibble: u8) -> i16 {
        let signed = if nibble & 0x08 != 0 {
            nibble as i32 - 16
        } else {
            nibble as i32
        };
        let predicted =
            (self.prev1 * COEFF1[self.predictor] + self.prev2 * COEFF2[self.predictor]) >> 8;
        let sample = predicted
            .saturating_add(signed.saturating_mul(self.delta))
            .clamp(i16::MIN as i32, i16::MAX as i32);
        self.prev2 = self.prev1;
        self.prev1 = sample;
        self.delta =
            (ADAPTATION_TABLE[nibble as usize].saturating_mul(self.delta) >> 8).max(MIN_DELTA);
        sample as i16
    }
}

/// Block decoder for Microsoft ADPCM, mono or stereo.
///
/// Each block opens with a per-channel header (predictor index, delta and two
/// seed samples); every following byte carries two nibbles, high nibble first.
/// Frames produced but not yet handed out are kept in `cache` between calls.
#[derive(Debug, Clone)]
pub struct MsAdpcmDecoder {
    channels: usize,
    block_align: u64,
    bytes_remaining: u64,
    state: [ChannelState; 2],
    cache: [i16; 4],
    cache_len: usize,
    cache_pos: usize,
}

impl MsAdpcmDecoder {
    pub fn new(channels: u16, block_align: u16) -> Self {
        MsAdpcmDecoder {
            channels: channels as usize,
            block_align: block_align as u64,
            bytes_remaining: 0,
            state: [ChannelState::default(); 2],
            cache: [0; 4],
            cache_len: 0,
            cache_pos: 0,
        }
    }

    /// Forget all decoder state; the next read starts a fresh block
    pub fn reset(&mut self) {
        self.bytes_remaining = 0;
        self.state = [ChannelState::default(); 2];
        self.cache_len = 0;
        self.cache_pos = 0;
    }

    /// Decode up to `out.len() / channels` frames of interleaved samples.
    ///
    /// Returns the number of frames written. Fewer than requested means the
    /// source ran dry or a corrupt block was abandoned.
    pub fn read_frames<R: Read + ?Sized>(
        &mut self,
        reader: &mut R,
        out: &mut [i16],
    ) -> AudioIOResult<usize> {
        let channels = self.channels;
        let wanted = out.len() / channels;
        let mut frames = 0;

        while frames < wanted {
            while self.cache_pos < self.cache_len && frames < wanted {
                out[frames * channels..(frames + 1) * channels]
                    .copy_from_slice(&self.cache[self.cache_pos..self.cache_pos + channels]);
                self.cache_pos += channels;
                frames += 1;
            }
            if frames == wanted {
                break;
            }

            let refilled = if self.bytes_remaining == 0 {
                self.load_block_header(reader)?
            } else {
                self.decode_byte(reader)?
            };
            if !refilled {
                break;
            }
        }

        Ok(frames)
    }

    fn load_block_header<R: Read + ?Sized>(&mut self, reader: &mut R) -> io::Result<bool> {
        let channels = self.channels;
        let header_len = HEADER_BYTES_PER_CHANNEL * channels;
        let mut header = [0u8; HEADER_BYTES_PER_CHANNEL * 2];
        if read_fully(reader, &mut header[..header_len])? < header_len {
            return Ok(false);
        }

        // Stereo headers interleave each field per channel
        let field = |offset: usize, ch: usize| {
            let at = offset * channels + ch * 2;
            i16::from_le_bytes([header[at], header[at + 1]]) as i32
        };
        for ch in 0..channels {
            let predictor = header[ch] as usize;
            if predictor >= COEFF1.len() {
                log::warn!(
                    "MS-ADPCM block with predictor index {} on channel {}, abandoning block",
                    predictor,
                    ch
                );
                let rest = self.block_align.saturating_sub(header_len as u64);
                io::copy(&mut (&mut *reader).take(rest), &mut io::sink())?;
                self.bytes_remaining = 0;
                return Ok(false);
            }
            self.state[ch] = ChannelState {
                predictor,
                delta: field(1, ch),
                prev1: field(3, ch),
                prev2: field(5, ch),
            };
        }

        // Seed samples come out oldest first
        for ch in 0..channels {
            self.cache[ch] = self.state[ch].prev2 as i16;
            self.cache[channels + ch] = self.state[ch].prev1 as i16;
        }
        self.cache_len = channels * 2;
        self.cache_pos = 0;
        self.bytes_remaining = self.block_align.saturating_sub(header_len as u64);
        log::trace!("MS-ADPCM block: {} data bytes", self.bytes_remaining);
        Ok(true)
    }

    fn decode_byte<R: Read + ?Sized>(&mut self, reader: &mut R) -> io::Result<bool> {
        let mut byte = [0u8; 1];
        if read_fully(reader, &mut byte)? == 0 {
            self.bytes_remaining = 0;
            return Ok(false);
        }
        self.bytes_remaining -= 1;

        let high = byte[0] >> 4;
        let low = byte[0] & 0x0F;
        if self.channels == 1 {
            self.cache[0] = self.state[0].decode(high);
            self.cache[1] = self.state[0].decode(low);
        } else {
            self.cache[0] = self.state[0].decode(high);
            self.cache[1] = self.state[1].decode(low);
        }
        self.cache_len = 2;
        self.cache_pos = 0;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn mono_block() -> Vec<u8> {
        let mut block = vec![0u8];
        block.extend_from_slice(&16i16.to_le_bytes());
        block.extend_from_slice(&100i16.to_le_bytes());
        block.extend_from_slice(&50i16.to_le_bytes());
        block.extend_from_slice(&[0x12, 0xF0, 0x00, 0x00]);
        block
    }

    const MONO_EXPECTED: [i16; 10] = [50, 100, 116, 148, 132, 132, 132, 132, 132, 132];

    #[test]
    fn test_mono_block_decode() {
        let block = mono_block();
        let mut decoder = MsAdpcmDecoder::new(1, block.len() as u16);
        let mut out = [0i16; 16];
        let frames = decoder.read_frames(&mut Cursor::new(&block), &mut out).unwrap();
        assert_eq!(frames, 10);
        assert_eq!(&out[..10], &MONO_EXPECTED);
        assert_eq!(frames_per_block(block.len() as u64, 1), 10);
    }

    #[test]
    fn test_cache_carries_across_odd_reads() {
        let block = mono_block();
        let mut decoder = MsAdpcmDecoder::new(1, block.len() as u16);
        let mut cursor = Cursor::new(&block);
        let mut collected = Vec::new();
        let mut out = [0i16; 3];
        loop {
            let frames = decoder.read_frames(&mut cursor, &mut out).unwrap();
            if frames == 0 {
                break;
            }
            collected.extend_from_slice(&out[..frames]);
        }
        assert_eq!(collected, MONO_EXPECTED);
    }

    #[test]
    fn test_stereo_nibble_order() {
        let mut block = vec![0u8, 0u8];
        for value in [16i16, 16, 10, -10, 5, -5] {
            block.extend_from_slice(&value.to_le_bytes());
        }
        // High nibble left, low nibble right
        block.push(0x1F);
        let mut decoder = MsAdpcmDecoder::new(2, block.len() as u16);
        let mut out = [0i16; 6];
        let frames = decoder.read_frames(&mut Cursor::new(&block), &mut out).unwrap();
        assert_eq!(frames, 3);
        assert_eq!(out, [5, -5, 10, -10, 26, -26]);
    }

    #[test]
    fn test_bad_predictor_stops() {
        let mut block = mono_block();
        block[0] = 9;
        let mut decoder = MsAdpcmDecoder::new(1, block.len() as u16);
        let mut out = [0i16; 4];
        let frames = decoder.read_frames(&mut Cursor::new(&block), &mut out).unwrap();
        assert_eq!(frames, 0);
    }

    #[test]
    fn test_reset_reproduces_output() {
        let block = mono_block();
        let mut decoder = MsAdpcmDecoder::new(1, block.len() as u16);
        let mut first = [0i16; 10];
        decoder.read_frames(&mut Cursor::new(&block), &mut first[..5]).unwrap();
        decoder.reset();
        let mut second = [0i16; 10];
        decoder.read_frames(&mut Cursor::new(&block), &mut second).unwrap();
        assert_eq!(second, MONO_EXPECTED);
        assert_eq!(first[..5], MONO_EXPECTED[..5]);
    }
}
