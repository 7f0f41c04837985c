use std::io::{self, Read};

use crate::{error::AudioIOResult, wav::endian::read_fully};

pub const STEP_TABLE: [i32; 89] = [
    7, 8, 9, 10, 11, 12, 13, 14, 16, 17, 19, 21, 23, 25, 28, 31, 34, 37, 41, 45, 50, 55, 60, 66,
    73, 80, 88, 97, 107, 118, 130, 143, 157, 173, 190, 209, 230, 253, 279, 307, 337, 371, 408, 449,
    494, 544, 598, 658, 724, 796, 876, 963, 1060, 1166, 1282, 1411, 1552, 1707, 1878, 2066, 2272,
    2499, 2749, 3024, 3327, 3660, 4026, 4428, 4871, 5358, 5894, 6484, 7132, 7845, 8630, 9493,
    10442, 11487, 12635, 13899, 15289, 16818, 18500, 20350, 22385, 24623, 27086, 29794, 32767,
];

pub const INDEX_TABLE: [i32; 16] = [-1, -1, -1, -1, 2, 4, 6, 8, -1, -1, -1, -1, 2, 4, 6, 8];

/// Block header bytes per channel
pub const HEADER_BYTES_PER_CHANNEL: usize = 4;
/// Data bytes per channel in one interleave group (8 nibbles)
const GROUP_BYTES_PER_CHANNEL: usize = 4;
const FRAMES_PER_GROUP: usize = 8;

/// Frames held in one block of `block_align` bytes
pub const fn frames_per_block(block_align: u64, channels: u64) -> u64 {
    let header = HEADER_BYTES_PER_CHANNEL as u64 * channels;
    if block_align < header {
        return 0;
    }
    1 + (block_align - header) * 2 / channels
}

#[derive(Debug, Clone, Copy, Default)]
struct ChannelState {
    predictor: i32,
    step_index: i32,
}

impl ChannelState {
    #[inline]
    fn decode(&mut self, nibble: u8) -> i16 {
        let step = STEP_TABLE[self.step_index as usize];
        let mut diff = step >> 3;
        if nibble & 0x01 != 0 {
            diff += step >> 2;
        }
        if nibble & 0x02 != 0 {
            diff += step >> 1;
        }
        if nibble & 0x04 != 0 {
            diff += step;
        }
        if nibble & 0x08 != 0 {
            diff = -diff;
        }
        self.predictor = (self.predictor + diff).clamp(i16::MIN as i32, i16::MAX as i32);
        self.step_index = (self.step_index + INDEX_TABLE[nibble as usize]).clamp(0, 88);
        self.predictor as i16
    }
}

/// Block decoder for IMA/DVI ADPCM, mono or stereo.
///
/// Data after the block header is interleaved in groups of four bytes per
/// channel, low nibble first. A header whose step index falls outside the
/// step table marks the block as corrupt; it is skipped and the read ends.
#[derive(Debug, Clone)]
pub struct ImaAdpcmDecoder {
    channels: usize,
    block_align: u64,
    bytes_remaining: u64,
    state: [ChannelState; 2],
    cache: [i16; FRAMES_PER_GROUP * 2],
    cache_len: usize,
    cache_pos: usize,
}

impl ImaAdpcmDecoder {
    pub fn new(channels: u16, block_align: u16) -> Self {
        ImaAdpcmDecoder {
            channels: channels as usize,
            block_align: block_align as u64,
            bytes_remaining: 0,
            state: [ChannelState::default(); 2],
            cache: [0; FRAMES_PER_GROUP * 2],
            cache_len: 0,
            cache_pos: 0,
        }
    }

    pub fn reset(&mut self) {
        self.bytes_remaining = 0;
        self.state = [ChannelState::default(); 2];
        self.cache_len = 0;
        self.cache_pos = 0;
    }

    /// Decode up to `out.len() / channels` frames of interleaved samples
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
                self.decode_group(reader)?
            };
            if !refilled {
                break;
            }
        }

        Ok(frames)
    }

    fn skip_block_rest<R: Read + ?Sized>(&mut self, reader: &mut R, rest: u64) -> io::Result<()> {
        io::copy(&mut (&mut *reader).take(rest), &mut io::sink())?;
        self.bytes_remaining = 0;
        Ok(())
    }

    fn load_block_header<R: Read + ?Sized>(&mut self, reader: &mut R) -> io::Result<bool> {
        let channels = self.channels;
        let header_len = HEADER_BYTES_PER_CHANNEL * channels;
        let mut header = [0u8; HEADER_BYTES_PER_CHANNEL * 2];
        if read_fully(reader, &mut header[..header_len])? < header_len {
            return Ok(false);
        }

        for ch in 0..channels {
            let at = ch * HEADER_BYTES_PER_CHANNEL;
            let predictor = i16::from_le_bytes([header[at], header[at + 1]]) as i32;
            let step_index = header[at + 2] as i32;
            if step_index as usize >= STEP_TABLE.len() {
                log::warn!(
                    "IMA ADPCM block with step index {} on channel {}, skipping block",
                    step_index,
                    ch
                );
                self.skip_block_rest(reader, self.block_align.saturating_sub(header_len as u64))?;
                return Ok(false);
            }
            self.state[ch] = ChannelState {
                predictor,
                step_index,
            };
            self.cache[ch] = predictor as i16;
        }

        self.cache_len = channels;
        self.cache_pos = 0;
        self.bytes_remaining = self.block_align.saturating_sub(header_len as u64);
        log::trace!("IMA ADPCM block: {} data bytes", self.bytes_remaining);
        Ok(true)
    }

    fn decode_group<R: Read + ?Sized>(&mut self, reader: &mut R) -> io::Result<bool> {
        let channels = self.channels;
        let group_len = GROUP_BYTES_PER_CHANNEL * channels;
        if self.bytes_remaining < group_len as u64 {
            // Trailing bytes too short for a whole group carry no frames
            let rest = self.bytes_remaining;
            self.skip_block_rest(reader, rest)?;
            return Ok(true);
        }

        let mut group = [0u8; GROUP_BYTES_PER_CHANNEL * 2];
        if read_fully(reader, &mut group[..group_len])? < group_len {
            self.bytes_remaining = 0;
            return Ok(false);
        }
        self.bytes_remaining -= group_len as u64;

        for ch in 0..channels {
            let bytes = &group[ch * GROUP_BYTES_PER_CHANNEL..(ch + 1) * GROUP_BYTES_PER_CHANNEL];
            for (i, byte) in bytes.iter().enumerate() {
                self.cache[(i * 2) * channels + ch] = self.state[ch].decode(byte & 0x0F);
                self.cache[(i * 2 + 1) * channels + ch] = self.state[ch].decode(byte >> 4);
            }
        }
        self.cache_len = FRAMES_PER_GROUP * channels;
        self.cache_pos = 0;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn mono_block() -> Vec<u8> {
        let mut block = Vec::new();
        block.extend_from_slice(&100i16.to_le_bytes());
        block.extend_from_slice(&[0, 0]);
        block.extend_from_slice(&[0x17, 0x7F, 0x00, 0x88]);
        block
    }

    const MONO_EXPECTED: [i16; 9] = [100, 111, 117, 92, 148, 156, 163, 157, 151];

    #[test]
    fn test_step_table_shape() {
        assert_eq!(STEP_TABLE.len(), 89);
        assert_eq!(STEP_TABLE[88], 32767);
    }

    #[test]
    fn test_mono_block_decode() {
        let block = mono_block();
        let mut decoder = ImaAdpcmDecoder::new(1, block.len() as u16);
        let mut out = [0i16; 12];
        let frames = decoder.read_frames(&mut Cursor::new(&block), &mut out).unwrap();
        assert_eq!(frames, 9);
        assert_eq!(&out[..9], &MONO_EXPECTED);
        assert_eq!(frames_per_block(block.len() as u64, 1), 9);
    }

    #[test]
    fn test_odd_sized_reads_match() {
        let block = mono_block();
        let mut decoder = ImaAdpcmDecoder::new(1, block.len() as u16);
        let mut cursor = Cursor::new(&block);
        let mut collected = Vec::new();
        let mut out = [0i16; 2];
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
    fn test_stereo_groups_interleave() {
        let mut block = Vec::new();
        block.extend_from_slice(&100i16.to_le_bytes());
        block.extend_from_slice(&[0, 0]);
        block.extend_from_slice(&(-100i16).to_le_bytes());
        block.extend_from_slice(&[0, 0]);
        block.extend_from_slice(&[0x17, 0x7F, 0x00, 0x88]);
        block.extend_from_slice(&[0x00; 4]);
        let mut decoder = ImaAdpcmDecoder::new(2, block.len() as u16);
        let mut out = [0i16; 18];
        let frames = decoder.read_frames(&mut Cursor::new(&block), &mut out).unwrap();
        assert_eq!(frames, 9);
        let left: Vec<i16> = out.iter().step_by(2).copied().collect();
        assert_eq!(left, MONO_EXPECTED);
        // Nibble 0 adds step >> 3 at step index 0 and keeps the index at 0
        assert_eq!(out[1], -100);
        assert_eq!(out[3], -100);
    }

    #[test]
    fn test_corrupt_step_index_skips_block() {
        let mut data = mono_block();
        data[2] = 89;
        data.extend_from_slice(&mono_block());
        let mut decoder = ImaAdpcmDecoder::new(1, 8);
        let mut cursor = Cursor::new(&data);
        let mut out = [0i16; 9];
        assert_eq!(decoder.read_frames(&mut cursor, &mut out).unwrap(), 0);
        assert_eq!(cursor.position(), 8);
        assert_eq!(decoder.read_frames(&mut cursor, &mut out).unwrap(), 9);
        assert_eq!(out, MONO_EXPECTED);
    }
}
