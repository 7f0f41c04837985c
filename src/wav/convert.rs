//! Sample conversions between on-disk encodings and the three canonical
//! in-memory formats (`i16`, `i32`, `f32`).
//!
//! Every converter processes `min(src, dst)` samples and never allocates.
//! Byte-oriented sources (`u8`, 24-bit, companded, arbitrary-width PCM) are
//! little-endian as stored in a WAV data chunk.

use crate::{
    types::SampleFormat,
    wav::codecs::law::{ALAW_TO_S16, ULAW_TO_S16, linear_to_alaw, linear_to_ulaw},
};

const I24_SCALE: f32 = 8_388_608.0;
const I32_SCALE: f32 = 2_147_483_648.0;
const I64_SCALE: f64 = 9_223_372_036_854_775_808.0;

/// Sign-extend up to eight little-endian bytes into the top of an `i64`
#[inline]
fn pcm_top_aligned(bytes: &[u8]) -> i64 {
    let mut word = [0u8; 8];
    word[8 - bytes.len()..].copy_from_slice(bytes);
    i64::from_le_bytes(word)
}

#[inline]
fn s24_value(bytes: &[u8]) -> i32 {
    i32::from_le_bytes([0, bytes[0], bytes[1], bytes[2]]) >> 8
}

#[inline]
fn f32_sample_to_s16(x: f32) -> i16 {
    let x = x.clamp(-1.0, 1.0);
    (((x + 1.0) * 32767.5) as i32 - 32768) as i16
}

#[inline]
fn f64_sample_to_s16(x: f64) -> i16 {
    let x = x.clamp(-1.0, 1.0);
    (((x + 1.0) * 32767.5) as i32 - 32768) as i16
}

#[inline]
fn f32_sample_to_s32(x: f32) -> i32 {
    // `as` saturates at the i32 bounds and maps NaN to 0
    (x as f64 * I32_SCALE as f64) as i32
}

#[inline]
fn f64_sample_to_s32(x: f64) -> i32 {
    (x * I32_SCALE as f64) as i32
}

// ---------------------------------------------------------------------------
// To i16

pub fn u8_to_s16(src: &[u8], dst: &mut [i16]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = (s as i16 - 128) << 8;
    }
}

/// `src` holds packed 24-bit samples, three bytes each
pub fn s24_to_s16(src: &[u8], dst: &mut [i16]) {
    for (d, s) in dst.iter_mut().zip(src.chunks_exact(3)) {
        *d = i16::from_le_bytes([s[1], s[2]]);
    }
}

pub fn s32_to_s16(src: &[i32], dst: &mut [i16]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = (s >> 16) as i16;
    }
}

pub fn f32_to_s16(src: &[f32], dst: &mut [i16]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = f32_sample_to_s16(s);
    }
}

pub fn f64_to_s16(src: &[f64], dst: &mut [i16]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = f64_sample_to_s16(s);
    }
}

pub fn alaw_to_s16(src: &[u8], dst: &mut [i16]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = ALAW_TO_S16[s as usize];
    }
}

pub fn ulaw_to_s16(src: &[u8], dst: &mut [i16]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = ULAW_TO_S16[s as usize];
    }
}

/// Signed PCM of `bytes_per_sample` (1 means unsigned 8-bit) to `i16`
pub fn pcm_to_s16(src: &[u8], dst: &mut [i16], bytes_per_sample: usize) {
    match bytes_per_sample {
        0 => {}
        n if n > 8 => {}
        1 => u8_to_s16(src, dst),
        _ => {
            for (d, s) in dst.iter_mut().zip(src.chunks_exact(bytes_per_sample)) {
                *d = (pcm_top_aligned(s) >> 48) as i16;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// To i32

pub fn u8_to_s32(src: &[u8], dst: &mut [i32]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = (s as i32 - 128) << 24;
    }
}

pub fn s16_to_s32(src: &[i16], dst: &mut [i32]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = (s as i32) << 16;
    }
}

pub fn s24_to_s32(src: &[u8], dst: &mut [i32]) {
    for (d, s) in dst.iter_mut().zip(src.chunks_exact(3)) {
        *d = i32::from_le_bytes([0, s[0], s[1], s[2]]);
    }
}

pub fn f32_to_s32(src: &[f32], dst: &mut [i32]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = f32_sample_to_s32(s);
    }
}

pub fn f64_to_s32(src: &[f64], dst: &mut [i32]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = f64_sample_to_s32(s);
    }
}

pub fn alaw_to_s32(src: &[u8], dst: &mut [i32]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = (ALAW_TO_S16[s as usize] as i32) << 16;
    }
}

pub fn ulaw_to_s32(src: &[u8], dst: &mut [i32]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = (ULAW_TO_S16[s as usize] as i32) << 16;
    }
}

pub fn pcm_to_s32(src: &[u8], dst: &mut [i32], bytes_per_sample: usize) {
    match bytes_per_sample {
        0 => {}
        n if n > 8 => {}
        1 => u8_to_s32(src, dst),
        _ => {
            for (d, s) in dst.iter_mut().zip(src.chunks_exact(bytes_per_sample)) {
                *d = (pcm_top_aligned(s) >> 32) as i32;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// To f32

pub fn u8_to_f32(src: &[u8], dst: &mut [f32]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = s as f32 / 127.5 - 1.0;
    }
}

pub fn s16_to_f32(src: &[i16], dst: &mut [f32]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = s as f32 / 32768.0;
    }
}

pub fn s24_to_f32(src: &[u8], dst: &mut [f32]) {
    for (d, s) in dst.iter_mut().zip(src.chunks_exact(3)) {
        *d = s24_value(s) as f32 / I24_SCALE;
    }
}

pub fn s32_to_f32(src: &[i32], dst: &mut [f32]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = (s as f64 / I32_SCALE as f64) as f32;
    }
}

pub fn f64_to_f32(src: &[f64], dst: &mut [f32]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = s as f32;
    }
}

pub fn alaw_to_f32(src: &[u8], dst: &mut [f32]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = ALAW_TO_S16[s as usize] as f32 / 32768.0;
    }
}

pub fn ulaw_to_f32(src: &[u8], dst: &mut [f32]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = ULAW_TO_S16[s as usize] as f32 / 32768.0;
    }
}

pub fn pcm_to_f32(src: &[u8], dst: &mut [f32], bytes_per_sample: usize) {
    match bytes_per_sample {
        0 => {}
        n if n > 8 => {}
        1 => u8_to_f32(src, dst),
        _ => {
            for (d, s) in dst.iter_mut().zip(src.chunks_exact(bytes_per_sample)) {
                *d = (pcm_top_aligned(s) as f64 / I64_SCALE) as f32;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Encoders used by the writer

pub fn s16_to_u8(src: &[i16], dst: &mut [u8]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = ((s >> 8) + 128) as u8;
    }
}

pub fn s32_to_s24(src: &[i32], dst: &mut [u8]) {
    for (d, &s) in dst.chunks_exact_mut(3).zip(src) {
        d.copy_from_slice(&s.to_le_bytes()[1..4]);
    }
}

pub fn s16_to_alaw(src: &[i16], dst: &mut [u8]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = linear_to_alaw(s);
    }
}

pub fn s16_to_ulaw(src: &[i16], dst: &mut [u8]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = linear_to_ulaw(s);
    }
}

/// Layout of one uncompressed sample in a data chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskSample {
    /// Unsigned 8-bit PCM
    U8,
    /// Signed little-endian PCM of 2 to 8 bytes
    Pcm(usize),
    F32,
    F64,
    ALaw,
    MuLaw,
}

impl DiskSample {
    /// Layout for an uncompressed format, `None` for ADPCM or unusable widths
    pub const fn from_format(format: SampleFormat, bytes_per_sample: u64) -> Option<Self> {
        match (format, bytes_per_sample) {
            (SampleFormat::Pcm, 1) => Some(DiskSample::U8),
            (SampleFormat::Pcm, n) if n >= 2 && n <= 8 => Some(DiskSample::Pcm(n as usize)),
            (SampleFormat::IeeeFloat, 4) => Some(DiskSample::F32),
            (SampleFormat::IeeeFloat, 8) => Some(DiskSample::F64),
            (SampleFormat::ALaw, 1) => Some(DiskSample::ALaw),
            (SampleFormat::MuLaw, 1) => Some(DiskSample::MuLaw),
            _ => None,
        }
    }

    /// Bytes per sample
    pub const fn width(self) -> usize {
        match self {
            DiskSample::U8 | DiskSample::ALaw | DiskSample::MuLaw => 1,
            DiskSample::Pcm(n) => n,
            DiskSample::F32 => 4,
            DiskSample::F64 => 8,
        }
    }

    pub fn decode_to_s16(self, src: &[u8], dst: &mut [i16]) {
        match self {
            DiskSample::U8 => u8_to_s16(src, dst),
            DiskSample::Pcm(2) => {
                for (d, s) in dst.iter_mut().zip(src.chunks_exact(2)) {
                    *d = i16::from_le_bytes([s[0], s[1]]);
                }
            }
            DiskSample::Pcm(3) => s24_to_s16(src, dst),
            DiskSample::Pcm(n) => pcm_to_s16(src, dst, n),
            DiskSample::F32 => {
                for (d, s) in dst.iter_mut().zip(src.chunks_exact(4)) {
                    *d = f32_sample_to_s16(f32::from_le_bytes([s[0], s[1], s[2], s[3]]));
                }
            }
            DiskSample::F64 => {
                for (d, s) in dst.iter_mut().zip(src.chunks_exact(8)) {
                    *d = f64_sample_to_s16(f64_from_le(s));
                }
            }
            DiskSample::ALaw => alaw_to_s16(src, dst),
            DiskSample::MuLaw => ulaw_to_s16(src, dst),
        }
    }

    pub fn decode_to_s32(self, src: &[u8], dst: &mut [i32]) {
        match self {
            DiskSample::U8 => u8_to_s32(src, dst),
            DiskSample::Pcm(3) => s24_to_s32(src, dst),
            DiskSample::Pcm(4) => {
                for (d, s) in dst.iter_mut().zip(src.chunks_exact(4)) {
                    *d = i32::from_le_bytes([s[0], s[1], s[2], s[3]]);
                }
            }
            DiskSample::Pcm(n) => pcm_to_s32(src, dst, n),
            DiskSample::F32 => {
                for (d, s) in dst.iter_mut().zip(src.chunks_exact(4)) {
                    *d = f32_sample_to_s32(f32::from_le_bytes([s[0], s[1], s[2], s[3]]));
                }
            }
            DiskSample::F64 => {
                for (d, s) in dst.iter_mut().zip(src.chunks_exact(8)) {
                    *d = f64_sample_to_s32(f64_from_le(s));
                }
            }
            DiskSample::ALaw => alaw_to_s32(src, dst),
            DiskSample::MuLaw => ulaw_to_s32(src, dst),
        }
    }

    pub fn decode_to_f32(self, src: &[u8], dst: &mut [f32]) {
        match self {
            DiskSample::U8 => u8_to_f32(src, dst),
            DiskSample::Pcm(2) => {
                for (d, s) in dst.iter_mut().zip(src.chunks_exact(2)) {
                    *d = i16::from_le_bytes([s[0], s[1]]) as f32 / 32768.0;
                }
            }
            DiskSample::Pcm(3) => s24_to_f32(src, dst),
            DiskSample::Pcm(4) => {
                for (d, s) in dst.iter_mut().zip(src.chunks_exact(4)) {
                    let value = i32::from_le_bytes([s[0], s[1], s[2], s[3]]);
                    *d = (value as f64 / I32_SCALE as f64) as f32;
                }
            }
            DiskSample::Pcm(n) => pcm_to_f32(src, dst, n),
            DiskSample::F32 => {
                for (d, s) in dst.iter_mut().zip(src.chunks_exact(4)) {
                    *d = f32::from_le_bytes([s[0], s[1], s[2], s[3]]);
                }
            }
            DiskSample::F64 => {
                for (d, s) in dst.iter_mut().zip(src.chunks_exact(8)) {
                    *d = f64_from_le(s) as f32;
                }
            }
            DiskSample::ALaw => alaw_to_f32(src, dst),
            DiskSample::MuLaw => ulaw_to_f32(src, dst),
        }
    }

    /// Encode canonical `i16` samples; `dst` holds `width()` bytes per sample
    pub fn encode_from_s16(self, src: &[i16], dst: &mut [u8]) {
        match self {
            DiskSample::U8 => s16_to_u8(src, dst),
            DiskSample::ALaw => s16_to_alaw(src, dst),
            DiskSample::MuLaw => s16_to_ulaw(src, dst),
            DiskSample::F32 => {
                for (d, &s) in dst.chunks_exact_mut(4).zip(src) {
                    d.copy_from_slice(&(s as f32 / 32768.0).to_le_bytes());
                }
            }
            DiskSample::F64 => {
                for (d, &s) in dst.chunks_exact_mut(8).zip(src) {
                    d.copy_from_slice(&(s as f64 / 32768.0).to_le_bytes());
                }
            }
            DiskSample::Pcm(n) => {
                for (d, &s) in dst.chunks_exact_mut(n).zip(src) {
                    write_top_aligned(d, (s as i64) << 48);
                }
            }
        }
    }

    pub fn encode_from_s32(self, src: &[i32], dst: &mut [u8]) {
        match self {
            DiskSample::U8 => {
                for (d, &s) in dst.iter_mut().zip(src) {
                    *d = ((s >> 24) + 128) as u8;
                }
            }
            DiskSample::ALaw => {
                for (d, &s) in dst.iter_mut().zip(src) {
                    *d = linear_to_alaw((s >> 16) as i16);
                }
            }
            DiskSample::MuLaw => {
                for (d, &s) in dst.iter_mut().zip(src) {
                    *d = linear_to_ulaw((s >> 16) as i16);
                }
            }
            DiskSample::F32 => {
                for (d, &s) in dst.chunks_exact_mut(4).zip(src) {
                    let value = (s as f64 / I32_SCALE as f64) as f32;
                    d.copy_from_slice(&value.to_le_bytes());
                }
            }
            DiskSample::F64 => {
                for (d, &s) in dst.chunks_exact_mut(8).zip(src) {
                    d.copy_from_slice(&(s as f64 / I32_SCALE as f64).to_le_bytes());
                }
            }
            DiskSample::Pcm(3) => s32_to_s24(src, dst),
            DiskSample::Pcm(n) => {
                for (d, &s) in dst.chunks_exact_mut(n).zip(src) {
                    write_top_aligned(d, (s as i64) << 32);
                }
            }
        }
    }

    pub fn encode_from_f32(self, src: &[f32], dst: &mut [u8]) {
        match self {
            DiskSample::U8 => {
                for (d, &s) in dst.iter_mut().zip(src) {
                    *d = ((f32_sample_to_s16(s) >> 8) + 128) as u8;
                }
            }
            DiskSample::ALaw => {
                for (d, &s) in dst.iter_mut().zip(src) {
                    *d = linear_to_alaw(f32_sample_to_s16(s));
                }
            }
            DiskSample::MuLaw => {
                for (d, &s) in dst.iter_mut().zip(src) {
                    *d = linear_to_ulaw(f32_sample_to_s16(s));
                }
            }
            DiskSample::F32 => {
                for (d, &s) in dst.chunks_exact_mut(4).zip(src) {
                    d.copy_from_slice(&s.to_le_bytes());
                }
            }
            DiskSample::F64 => {
                for (d, &s) in dst.chunks_exact_mut(8).zip(src) {
                    d.copy_from_slice(&(s as f64).to_le_bytes());
                }
            }
            DiskSample::Pcm(2) => {
                for (d, &s) in dst.chunks_exact_mut(2).zip(src) {
                    d.copy_from_slice(&f32_sample_to_s16(s).to_le_bytes());
                }
            }
            DiskSample::Pcm(n) => {
                for (d, &s) in dst.chunks_exact_mut(n).zip(src) {
                    write_top_aligned(d, (f32_sample_to_s32(s) as i64) << 32);
                }
            }
        }
    }
}

#[inline]
fn f64_from_le(bytes: &[u8]) -> f64 {
    let mut word = [0u8; 8];
    word.copy_from_slice(&bytes[..8]);
    f64::from_le_bytes(word)
}

/// Store the top `dst.len()` bytes of `value` little-endian
#[inline]
fn write_top_aligned(dst: &mut [u8], value: i64) {
    let bytes = value.to_le_bytes();
    dst.copy_from_slice(&bytes[8 - dst.len()..]);
}
