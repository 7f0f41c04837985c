//! G.711 A-law and µ-law companding.
//!
//! Decoding goes through 256-entry tables built at compile time; encoding is
//! the segment search from the G.711 reference coder.

const SIGN_BIT: u8 = 0x80;
const QUANT_MASK: u8 = 0x0F;
const SEG_MASK: u8 = 0x70;
const SEG_SHIFT: u8 = 4;
const ULAW_BIAS: i32 = 0x84;
const ULAW_CLIP: i32 = 8159;

const ALAW_SEG_END: [i32; 8] = [0x1F, 0x3F, 0x7F, 0xFF, 0x1FF, 0x3FF, 0x7FF, 0xFFF];
const ULAW_SEG_END: [i32; 8] = [0x3F, 0x7F, 0xFF, 0x1FF, 0x3FF, 0x7FF, 0xFFF, 0x1FFF];

const fn alaw_decode(value: u8) -> i16 {
    let a = value ^ 0x55;
    let mut t = ((a & QUANT_MASK) as i32) << 4;
    let seg = (a & SEG_MASK) >> SEG_SHIFT;
    match seg {
        0 => t += 8,
        1 => t += 0x108,
        _ => {
            t += 0x108;
            t <<= seg - 1;
        }
    }
    if a & SIGN_BIT != 0 { t as i16 } else { -t as i16 }
}

const fn ulaw_decode(value: u8) -> i16 {
    let u = !value;
    let mut t = (((u & QUANT_MASK) as i32) << 3) + ULAW_BIAS;
    t <<= (u & SEG_MASK) >> SEG_SHIFT;
    if u & SIGN_BIT != 0 {
        (ULAW_BIAS - t) as i16
    } else {
        (t - ULAW_BIAS) as i16
    }
}

const fn build_alaw_table() -> [i16; 256] {
    let mut table = [0i16; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = alaw_decode(i as u8);
        i += 1;
    }
    table
}

const fn build_ulaw_table() -> [i16; 256] {
    let mut table = [0i16; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = ulaw_decode(i as u8);
        i += 1;
    }
    table
}

/// A-law byte to linear 16-bit sample
pub static ALAW_TO_S16: [i16; 256] = build_alaw_table();
/// µ-law byte to linear 16-bit sample
pub static ULAW_TO_S16: [i16; 256] = build_ulaw_table();

#[inline]
pub fn alaw_to_linear(value: u8) -> i16 {
    ALAW_TO_S16[value as usize]
}

#[inline]
pub fn ulaw_to_linear(value: u8) -> i16 {
    ULAW_TO_S16[value as usize]
}

#[inline]
const fn segment(value: i32, table: &[i32; 8]) -> usize {
    let mut i = 0;
    while i < 8 {
        if value <= table[i] {
            return i;
        }
        i += 1;
    }
    8
}

/// Linear 16-bit sample to A-law byte
pub const fn linear_to_alaw(sample: i16) -> u8 {
    let mut pcm = (sample as i32) >> 3;
    let mask: u8 = if pcm >= 0 {
        0xD5
    } else {
        pcm = -pcm - 1;
        0x55
    };
    let seg = segment(pcm, &ALAW_SEG_END);
    if seg >= 8 {
        return 0x7F ^ mask;
    }
    let mut aval = (seg as u8) << 4;
    if seg < 2 {
        aval |= ((pcm >> 1) & 0x0F) as u8;
    } else {
        aval |= ((pcm >> seg) & 0x0F) as u8;
    }
    aval ^ mask
}

/// Linear 16-bit sample to µ-law byte
pub const fn linear_to_ulaw(sample: i16) -> u8 {
    let mut pcm = (sample as i32) >> 2;
    let mask: u8 = if pcm < 0 {
        pcm = -pcm;
        0x7F
    } else {
        0xFF
    };
    if pcm > ULAW_CLIP {
        pcm = ULAW_CLIP;
    }
    pcm += ULAW_BIAS >> 2;
    let seg = segment(pcm, &ULAW_SEG_END);
    if seg >= 8 {
        return 0x7F ^ mask;
    }
    (((seg as u8) << 4) | ((pcm >> (seg + 1)) & 0x0F) as u8) ^ mask
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alaw_known_values() {
        assert_eq!(alaw_to_linear(0xD5), 8);
        assert_eq!(alaw_to_linear(0x55), -8);
        assert_eq!(alaw_to_linear(0xAA), 32256);
        assert_eq!(alaw_to_linear(0x2A), -32256);
        assert_eq!(linear_to_alaw(0), 0xD5);
        assert_eq!(linear_to_alaw(i16::MAX), 0xAA);
    }

    #[test]
    fn test_ulaw_known_values() {
        assert_eq!(ulaw_to_linear(0xFF), 0);
        assert_eq!(ulaw_to_linear(0x7F), 0);
        assert_eq!(ulaw_to_linear(0x80), 32124);
        assert_eq!(ulaw_to_linear(0x00), -32124);
        assert_eq!(linear_to_ulaw(0), 0xFF);
        assert_eq!(linear_to_ulaw(i16::MIN), 0x00);
    }

    #[test]
    fn test_alaw_codes_are_stable() {
        for code in 0..=255u8 {
            assert_eq!(linear_to_alaw(alaw_to_linear(code)), code);
        }
    }

    #[test]
    fn test_ulaw_decode_encode_decode() {
        for code in 0..=255u8 {
            let linear = ulaw_to_linear(code);
            assert_eq!(ulaw_to_linear(linear_to_ulaw(linear)), linear);
        }
    }

    #[test]
    fn test_reference_quantisation() {
        let input = [0i16, 1000, -1000, 32767, -32768];
        let alaw: Vec<i16> = input
            .iter()
            .map(|&s| alaw_to_linear(linear_to_alaw(s)))
            .collect();
        assert_eq!(alaw, vec![8, 1008, -1008, 32256, -32256]);
        let ulaw: Vec<i16> = input
            .iter()
            .map(|&s| ulaw_to_linear(linear_to_ulaw(s)))
            .collect();
        assert_eq!(ulaw, vec![0, 988, -988, 32124, -32124]);
    }
}
