//! G.711 bit-exact reference companding
//!
//! Bit-exact with the ITU-T Software Tools Library G.711 routines. The
//! lookup tables in [`super::tables`] are generated from these functions, so
//! any change here changes every translator output.
//!
//! - A-law keeps the 13 most significant input bits, inverts negative values
//!   and toggles the even bits (XOR 0x55).
//! - mu-law keeps the 14 most significant bits, adds a bias of 33 and stores
//!   the one's complement.

/// mu-law bias added to the 14-bit magnitude before segmenting
const ULAW_BIAS: u16 = 33;

/// Largest biased mu-law magnitude
const ULAW_CLIP: u16 = 0x1fff;

/// Magnitude of a sample, taking the one's complement of negative values
#[inline]
fn magnitude(sample: i16, drop_bits: u32) -> u16 {
    let folded = if sample < 0 { !sample } else { sample };
    (folded >> drop_bits) as u16
}

#[inline]
fn sign_bit(sample: i16) -> u16 {
    if sample >= 0 {
        0x80
    } else {
        0
    }
}

/// Compress one linear sample to A-law
pub fn alaw_compress(sample: i16) -> u8 {
    let magnitude = magnitude(sample, 4);
    let code = if magnitude < 16 {
        magnitude
    } else {
        // Segment 1 starts at 16, every further segment doubles
        let segment = 12 - magnitude.leading_zeros() as u16;
        (segment << 4) | ((magnitude >> (segment - 1)) & 0x0f)
    };
    ((code | sign_bit(sample)) ^ 0x55) as u8
}

/// Expand one A-law byte to a linear sample
pub fn alaw_expand(code: u8) -> i16 {
    let bits = (code ^ 0x55) & 0x7f;
    let segment = bits >> 4;
    let mantissa = (bits & 0x0f) as i16;
    let magnitude = match segment {
        0 => (mantissa << 4) + 8,
        s => (((mantissa + 16) << 4) + 8) << (s - 1),
    };
    if code & 0x80 != 0 {
        magnitude
    } else {
        -magnitude
    }
}

/// Compress one linear sample to mu-law
pub fn ulaw_compress(sample: i16) -> u8 {
    let biased = (magnitude(sample, 2) + ULAW_BIAS).min(ULAW_CLIP);
    let segment = 11 - biased.leading_zeros() as u16;
    let code = ((8 - segment) << 4) | (0x0f - ((biased >> segment) & 0x0f));
    (code | sign_bit(sample)) as u8
}

/// Expand one mu-law byte to a linear sample
pub fn ulaw_expand(code: u8) -> i16 {
    let bits = !code;
    let segment = (bits >> 4) & 0x07;
    let mantissa = (bits & 0x0f) as i16;
    let bias = (ULAW_BIAS * 4) as i16;
    let magnitude = (((mantissa << 3) + bias) << segment) - bias;
    if code & 0x80 != 0 {
        magnitude
    } else {
        -magnitude
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_values() {
        // Vectors from the ITU-T reference implementation
        assert_eq!(alaw_compress(0), 0xd5);
        assert_eq!(alaw_compress(128), 0xdd);
        assert_eq!(alaw_compress(1024), 0xe5);
        assert_eq!(alaw_compress(-128), 0x52);
        assert_eq!(alaw_compress(-1024), 0x7a);

        assert_eq!(ulaw_compress(0), 0xff);
        assert_eq!(ulaw_compress(128), 0xef);
        assert_eq!(ulaw_compress(1024), 0xcd);
        assert_eq!(ulaw_compress(-128), 0x6f);
        assert_eq!(ulaw_compress(-1024), 0x4d);

        assert_eq!(alaw_expand(0xd5), 8);
        assert_eq!(alaw_expand(0xdd), 136);
        assert_eq!(alaw_expand(0xe5), 1056);
        assert_eq!(alaw_expand(0x52), -120);
        assert_eq!(alaw_expand(0x7a), -1008);

        assert_eq!(ulaw_expand(0xff), 0);
        assert_eq!(ulaw_expand(0xef), 132);
        assert_eq!(ulaw_expand(0xcd), 1052);
        assert_eq!(ulaw_expand(0x6f), -132);
        assert_eq!(ulaw_expand(0x4d), -1052);
    }

    #[test]
    fn test_extremes_do_not_overflow() {
        for sample in [i16::MIN, i16::MIN + 1, -1, 0, 1, i16::MAX - 1, i16::MAX] {
            let a = alaw_expand(alaw_compress(sample));
            let u = ulaw_expand(ulaw_compress(sample));
            assert!(a.unsigned_abs() <= 32256);
            assert!(u.unsigned_abs() <= 32124);
        }
        assert!(alaw_expand(alaw_compress(i16::MAX)) > 30000);
        assert!(alaw_expand(alaw_compress(i16::MIN)) < -30000);
        assert!(ulaw_expand(ulaw_compress(i16::MAX)) > 30000);
        assert!(ulaw_expand(ulaw_compress(i16::MIN)) < -30000);
    }
}
