//! Signed 16-bit linear PCM ("slin") packing
//!
//! The media graph moves opaque byte buffers. Linear audio travels as
//! little-endian signed 16-bit samples, two bytes per sample per channel.

use crate::error::{CodecError, Result};

/// Bytes used by one linear sample
pub const BYTES_PER_SAMPLE: usize = 2;

/// Number of whole samples held by a linear buffer of `len` bytes
pub fn sample_count(len: usize) -> usize {
    len / BYTES_PER_SAMPLE
}

/// Decode a linear byte buffer into samples.
///
/// Fails on an odd length instead of silently dropping the last byte.
pub fn bytes_to_samples(data: &[u8]) -> Result<Vec<i16>> {
    if data.len() % BYTES_PER_SAMPLE != 0 {
        return Err(CodecError::OddLinearLength { len: data.len() });
    }
    Ok(data
        .chunks_exact(BYTES_PER_SAMPLE)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

/// Encode samples into a linear byte buffer
pub fn samples_to_bytes(samples: &[i16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * BYTES_PER_SAMPLE);
    extend_with_samples(&mut out, samples.iter().copied());
    out
}

/// Append samples to an existing linear byte buffer
pub fn extend_with_samples<I>(out: &mut Vec<u8>, samples: I)
where
    I: IntoIterator<Item = i16>,
{
    for sample in samples {
        out.extend_from_slice(&sample.to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_little_endian_layout() {
        let bytes = samples_to_bytes(&[0x0102, -2]);
        assert_eq!(bytes, vec![0x02, 0x01, 0xfe, 0xff]);
        assert_eq!(bytes_to_samples(&bytes).unwrap(), vec![0x0102, -2]);
    }

    #[test]
    fn test_odd_length_rejected() {
        let err = bytes_to_samples(&[1, 2, 3]).unwrap_err();
        assert_eq!(err, CodecError::OddLinearLength { len: 3 });
    }

    #[test]
    fn test_sample_count() {
        assert_eq!(sample_count(160), 80);
        assert_eq!(sample_count(161), 80);
        assert_eq!(sample_count(0), 0);
    }
}
