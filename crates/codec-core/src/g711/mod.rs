//! G.711 companding
//!
//! Converts between signed 16-bit linear PCM and the two G.711 laws. Each
//! law code word is exactly one byte per sample, so a law buffer of `n`
//! bytes always corresponds to `2 * n` linear bytes.

pub mod reference;
pub mod tables;

use crate::error::Result;
use crate::pcm;
use std::fmt;

/// G.711 companding law
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Law {
    /// A-law (PCMA, used in Europe and most of the world)
    ALaw,
    /// mu-law (PCMU, used in North America and Japan)
    MuLaw,
}

impl Law {
    /// Media format name used by the format registry
    pub fn format_name(self) -> &'static str {
        match self {
            Self::ALaw => "alaw",
            Self::MuLaw => "mulaw",
        }
    }

    /// Compress one linear sample
    #[inline]
    pub fn compress(self, sample: i16) -> u8 {
        match self {
            Self::ALaw => tables::alaw_compress_table(sample),
            Self::MuLaw => tables::mulaw_compress_table(sample),
        }
    }

    /// Expand one code word
    #[inline]
    pub fn expand(self, code: u8) -> i16 {
        match self {
            Self::ALaw => tables::alaw_expand_table(code),
            Self::MuLaw => tables::mulaw_expand_table(code),
        }
    }

    /// Compress a little-endian linear buffer, appending code words to `out`
    pub fn compress_bytes(self, linear: &[u8], out: &mut Vec<u8>) -> Result<usize> {
        let samples = pcm::bytes_to_samples(linear)?;
        out.reserve(samples.len());
        out.extend(samples.iter().map(|&s| self.compress(s)));
        Ok(samples.len())
    }

    /// Expand code words, appending little-endian linear samples to `out`
    pub fn expand_bytes(self, encoded: &[u8], out: &mut Vec<u8>) -> usize {
        out.reserve(encoded.len() * pcm::BYTES_PER_SAMPLE);
        pcm::extend_with_samples(out, encoded.iter().map(|&c| self.expand(c)));
        encoded.len()
    }
}

impl fmt::Display for Law {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_name())
    }
}
