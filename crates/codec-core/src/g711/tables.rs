//! G.711 lookup tables
//!
//! Encoding covers the whole 16-bit input range (64KB per law), decoding all
//! 256 code words. Tables are generated lazily from [`super::reference`].

use super::reference::{alaw_compress, alaw_expand, ulaw_compress, ulaw_expand};
use std::sync::LazyLock;

/// Encode table indexed by `sample + 32768`, decode table by code word
struct Companding {
    encode: Box<[u8]>,
    decode: [i16; 256],
}

impl Companding {
    fn build(compress: fn(i16) -> u8, expand: fn(u8) -> i16) -> Self {
        let encode = (i16::MIN..=i16::MAX).map(compress).collect();
        let mut decode = [0i16; 256];
        for (code, slot) in (0..=u8::MAX).zip(decode.iter_mut()) {
            *slot = expand(code);
        }
        Self { encode, decode }
    }

    #[inline]
    fn compress(&self, sample: i16) -> u8 {
        self.encode[(sample as i32 - i16::MIN as i32) as usize]
    }

    #[inline]
    fn expand(&self, code: u8) -> i16 {
        self.decode[code as usize]
    }
}

static MULAW: LazyLock<Companding> = LazyLock::new(|| Companding::build(ulaw_compress, ulaw_expand));
static ALAW: LazyLock<Companding> = LazyLock::new(|| Companding::build(alaw_compress, alaw_expand));

/// Force generation of both laws' tables
pub fn init_tables() {
    LazyLock::force(&MULAW);
    LazyLock::force(&ALAW);
}

/// O(1) mu-law compression
#[inline]
pub fn mulaw_compress_table(sample: i16) -> u8 {
    MULAW.compress(sample)
}

/// O(1) mu-law expansion
#[inline]
pub fn mulaw_expand_table(encoded: u8) -> i16 {
    MULAW.expand(encoded)
}

/// O(1) A-law compression
#[inline]
pub fn alaw_compress_table(sample: i16) -> u8 {
    ALAW.compress(sample)
}

/// O(1) A-law expansion
#[inline]
pub fn alaw_expand_table(encoded: u8) -> i16 {
    ALAW.expand(encoded)
}
