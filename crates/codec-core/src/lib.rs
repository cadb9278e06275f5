//! # Codec-Core: sample conversion for the tandem media plane
//!
//! This crate holds the codec math used by the built-in translators of
//! `tandem-media-core`. The media graph itself never looks inside a buffer;
//! translators call into this crate to turn one wire format into another.
//!
//! ## Features
//!
//! - **G.711 (A-law / mu-law)**: ITU-T bit-exact companding with lookup tables
//! - **Linear PCM**: little-endian 16-bit sample packing helpers
//!
//! ## Usage
//!
//! ```rust
//! use tandem_codec_core::{g711::Law, pcm};
//!
//! // 10ms of silence at 8kHz as signed linear bytes
//! let linear = pcm::samples_to_bytes(&[0i16; 80]);
//!
//! let mut alaw = Vec::new();
//! Law::ALaw.compress_bytes(&linear, &mut alaw)?;
//! assert_eq!(alaw.len(), 80);
//! # Ok::<(), tandem_codec_core::CodecError>(())
//! ```

#![deny(missing_docs)]

pub mod error;
#[cfg(feature = "g711")]
pub mod g711;
pub mod pcm;

pub use error::{CodecError, Result};

/// Version information for the codec library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Names of the wire formats this crate can produce or consume
pub const SUPPORTED_FORMATS: &[&str] = &[
    "slin",
    #[cfg(feature = "g711")]
    "alaw",
    #[cfg(feature = "g711")]
    "mulaw",
];

/// Warm up lookup tables so the first media frame does not pay for them.
///
/// Safe to call any number of times.
pub fn init() {
    #[cfg(feature = "g711")]
    g711::tables::init_tables();

    tracing::debug!(version = VERSION, formats = ?SUPPORTED_FORMATS, "codec-core initialized");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_formats() {
        assert!(SUPPORTED_FORMATS.contains(&"slin"));

        #[cfg(feature = "g711")]
        {
            assert!(SUPPORTED_FORMATS.contains(&"alaw"));
            assert!(SUPPORTED_FORMATS.contains(&"mulaw"));
        }
    }

    #[test]
    fn test_init_is_repeatable() {
        init();
        init();
    }
}
