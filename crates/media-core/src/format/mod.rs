//! Media formats
//!
//! A [`FormatInfo`] describes a wire format: name, media type and frame
//! geometry. Formats are interned by name in a [`FormatRegistry`] and handed
//! out as [`Format`] handles, which compare by identity. Two handles are
//! equal only when they come from the same registration.

mod builtin;

use crate::error::{MediaError, Result};
use parking_lot::RwLock;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;
use tracing::{debug, warn};

pub use builtin::BUILTIN_FORMATS;

/// Description of one media format
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatInfo {
    /// Format name, e.g. "slin" or "alaw"
    pub name: String,
    /// Media type: "audio", "video" or "text"
    pub media_type: String,
    /// Bytes per frame, 0 when frames have no fixed size
    pub frame_size: u32,
    /// Microseconds per frame, 0 when frames have no fixed duration
    pub frame_time: u32,
    /// Samples per second
    pub sample_rate: u32,
    /// Number of interleaved channels
    pub channels: u32,
}

impl FormatInfo {
    /// Build a format description
    pub fn new(
        name: impl Into<String>,
        frame_size: u32,
        frame_time: u32,
        media_type: impl Into<String>,
        sample_rate: u32,
        channels: u32,
    ) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            frame_size,
            frame_time,
            sample_rate,
            channels,
        }
    }

    /// Whether every frame has the same size and duration
    pub fn is_fixed_frame(&self) -> bool {
        self.frame_size > 0 && self.frame_time > 0
    }

    /// Bytes per second, 0 for variable rate formats
    pub fn data_rate(&self) -> u32 {
        if !self.is_fixed_frame() {
            return 0;
        }
        (self.frame_size as u64 * 1_000_000 / self.frame_time as u64) as u32
    }

    /// Number of samples carried by `len` bytes.
    ///
    /// Only whole frames count. Returns 0 when the geometry is not fixed.
    pub fn guess_samples(&self, len: usize) -> u64 {
        if !self.is_fixed_frame() {
            return 0;
        }
        let frames = len as u64 / self.frame_size as u64;
        frames * self.frame_time as u64 * self.sample_rate as u64 / 1_000_000
    }

    /// Playing time of `len` bytes in microseconds, 0 when unknown
    pub fn guess_duration(&self, len: usize) -> u64 {
        if !self.is_fixed_frame() {
            return 0;
        }
        (len as u64 / self.frame_size as u64) * self.frame_time as u64
    }

    /// Whether this is an audio format
    pub fn is_audio(&self) -> bool {
        self.media_type == "audio"
    }

    fn check(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(MediaError::invalid_format("empty format name"));
        }
        if self.media_type.is_empty() {
            return Err(MediaError::invalid_format(format!(
                "format '{}' has no media type",
                self.name
            )));
        }
        Ok(())
    }
}

/// Interned handle to a registered format.
///
/// Cloning is cheap. Equality and hashing use the identity of the
/// registration, never the name.
#[derive(Clone)]
pub struct Format(Arc<FormatInfo>);

impl Format {
    /// The underlying description
    pub fn info(&self) -> &FormatInfo {
        &self.0
    }

    /// Format name
    pub fn name(&self) -> &str {
        &self.0.name
    }
}

impl Deref for Format {
    type Target = FormatInfo;

    fn deref(&self) -> &FormatInfo {
        &self.0
    }
}

impl PartialEq for Format {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Format {}

impl Hash for Format {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as usize).hash(state);
    }
}

impl fmt::Debug for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Format({})", self.0.name)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.name)
    }
}

/// Registry interning formats by name
#[derive(Debug)]
pub struct FormatRegistry {
    formats: RwLock<Vec<Format>>,
}

impl FormatRegistry {
    /// Create a registry holding the built-in format table
    pub fn new() -> Self {
        let registry = Self::empty();
        {
            let mut formats = registry.formats.write();
            for (name, frame_size, frame_time, media_type, sample_rate, channels) in BUILTIN_FORMATS {
                formats.push(Format(Arc::new(FormatInfo::new(
                    *name,
                    *frame_size,
                    *frame_time,
                    *media_type,
                    *sample_rate,
                    *channels,
                ))));
            }
        }
        registry
    }

    /// Create a registry with no formats at all
    pub fn empty() -> Self {
        Self {
            formats: RwLock::new(Vec::new()),
        }
    }

    /// Find a format by name
    pub fn lookup(&self, name: &str) -> Option<Format> {
        if name.is_empty() {
            return None;
        }
        self.formats.read().iter().find(|f| f.name == name).cloned()
    }

    /// Find a format by name, failing with [`MediaError::UnknownFormat`]
    pub fn require(&self, name: &str) -> Result<Format> {
        self.lookup(name).ok_or_else(|| MediaError::UnknownFormat {
            name: name.to_string(),
        })
    }

    /// Register a format.
    ///
    /// Registering the same definition again returns the existing handle. A
    /// different definition under a known name is refused.
    pub fn register(
        &self,
        name: &str,
        frame_size: u32,
        frame_time: u32,
        media_type: &str,
        sample_rate: u32,
        channels: u32,
    ) -> Result<Format> {
        self.register_info(FormatInfo::new(name, frame_size, frame_time, media_type, sample_rate, channels))
    }

    /// Register a prepared description, see [`FormatRegistry::register`]
    pub fn register_info(&self, info: FormatInfo) -> Result<Format> {
        info.check()?;
        let mut formats = self.formats.write();
        if let Some(existing) = formats.iter().find(|f| f.name == info.name) {
            if *existing.info() == info {
                return Ok(existing.clone());
            }
            warn!(
                format = %info.name,
                media_type = %info.media_type,
                frame_size = info.frame_size,
                frame_time = info.frame_time,
                sample_rate = info.sample_rate,
                channels = info.channels,
                "Refusing conflicting format registration"
            );
            return Err(MediaError::FormatConflict { name: info.name });
        }
        debug!(
            format = %info.name,
            media_type = %info.media_type,
            frame_size = info.frame_size,
            frame_time = info.frame_time,
            sample_rate = info.sample_rate,
            "Registering format"
        );
        let format = Format(Arc::new(info));
        formats.push(format.clone());
        Ok(format)
    }

    /// Snapshot of every registered format
    pub fn formats(&self) -> Vec<Format> {
        self.formats.read().clone()
    }

    /// Number of registered formats
    pub fn len(&self) -> usize {
        self.formats.read().len()
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        let registry = FormatRegistry::new();
        let slin = registry.lookup("slin").unwrap();
        assert_eq!(slin.sample_rate, 8000);
        assert_eq!(slin.channels, 1);
        assert!(slin.is_audio());
        assert_eq!(slin.data_rate(), 16000);

        assert!(registry.lookup("h264").is_some());
        assert!(registry.lookup("nonexistent").is_none());
        assert!(registry.lookup("").is_none());
        assert!(matches!(registry.require("nope"), Err(MediaError::UnknownFormat { .. })));
    }

    #[test]
    fn test_identity_equality() {
        let registry = FormatRegistry::new();
        let a = registry.lookup("alaw").unwrap();
        let b = registry.lookup("alaw").unwrap();
        assert_eq!(a, b);

        // Same description in another registry is a different format
        let other = FormatRegistry::new();
        assert_ne!(a, other.lookup("alaw").unwrap());
        assert_eq!(a.info(), other.lookup("alaw").unwrap().info());
    }

    #[test]
    fn test_register_idempotent() {
        let registry = FormatRegistry::empty();
        let first = registry.register("opus", 0, 20000, "audio", 48000, 2).unwrap();
        let again = registry.register("opus", 0, 20000, "audio", 48000, 2).unwrap();
        assert_eq!(first, again);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_conflict() {
        let registry = FormatRegistry::new();
        let err = registry.register("alaw", 160, 20000, "audio", 8000, 1).unwrap_err();
        assert!(matches!(err, MediaError::FormatConflict { ref name } if name == "alaw"));
    }

    #[test]
    fn test_register_requires_name_and_type() {
        let registry = FormatRegistry::empty();
        assert!(registry.register("", 1, 1, "audio", 8000, 1).is_err());
        assert!(registry.register("x", 1, 1, "", 8000, 1).is_err());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_guess_samples() {
        let registry = FormatRegistry::new();
        let slin = registry.lookup("slin").unwrap();
        assert_eq!(slin.guess_samples(160), 80);
        assert_eq!(slin.guess_samples(320), 160);
        // Partial frames do not count
        assert_eq!(slin.guess_samples(100), 0);
        assert_eq!(slin.guess_duration(320), 20000);

        let gsm = registry.lookup("gsm").unwrap();
        assert_eq!(gsm.guess_samples(66), 320);

        let wide = registry.lookup("slin/16000").unwrap();
        assert_eq!(wide.guess_samples(320), 160);

        let speex = registry.lookup("speex").unwrap();
        assert!(!speex.is_fixed_frame());
        assert_eq!(speex.guess_samples(1000), 0);
        assert_eq!(speex.data_rate(), 0);
    }
}
