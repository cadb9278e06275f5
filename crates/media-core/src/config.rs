//! Media core configuration
//!
//! Loaded from TOML. Every field has a default, so an empty document is a
//! valid configuration.
//!
//! ```toml
//! max_chain_length = 3
//! call_lock_wait_ms = 5000
//! call_lock_extended_wait_ms = 55000
//! builtin_translators = true
//! ```

use crate::error::{MediaError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Longest translator chain the engine will ever compose
pub const MAX_CHAIN_LIMIT: u32 = 4;

/// Default translator chain length limit
pub const DEFAULT_MAX_CHAIN_LENGTH: u32 = 3;

/// Default first wait for the cross-call lock
pub const DEFAULT_CALL_LOCK_WAIT_MS: u64 = 5_000;

/// Default second wait for the cross-call lock after a congestion alarm
pub const DEFAULT_CALL_LOCK_EXTENDED_WAIT_MS: u64 = 55_000;

/// Configuration of a [`MediaEngine`](crate::engine::MediaEngine)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Maximum number of translators in one composed chain (1..=4)
    pub max_chain_length: u32,

    /// First bounded wait for the cross-call lock, in milliseconds
    pub call_lock_wait_ms: u64,

    /// Extra wait after congestion was signalled, in milliseconds.
    /// Zero disables the second attempt.
    pub call_lock_extended_wait_ms: u64,

    /// Install the built-in G.711 translator factories at startup
    pub builtin_translators: bool,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            max_chain_length: DEFAULT_MAX_CHAIN_LENGTH,
            call_lock_wait_ms: DEFAULT_CALL_LOCK_WAIT_MS,
            call_lock_extended_wait_ms: DEFAULT_CALL_LOCK_EXTENDED_WAIT_MS,
            builtin_translators: true,
        }
    }
}

impl MediaConfig {
    /// Parse a configuration from a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| MediaError::config(format!("invalid media config: {}", e)))
    }

    /// Render the configuration back to TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| MediaError::config(e.to_string()))
    }

    /// Set the chain length limit
    pub fn with_max_chain_length(mut self, length: u32) -> Self {
        self.max_chain_length = length;
        self
    }

    /// Set both call lock waits
    pub fn with_call_lock_waits(mut self, wait_ms: u64, extended_wait_ms: u64) -> Self {
        self.call_lock_wait_ms = wait_ms;
        self.call_lock_extended_wait_ms = extended_wait_ms;
        self
    }

    /// Enable or disable the built-in translators
    pub fn with_builtin_translators(mut self, enabled: bool) -> Self {
        self.builtin_translators = enabled;
        self
    }

    /// Reject values that cannot be brought into range.
    ///
    /// The chain length is not checked here, see [`normalized`](Self::normalized).
    pub fn validate(&self) -> Result<()> {
        if self.call_lock_wait_ms == 0 {
            return Err(MediaError::config("call_lock_wait_ms must be positive"));
        }
        Ok(())
    }

    /// Copy with the chain length clamped into `1..=MAX_CHAIN_LIMIT`
    pub fn normalized(&self) -> Self {
        Self {
            max_chain_length: clamp_chain_length(self.max_chain_length),
            ..self.clone()
        }
    }

    /// First call lock wait
    pub fn call_lock_wait(&self) -> Duration {
        Duration::from_millis(self.call_lock_wait_ms)
    }

    /// Second call lock wait, if enabled
    pub fn call_lock_extended_wait(&self) -> Option<Duration> {
        (self.call_lock_extended_wait_ms > 0)
            .then(|| Duration::from_millis(self.call_lock_extended_wait_ms))
    }
}

/// Clamp a requested chain length into `1..=MAX_CHAIN_LIMIT`
pub fn clamp_chain_length(length: u32) -> u32 {
    length.clamp(1, MAX_CHAIN_LIMIT)
}
