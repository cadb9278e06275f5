//! Media engine context
//!
//! One [`MediaEngine`] owns everything the media plane shares between
//! calls: the format and translator registries, the lock serializing data
//! endpoint rewiring, and the cross-call lock. Call endpoints hold an
//! `Arc<MediaEngine>`; there is no hidden global state.

use crate::config::MediaConfig;
use crate::error::{MediaError, Result};
use crate::format::{Format, FormatRegistry};
use crate::translate::TranslatorRegistry;
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Guard of the cross-call lock
pub type CallLockGuard<'a> = ReentrantMutexGuard<'a, ()>;

/// Receiver of engine alarms
pub trait AlarmSink: Send + Sync {
    /// The call lock was not available within the first wait
    fn congestion(&self, operation: &str, waited: Duration);

    /// An unrecoverable condition was detected
    fn fatal(&self, component: &str, message: &str);

    /// The engine wants the process restarted
    fn restart_requested(&self);
}

/// Alarm sink writing to the log
#[derive(Debug, Default)]
pub struct LogAlarms;

impl AlarmSink for LogAlarms {
    fn congestion(&self, operation: &str, waited: Duration) {
        warn!(operation, waited_ms = waited.as_millis() as u64, "Call lock congestion");
    }

    fn fatal(&self, component: &str, message: &str) {
        error!(component, "{}", message);
    }

    fn restart_requested(&self) {
        error!("Engine restart requested");
    }
}

/// Shared media plane context
pub struct MediaEngine {
    config: MediaConfig,
    formats: FormatRegistry,
    translators: TranslatorRegistry,
    data_lock: ReentrantMutex<()>,
    call_lock: ReentrantMutex<()>,
    alarms: Arc<dyn AlarmSink>,
    restart: AtomicBool,
}

impl MediaEngine {
    /// Create an engine logging its alarms
    pub fn new(config: MediaConfig) -> Result<Arc<Self>> {
        Self::with_alarms(config, Arc::new(LogAlarms))
    }

    /// Create an engine reporting alarms to `alarms`
    pub fn with_alarms(config: MediaConfig, alarms: Arc<dyn AlarmSink>) -> Result<Arc<Self>> {
        config.validate()?;
        let config = config.normalized();
        let engine = Self {
            translators: TranslatorRegistry::new(config.max_chain_length),
            formats: FormatRegistry::new(),
            data_lock: ReentrantMutex::new(()),
            call_lock: ReentrantMutex::new(()),
            alarms,
            restart: AtomicBool::new(false),
            config,
        };

        if engine.config.builtin_translators {
            #[cfg(feature = "g711")]
            crate::translate::g711::install(&engine.translators, &engine.formats)?;
        }

        info!(
            max_chain_length = engine.config.max_chain_length,
            formats = engine.formats.len(),
            "Media engine started"
        );
        Ok(Arc::new(engine))
    }

    /// Engine configuration
    pub fn config(&self) -> &MediaConfig {
        &self.config
    }

    /// Format registry
    pub fn formats(&self) -> &FormatRegistry {
        &self.formats
    }

    /// Translator factory registry
    pub fn translators(&self) -> &TranslatorRegistry {
        &self.translators
    }

    /// Look a format up by name
    pub fn lookup_format(&self, name: &str) -> Option<Format> {
        self.formats.lookup(name)
    }

    /// Register a format, see [`FormatRegistry::register`]
    pub fn register_format(
        &self,
        name: &str,
        frame_size: u32,
        frame_time: u32,
        media_type: &str,
        sample_rate: u32,
        channels: u32,
    ) -> Result<Format> {
        self.formats
            .register(name, frame_size, frame_time, media_type, sample_rate, channels)
    }

    /// Lock serializing every data endpoint rewiring
    pub(crate) fn data_lock(&self) -> ReentrantMutexGuard<'_, ()> {
        self.data_lock.lock()
    }

    /// Take the cross-call lock.
    ///
    /// Waits for the configured time; on expiry raises a congestion alarm
    /// and waits once more for the extended time. If that expires too the
    /// engine is considered wedged: a fatal alarm is raised and a restart
    /// requested.
    pub fn lock_calls(&self, operation: &str) -> Result<CallLockGuard<'_>> {
        let wait = self.config.call_lock_wait();
        if let Some(guard) = self.call_lock.try_lock_for(wait) {
            return Ok(guard);
        }
        self.alarms.congestion(operation, wait);

        let mut waited = wait;
        if let Some(extended) = self.config.call_lock_extended_wait() {
            waited += extended;
            if let Some(guard) = self.call_lock.try_lock_for(extended) {
                debug!(operation, waited_ms = waited.as_millis() as u64, "Call lock acquired after congestion");
                return Ok(guard);
            }
        }

        let message = format!(
            "Call lock not acquired for {} after {} ms",
            operation,
            waited.as_millis()
        );
        self.alarms.fatal("engine", &message);
        self.request_restart();
        Err(MediaError::LockTimeout {
            operation: operation.to_string(),
            waited,
        })
    }

    /// Ask for the process to be restarted
    pub fn request_restart(&self) {
        if !self.restart.swap(true, Ordering::AcqRel) {
            self.alarms.restart_requested();
        }
    }

    /// Whether a restart was requested
    pub fn restart_pending(&self) -> bool {
        self.restart.load(Ordering::Acquire)
    }

    /// Drop every translator factory
    pub fn shutdown(&self) {
        info!("Media engine shutting down");
        self.translators.clear();
    }
}

impl fmt::Debug for MediaEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaEngine")
            .field("config", &self.config)
            .field("restart_pending", &self.restart_pending())
            .finish()
    }
}
