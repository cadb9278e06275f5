//! Shared helpers for media core integration tests

#![allow(dead_code)]

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tandem_media_core::logging::{setup_logging, LoggingConfig};
use tandem_media_core::prelude::*;
use tandem_media_core::MediaConfig;

/// Route library logs to the test output, once per test binary
pub fn init_logging() {
    let _ = setup_logging(&LoggingConfig::for_tests());
}

/// Engine with default configuration and the built-in translators
pub fn engine() -> Arc<MediaEngine> {
    init_logging();
    MediaEngine::new(MediaConfig::default()).expect("default config is valid")
}

/// What a [`Recorder`] has been given
#[derive(Default)]
pub struct Recording {
    pub buffers: Mutex<Vec<(Vec<u8>, u64)>>,
    pub invalid: AtomicBool,
    pub refuse: AtomicBool,
}

impl Recording {
    pub fn count(&self) -> usize {
        self.buffers.lock().len()
    }

    pub fn bytes(&self) -> usize {
        self.buffers.lock().iter().map(|(b, _)| b.len()).sum()
    }

    pub fn timestamps(&self) -> Vec<u64> {
        self.buffers.lock().iter().map(|(_, ts)| *ts).collect()
    }

    pub fn last(&self) -> Option<Vec<u8>> {
        self.buffers.lock().last().map(|(b, _)| b.clone())
    }
}

/// Consumer handler keeping every buffer it receives
pub struct Recorder(pub Arc<Recording>);

impl ConsumerHandler for Recorder {
    fn consume(&self, data: &[u8], timestamp: u64, _flags: u32) -> usize {
        if self.0.refuse.load(Ordering::SeqCst) {
            return 0;
        }
        self.0.buffers.lock().push((data.to_vec(), timestamp));
        data.len()
    }

    fn valid(&self) -> bool {
        !self.0.invalid.load(Ordering::SeqCst)
    }
}

/// Recording consumer in `format`
pub fn recorder(format: &Format) -> (Arc<DataConsumer>, Arc<Recording>) {
    let recording = Arc::new(Recording::default());
    (DataConsumer::new(format.clone(), Recorder(recording.clone())), recording)
}

/// Handler accepting a fixed number of bytes per buffer
pub struct Accepting(pub usize);

impl ConsumerHandler for Accepting {
    fn consume(&self, _data: &[u8], _timestamp: u64, _flags: u32) -> usize {
        self.0
    }
}
