//! Sources driven by their own thread

use super::{DataNode, DataSource};
use crate::error::{MediaError, Result};
use crate::format::Format;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, error, info};

/// Body of a [`ThreadedSource`] worker thread
pub trait SourceWorker: Send + 'static {
    /// Produce media into `source` until `stop` becomes true.
    ///
    /// Implementations should check `stop` at least once per frame.
    fn run(&mut self, source: &Arc<DataSource>, stop: &AtomicBool);

    /// Called on the worker thread after `run` returns
    fn cleanup(&mut self) {}
}

/// A [`DataSource`] fed by a named worker thread.
///
/// The worker is handed back when the thread ends, so a stopped source can
/// be started again. Dropping the wrapper stops the thread.
pub struct ThreadedSource {
    source: Arc<DataSource>,
    worker: Mutex<Option<Box<dyn SourceWorker>>>,
    thread: Mutex<Option<JoinHandle<Box<dyn SourceWorker>>>>,
    stop: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
}

impl ThreadedSource {
    /// Wrap a worker producing media in `format`
    pub fn new(format: Format, worker: impl SourceWorker) -> Self {
        Self {
            source: DataSource::new(format),
            worker: Mutex::new(Some(Box::new(worker))),
            thread: Mutex::new(None),
            stop: Arc::new(AtomicBool::new(false)),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The source consumers attach to
    pub fn source(&self) -> &Arc<DataSource> {
        &self.source
    }

    /// Start the worker thread.
    ///
    /// Returns `Ok(false)` if it is already running.
    pub fn start(&self, name: &str) -> Result<bool> {
        let mut thread = self.thread.lock();
        if thread.is_some() {
            return Ok(false);
        }
        let Some(mut worker) = self.worker.lock().take() else {
            return Ok(false);
        };

        self.stop.store(false, Ordering::Release);
        self.running.store(true, Ordering::Release);
        let source = self.source.clone();
        let stop = self.stop.clone();
        let running = self.running.clone();

        let spawned = std::thread::Builder::new().name(name.to_string()).spawn(move || {
            worker.run(&source, &stop);
            worker.cleanup();
            running.store(false, Ordering::Release);
            worker
        });

        match spawned {
            Ok(handle) => {
                info!(thread = name, format = %self.source.format(), "Started threaded source");
                *thread = Some(handle);
                Ok(true)
            }
            Err(e) => {
                self.running.store(false, Ordering::Release);
                error!(thread = name, error = %e, "Failed to start threaded source");
                Err(MediaError::Thread {
                    name: name.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Ask the worker to stop and wait for the thread to end
    pub fn stop(&self) {
        let Some(handle) = self.thread.lock().take() else {
            return;
        };
        self.stop.store(true, Ordering::Release);
        match handle.join() {
            Ok(worker) => {
                *self.worker.lock() = Some(worker);
                debug!("Threaded source stopped");
            }
            Err(_) => {
                self.running.store(false, Ordering::Release);
                error!("Threaded source worker panicked");
            }
        }
    }

    /// Whether the worker thread is still producing
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl fmt::Debug for ThreadedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadedSource")
            .field("source", &self.source)
            .field("running", &self.is_running())
            .finish()
    }
}

impl Drop for ThreadedSource {
    fn drop(&mut self) {
        self.stop();
    }
}
