//! Data sources

use super::{DataConsumer, DataNode};
use crate::format::Format;
use crate::params::NamedParams;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use tracing::{debug, trace, warn};

/// Producer side hooks of a source
pub trait SourceHandler: Send + Sync {
    /// Whether the producer can switch to `format`
    fn accept_format(&self, _format: &Format) -> bool {
        false
    }

    /// Handle a control request
    fn control(&self, _params: &mut NamedParams) -> bool {
        false
    }
}

#[derive(Default)]
struct SourceState {
    consumers: Vec<Arc<DataConsumer>>,
    timestamp: u64,
    /// Predicted timestamp of the next buffer, if the format allows a guess
    next_timestamp: Option<u64>,
}

/// Producing end of the media graph.
///
/// Holds strong references to its consumers, in attachment order.
pub struct DataSource {
    format: RwLock<Format>,
    state: Mutex<SourceState>,
    alive: AtomicBool,
    /// Translator whose output this source is, if any
    translator: OnceLock<Weak<DataConsumer>>,
    handler: Option<Box<dyn SourceHandler>>,
}

impl DataSource {
    /// Create a plain source
    pub fn new(format: Format) -> Arc<Self> {
        Arc::new(Self::build(format, None))
    }

    /// Create a source with producer hooks
    pub fn with_handler(format: Format, handler: impl SourceHandler + 'static) -> Arc<Self> {
        Arc::new(Self::build(format, Some(Box::new(handler))))
    }

    pub(crate) fn build(format: Format, handler: Option<Box<dyn SourceHandler>>) -> Self {
        Self {
            format: RwLock::new(format),
            state: Mutex::new(SourceState::default()),
            alive: AtomicBool::new(true),
            translator: OnceLock::new(),
            handler,
        }
    }

    pub(crate) fn set_translator(&self, consumer: &Arc<DataConsumer>) {
        let _ = self.translator.set(Arc::downgrade(consumer));
    }

    /// Input consumer of the translator that owns this source
    pub fn translator(&self) -> Option<Arc<DataConsumer>> {
        self.translator.get().and_then(Weak::upgrade)
    }

    /// Whether the source still accepts new consumers
    pub fn alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Stop accepting consumers and detach the current ones
    pub fn kill(&self) {
        if self.alive.swap(false, Ordering::AcqRel) {
            debug!(format = %self.format(), "Killing data source");
            self.clear();
        }
    }

    /// Predicted timestamp of the next buffer
    pub fn next_timestamp(&self) -> Option<u64> {
        self.state.lock().next_timestamp
    }

    /// Number of attached consumers
    pub fn consumer_count(&self) -> usize {
        self.state.lock().consumers.len()
    }

    /// Snapshot of the attached consumers, in attachment order
    pub fn consumers(&self) -> Vec<Arc<DataConsumer>> {
        self.state.lock().consumers.clone()
    }

    /// Whether `consumer` is attached to this source
    pub fn has_consumer(&self, consumer: &Arc<DataConsumer>) -> bool {
        self.state.lock().consumers.iter().any(|c| Arc::ptr_eq(c, consumer))
    }

    /// Deliver a buffer to every attached consumer.
    ///
    /// Without a timestamp the predicted one is used, or the previous one
    /// advanced by the samples the buffer is guessed to carry. Consumers
    /// that accept nothing and report themselves invalid are detached on
    /// the way. Returns the smallest non-zero count accepted, or 0.
    pub fn forward(&self, data: &[u8], timestamp: Option<u64>, flags: u32) -> usize {
        let format = self.format();
        let mut dead = Vec::new();
        let mut st = self.state.lock();

        let timestamp = timestamp
            .or(st.next_timestamp)
            .unwrap_or_else(|| st.timestamp + format.guess_samples(data.len()));

        let mut forwarded: usize = 0;
        let mut i = 0;
        while i < st.consumers.len() {
            let consumer = st.consumers[i].clone();
            let accepted = consumer.consume_from(data, timestamp, flags, self);
            if accepted == 0 && !consumer.valid() {
                trace!(format = %format, "Pruning invalid consumer");
                consumer.release_slots(self);
                dead.push(st.consumers.remove(i));
                continue;
            }
            if accepted > 0 && (forwarded == 0 || accepted < forwarded) {
                forwarded = accepted;
            }
            i += 1;
        }

        st.timestamp = timestamp;
        let samples = format.guess_samples(data.len());
        st.next_timestamp = format.is_fixed_frame().then(|| timestamp + samples);
        drop(st);
        drop(dead);
        forwarded
    }

    /// Attach a consumer to the regular or override slot.
    ///
    /// A different source already feeding that slot is detached first.
    pub fn attach(self: &Arc<Self>, consumer: &Arc<DataConsumer>, override_slot: bool) -> bool {
        if !self.alive() {
            debug!(format = %self.format(), "Refusing to attach to a dead source");
            return false;
        }
        if consumer
            .translator_source()
            .is_some_and(|output| Arc::ptr_eq(output, self))
        {
            warn!("Refusing to attach a translator to its own output");
            return false;
        }

        let previous = if override_slot {
            consumer.override_source()
        } else {
            consumer.source()
        };
        if let Some(previous) = previous {
            if !Arc::ptr_eq(&previous, self) {
                previous.detach(consumer);
            }
        }

        let mut st = self.state.lock();
        if !self.alive() {
            return false;
        }
        if !consumer.claim_slot(self, override_slot, st.timestamp) {
            warn!(
                format = %self.format(),
                override_slot,
                "Consumer was claimed by another source while attaching"
            );
            return false;
        }
        if !st.consumers.iter().any(|c| Arc::ptr_eq(c, consumer)) {
            st.consumers.push(consumer.clone());
        }
        trace!(format = %self.format(), override_slot, consumers = st.consumers.len(), "Attached consumer");
        true
    }

    /// Detach a consumer.
    ///
    /// Only the consumer slots that refer to this source are cleared.
    pub fn detach(&self, consumer: &Arc<DataConsumer>) -> bool {
        let mut st = self.state.lock();
        let Some(pos) = st.consumers.iter().position(|c| Arc::ptr_eq(c, consumer)) else {
            trace!(format = %self.format(), "Consumer not attached here");
            return false;
        };
        let removed = st.consumers.remove(pos);
        removed.release_slots(self);
        drop(st);
        drop(removed);
        true
    }

    /// Detach every consumer
    pub fn clear(&self) {
        let removed = {
            let mut st = self.state.lock();
            std::mem::take(&mut st.consumers)
        };
        for consumer in &removed {
            consumer.release_slots(self);
        }
    }
}

impl DataNode for DataSource {
    fn format(&self) -> Format {
        self.format.read().clone()
    }

    fn timestamp(&self) -> u64 {
        self.state.lock().timestamp
    }

    fn set_format(&self, format: &Format) -> bool {
        if *self.format.read() == *format {
            return true;
        }
        // Existing consumers were negotiated for the current format
        if self.consumer_count() > 0 {
            return false;
        }
        let accepted = self.handler.as_ref().is_some_and(|h| h.accept_format(format));
        if accepted {
            *self.format.write() = format.clone();
        }
        accepted
    }

    fn control(&self, params: &mut NamedParams) -> bool {
        self.handler.as_ref().is_some_and(|h| h.control(params))
    }
}

impl fmt::Debug for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSource")
            .field("format", &*self.format.read())
            .field("alive", &self.alive())
            .finish()
    }
}

impl Drop for DataSource {
    fn drop(&mut self) {
        let consumers = std::mem::take(&mut self.state.get_mut().consumers);
        for consumer in &consumers {
            consumer.release_slots(self);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ConsumerHandler;
    use crate::format::FormatRegistry;
    use std::sync::atomic::AtomicUsize;

    struct Fixed {
        accept: usize,
        valid: bool,
        seen: Arc<AtomicUsize>,
    }

    impl ConsumerHandler for Fixed {
        fn consume(&self, _data: &[u8], _timestamp: u64, _flags: u32) -> usize {
            self.seen.fetch_add(1, Ordering::SeqCst);
            self.accept
        }

        fn valid(&self) -> bool {
            self.valid
        }
    }

    fn fixed(format: &Format, accept: usize, valid: bool) -> (Arc<DataConsumer>, Arc<AtomicUsize>) {
        let seen = Arc::new(AtomicUsize::new(0));
        let consumer = DataConsumer::new(
            format.clone(),
            Fixed {
                accept,
                valid,
                seen: seen.clone(),
            },
        );
        (consumer, seen)
    }

    #[test]
    fn test_timestamp_prediction() {
        let slin = FormatRegistry::new().lookup("slin").unwrap();
        let source = DataSource::new(slin);
        source.forward(&[0u8; 320], Some(1000), 0);
        assert_eq!(source.timestamp(), 1000);
        assert_eq!(source.next_timestamp(), Some(1160));

        source.forward(&[0u8; 160], None, 0);
        assert_eq!(source.timestamp(), 1160);
        assert_eq!(source.next_timestamp(), Some(1240));
    }

    #[test]
    fn test_short_buffer_keeps_prediction() {
        let slin = FormatRegistry::new().lookup("slin").unwrap();
        let source = DataSource::new(slin);
        // Less than one frame carries no whole samples
        source.forward(&[0u8; 100], Some(2000), 0);
        assert_eq!(source.next_timestamp(), Some(2000));
        source.forward(&[0u8; 320], None, 0);
        assert_eq!(source.timestamp(), 2000);
        assert_eq!(source.next_timestamp(), Some(2160));
    }

    #[test]
    fn test_variable_rate_has_no_prediction() {
        let speex = FormatRegistry::new().lookup("speex").unwrap();
        let source = DataSource::new(speex);
        source.forward(&[0u8; 40], Some(500), 0);
        assert_eq!(source.next_timestamp(), None);
        // Falls back to the last timestamp plus a guess of nothing
        source.forward(&[0u8; 40], None, 0);
        assert_eq!(source.timestamp(), 500);
    }

    #[test]
    fn test_forward_returns_minimum() {
        let slin = FormatRegistry::new().lookup("slin").unwrap();
        let source = DataSource::new(slin.clone());
        let (a, _) = fixed(&slin, 160, true);
        let (b, _) = fixed(&slin, 80, true);
        let (c, _) = fixed(&slin, 0, true);
        assert!(source.attach(&a, false));
        assert!(source.attach(&b, false));
        assert!(source.attach(&c, false));

        assert_eq!(source.forward(&[0u8; 160], None, 0), 80);
        // Valid consumers accepting nothing stay attached
        assert_eq!(source.consumer_count(), 3);
    }

    #[test]
    fn test_invalid_consumer_pruned() {
        let slin = FormatRegistry::new().lookup("slin").unwrap();
        let source = DataSource::new(slin.clone());
        let (dead, dead_seen) = fixed(&slin, 0, false);
        let (live, live_seen) = fixed(&slin, 160, true);
        assert!(source.attach(&dead, false));
        assert!(source.attach(&live, false));

        assert_eq!(source.forward(&[0u8; 160], None, 0), 160);
        assert_eq!(source.consumer_count(), 1);
        assert!(dead.source().is_none());
        assert!(Arc::ptr_eq(&live.source().unwrap(), &source));

        source.forward(&[0u8; 160], None, 0);
        assert_eq!(dead_seen.load(Ordering::SeqCst), 1);
        assert_eq!(live_seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_dead_source_refuses_attach() {
        let slin = FormatRegistry::new().lookup("slin").unwrap();
        let source = DataSource::new(slin.clone());
        let (consumer, _) = fixed(&slin, 1, true);
        assert!(source.attach(&consumer, false));

        source.kill();
        assert!(!source.alive());
        assert_eq!(source.consumer_count(), 0);
        assert!(consumer.source().is_none());
        assert!(!source.attach(&consumer, false));
    }

    #[test]
    fn test_drop_clears_consumer_slots() {
        let slin = FormatRegistry::new().lookup("slin").unwrap();
        let (consumer, _) = fixed(&slin, 1, true);
        {
            let source = DataSource::new(slin.clone());
            assert!(source.attach(&consumer, true));
            assert!(consumer.is_attached());
        }
        assert!(!consumer.is_attached());
        assert!(consumer.override_source().is_none());
    }

    #[test]
    fn test_set_format_refused_with_consumers() {
        struct Flexible;
        impl SourceHandler for Flexible {
            fn accept_format(&self, _format: &Format) -> bool {
                true
            }
        }

        let registry = FormatRegistry::new();
        let slin = registry.lookup("slin").unwrap();
        let alaw = registry.lookup("alaw").unwrap();
        let source = DataSource::with_handler(slin.clone(), Flexible);
        let (consumer, _) = fixed(&slin, 1, true);

        assert!(source.attach(&consumer, false));
        assert!(!source.set_format(&alaw));
        assert!(source.detach(&consumer));
        assert!(source.set_format(&alaw));
        assert_eq!(source.format(), alaw);
    }
}
