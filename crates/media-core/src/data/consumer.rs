//! Data consumers

use super::{clock, DataNode, DataSource, GAP_THRESHOLD_US};
use crate::format::Format;
use crate::params::NamedParams;
use crate::translate::TranslatorCore;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::{error, trace};

/// Application side of a consumer: where delivered buffers end up
pub trait ConsumerHandler: Send + Sync {
    /// Handle one buffer, returning how many bytes were accepted
    fn consume(&self, data: &[u8], timestamp: u64, flags: u32) -> usize;

    /// Whether the consumer still wants data. An invalid consumer that
    /// accepts nothing is detached from the source that fed it.
    fn valid(&self) -> bool {
        true
    }

    /// Whether the consumer can switch to `format`
    fn accept_format(&self, _format: &Format) -> bool {
        false
    }

    /// Handle a control request
    fn control(&self, _params: &mut NamedParams) -> bool {
        false
    }
}

enum Role {
    Sink(Box<dyn ConsumerHandler>),
    Translator(TranslatorCore),
}

#[derive(Default)]
struct ConsumerState {
    /// Timestamp of the last delivered buffer, after delta adjustment
    timestamp: u64,
    regular: Option<Weak<DataSource>>,
    overriding: Option<Weak<DataSource>>,
    regular_delta: i64,
    override_delta: i64,
    /// Clock reading at the last delivery, 0 if none yet
    last_ts_time: u64,
}

impl ConsumerState {
    fn slot_mut(&mut self, override_slot: bool) -> &mut Option<Weak<DataSource>> {
        if override_slot {
            &mut self.overriding
        } else {
            &mut self.regular
        }
    }

    /// Which slot feeds from `source`: `Some(true)` for override,
    /// `Some(false)` for regular, `None` when the source must be ignored
    fn slot_of(&self, source: &DataSource) -> Option<bool> {
        if points_to(&self.overriding, source) {
            Some(true)
        } else if occupied(&self.overriding) || !points_to(&self.regular, source) {
            None
        } else {
            Some(false)
        }
    }
}

fn points_to(slot: &Option<Weak<DataSource>>, source: &DataSource) -> bool {
    slot.as_ref()
        .is_some_and(|w| std::ptr::eq(w.as_ptr(), source as *const DataSource))
}

fn occupied(slot: &Option<Weak<DataSource>>) -> bool {
    slot.as_ref().is_some_and(|w| w.strong_count() > 0)
}

fn apply_delta(timestamp: u64, delta: i64) -> u64 {
    (timestamp as i128 + delta as i128).clamp(0, u64::MAX as i128) as u64
}

/// Receiving end of the media graph.
///
/// A consumer is fed by at most one regular source and at most one override
/// source. While an override source is attached, buffers from the regular
/// source are dropped. Timestamps from each source are shifted by a
/// per-slot delta so the consumer sees one continuous timeline across
/// source changes.
pub struct DataConsumer {
    format: RwLock<Format>,
    state: Mutex<ConsumerState>,
    role: Role,
}

impl DataConsumer {
    /// Create a consumer delivering to `handler`
    pub fn new(format: Format, handler: impl ConsumerHandler + 'static) -> Arc<Self> {
        Self::with_handler(format, Box::new(handler))
    }

    /// Create a consumer from a boxed handler
    pub fn with_handler(format: Format, handler: Box<dyn ConsumerHandler>) -> Arc<Self> {
        Arc::new(Self {
            format: RwLock::new(format),
            state: Mutex::new(ConsumerState::default()),
            role: Role::Sink(handler),
        })
    }

    pub(crate) fn translator(format: Format, core: TranslatorCore) -> Self {
        Self {
            format: RwLock::new(format),
            state: Mutex::new(ConsumerState::default()),
            role: Role::Translator(core),
        }
    }

    /// Regular upstream source, if attached and alive
    pub fn source(&self) -> Option<Arc<DataSource>> {
        self.state.lock().regular.as_ref().and_then(Weak::upgrade)
    }

    /// Override upstream source, if attached and alive
    pub fn override_source(&self) -> Option<Arc<DataSource>> {
        self.state.lock().overriding.as_ref().and_then(Weak::upgrade)
    }

    /// Whether any upstream slot is in use
    pub fn is_attached(&self) -> bool {
        let st = self.state.lock();
        occupied(&st.regular) || occupied(&st.overriding)
    }

    /// Whether the consumer still wants data
    pub fn valid(&self) -> bool {
        match &self.role {
            Role::Sink(handler) => handler.valid(),
            Role::Translator(core) => core.valid(),
        }
    }

    /// Whether this consumer is the input of a translator
    pub fn is_translator(&self) -> bool {
        matches!(self.role, Role::Translator(_))
    }

    /// Output source of the translator this consumer belongs to
    pub fn translator_source(&self) -> Option<&Arc<DataSource>> {
        match &self.role {
            Role::Translator(core) => Some(core.source()),
            Role::Sink(_) => None,
        }
    }

    /// Timestamp delta applied to buffers from the regular source
    pub fn regular_delta(&self) -> i64 {
        self.state.lock().regular_delta
    }

    /// Timestamp delta applied to buffers from the override source
    pub fn override_delta(&self) -> i64 {
        self.state.lock().override_delta
    }

    /// Clock reading (see [`clock::now_usec`]) at the last delivery, 0 if none
    pub fn last_ts_time(&self) -> u64 {
        self.state.lock().last_ts_time
    }

    /// Recompute the timestamp delta for `source`.
    ///
    /// The first call on a fresh consumer adopts the source timestamp. Later
    /// calls fold in any wall-clock gap longer than [`GAP_THRESHOLD_US`]
    /// since the last delivery plus the difference between the two
    /// timestamps. Fails when `source` does not feed this consumer.
    pub fn synchronize(&self, source: &DataSource) -> bool {
        self.synchronize_at(source, clock::now_usec())
    }

    /// [`synchronize`](Self::synchronize) with an explicit clock reading
    pub fn synchronize_at(&self, source: &DataSource, now_usec: u64) -> bool {
        let source_ts = source.timestamp();
        let mut st = self.state.lock();
        self.resync(&mut st, source, source_ts, now_usec)
    }

    fn resync(&self, st: &mut ConsumerState, source: &DataSource, source_ts: u64, now: u64) -> bool {
        let Some(override_slot) = st.slot_of(source) else {
            return false;
        };

        if st.timestamp == 0 && st.regular_delta == 0 && st.override_delta == 0 {
            st.timestamp = source_ts;
            return true;
        }

        let mut delta: i64 = 0;
        if st.last_ts_time != 0 {
            let elapsed = now.saturating_sub(st.last_ts_time);
            if elapsed > GAP_THRESHOLD_US {
                let rate = self.format.read().sample_rate as u64;
                delta += (elapsed * rate / 1_000_000) as i64;
            }
        }
        delta += st.timestamp as i64 - source_ts as i64;

        trace!(delta, override_slot, "Consumer resynchronized");
        if override_slot {
            st.override_delta = delta;
        } else {
            st.regular_delta = delta;
        }
        true
    }

    /// Point the requested slot at `source` and resynchronize.
    ///
    /// Fails if the slot is held by another live source.
    pub(crate) fn claim_slot(&self, source: &Arc<DataSource>, override_slot: bool, source_ts: u64) -> bool {
        let mut st = self.state.lock();
        let slot = st.slot_mut(override_slot);
        if occupied(slot) && !points_to(slot, source) {
            return false;
        }
        *slot = Some(Arc::downgrade(source));
        self.resync(&mut st, source, source_ts, clock::now_usec());
        true
    }

    /// Clear every slot that refers to `source`
    pub(crate) fn release_slots(&self, source: &DataSource) -> bool {
        let mut st = self.state.lock();
        let mut released = false;
        if points_to(&st.regular, source) {
            st.regular = None;
            released = true;
        }
        if points_to(&st.overriding, source) {
            st.overriding = None;
            released = true;
        }
        released
    }

    /// Deliver a buffer forwarded by `source`
    pub(crate) fn consume_from(&self, data: &[u8], timestamp: u64, flags: u32, source: &DataSource) -> usize {
        let delta = {
            let st = self.state.lock();
            match st.slot_of(source) {
                Some(true) => st.override_delta,
                Some(false) => st.regular_delta,
                None => return 0,
            }
        };
        let timestamp = apply_delta(timestamp, delta);

        let accepted = match &self.role {
            Role::Sink(handler) => handler.consume(data, timestamp, flags),
            Role::Translator(core) => core.convert(data, timestamp, flags),
        };

        let mut st = self.state.lock();
        st.timestamp = timestamp;
        st.last_ts_time = clock::now_usec();
        accepted
    }
}

impl DataNode for DataConsumer {
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
        let accepted = match &self.role {
            Role::Sink(handler) => handler.accept_format(format),
            // A translator's input format is fixed by its factory
            Role::Translator(_) => false,
        };
        if accepted {
            *self.format.write() = format.clone();
        }
        accepted
    }

    fn control(&self, params: &mut NamedParams) -> bool {
        match &self.role {
            Role::Sink(handler) => handler.control(params),
            Role::Translator(core) => core.control(params),
        }
    }
}

impl fmt::Debug for DataConsumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataConsumer")
            .field("format", &*self.format.read())
            .field("translator", &self.is_translator())
            .finish()
    }
}

impl Drop for DataConsumer {
    fn drop(&mut self) {
        let st = self.state.get_mut();
        if occupied(&st.regular) || occupied(&st.overriding) {
            error!("DataConsumer destroyed while a source still refers to it");
            debug_assert!(false, "DataConsumer destroyed while attached");
        }
    }
}
