//! Registry of installed translator factories

use super::factory::same_factory;
use super::{ChainedFactory, DataTranslator, TranslatorFactory, MAX_CHAIN_HOPS};
use crate::config::clamp_chain_length;
use crate::data::{DataConsumer, DataNode, DataSource};
use crate::format::Format;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

#[derive(Default)]
struct RegistryState {
    factories: Vec<Arc<dyn TranslatorFactory>>,
    /// Factories not yet considered for composition
    pending: VecDeque<Arc<dyn TranslatorFactory>>,
}

impl RegistryState {
    fn best_cost(&self, src: &Format, dest: &Format) -> Option<u32> {
        self.factories.iter().filter_map(|f| f.converts(src, dest)).min()
    }

    fn contains(&self, factory: &Arc<dyn TranslatorFactory>) -> bool {
        self.factories.iter().any(|f| Arc::ptr_eq(f, factory))
    }
}

/// Installed translator factories and the chains composed from them.
///
/// Composition is lazy: installing a factory queues it, and the next
/// lookup pairs every queued factory with every installed one.
pub struct TranslatorRegistry {
    state: Mutex<RegistryState>,
    max_chain_length: AtomicU32,
}

impl TranslatorRegistry {
    /// Create an empty registry composing chains of at most
    /// `max_chain_length` translators
    pub fn new(max_chain_length: u32) -> Self {
        Self {
            state: Mutex::new(RegistryState::default()),
            max_chain_length: AtomicU32::new(clamp_chain_length(max_chain_length)),
        }
    }

    /// Longest chain composition may build
    pub fn max_chain_length(&self) -> u32 {
        self.max_chain_length.load(Ordering::Relaxed)
    }

    /// Change the chain length limit, clamped to the supported range.
    ///
    /// Chains already composed are kept.
    pub fn set_max_chain_length(&self, length: u32) {
        self.max_chain_length
            .store(clamp_chain_length(length), Ordering::Relaxed);
    }

    /// Install a factory. Returns false if it is already installed.
    pub fn install(&self, factory: Arc<dyn TranslatorFactory>) -> bool {
        let mut st = self.state.lock();
        if st.contains(&factory) {
            return false;
        }
        info!(
            factory = factory.name(),
            caps = factory.capabilities().len(),
            "Installing translator factory"
        );
        st.factories.push(factory.clone());
        st.pending.push_back(factory);
        true
    }

    /// Remove a factory and every composed factory depending on it
    pub fn uninstall(&self, factory: &Arc<dyn TranslatorFactory>) -> bool {
        let mut st = self.state.lock();
        if !st.contains(factory) {
            return false;
        }
        info!(factory = factory.name(), "Uninstalling translator factory");
        // Collected up front: removing a chain drops the last strong
        // reference that chains built on top of it resolve through
        let target = Arc::as_ptr(factory);
        let doomed: Vec<*const dyn TranslatorFactory> = st
            .factories
            .iter()
            .filter(|f| same_factory(Arc::as_ptr(f), target) || f.depends_on(factory))
            .map(Arc::as_ptr)
            .collect();
        let is_doomed = |f: &Arc<dyn TranslatorFactory>| {
            doomed.iter().any(|&d| same_factory(Arc::as_ptr(f), d))
        };
        let before = st.factories.len();
        st.factories.retain(|f| !is_doomed(f));
        st.pending.retain(|f| !is_doomed(f));
        debug!(removed = before - st.factories.len(), "Factory and dependents removed");
        true
    }

    /// Remove every factory
    pub fn clear(&self) {
        let mut st = self.state.lock();
        st.factories.clear();
        st.pending.clear();
    }

    /// Snapshot of every installed factory, composed ones included
    pub fn factories(&self) -> Vec<Arc<dyn TranslatorFactory>> {
        self.compose();
        self.state.lock().factories.clone()
    }

    /// Number of installed factories, composed ones included
    pub fn factory_count(&self) -> usize {
        self.compose();
        self.state.lock().factories.len()
    }

    /// Pair every queued factory with the installed ones.
    ///
    /// A chained factory is kept only when it offers a conversion nobody
    /// offers yet, or offers one strictly cheaper. Returns the number of
    /// chained factories added.
    pub fn compose(&self) -> usize {
        let max = self.max_chain_length();
        let mut st = self.state.lock();
        let mut added = 0;

        while let Some(factory) = st.pending.pop_front() {
            // Snapshot: factories added below are queued and get their own turn
            let installed = st.factories.clone();
            for other in &installed {
                if let Some(chained) = Self::compose_pair(&st, &factory, other, max) {
                    for chain in chained {
                        debug!(
                            factory = chain.name(),
                            length = chain.length(),
                            caps = chain.capabilities().len(),
                            "Composed translator factory"
                        );
                        let chain: Arc<dyn TranslatorFactory> = Arc::new(chain);
                        st.factories.push(chain.clone());
                        st.pending.push_back(chain);
                        added += 1;
                    }
                }
            }
        }
        added
    }

    fn compose_pair(
        st: &RegistryState,
        a: &Arc<dyn TranslatorFactory>,
        b: &Arc<dyn TranslatorFactory>,
        max: u32,
    ) -> Option<Vec<ChainedFactory>> {
        if Arc::ptr_eq(a, b) || a.length() + b.length() > max {
            return None;
        }
        // One side already passes through the other's join point
        if a.intermediate_format().is_some_and(|m| b.intermediate(m))
            || b.intermediate_format().is_some_and(|m| a.intermediate(m))
        {
            return None;
        }

        let mut candidates: Vec<Format> = Vec::new();
        let mut consider = |m: &Format| {
            if !candidates.contains(m) {
                candidates.push(m.clone());
            }
        };
        for x in a.capabilities() {
            for y in b.capabilities() {
                if x.dest == y.src {
                    consider(&x.dest);
                }
                if y.dest == x.src {
                    consider(&y.dest);
                }
            }
        }

        let mut result = Vec::new();
        for m in candidates {
            if a.intermediate(&m) || b.intermediate(&m) {
                continue;
            }
            let chained = ChainedFactory::new(a, b, m);
            if chained.capabilities().is_empty() {
                trace!(factory = chained.name(), "Every composed conversion would loop");
                continue;
            }
            let improves = chained.capabilities().iter().any(|c| {
                let best = st.best_cost(&c.src, &c.dest);
                let best = result
                    .iter()
                    .filter_map(|r: &ChainedFactory| r.converts(&c.src, &c.dest))
                    .chain(best)
                    .min();
                best.map_or(true, |best| c.cost < best)
            });
            if improves {
                result.push(chained);
            } else {
                trace!(factory = chained.name(), "Composition brings nothing new");
            }
        }
        (!result.is_empty()).then_some(result)
    }

    /// Build a translator for `src -> dest` using the cheapest factory
    /// that succeeds
    pub fn create(&self, src: &Format, dest: &Format) -> Option<DataTranslator> {
        if src == dest {
            return None;
        }
        self.compose();
        let mut candidates: Vec<(u32, Arc<dyn TranslatorFactory>)> = {
            let st = self.state.lock();
            st.factories
                .iter()
                .filter_map(|f| f.converts(src, dest).map(|cost| (cost, f.clone())))
                .collect()
        };
        // Stable sort keeps install order among equal costs
        candidates.sort_by_key(|(cost, _)| *cost);

        for (cost, factory) in candidates {
            if let Some(translator) = factory.create(src, dest) {
                debug!(factory = factory.name(), src = %src, dest = %dest, cost, "Created translator");
                return Some(translator);
            }
            debug!(factory = factory.name(), src = %src, dest = %dest, "Factory failed to create translator");
        }
        debug!(src = %src, dest = %dest, "No translator available");
        None
    }

    /// Cheapest known cost of `src -> dest`
    pub fn cost(&self, src: &Format, dest: &Format) -> Option<u32> {
        self.compose();
        self.state.lock().best_cost(src, dest)
    }

    /// Whether `src` can be turned into `dest`
    pub fn can_convert(&self, src: &Format, dest: &Format) -> bool {
        src == dest || self.cost(src, dest).is_some()
    }

    /// Whether `a` and `b` can be converted into each other
    pub fn can_convert_both(&self, a: &Format, b: &Format) -> bool {
        self.can_convert(a, b) && self.can_convert(b, a)
    }

    /// Formats that can be converted into `dest`, with the cheapest cost
    pub fn src_formats(&self, dest: &Format) -> Vec<(Format, u32)> {
        self.collect_formats(|caps_src, caps_dest| (caps_dest == dest).then(|| caps_src.clone()))
    }

    /// Formats `src` can be converted into, with the cheapest cost
    pub fn dest_formats(&self, src: &Format) -> Vec<(Format, u32)> {
        self.collect_formats(|caps_src, caps_dest| (caps_src == src).then(|| caps_dest.clone()))
    }

    fn collect_formats<F>(&self, pick: F) -> Vec<(Format, u32)>
    where
        F: Fn(&Format, &Format) -> Option<Format>,
    {
        self.compose();
        let st = self.state.lock();
        let mut found: Vec<(Format, u32)> = Vec::new();
        for caps in st.factories.iter().flat_map(|f| f.capabilities().iter()) {
            let Some(format) = pick(&caps.src, &caps.dest) else {
                continue;
            };
            match found.iter_mut().find(|(f, _)| *f == format) {
                Some(entry) => entry.1 = entry.1.min(caps.cost),
                None => found.push((format, caps.cost)),
            }
        }
        found
    }

    /// The given formats plus every format convertible both ways with one
    /// of them, optionally restricted to the same sample rate and channel
    /// count
    pub fn all_formats(&self, formats: &[Format], same_rate: bool, same_channels: bool) -> Vec<Format> {
        let mut result: Vec<Format> = formats.to_vec();
        for format in formats {
            for (other, _) in self.dest_formats(format) {
                if result.contains(&other) {
                    continue;
                }
                if same_rate && other.sample_rate != format.sample_rate {
                    continue;
                }
                if same_channels && other.channels != format.channels {
                    continue;
                }
                if self.can_convert(&other, format) {
                    result.push(other);
                }
            }
        }
        result
    }

    /// Connect `source` to `consumer`, inserting translators if needed.
    ///
    /// Formats are renegotiated first: the consumer may adopt the source
    /// format (not for the override slot), or the source the consumer's.
    pub fn attach_chain(&self, source: &Arc<DataSource>, consumer: &Arc<DataConsumer>, override_slot: bool) -> bool {
        let src_format = source.format();
        let dest_format = consumer.format();

        if src_format == dest_format
            || (!override_slot && consumer.set_format(&src_format))
            || source.set_format(&dest_format)
        {
            trace!(format = %src_format, override_slot, "Attaching without translation");
            return source.attach(consumer, override_slot);
        }

        let Some(translator) = self.create(&src_format, &dest_format) else {
            warn!(src = %src_format, dest = %dest_format, "Cannot build translator chain");
            return false;
        };
        let tail = translator.final_source();
        if !tail.attach(consumer, override_slot) {
            warn!(src = %src_format, dest = %dest_format, "Could not attach consumer to translator chain");
            return false;
        }
        if !source.attach(translator.consumer(), false) {
            warn!(src = %src_format, dest = %dest_format, "Could not attach translator chain to source");
            tail.detach(consumer);
            return false;
        }
        debug!(
            src = %src_format,
            dest = %dest_format,
            length = translator.chain_length(),
            override_slot,
            "Attached through translator chain"
        );
        true
    }

    /// Undo [`attach_chain`](Self::attach_chain).
    ///
    /// Walks back from `consumer` through translators until `source` is
    /// found, then unwires from the consumer upwards. Translators still
    /// feeding someone else are left in place.
    pub fn detach_chain(&self, source: &Arc<DataSource>, consumer: &Arc<DataConsumer>) -> bool {
        let Some(path) = Self::find_path(source, consumer, 0) else {
            if consumer.is_attached() {
                warn!(format = %consumer.format(), "Consumer is not fed by this source, chain looks broken");
            }
            return false;
        };

        for (hop, (upstream, node)) in path.iter().rev().enumerate() {
            // Translators above the consumer go only when nothing else uses them
            if hop > 0 && node.translator_source().is_some_and(|out| out.consumer_count() > 0) {
                trace!("Translator still in use, stopping chain teardown");
                break;
            }
            if !upstream.detach(node) {
                warn!(format = %upstream.format(), "Translator chain changed during teardown");
                break;
            }
        }
        true
    }

    /// Edges from `source` down to `consumer`, in flow order
    fn find_path(
        source: &Arc<DataSource>,
        consumer: &Arc<DataConsumer>,
        depth: usize,
    ) -> Option<Vec<(Arc<DataSource>, Arc<DataConsumer>)>> {
        if depth > MAX_CHAIN_HOPS {
            return None;
        }
        let upstreams = [consumer.source(), consumer.override_source()];
        for upstream in upstreams.into_iter().flatten() {
            if Arc::ptr_eq(&upstream, source) {
                return Some(vec![(upstream, consumer.clone())]);
            }
            if let Some(translator) = upstream.translator() {
                if let Some(mut path) = Self::find_path(source, &translator, depth + 1) {
                    path.push((upstream, consumer.clone()));
                    return Some(path);
                }
            }
        }
        None
    }
}

impl Default for TranslatorRegistry {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_MAX_CHAIN_LENGTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::FormatRegistry;
    use crate::translate::{TranslatorCaps, Transcoder};

    struct Passthrough;

    impl Transcoder for Passthrough {
        fn convert(&mut self, data: &[u8], out: &mut Vec<u8>) -> bool {
            out.extend_from_slice(data);
            true
        }
    }

    struct Pair {
        name: String,
        caps: Vec<TranslatorCaps>,
    }

    impl Pair {
        fn new(a: &Format, b: &Format, cost: u32) -> Arc<dyn TranslatorFactory> {
            Arc::new(Self {
                name: format!("{}<>{}", a, b),
                caps: vec![
                    TranslatorCaps::new(a.clone(), b.clone(), cost),
                    TranslatorCaps::new(b.clone(), a.clone(), cost),
                ],
            })
        }
    }

    impl TranslatorFactory for Pair {
        fn name(&self) -> &str {
            &self.name
        }

        fn capabilities(&self) -> &[TranslatorCaps] {
            &self.caps
        }

        fn create(&self, src: &Format, dest: &Format) -> Option<DataTranslator> {
            self.converts(src, dest)?;
            Some(DataTranslator::new(src.clone(), dest.clone(), Passthrough))
        }
    }

    #[test]
    fn test_install_twice() {
        let formats = FormatRegistry::new();
        let registry = TranslatorRegistry::default();
        let f = Pair::new(&formats.lookup("slin").unwrap(), &formats.lookup("gsm").unwrap(), 2);
        assert!(registry.install(f.clone()));
        assert!(!registry.install(f.clone()));
        assert_eq!(registry.factory_count(), 1);
        assert!(registry.uninstall(&f));
        assert!(!registry.uninstall(&f));
    }

    #[test]
    fn test_chain_length_limit() {
        let formats = FormatRegistry::new();
        let slin = formats.lookup("slin").unwrap();
        let alaw = formats.lookup("alaw").unwrap();
        let gsm = formats.lookup("gsm").unwrap();

        let registry = TranslatorRegistry::new(1);
        registry.install(Pair::new(&slin, &alaw, 1));
        registry.install(Pair::new(&slin, &gsm, 1));
        assert_eq!(registry.factory_count(), 2);
        assert!(!registry.can_convert(&alaw, &gsm));

        registry.set_max_chain_length(2);
        registry.install(Pair::new(&slin, &formats.lookup("g729").unwrap(), 1));
        assert!(registry.can_convert(&gsm, &formats.lookup("g729").unwrap()));

        registry.set_max_chain_length(99);
        assert_eq!(registry.max_chain_length(), 4);
    }

    #[test]
    fn test_src_and_dest_formats() {
        let formats = FormatRegistry::new();
        let slin = formats.lookup("slin").unwrap();
        let alaw = formats.lookup("alaw").unwrap();
        let gsm = formats.lookup("gsm").unwrap();

        let registry = TranslatorRegistry::default();
        registry.install(Pair::new(&slin, &alaw, 1));
        registry.install(Pair::new(&slin, &gsm, 5));

        let mut dests = registry.dest_formats(&alaw);
        dests.sort_by_key(|(_, cost)| *cost);
        assert_eq!(dests, vec![(slin.clone(), 1), (gsm.clone(), 6)]);

        let srcs = registry.src_formats(&slin);
        assert_eq!(srcs.len(), 2);
        assert!(srcs.contains(&(gsm.clone(), 5)));

        let all = registry.all_formats(&[alaw.clone()], true, true);
        assert_eq!(all, vec![alaw.clone(), slin.clone(), gsm.clone()]);
    }

    #[test]
    fn test_all_formats_respects_rate() {
        let formats = FormatRegistry::new();
        let slin = formats.lookup("slin").unwrap();
        let wide = formats.lookup("slin/16000").unwrap();

        let registry = TranslatorRegistry::default();
        registry.install(Pair::new(&slin, &wide, 1));
        assert_eq!(registry.all_formats(&[slin.clone()], true, false), vec![slin.clone()]);
        assert_eq!(registry.all_formats(&[slin.clone()], false, false), vec![slin, wide]);
    }

    #[test]
    fn test_create_identity_is_none() {
        let formats = FormatRegistry::new();
        let slin = formats.lookup("slin").unwrap();
        let registry = TranslatorRegistry::default();
        assert!(registry.create(&slin, &slin).is_none());
        assert!(registry.can_convert(&slin, &slin));
    }
}
