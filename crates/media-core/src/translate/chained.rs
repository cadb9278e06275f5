//! Factories composed from two others

use super::factory::same_factory;
use super::{DataTranslator, TranslatorCaps, TranslatorFactory};
use crate::format::Format;
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

/// Factory building two-part chains joined on an intermediate format.
///
/// Holds only weak references to its parents: uninstalling a parent from
/// the registry also removes every chain built on it. A chain whose parent
/// is gone depends on everything and goes with the next uninstall.
pub struct ChainedFactory {
    name: String,
    first: Weak<dyn TranslatorFactory>,
    second: Weak<dyn TranslatorFactory>,
    format: Format,
    length: u32,
    caps: Vec<TranslatorCaps>,
}

impl ChainedFactory {
    /// Compose two factories on `intermediate`
    pub fn new(
        first: &Arc<dyn TranslatorFactory>,
        second: &Arc<dyn TranslatorFactory>,
        intermediate: Format,
    ) -> Self {
        let mut caps = Self::derive_caps(first.capabilities(), second.capabilities(), &intermediate);
        // An outer format already used inside a parent would pass through twice
        let inside = |f: &Format| first.intermediate(f) || second.intermediate(f);
        caps.retain(|c| !inside(&c.src) && !inside(&c.dest));
        Self {
            name: format!("{}+{}@{}", first.name(), second.name(), intermediate),
            first: Arc::downgrade(first),
            second: Arc::downgrade(second),
            length: first.length() + second.length(),
            format: intermediate,
            caps,
        }
    }

    /// Every `src -> dest` obtainable by passing through `intermediate`,
    /// in either parent order, at the summed cost.
    ///
    /// Pairs that would convert a format back to itself are left out. When
    /// a pair can be reached more than one way only the cheapest is kept.
    pub fn derive_caps(
        first: &[TranslatorCaps],
        second: &[TranslatorCaps],
        intermediate: &Format,
    ) -> Vec<TranslatorCaps> {
        let mut caps: Vec<TranslatorCaps> = Vec::new();
        let mut add = |src: &Format, dest: &Format, cost: u32| {
            if src == dest {
                return;
            }
            match caps.iter_mut().find(|c| c.src == *src && c.dest == *dest) {
                Some(existing) => existing.cost = existing.cost.min(cost),
                None => caps.push(TranslatorCaps::new(src.clone(), dest.clone(), cost)),
            }
        };

        for a in first {
            for b in second {
                // first then second
                if a.dest == *intermediate && b.src == *intermediate {
                    add(&a.src, &b.dest, a.cost + b.cost);
                }
                // second then first
                if b.dest == *intermediate && a.src == *intermediate {
                    add(&b.src, &a.dest, a.cost + b.cost);
                }
            }
        }
        caps
    }

    /// First parent, if still installed
    pub fn first(&self) -> Option<Arc<dyn TranslatorFactory>> {
        self.first.upgrade()
    }

    /// Second parent, if still installed
    pub fn second(&self) -> Option<Arc<dyn TranslatorFactory>> {
        self.second.upgrade()
    }

    fn build(
        &self,
        head: &Arc<dyn TranslatorFactory>,
        tail: &Arc<dyn TranslatorFactory>,
        src: &Format,
        dest: &Format,
    ) -> Option<DataTranslator> {
        head.converts(src, &self.format)?;
        tail.converts(&self.format, dest)?;

        let first = head.create(src, &self.format)?;
        let second = tail.create(&self.format, dest)?;
        if !first.final_source().attach(second.consumer(), false) {
            warn!(factory = %self.name, "Could not join translator chain");
            return None;
        }
        debug!(factory = %self.name, src = %src, dest = %dest, "Built translator chain");
        Some(first)
    }
}

impl TranslatorFactory for ChainedFactory {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> &[TranslatorCaps] {
        &self.caps
    }

    fn create(&self, src: &Format, dest: &Format) -> Option<DataTranslator> {
        self.converts(src, dest)?;
        let (first, second) = (self.first.upgrade()?, self.second.upgrade()?);
        self.build(&first, &second, src, dest)
            .or_else(|| self.build(&second, &first, src, dest))
    }

    fn length(&self) -> u32 {
        self.length
    }

    fn intermediate(&self, format: &Format) -> bool {
        if self.format == *format {
            return true;
        }
        self.first.upgrade().is_some_and(|f| f.intermediate(format))
            || self.second.upgrade().is_some_and(|f| f.intermediate(format))
    }

    fn intermediate_format(&self) -> Option<&Format> {
        Some(&self.format)
    }

    fn depends_on(&self, factory: &Arc<dyn TranslatorFactory>) -> bool {
        let target = Arc::as_ptr(factory);
        [&self.first, &self.second].into_iter().any(|parent| {
            same_factory(parent.as_ptr(), target)
                || parent.upgrade().map_or(true, |p| p.depends_on(factory))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::FormatRegistry;

    struct Table {
        name: &'static str,
        caps: Vec<TranslatorCaps>,
    }

    impl TranslatorFactory for Table {
        fn name(&self) -> &str {
            self.name
        }

        fn capabilities(&self) -> &[TranslatorCaps] {
            &self.caps
        }

        fn create(&self, _src: &Format, _dest: &Format) -> Option<DataTranslator> {
            None
        }
    }

    fn both_ways(name: &'static str, a: &Format, b: &Format, cost: u32) -> Arc<dyn TranslatorFactory> {
        Arc::new(Table {
            name,
            caps: vec![
                TranslatorCaps::new(a.clone(), b.clone(), cost),
                TranslatorCaps::new(b.clone(), a.clone(), cost),
            ],
        })
    }

    #[test]
    fn test_derive_caps_both_orders() {
        let registry = FormatRegistry::new();
        let slin = registry.lookup("slin").unwrap();
        let alaw = registry.lookup("alaw").unwrap();
        let gsm = registry.lookup("gsm").unwrap();

        let a = both_ways("a", &slin, &alaw, 1);
        let g = both_ways("g", &slin, &gsm, 3);
        let chained = ChainedFactory::new(&a, &g, slin.clone());

        assert_eq!(chained.length(), 2);
        assert_eq!(chained.converts(&alaw, &gsm), Some(4));
        assert_eq!(chained.converts(&gsm, &alaw), Some(4));
        // No identity pairs
        assert_eq!(chained.converts(&alaw, &alaw), None);
        assert_eq!(chained.capabilities().len(), 2);
        assert_eq!(chained.name(), "a+g@slin");
    }

    #[test]
    fn test_intermediate_and_dependencies() {
        let registry = FormatRegistry::new();
        let slin = registry.lookup("slin").unwrap();
        let alaw = registry.lookup("alaw").unwrap();
        let mulaw = registry.lookup("mulaw").unwrap();
        let gsm = registry.lookup("gsm").unwrap();

        let a = both_ways("a", &slin, &alaw, 1);
        let u = both_ways("u", &slin, &mulaw, 1);
        let g = both_ways("g", &mulaw, &gsm, 1);
        let au: Arc<dyn TranslatorFactory> = Arc::new(ChainedFactory::new(&a, &u, slin.clone()));
        let aug = ChainedFactory::new(&au, &g, mulaw.clone());

        assert_eq!(aug.length(), 3);
        assert!(aug.intermediate(&mulaw));
        assert!(aug.intermediate(&slin));
        assert!(!aug.intermediate(&alaw));
        assert!(aug.depends_on(&au));
        assert!(aug.depends_on(&a));
        assert!(!aug.depends_on(&both_ways("x", &slin, &gsm, 1)));
        assert_eq!(aug.converts(&alaw, &gsm), Some(3));
    }

    #[test]
    fn test_outer_formats_never_revisited() {
        let registry = FormatRegistry::new();
        let slin = registry.lookup("slin").unwrap();
        let alaw = registry.lookup("alaw").unwrap();
        let mulaw = registry.lookup("mulaw").unwrap();

        let a = both_ways("a", &slin, &alaw, 1);
        let u = both_ways("u", &slin, &mulaw, 1);
        let au: Arc<dyn TranslatorFactory> = Arc::new(ChainedFactory::new(&a, &u, slin.clone()));

        // slin -> alaw -> slin -> mulaw and back would cross slin twice
        let looping = ChainedFactory::new(&a, &au, alaw.clone());
        assert!(looping.capabilities().is_empty());
        assert_eq!(looping.converts(&slin, &mulaw), None);
    }

    #[test]
    fn test_dead_parent_counts_as_dependency() {
        let registry = FormatRegistry::new();
        let slin = registry.lookup("slin").unwrap();
        let alaw = registry.lookup("alaw").unwrap();
        let mulaw = registry.lookup("mulaw").unwrap();

        let a = both_ways("a", &slin, &alaw, 1);
        let unrelated = both_ways("x", &alaw, &mulaw, 1);
        let chained = {
            let u = both_ways("u", &slin, &mulaw, 1);
            ChainedFactory::new(&a, &u, slin.clone())
        };
        assert!(chained.depends_on(&unrelated));
    }

    #[test]
    fn test_create_fails_when_parent_gone() {
        let registry = FormatRegistry::new();
        let slin = registry.lookup("slin").unwrap();
        let alaw = registry.lookup("alaw").unwrap();
        let mulaw = registry.lookup("mulaw").unwrap();

        let a = both_ways("a", &slin, &alaw, 1);
        let chained = {
            let u = both_ways("u", &slin, &mulaw, 1);
            ChainedFactory::new(&a, &u, slin.clone())
        };
        assert!(chained.second().is_none());
        assert!(chained.create(&alaw, &mulaw).is_none());
    }
}
