//! Translator factory interface

use super::DataTranslator;
use crate::format::Format;
use std::fmt;
use std::sync::Arc;

/// One conversion offered by a factory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatorCaps {
    /// Input format
    pub src: Format,
    /// Output format
    pub dest: Format,
    /// Relative cost, lower is better
    pub cost: u32,
}

impl TranslatorCaps {
    /// Describe a conversion
    pub fn new(src: Format, dest: Format, cost: u32) -> Self {
        Self { src, dest, cost }
    }
}

impl fmt::Display for TranslatorCaps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} ({})", self.src, self.dest, self.cost)
    }
}

/// Producer of translators for a fixed set of conversions
pub trait TranslatorFactory: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Conversions this factory can build
    fn capabilities(&self) -> &[TranslatorCaps];

    /// Build a translator for one advertised conversion
    fn create(&self, src: &Format, dest: &Format) -> Option<DataTranslator>;

    /// Number of translators in the chains this factory builds
    fn length(&self) -> u32 {
        1
    }

    /// Whether `format` is used as an intermediate step inside this factory
    fn intermediate(&self, _format: &Format) -> bool {
        false
    }

    /// The intermediate format this factory joins its parts on
    fn intermediate_format(&self) -> Option<&Format> {
        None
    }

    /// Whether this factory relies on `factory` to build its translators
    fn depends_on(&self, _factory: &Arc<dyn TranslatorFactory>) -> bool {
        false
    }

    /// Cheapest advertised cost of `src -> dest`
    fn converts(&self, src: &Format, dest: &Format) -> Option<u32> {
        self.capabilities()
            .iter()
            .filter(|c| c.src == *src && c.dest == *dest)
            .map(|c| c.cost)
            .min()
    }
}

impl fmt::Debug for dyn TranslatorFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranslatorFactory")
            .field("name", &self.name())
            .field("length", &self.length())
            .field("caps", &self.capabilities().len())
            .finish()
    }
}

/// Identity comparison of two factories
pub(crate) fn same_factory(a: *const dyn TranslatorFactory, b: *const dyn TranslatorFactory) -> bool {
    std::ptr::addr_eq(a, b)
}
