//! Translators and translator factories
//!
//! A [`DataTranslator`] is a consumer in one format glued to a source in
//! another. Factories advertise the conversions they offer; the
//! [`TranslatorRegistry`] composes them into chains when no single factory
//! does the job.

mod chained;
mod factory;
#[cfg(feature = "g711")]
pub mod g711;
mod registry;

pub use chained::ChainedFactory;
pub use factory::{TranslatorCaps, TranslatorFactory};
pub use registry::TranslatorRegistry;

use crate::data::{DataConsumer, DataNode, DataSource};
use crate::format::Format;
use crate::params::NamedParams;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Hops a chain walk will follow before giving up
const MAX_CHAIN_HOPS: usize = 8;

/// Buffer conversion performed by a translator
pub trait Transcoder: Send {
    /// Convert one buffer, appending the result to `out`.
    ///
    /// Returning false drops the buffer.
    fn convert(&mut self, data: &[u8], out: &mut Vec<u8>) -> bool;

    /// Handle a control request
    fn control(&mut self, _params: &mut NamedParams) -> bool {
        false
    }
}

/// Conversion state owned by a translator's input consumer
pub(crate) struct TranslatorCore {
    source: Arc<DataSource>,
    transcoder: Mutex<Box<dyn Transcoder>>,
    src_rate: u32,
    dest_rate: u32,
}

impl TranslatorCore {
    pub(crate) fn source(&self) -> &Arc<DataSource> {
        &self.source
    }

    /// A translator nobody listens to is of no use
    pub(crate) fn valid(&self) -> bool {
        self.source.alive() && self.source.consumer_count() > 0
    }

    pub(crate) fn convert(&self, data: &[u8], timestamp: u64, flags: u32) -> usize {
        let mut out = Vec::with_capacity(data.len() * 2);
        if !self.transcoder.lock().convert(data, &mut out) || out.is_empty() {
            trace!(len = data.len(), "Translator dropped buffer");
            return 0;
        }
        let timestamp = if self.src_rate != self.dest_rate && self.src_rate > 0 {
            timestamp * self.dest_rate as u64 / self.src_rate as u64
        } else {
            timestamp
        };
        self.source.forward(&out, Some(timestamp), flags)
    }

    pub(crate) fn control(&self, params: &mut NamedParams) -> bool {
        self.transcoder.lock().control(params)
    }
}

/// Format converting node: a consumer in the source format feeding an
/// internal source in the destination format.
///
/// The handle is cheap to clone. The translator lives as long as someone
/// holds its consumer, normally the upstream source it is attached to.
#[derive(Clone)]
pub struct DataTranslator {
    consumer: Arc<DataConsumer>,
    source: Arc<DataSource>,
}

impl DataTranslator {
    /// Build a translator from `src` to `dest` around a transcoder
    pub fn new(src: Format, dest: Format, transcoder: impl Transcoder + 'static) -> Self {
        Self::from_boxed(src, dest, Box::new(transcoder))
    }

    /// Build a translator from a boxed transcoder
    pub fn from_boxed(src: Format, dest: Format, transcoder: Box<dyn Transcoder>) -> Self {
        let src_rate = src.sample_rate;
        let dest_rate = dest.sample_rate;
        let source = Arc::new(DataSource::build(dest, None));
        let consumer = Arc::new(DataConsumer::translator(
            src,
            TranslatorCore {
                source: source.clone(),
                transcoder: Mutex::new(transcoder),
                src_rate,
                dest_rate,
            },
        ));
        source.set_translator(&consumer);
        Self { consumer, source }
    }

    /// Rebuild the handle of a translator from its input consumer
    pub fn from_consumer(consumer: &Arc<DataConsumer>) -> Option<Self> {
        let source = consumer.translator_source()?.clone();
        Some(Self {
            consumer: consumer.clone(),
            source,
        })
    }

    /// Input side, attach this to the upstream source
    pub fn consumer(&self) -> &Arc<DataConsumer> {
        &self.consumer
    }

    /// Output side of this translator
    pub fn source(&self) -> &Arc<DataSource> {
        &self.source
    }

    /// Format accepted
    pub fn src_format(&self) -> Format {
        self.consumer.format()
    }

    /// Format produced
    pub fn dest_format(&self) -> Format {
        self.source.format()
    }

    /// Output of the last translator in the chain this one heads
    pub fn final_source(&self) -> Arc<DataSource> {
        let mut source = self.source.clone();
        for _ in 0..MAX_CHAIN_HOPS {
            let next = match source.consumers().as_slice() {
                [only] => only.translator_source().cloned(),
                _ => None,
            };
            match next {
                Some(next) => source = next,
                None => break,
            }
        }
        source
    }

    /// Number of translators in the chain this one heads
    pub fn chain_length(&self) -> usize {
        let mut length = 1;
        let mut source = self.source.clone();
        while length < MAX_CHAIN_HOPS {
            let next = match source.consumers().as_slice() {
                [only] => only.translator_source().cloned(),
                _ => None,
            };
            match next {
                Some(next) => {
                    source = next;
                    length += 1;
                }
                None => break,
            }
        }
        length
    }
}

impl fmt::Debug for DataTranslator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DataTranslator({} -> {})", self.src_format(), self.dest_format())
    }
}
