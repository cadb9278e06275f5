//! Built-in G.711 translators
//!
//! One factory per companding law, each converting between `slin` and its
//! law at cost 1. A-law to mu-law and back comes from chain composition.

use super::{DataTranslator, Transcoder, TranslatorCaps, TranslatorFactory, TranslatorRegistry};
use crate::error::Result;
use crate::format::{Format, FormatRegistry};
use std::sync::Arc;
use tandem_codec_core::g711::Law;
use tracing::trace;

/// Cost of one companding step
pub const G711_COST: u32 = 1;

#[derive(Debug, Clone, Copy)]
enum Direction {
    Compress,
    Expand,
}

struct Compander {
    law: Law,
    direction: Direction,
}

impl Transcoder for Compander {
    fn convert(&mut self, data: &[u8], out: &mut Vec<u8>) -> bool {
        match self.direction {
            Direction::Compress => match self.law.compress_bytes(data, out) {
                Ok(_) => true,
                Err(e) => {
                    trace!(law = %self.law, error = %e, "Dropping linear buffer");
                    false
                }
            },
            Direction::Expand => {
                self.law.expand_bytes(data, out);
                true
            }
        }
    }
}

/// Factory for `slin <-> alaw` or `slin <-> mulaw`
pub struct G711Factory {
    law: Law,
    name: String,
    linear: Format,
    coded: Format,
    caps: Vec<TranslatorCaps>,
}

impl G711Factory {
    /// Build the factory for `law` using formats from `formats`
    pub fn new(formats: &FormatRegistry, law: Law) -> Result<Self> {
        let linear = formats.require("slin")?;
        let coded = formats.require(law.format_name())?;
        Ok(Self {
            law,
            name: format!("g711-{}", law),
            caps: vec![
                TranslatorCaps::new(linear.clone(), coded.clone(), G711_COST),
                TranslatorCaps::new(coded.clone(), linear.clone(), G711_COST),
            ],
            linear,
            coded,
        })
    }

    /// Companding law handled by this factory
    pub fn law(&self) -> Law {
        self.law
    }
}

impl TranslatorFactory for G711Factory {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> &[TranslatorCaps] {
        &self.caps
    }

    fn create(&self, src: &Format, dest: &Format) -> Option<DataTranslator> {
        let direction = if *src == self.linear && *dest == self.coded {
            Direction::Compress
        } else if *src == self.coded && *dest == self.linear {
            Direction::Expand
        } else {
            return None;
        };
        Some(DataTranslator::new(
            src.clone(),
            dest.clone(),
            Compander {
                law: self.law,
                direction,
            },
        ))
    }
}

/// Install both G.711 factories
pub fn install(registry: &TranslatorRegistry, formats: &FormatRegistry) -> Result<()> {
    tandem_codec_core::init();
    for law in [Law::ALaw, Law::MuLaw] {
        registry.install(Arc::new(G711Factory::new(formats, law)?));
    }
    Ok(())
}
