//! # Media-Core: the tandem media plane
//!
//! Moves media buffers between call legs. Producers ([`DataSource`]) fan
//! buffers out to consumers ([`DataConsumer`]); when the two sides speak
//! different formats the [`TranslatorRegistry`] inserts a chain of
//! [`DataTranslator`]s built by installed factories, composing factories
//! into multi-hop chains when no single one converts directly.
//!
//! On top of the data graph sit [`DataEndpoint`]s, the named media streams
//! of a call, and [`CallEndpoint`]s, the call legs that cross-connect
//! those streams pairwise.
//!
//! Everything shared lives in a [`MediaEngine`]:
//!
//! ```rust
//! use tandem_media_core::{CallEndpoint, MediaConfig, MediaEngine};
//!
//! let engine = MediaEngine::new(MediaConfig::default())?;
//! let alaw = engine.lookup_format("alaw").unwrap();
//! let mulaw = engine.lookup_format("mulaw").unwrap();
//!
//! // The built-in G.711 factories compose into alaw -> slin -> mulaw
//! assert_eq!(engine.translators().cost(&alaw, &mulaw), Some(2));
//!
//! let a = CallEndpoint::new(&engine, "leg-a");
//! let b = CallEndpoint::new(&engine, "leg-b");
//! assert!(a.connect(Some(&b), None, true));
//! assert_eq!(b.get_peer_id().as_deref(), Some("leg-a"));
//! a.shutdown(Some("done"));
//! # Ok::<(), tandem_media_core::MediaError>(())
//! ```

pub mod call;
pub mod config;
pub mod data;
pub mod endpoint;
pub mod engine;
pub mod error;
pub mod format;
pub mod logging;
pub mod params;
pub mod translate;

pub use call::{CallEndpoint, CallHooks};
pub use config::MediaConfig;
pub use data::{ConsumerHandler, DataConsumer, DataNode, DataSource, SourceHandler, ThreadedSource};
pub use endpoint::{DataEndpoint, EndpointHooks};
pub use engine::{AlarmSink, LogAlarms, MediaEngine};
pub use error::{MediaError, Result};
pub use format::{Format, FormatInfo, FormatRegistry};
pub use params::NamedParams;
pub use translate::{
    ChainedFactory, DataTranslator, Transcoder, TranslatorCaps, TranslatorFactory, TranslatorRegistry,
};

/// Version information for the media core
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Commonly used items
pub mod prelude {
    pub use crate::call::{CallEndpoint, CallHooks};
    pub use crate::data::{ConsumerHandler, DataConsumer, DataNode, DataSource};
    pub use crate::endpoint::DataEndpoint;
    pub use crate::engine::MediaEngine;
    pub use crate::format::Format;
    pub use crate::params::NamedParams;
    pub use crate::translate::{DataTranslator, TranslatorFactory};
}
