//! Data nodes: the producer / consumer graph media flows through
//!
//! A [`DataSource`] fans buffers out to the [`DataConsumer`]s attached to
//! it. A consumer has two upstream slots, regular and override, each
//! pointing back at the source that feeds it. Sources own their consumers;
//! consumers only keep weak references to their sources.
//!
//! Lock order: a source's lock is always taken before a consumer's. No
//! consumer lock is held while a consumer handler runs.

pub mod clock;
mod consumer;
mod source;
mod threaded;

pub use consumer::{ConsumerHandler, DataConsumer};
pub use source::{DataSource, SourceHandler};
pub use threaded::{SourceWorker, ThreadedSource};

use crate::format::Format;
use crate::params::NamedParams;

/// Wall-clock gap after which a consumer folds elapsed time into its
/// timestamp delta when it is resynchronized
pub const GAP_THRESHOLD_US: u64 = 25_000;

/// Buffer flag: discontinuity, the stream restarted
pub const FLAG_MARK: u32 = 0x0001;
/// Buffer flag: payload is silence or comfort noise
pub const FLAG_SILENCE: u32 = 0x0002;

/// Behaviour shared by sources and consumers
pub trait DataNode {
    /// Current media format
    fn format(&self) -> Format;

    /// Timestamp of the last buffer handled, in samples
    fn timestamp(&self) -> u64;

    /// Try to switch to another format.
    ///
    /// Returns true when the node now uses `format`.
    fn set_format(&self, format: &Format) -> bool;

    /// Offer a control request to the node
    fn control(&self, params: &mut NamedParams) -> bool;
}
