//! Event processing pipeline: ordered, fault-tolerant ingestion of error/log events.
//!
//! Each batch runs through a fixed list of actions: normalize, suppress
//! duplicates, index extended data, assign stacks by fingerprint, update stack
//! stats, detect regressions, sync stack tags, save. Storage sits behind the
//! traits in [`storage`]; coordination across concurrent batches happens only
//! through their atomic operations.

pub mod actions;
pub mod config;
pub mod context;
pub mod error;
pub mod extended_data;
pub mod fingerprint;
pub mod normalize;
pub mod pipeline;
pub mod storage;
pub mod tags;
pub mod types;

pub use config::Config;
pub use context::{EventContext, Outcome};
pub use error::{ActionError, PipelineError, StorageError};
pub use pipeline::{BatchSummary, EventAction, Fault, Pipeline};
pub use storage::{EventRepository, InMemoryEventRepository, InMemoryStackRepository, StackRepository};
pub use tags::TagSet;
pub use types::{Event, Fingerprint, IndexValue, Stack};
