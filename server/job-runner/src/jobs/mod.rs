mod event_ingest;
mod queue_seed;

pub use event_ingest::{EventBatch, EventIngestJob};
pub use queue_seed::QueueSeedJob;
