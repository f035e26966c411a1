pub mod config;
pub mod error;
pub mod job;
pub mod jobs;
pub mod queue;
pub mod registry;
pub mod runner;
pub mod shutdown;

pub use config::Args;
pub use error::{JobError, QueueError, RunnerError};
pub use job::{run_continuous, run_once, Job, JobResult, LoopOptions, LoopReport};
pub use queue::{InMemoryQueue, Queue, QueueOptions, QueueStats, WorkItem};
pub use runner::{execute, RunReport};
