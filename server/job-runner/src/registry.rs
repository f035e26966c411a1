//! Startup job resolution by name.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use event_pipeline::Pipeline;

use crate::error::RunnerError;
use crate::job::Job;
use crate::jobs::{EventBatch, EventIngestJob, QueueSeedJob};
use crate::queue::Queue;

pub const JOB_TYPES: [&str; 2] = [EventIngestJob::NAME, QueueSeedJob::NAME];

/// Everything a job may be built from.
#[derive(Clone)]
pub struct JobDeps {
  pub queue: Arc<dyn Queue<EventBatch>>,
  pub pipeline: Arc<Pipeline>,
  pub input: Option<PathBuf>,
  pub batch_size: usize,
  pub dequeue_wait: Duration,
}

/// Names match case-insensitively; `_` and `-` are interchangeable.
pub fn resolve(name: &str, deps: &JobDeps) -> Result<Box<dyn Job>, RunnerError> {
  let key = name.trim().to_ascii_lowercase().replace('_', "-");
  match key.as_str() {
    EventIngestJob::NAME => Ok(Box::new(EventIngestJob::new(
      Arc::clone(&deps.queue),
      Arc::clone(&deps.pipeline),
      deps.dequeue_wait,
    ))),
    QueueSeedJob::NAME => {
      let input = deps
        .input
        .clone()
        .ok_or(RunnerError::MissingInput(QueueSeedJob::NAME))?;
      Ok(Box::new(QueueSeedJob::new(
        Arc::clone(&deps.queue),
        input,
        deps.batch_size,
      )))
    }
    _ => Err(RunnerError::UnknownJob(name.to_string())),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::queue::InMemoryQueue;
  use event_pipeline::{Config, InMemoryEventRepository, InMemoryStackRepository};

  fn deps(input: Option<PathBuf>) -> JobDeps {
    JobDeps {
      queue: Arc::new(InMemoryQueue::default()),
      pipeline: Arc::new(Pipeline::with_storage(
        Arc::new(InMemoryEventRepository::new()),
        Arc::new(InMemoryStackRepository::new()),
        Config::default(),
      )),
      input,
      batch_size: 10,
      dequeue_wait: Duration::ZERO,
    }
  }

  #[test]
  fn resolves_known_names() {
    let d = deps(Some(PathBuf::from("events.jsonl")));
    assert_eq!(resolve("event-ingest", &d).unwrap().name(), "event-ingest");
    assert_eq!(resolve(" Event_Ingest ", &d).unwrap().name(), "event-ingest");
    assert_eq!(resolve("QUEUE-SEED", &d).unwrap().name(), "queue-seed");
  }

  #[test]
  fn unknown_name_is_an_error() {
    let err = resolve("reindex", &deps(None)).err().unwrap();
    assert_eq!(
      err.to_string(),
      "unable to resolve job type \"reindex\" (known: event-ingest, queue-seed)"
    );
    assert!(matches!(err, RunnerError::UnknownJob(name) if name == "reindex"));
  }

  #[test]
  fn queue_seed_needs_input() {
    let err = resolve("queue-seed", &deps(None)).err().unwrap();
    assert!(matches!(err, RunnerError::MissingInput("queue-seed")));
  }
}
