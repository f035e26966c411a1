//! Structured error types for the job runner.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
  /// The item is not leased, typically because its lease already expired.
  #[error("work item {0} is not in progress")]
  NotInProgress(String),

  #[error("queue unavailable: {0}")]
  Unavailable(String),
}

#[derive(Debug, Error)]
pub enum JobError {
  #[error("queue: {0}")]
  Queue(#[from] QueueError),

  #[error("io: {0}")]
  Io(#[from] std::io::Error),

  #[error("json: {0}")]
  Json(#[from] serde_json::Error),

  #[error("{0}")]
  Message(String),
}

impl JobError {
  pub fn message(msg: impl Into<String>) -> Self {
    Self::Message(msg.into())
  }
}

#[derive(Debug, Error)]
pub enum RunnerError {
  #[error("unable to resolve job type \"{0}\" (known: {known})", known = crate::registry::JOB_TYPES.join(", "))]
  UnknownJob(String),

  #[error("job type \"{0}\" requires --input")]
  MissingInput(&'static str),

  #[error("job: {0}")]
  Job(#[from] JobError),
}
