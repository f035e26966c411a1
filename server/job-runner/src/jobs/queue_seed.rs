//! Load JSON-lines events from a file and enqueue them in batches.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use event_pipeline::Event;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::EventBatch;
use crate::error::JobError;
use crate::job::{Job, JobResult};
use crate::queue::Queue;

pub struct QueueSeedJob {
  queue: Arc<dyn Queue<EventBatch>>,
  input: PathBuf,
  batch_size: usize,
}

impl QueueSeedJob {
  pub const NAME: &'static str = "queue-seed";

  pub fn new(queue: Arc<dyn Queue<EventBatch>>, input: PathBuf, batch_size: usize) -> Self {
    Self {
      queue,
      input,
      batch_size: batch_size.max(1),
    }
  }
}

#[async_trait]
impl Job for QueueSeedJob {
  fn name(&self) -> &'static str {
    Self::NAME
  }

  /// Unparseable lines are logged, counted as failed and skipped.
  async fn run(&self, token: &CancellationToken) -> Result<JobResult, JobError> {
    let text = tokio::fs::read_to_string(&self.input).await?;

    let mut events = Vec::new();
    let mut failed = 0;
    for (n, line) in text.lines().enumerate() {
      let line = line.trim();
      if line.is_empty() {
        continue;
      }
      match serde_json::from_str::<Event>(line) {
        Ok(event) => events.push(event),
        Err(e) => {
          failed += 1;
          warn!(path = %self.input.display(), line = n + 1, error = %e, "skipping unparseable event");
        }
      }
    }

    let mut enqueued = 0;
    let mut batches = 0;
    for chunk in events.chunks(self.batch_size) {
      if token.is_cancelled() {
        break;
      }
      self
        .queue
        .enqueue(EventBatch {
          events: chunk.to_vec(),
        })
        .await?;
      enqueued += chunk.len();
      batches += 1;
    }

    info!(path = %self.input.display(), events = enqueued, batches, failed, "queue seeded");
    Ok(JobResult::new(enqueued, failed))
  }
}
