//! Drain queued event batches through the event pipeline.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use event_pipeline::{BatchSummary, Event, EventContext, Outcome, Pipeline};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::JobError;
use crate::job::{Job, JobResult};
use crate::queue::{Queue, WorkItem};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventBatch {
  pub events: Vec<Event>,
}

pub struct EventIngestJob {
  queue: Arc<dyn Queue<EventBatch>>,
  pipeline: Arc<Pipeline>,
  wait: Duration,
}

impl EventIngestJob {
  pub const NAME: &'static str = "event-ingest";

  pub fn new(queue: Arc<dyn Queue<EventBatch>>, pipeline: Arc<Pipeline>, wait: Duration) -> Self {
    Self {
      queue,
      pipeline,
      wait,
    }
  }

  /// Run one work item. Events that were not persisted go back to the queue as
  /// a smaller batch; persisted and discarded events are never redelivered.
  async fn process(&self, item: WorkItem<EventBatch>) -> Result<BatchSummary, JobError> {
    let WorkItem {
      id, value, attempts, ..
    } = item;

    let pipeline = Arc::clone(&self.pipeline);
    let (summary, retry) = tokio::task::spawn_blocking(move || {
      let mut contexts: Vec<EventContext> = value.events.iter().cloned().map(EventContext::new).collect();
      let summary = pipeline.run_batch(&mut contexts);
      let retry: Vec<Event> = value
        .events
        .into_iter()
        .zip(&contexts)
        .filter(|(_, ctx)| ctx.outcome() == Outcome::Failed)
        .map(|(event, _)| event)
        .collect();
      (summary, retry)
    })
    .await
    .map_err(|e| JobError::message(format!("pipeline task failed: {e}")))?;

    debug!(
      item = %id,
      processed = summary.processed,
      discarded = summary.discarded,
      failed = summary.failed,
      "batch processed"
    );

    if retry.is_empty() {
      self.queue.complete(&id).await?;
    } else {
      warn!(
        item = %id,
        attempts,
        events = retry.len(),
        aborted_by = summary.aborted_by.unwrap_or_default(),
        "events not persisted; returning them to the queue"
      );
      self.queue.abandon_with(&id, EventBatch { events: retry }).await?;
    }
    Ok(summary)
  }
}

#[async_trait]
impl Job for EventIngestJob {
  fn name(&self) -> &'static str {
    Self::NAME
  }

  /// Process batches until the queue stays empty for the dequeue wait.
  async fn run(&self, token: &CancellationToken) -> Result<JobResult, JobError> {
    let mut result = JobResult::default();

    while !token.is_cancelled() {
      let next = tokio::select! {
        _ = token.cancelled() => break,
        next = self.queue.dequeue(self.wait) => next?,
      };
      let Some(item) = next else {
        break;
      };

      let summary = self.process(item).await?;
      result.processed += summary.processed;
      result.failed += summary.failed;
    }
    Ok(result)
  }
}
