//! Wires configuration, storage, queue and shutdown sources into one run.

use std::sync::Arc;

use event_pipeline::{Config, InMemoryEventRepository, InMemoryStackRepository, Pipeline};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::Args;
use crate::error::RunnerError;
use crate::job::{self, LoopReport};
use crate::jobs::{EventBatch, EventIngestJob, QueueSeedJob};
use crate::queue::{InMemoryQueue, Queue, QueueStats};
use crate::registry::{self, JobDeps};
use crate::shutdown;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
  pub job: &'static str,
  pub passes: LoopReport,
  pub queue: QueueStats,
}

/// Resolve the job named in `args` and run it to completion or cancellation.
///
/// A single pass propagates its error; a continuous run only counts failures.
pub async fn execute(args: &Args, token: CancellationToken) -> Result<RunReport, RunnerError> {
  let queue = Arc::new(InMemoryQueue::<EventBatch>::new(args.queue_options()));
  let pipeline = Arc::new(Pipeline::with_storage(
    Arc::new(InMemoryEventRepository::new()),
    Arc::new(InMemoryStackRepository::new()),
    Config::default(),
  ));
  debug!(actions = ?pipeline.action_names(), "event pipeline ready");
  let deps = JobDeps {
    queue: queue.clone(),
    pipeline,
    input: args.input.clone(),
    batch_size: args.batch_size,
    dequeue_wait: args.dequeue_wait(),
  };

  let job = registry::resolve(&args.job_type, &deps)?;
  info!(
    job = job.name(),
    continuous = args.continuous,
    delay_ms = args.delay,
    "starting job"
  );

  if let Some(path) = &args.shutdown_file {
    shutdown::spawn_marker_watch(path.clone(), args.shutdown_poll(), token.clone());
  }

  // Ingest runs drain what --input provides; the in-memory queue starts empty.
  if job.name() == EventIngestJob::NAME {
    if let Some(input) = &args.input {
      let seed = QueueSeedJob::new(queue.clone(), input.clone(), args.batch_size);
      job::run_once(&seed, &token).await?;
    }
  }

  let passes = if args.continuous {
    job::run_continuous(job.as_ref(), args.loop_options(), &token).await
  } else {
    let result = job::run_once(job.as_ref(), &token).await?;
    LoopReport {
      iterations: 1,
      failures: 0,
      processed: result.processed,
      failed_items: result.failed,
    }
  };

  let stats = queue.stats().await;
  info!(
    job = job.name(),
    queued = stats.queued,
    completed = stats.completed,
    dead_letters = stats.dead_letters,
    "job finished"
  );

  Ok(RunReport {
    job: job.name(),
    passes,
    queue: stats,
  })
}
