//! Job abstraction plus the single-pass and continuous drivers.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::JobError;

/// What one pass of a job accomplished.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobResult {
  pub processed: usize,
  pub failed: usize,
}

impl JobResult {
  pub fn new(processed: usize, failed: usize) -> Self {
    Self { processed, failed }
  }
}

#[async_trait]
pub trait Job: Send + Sync {
  fn name(&self) -> &'static str;

  /// Run one pass. Implementations should return early once `token` is cancelled.
  async fn run(&self, token: &CancellationToken) -> Result<JobResult, JobError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopOptions {
  pub delay: Duration,
  /// Stop after this many passes. `None` runs until cancelled.
  pub iteration_limit: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopReport {
  pub iterations: u64,
  pub failures: u64,
  pub processed: usize,
  pub failed_items: usize,
}

pub async fn run_once(job: &dyn Job, token: &CancellationToken) -> Result<JobResult, JobError> {
  debug!(job = job.name(), "running job pass");
  let result = job.run(token).await?;
  info!(
    job = job.name(),
    processed = result.processed,
    failed = result.failed,
    "job pass finished"
  );
  Ok(result)
}

/// Repeat passes until cancelled or the iteration limit is reached.
///
/// A failing pass is logged and counted; it does not end the loop.
pub async fn run_continuous(
  job: &dyn Job,
  options: LoopOptions,
  token: &CancellationToken,
) -> LoopReport {
  let mut report = LoopReport::default();

  loop {
    if token.is_cancelled() {
      break;
    }
    if options.iteration_limit.is_some_and(|limit| report.iterations >= limit) {
      break;
    }

    report.iterations += 1;
    match job.run(token).await {
      Ok(result) => {
        debug!(
          job = job.name(),
          iteration = report.iterations,
          processed = result.processed,
          "job pass finished"
        );
        report.processed += result.processed;
        report.failed_items += result.failed;
      }
      Err(e) => {
        report.failures += 1;
        error!(job = job.name(), iteration = report.iterations, error = %e, "job pass failed");
      }
    }

    if options.delay.is_zero() {
      tokio::task::yield_now().await;
      continue;
    }
    tokio::select! {
      _ = token.cancelled() => break,
      _ = tokio::time::sleep(options.delay) => {}
    }
  }

  info!(
    job = job.name(),
    iterations = report.iterations,
    failures = report.failures,
    processed = report.processed,
    "job loop stopped"
  );
  report
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicU64, Ordering};
  use std::sync::Arc;

  struct CountingJob {
    runs: AtomicU64,
    fail_every: Option<u64>,
    cancel_after: Option<(u64, CancellationToken)>,
  }

  impl CountingJob {
    fn new() -> Self {
      Self {
        runs: AtomicU64::new(0),
        fail_every: None,
        cancel_after: None,
      }
    }
  }

  #[async_trait]
  impl Job for CountingJob {
    fn name(&self) -> &'static str {
      "counting"
    }

    async fn run(&self, _token: &CancellationToken) -> Result<JobResult, JobError> {
      let n = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
      if let Some((limit, token)) = &self.cancel_after {
        if n >= *limit {
          token.cancel();
        }
      }
      if self.fail_every.is_some_and(|every| n % every == 0) {
        return Err(JobError::message(format!("pass {n} failed")));
      }
      Ok(JobResult::new(1, 0))
    }
  }

  #[tokio::test]
  async fn run_once_runs_a_single_pass() {
    let job = CountingJob::new();
    let result = run_once(&job, &CancellationToken::new()).await.unwrap();
    assert_eq!(result.processed, 1);
    assert_eq!(job.runs.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn run_once_propagates_failure() {
    let job = CountingJob {
      fail_every: Some(1),
      ..CountingJob::new()
    };
    assert!(run_once(&job, &CancellationToken::new()).await.is_err());
  }

  #[tokio::test(start_paused = true)]
  async fn iteration_limit_bounds_the_loop() {
    let job = CountingJob::new();
    let options = LoopOptions {
      delay: Duration::from_millis(250),
      iteration_limit: Some(4),
    };
    let started = tokio::time::Instant::now();
    let report = run_continuous(&job, options, &CancellationToken::new()).await;

    assert_eq!(report.iterations, 4);
    assert_eq!(report.processed, 4);
    assert!(started.elapsed() >= Duration::from_millis(750));
  }

  #[tokio::test(start_paused = true)]
  async fn failed_passes_do_not_stop_the_loop() {
    let job = CountingJob {
      fail_every: Some(2),
      ..CountingJob::new()
    };
    let options = LoopOptions {
      delay: Duration::ZERO,
      iteration_limit: Some(6),
    };
    let report = run_continuous(&job, options, &CancellationToken::new()).await;
    assert_eq!(report.iterations, 6);
    assert_eq!(report.failures, 3);
    assert_eq!(report.processed, 3);
  }

  #[tokio::test(start_paused = true)]
  async fn cancellation_interrupts_the_delay() {
    let token = CancellationToken::new();
    let job = Arc::new(CountingJob::new());
    let handle = {
      let job = Arc::clone(&job);
      let token = token.clone();
      tokio::spawn(async move {
        let options = LoopOptions {
          delay: Duration::from_secs(3600),
          iteration_limit: None,
        };
        run_continuous(job.as_ref(), options, &token).await
      })
    };

    tokio::time::sleep(Duration::from_secs(1)).await;
    token.cancel();
    let report = handle.await.unwrap();
    assert_eq!(report.iterations, 1);
  }

  #[tokio::test]
  async fn cancellation_inside_a_pass_ends_the_loop() {
    let token = CancellationToken::new();
    let job = CountingJob {
      cancel_after: Some((3, token.clone())),
      ..CountingJob::new()
    };
    let report = run_continuous(&job, LoopOptions::default(), &token).await;
    assert_eq!(report.iterations, 3);
  }

  #[tokio::test]
  async fn cancelled_token_skips_every_pass() {
    let token = CancellationToken::new();
    token.cancel();
    let job = CountingJob::new();
    let report = run_continuous(&job, LoopOptions::default(), &token).await;
    assert_eq!(report.iterations, 0);
  }
}
