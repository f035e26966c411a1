//! Command-line configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::job::LoopOptions;
use crate::queue::QueueOptions;

#[derive(Parser, Debug, Clone)]
#[command(name = "job-runner", version, about = "Runs a background job once or continuously")]
pub struct Args {
  /// Job type to run: event-ingest or queue-seed
  #[arg(long = "job-type", short = 't')]
  pub job_type: String,

  /// Keep running passes until shut down
  #[arg(long, short = 'c')]
  pub continuous: bool,

  /// Delay between continuous passes, in milliseconds
  #[arg(long, short = 'd', default_value_t = 0)]
  pub delay: u64,

  /// Suppress the startup header and informational logs
  #[arg(long, short = 'q')]
  pub quiet: bool,

  /// JSON-lines file of events to enqueue before processing
  #[arg(long)]
  pub input: Option<PathBuf>,

  /// Events per enqueued batch
  #[arg(long, default_value_t = 50)]
  pub batch_size: usize,

  /// Redeliveries allowed before a work item is dead-lettered
  #[arg(long, default_value_t = 5)]
  pub retries: u32,

  /// Lease length for a dequeued work item, in seconds
  #[arg(long, default_value_t = 7200)]
  pub work_item_timeout: u64,

  /// How long a pass waits on an empty queue, in milliseconds
  #[arg(long, default_value_t = 1000)]
  pub dequeue_wait: u64,

  /// Marker file whose creation or modification requests shutdown
  #[arg(long, env = "JOB_SHUTDOWN_FILE")]
  pub shutdown_file: Option<PathBuf>,

  /// Marker file poll interval, in milliseconds
  #[arg(long, default_value_t = 500)]
  pub shutdown_poll: u64,

  /// Stop a continuous run after this many passes
  #[arg(long)]
  pub iterations: Option<u64>,
}

impl Args {
  pub fn queue_options(&self) -> QueueOptions {
    QueueOptions {
      retries: self.retries,
      work_item_timeout: Duration::from_secs(self.work_item_timeout),
    }
  }

  pub fn loop_options(&self) -> LoopOptions {
    LoopOptions {
      delay: Duration::from_millis(self.delay),
      iteration_limit: self.iterations,
    }
  }

  pub fn dequeue_wait(&self) -> Duration {
    Duration::from_millis(self.dequeue_wait)
  }

  pub fn shutdown_poll(&self) -> Duration {
    Duration::from_millis(self.shutdown_poll.max(1))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults() {
    let args = Args::try_parse_from(["job-runner", "--job-type", "event-ingest"]).unwrap();
    assert!(!args.continuous);
    assert!(!args.quiet);
    assert_eq!(args.batch_size, 50);
    assert_eq!(args.loop_options().delay, Duration::ZERO);
    assert_eq!(args.queue_options(), QueueOptions::default());
  }

  #[test]
  fn short_flags() {
    let args = Args::try_parse_from(["job-runner", "-t", "queue-seed", "-c", "-d", "250", "-q"]).unwrap();
    assert_eq!(args.job_type, "queue-seed");
    assert!(args.continuous);
    assert!(args.quiet);
    assert_eq!(args.loop_options().delay, Duration::from_millis(250));
  }

  #[test]
  fn job_type_is_required() {
    assert!(Args::try_parse_from(["job-runner"]).is_err());
  }
}
