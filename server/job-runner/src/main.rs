use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use job_runner::{shutdown, Args};
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
  let args = Args::parse();
  init_tracing(args.quiet);

  if !args.quiet {
    println!("Event Job Runner v{}", env!("CARGO_PKG_VERSION"));
    println!();
  }

  match run(args).await {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      error!(error = format!("{e:#}"), "job runner failed");
      ExitCode::from(1)
    }
  }
}

async fn run(args: Args) -> anyhow::Result<()> {
  let token = CancellationToken::new();
  shutdown::spawn_signal_handler(token.clone());

  job_runner::execute(&args, token)
    .await
    .with_context(|| format!("job type {}", args.job_type))?;
  Ok(())
}

fn init_tracing(quiet: bool) {
  let default = if quiet { "warn" } else { "info,job_runner=debug" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .init();
}
