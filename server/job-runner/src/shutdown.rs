//! Cooperative shutdown sources. Each one cancels the shared token.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Cancel `token` on Ctrl-C, or SIGTERM on unix.
pub fn spawn_signal_handler(token: CancellationToken) -> JoinHandle<()> {
  tokio::spawn(async move {
    tokio::select! {
      _ = token.cancelled() => return,
      _ = wait_for_signal() => {}
    }
    info!("shutdown signal received; finishing current work");
    token.cancel();
  })
}

#[cfg(unix)]
async fn wait_for_signal() {
  use tokio::signal::unix::{signal, SignalKind};

  match signal(SignalKind::terminate()) {
    Ok(mut term) => {
      tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = term.recv() => {}
      }
    }
    Err(e) => {
      warn!(error = %e, "unable to install SIGTERM handler; listening for Ctrl-C only");
      let _ = tokio::signal::ctrl_c().await;
    }
  }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
  let _ = tokio::signal::ctrl_c().await;
}

/// Cancel `token` once the marker file appears or its mtime changes.
pub fn spawn_marker_watch(
  path: PathBuf,
  poll: Duration,
  token: CancellationToken,
) -> JoinHandle<()> {
  tokio::spawn(async move { watch_marker(&path, poll, &token).await })
}

pub async fn watch_marker(path: &Path, poll: Duration, token: &CancellationToken) {
  let baseline = marker_stamp(path).await;
  info!(path = %path.display(), "watching shutdown marker file");

  loop {
    tokio::select! {
      _ = token.cancelled() => return,
      _ = tokio::time::sleep(poll) => {}
    }

    let current = marker_stamp(path).await;
    if current.is_some() && current != baseline {
      info!(path = %path.display(), "shutdown marker touched; finishing current work");
      token.cancel();
      return;
    }
  }
}

/// `None` when the file does not exist. Platforms without mtime report the epoch.
async fn marker_stamp(path: &Path) -> Option<SystemTime> {
  let meta = tokio::fs::metadata(path).await.ok()?;
  Some(meta.modified().unwrap_or(SystemTime::UNIX_EPOCH))
}
