//! Stable fingerprint computation for grouping events into stacks.

use crate::types::{Event, Fingerprint};

/// Compute a stable fingerprint from an event.
///
/// Key components, first match wins:
/// - explicit signature data (sorted key/value pairs)
/// - error type + top N normalized frames
/// - event type + source + message
///
/// The project is not part of the hash; stacks are looked up per project.
/// Uses blake3 for a fast, deterministic hash.
pub fn compute(event: &Event, max_frames: usize) -> Fingerprint {
  let mut hasher = blake3::Hasher::new();

  if !event.signature.is_empty() {
    hasher.update(b"signature");
    for (key, value) in &event.signature {
      hasher.update(b"|");
      hasher.update(key.as_bytes());
      hasher.update(b"=");
      hasher.update(value.as_bytes());
    }
  } else if let Some(error) = &event.error {
    hasher.update(b"error|");
    hasher.update(error.error_type.as_bytes());
    for frame in error.stacktrace.iter().take(max_frames) {
      hasher.update(b"|");
      hasher.update(frame.file.as_bytes());
      hasher.update(b":");
      hasher.update(frame.function.as_bytes());
    }
  } else {
    hasher.update(event.event_type.as_bytes());
    hasher.update(b"|");
    hasher.update(event.source.as_deref().unwrap_or_default().as_bytes());
    hasher.update(b"|");
    hasher.update(event.message.as_deref().unwrap_or_default().as_bytes());
  }

  let hash = hasher.finalize();
  // Use first 16 bytes (32 hex chars) for a compact but collision-resistant ID.
  let hex = hash.to_hex();
  Fingerprint(hex[..32].to_string())
}
