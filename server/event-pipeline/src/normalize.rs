//! Normalize events in place before they are grouped into stacks.

use chrono::{DateTime, Utc};

use crate::error::ActionError;
use crate::types::{known_types, Event};

/// Validate required identifiers and canonicalize an event.
///
/// - Future dates are clamped to `now`.
/// - The event type is lowercased; an empty type becomes `log`.
/// - Stack frame paths are normalized for stable fingerprints.
pub fn normalize(event: &mut Event, now: DateTime<Utc>) -> Result<(), ActionError> {
  if event.organization_id.trim().is_empty() {
    return Err(ActionError::validation("organization_id", "must not be empty"));
  }
  if event.project_id.trim().is_empty() {
    return Err(ActionError::validation("project_id", "must not be empty"));
  }

  if event.date > now {
    event.date = now;
  }

  let event_type = event.event_type.trim().to_ascii_lowercase();
  event.event_type = if event_type.is_empty() {
    known_types::LOG.to_string()
  } else {
    event_type
  };

  if let Some(error) = event.error.as_mut() {
    for frame in &mut error.stacktrace {
      frame.file = normalize_path(&frame.file);
    }
  }

  Ok(())
}

/// Normalize a file path for stable comparison:
/// - backslash -> forward slash
/// - collapse repeated slashes
/// - strip leading ./
/// - lowercase
pub fn normalize_path(p: &str) -> String {
  let s = p.replace('\\', "/");
  let mut out = String::with_capacity(s.len());
  let mut prev_slash = false;
  for ch in s.chars() {
    if ch == '/' {
      if !prev_slash {
        out.push('/');
      }
      prev_slash = true;
    } else {
      prev_slash = false;
      out.push(ch);
    }
  }
  let trimmed = out.strip_prefix("./").unwrap_or(&out);
  trimmed.to_ascii_lowercase()
}
