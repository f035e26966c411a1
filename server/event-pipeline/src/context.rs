//! Per-event state carried through one pipeline run.

use crate::error::PipelineError;
use crate::types::{Event, Fingerprint, Stack};

/// Final state of a context after a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
  Processed,
  Failed,
  Discarded,
}

/// Wraps one event for the duration of a single run. Never persisted.
#[derive(Debug, Clone)]
pub struct EventContext {
  pub event: Event,
  pub stack: Option<Stack>,
  pub signature_hash: Option<Fingerprint>,
  pub is_new: bool,
  pub is_regression: bool,
  pub is_processed: bool,
  pub is_discarded: bool,
  pub error: Option<PipelineError>,
  handled: bool,
}

impl EventContext {
  pub fn new(event: Event) -> Self {
    Self {
      event,
      stack: None,
      signature_hash: None,
      is_new: false,
      is_regression: false,
      is_processed: false,
      is_discarded: false,
      error: None,
      handled: false,
    }
  }

  /// Still taking part in the run: neither discarded nor failed.
  pub fn is_live(&self) -> bool {
    !self.is_discarded && self.error.is_none()
  }

  /// Record that the current action's batch pass fully covered this context,
  /// so its per-event pass is skipped.
  pub fn mark_handled(&mut self) {
    self.handled = true;
  }

  pub fn is_handled(&self) -> bool {
    self.handled
  }

  pub(crate) fn reset_handled(&mut self) {
    self.handled = false;
  }

  pub fn discard(&mut self) {
    self.is_discarded = true;
    self.is_processed = false;
  }

  pub fn fail(&mut self, error: PipelineError) {
    self.is_processed = false;
    self.error = Some(error);
  }

  pub fn outcome(&self) -> Outcome {
    if self.is_discarded {
      Outcome::Discarded
    } else if self.is_processed && self.error.is_none() {
      Outcome::Processed
    } else {
      Outcome::Failed
    }
  }

  pub fn stack_id(&self) -> Option<&str> {
    self.stack.as_ref().map(|s| s.id.as_str())
  }
}

impl From<Event> for EventContext {
  fn from(event: Event) -> Self {
    Self::new(event)
  }
}
