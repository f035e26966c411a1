//! Structured error types for the event pipeline.

use thiserror::Error;

/// Failures reported by a storage collaborator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
  #[error("not found: {kind} {id}")]
  NotFound { kind: &'static str, id: String },

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("storage unavailable: {0}")]
  Unavailable(String),
}

impl StorageError {
  pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
    Self::NotFound {
      kind,
      id: id.into(),
    }
  }
}

/// A fault raised by one action while handling a context or a group of contexts.
///
/// Whether it skips the affected contexts or aborts the batch depends on the
/// action's `continue_on_error` flag.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ActionError {
  #[error("validation: {field}: {reason}")]
  Validation { field: String, reason: String },

  #[error("storage: {0}")]
  Storage(#[from] StorageError),

  #[error("{0}")]
  Message(String),
}

impl ActionError {
  pub fn validation(field: &str, reason: &str) -> Self {
    Self::Validation {
      field: field.to_string(),
      reason: reason.to_string(),
    }
  }

  pub fn message(msg: impl Into<String>) -> Self {
    Self::Message(msg.into())
  }
}

/// Terminal failure attached to a context when its batch was aborted.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PipelineError {
  #[error("pipeline aborted in {action}: {source}")]
  Aborted {
    action: &'static str,
    source: ActionError,
  },
}

impl PipelineError {
  pub fn action(&self) -> &'static str {
    match self {
      Self::Aborted { action, .. } => action,
    }
  }
}
