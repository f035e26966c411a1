//! Storage collaborator boundary.
//!
//! The pipeline only talks to these traits. Backends must make every single
//! call atomic; there is no cross-call locking.

mod memory;

pub use memory::{InMemoryEventRepository, InMemoryStackRepository};

use chrono::{DateTime, Utc};

use crate::error::StorageError;
use crate::tags::TagSet;
use crate::types::{Event, Fingerprint, Stack};

/// Result of an atomic create-if-absent on the (project, fingerprint) key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackInsert {
  /// The stack passed in was stored.
  Created(Stack),
  /// Another writer got there first; this is the stored stack.
  Existing(Stack),
}

impl StackInsert {
  pub fn into_stack(self) -> Stack {
    match self {
      Self::Created(stack) | Self::Existing(stack) => stack,
    }
  }
}

pub trait EventRepository: Send + Sync {
  fn get_by_id(&self, id: &str) -> Result<Option<Event>, StorageError>;

  /// Insert or replace. Assigns an id to events that have none.
  fn save(&self, event: &mut Event) -> Result<(), StorageError>;

  /// Returns the number of events removed.
  fn remove(&self, ids: &[String]) -> Result<usize, StorageError>;

  fn exists_by_reference(&self, project_id: &str, reference_id: &str) -> Result<bool, StorageError>;

  /// Clear the fixed flag on every stored event of a stack. Returns the number changed.
  fn mark_not_fixed_by_stack(&self, organization_id: &str, stack_id: &str) -> Result<usize, StorageError>;

  fn find_by_stack(&self, stack_id: &str) -> Result<Vec<Event>, StorageError>;

  /// Make all prior writes visible to subsequent reads.
  fn refresh(&self) -> Result<(), StorageError>;
}

pub trait StackRepository: Send + Sync {
  fn get_by_id(&self, id: &str) -> Result<Option<Stack>, StorageError>;

  /// Lookup by fingerprint within a project. May be served from a cache.
  fn get_by_signature(&self, project_id: &str, hash: &Fingerprint) -> Result<Option<Stack>, StorageError>;

  fn create_if_absent(&self, stack: Stack) -> Result<StackInsert, StorageError>;

  /// Replace a stored stack wholesale.
  fn save(&self, stack: &Stack) -> Result<(), StorageError>;

  /// Compare-and-set the regressed flag. Returns the stored stack and whether
  /// this call flipped it; `false` means another writer already had.
  /// `date_fixed` is left untouched.
  fn mark_regressed(&self, id: &str) -> Result<(Stack, bool), StorageError>;

  /// Fold a group of occurrences into the usage counters.
  fn record_occurrences(
    &self,
    id: &str,
    first: DateTime<Utc>,
    last: DateTime<Utc>,
    count: u64,
  ) -> Result<Stack, StorageError>;

  /// Merge tags into the stored set. Returns the updated stack, or `None` when
  /// nothing was added.
  fn merge_tags(&self, id: &str, tags: &TagSet, limit: usize) -> Result<Option<Stack>, StorageError>;

  fn invalidate_cache(&self, project_id: &str, stack_id: &str, hash: &Fingerprint);

  fn remove(&self, ids: &[String]) -> Result<usize, StorageError>;

  fn refresh(&self) -> Result<(), StorageError>;
}
