//! In-process storage backend.
//!
//! Every trait call takes the table lock once, so each call is atomic. The
//! stack lookup cache is filled and invalidated while the table lock is held;
//! a reader can never put a copy older than the last write back into it.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use uuid::Uuid;

use super::{EventRepository, StackInsert, StackRepository};
use crate::error::StorageError;
use crate::tags::TagSet;
use crate::types::{Event, Fingerprint, Stack};

type SignatureKey = (String, Fingerprint);

#[derive(Default)]
pub struct InMemoryEventRepository {
  events: RwLock<HashMap<String, Event>>,
}

impl InMemoryEventRepository {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn count(&self) -> usize {
    self.events.read().len()
  }
}

impl EventRepository for InMemoryEventRepository {
  fn get_by_id(&self, id: &str) -> Result<Option<Event>, StorageError> {
    Ok(self.events.read().get(id).cloned())
  }

  fn save(&self, event: &mut Event) -> Result<(), StorageError> {
    let id = event
      .id
      .get_or_insert_with(|| Uuid::new_v4().simple().to_string())
      .clone();
    self.events.write().insert(id, event.clone());
    Ok(())
  }

  fn remove(&self, ids: &[String]) -> Result<usize, StorageError> {
    let mut events = self.events.write();
    Ok(ids.iter().filter(|id| events.remove(id.as_str()).is_some()).count())
  }

  fn exists_by_reference(&self, project_id: &str, reference_id: &str) -> Result<bool, StorageError> {
    Ok(self.events.read().values().any(|e| {
      e.project_id == project_id && e.reference_id.as_deref() == Some(reference_id)
    }))
  }

  fn mark_not_fixed_by_stack(&self, organization_id: &str, stack_id: &str) -> Result<usize, StorageError> {
    let mut events = self.events.write();
    let mut changed = 0;
    for event in events.values_mut() {
      if event.is_fixed
        && event.organization_id == organization_id
        && event.stack_id.as_deref() == Some(stack_id)
      {
        event.is_fixed = false;
        changed += 1;
      }
    }
    Ok(changed)
  }

  fn find_by_stack(&self, stack_id: &str) -> Result<Vec<Event>, StorageError> {
    let mut found: Vec<Event> = self
      .events
      .read()
      .values()
      .filter(|e| e.stack_id.as_deref() == Some(stack_id))
      .cloned()
      .collect();
    found.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
    Ok(found)
  }

  fn refresh(&self) -> Result<(), StorageError> {
    Ok(())
  }
}

#[derive(Default)]
struct StackTables {
  by_id: HashMap<String, Stack>,
  by_signature: HashMap<SignatureKey, String>,
}

#[derive(Default)]
pub struct InMemoryStackRepository {
  tables: RwLock<StackTables>,
  cache: Mutex<HashMap<SignatureKey, Stack>>,
}

impl InMemoryStackRepository {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn count(&self) -> usize {
    self.tables.read().by_id.len()
  }

  pub fn cached_len(&self) -> usize {
    self.cache.lock().len()
  }

  /// Apply `f` to a stored stack and drop its cache entry, under one write lock.
  fn update<F>(&self, id: &str, f: F) -> Result<Stack, StorageError>
  where
    F: FnOnce(&mut Stack),
  {
    let mut tables = self.tables.write();
    let stack = tables
      .by_id
      .get_mut(id)
      .ok_or_else(|| StorageError::not_found("stack", id))?;
    f(stack);
    let updated = stack.clone();
    self.evict(&updated.project_id, &updated.signature_hash);
    Ok(updated)
  }

  fn evict(&self, project_id: &str, hash: &Fingerprint) {
    self
      .cache
      .lock()
      .remove(&(project_id.to_string(), hash.clone()));
  }
}

impl StackRepository for InMemoryStackRepository {
  fn get_by_id(&self, id: &str) -> Result<Option<Stack>, StorageError> {
    Ok(self.tables.read().by_id.get(id).cloned())
  }

  fn get_by_signature(&self, project_id: &str, hash: &Fingerprint) -> Result<Option<Stack>, StorageError> {
    let key = (project_id.to_string(), hash.clone());
    if let Some(stack) = self.cache.lock().get(&key) {
      return Ok(Some(stack.clone()));
    }

    let tables = self.tables.read();
    let found = tables
      .by_signature
      .get(&key)
      .and_then(|id| tables.by_id.get(id))
      .cloned();
    if let Some(stack) = &found {
      self.cache.lock().insert(key, stack.clone());
    }
    Ok(found)
  }

  fn create_if_absent(&self, stack: Stack) -> Result<StackInsert, StorageError> {
    let key = (stack.project_id.clone(), stack.signature_hash.clone());
    let mut tables = self.tables.write();
    if let Some(existing) = tables.by_signature.get(&key).and_then(|id| tables.by_id.get(id)) {
      return Ok(StackInsert::Existing(existing.clone()));
    }
    if tables.by_id.contains_key(&stack.id) {
      return Err(StorageError::Conflict(format!("stack id {} already in use", stack.id)));
    }
    tables.by_signature.insert(key, stack.id.clone());
    tables.by_id.insert(stack.id.clone(), stack.clone());
    Ok(StackInsert::Created(stack))
  }

  fn save(&self, stack: &Stack) -> Result<(), StorageError> {
    let mut tables = self.tables.write();
    if let Some(previous) = tables.by_id.get(&stack.id) {
      if previous.signature_hash != stack.signature_hash || previous.project_id != stack.project_id {
        let old_key = (previous.project_id.clone(), previous.signature_hash.clone());
        tables.by_signature.remove(&old_key);
        self.evict(&old_key.0, &old_key.1);
      }
    }
    tables.by_signature.insert(
      (stack.project_id.clone(), stack.signature_hash.clone()),
      stack.id.clone(),
    );
    tables.by_id.insert(stack.id.clone(), stack.clone());
    self.evict(&stack.project_id, &stack.signature_hash);
    Ok(())
  }

  fn mark_regressed(&self, id: &str) -> Result<(Stack, bool), StorageError> {
    let mut changed = false;
    let stack = self.update(id, |stack| {
      changed = !stack.is_regressed;
      stack.is_regressed = true;
    })?;
    Ok((stack, changed))
  }

  fn record_occurrences(
    &self,
    id: &str,
    first: DateTime<Utc>,
    last: DateTime<Utc>,
    count: u64,
  ) -> Result<Stack, StorageError> {
    self.update(id, |stack| {
      stack.total_occurrences += count;
      stack.first_occurrence = stack.first_occurrence.min(first);
      stack.last_occurrence = stack.last_occurrence.max(last);
    })
  }

  fn merge_tags(&self, id: &str, tags: &TagSet, limit: usize) -> Result<Option<Stack>, StorageError> {
    let mut tables = self.tables.write();
    let stack = tables
      .by_id
      .get_mut(id)
      .ok_or_else(|| StorageError::not_found("stack", id))?;
    if !stack.tags.merge(tags, limit) {
      return Ok(None);
    }
    let updated = stack.clone();
    self.evict(&updated.project_id, &updated.signature_hash);
    Ok(Some(updated))
  }

  fn invalidate_cache(&self, project_id: &str, _stack_id: &str, hash: &Fingerprint) {
    self.evict(project_id, hash);
  }

  fn remove(&self, ids: &[String]) -> Result<usize, StorageError> {
    let mut tables = self.tables.write();
    let mut removed = 0;
    for id in ids {
      if let Some(stack) = tables.by_id.remove(id) {
        let key = (stack.project_id, stack.signature_hash);
        tables.by_signature.remove(&key);
        self.evict(&key.0, &key.1);
        removed += 1;
      }
    }
    Ok(removed)
  }

  fn refresh(&self) -> Result<(), StorageError> {
    Ok(())
  }
}
