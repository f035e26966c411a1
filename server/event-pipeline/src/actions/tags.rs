use std::sync::Arc;

use tracing::trace;

use super::{group_by_stack, priority};
use crate::context::EventContext;
use crate::pipeline::{EventAction, Fault};
use crate::storage::StackRepository;
use crate::tags::TagSet;

/// Merges event tags into the stack's tag set, one storage write per stack.
pub struct SyncStackTagsAction {
  stacks: Arc<dyn StackRepository>,
  max_tags: usize,
}

impl SyncStackTagsAction {
  pub fn new(stacks: Arc<dyn StackRepository>, max_tags: usize) -> Self {
    Self { stacks, max_tags }
  }
}

impl EventAction for SyncStackTagsAction {
  fn name(&self) -> &'static str {
    "sync_stack_tags"
  }

  fn priority(&self) -> u32 {
    priority::SYNC_TAGS
  }

  fn continue_on_error(&self) -> bool {
    true
  }

  fn process_batch(&self, contexts: &mut [&mut EventContext]) -> Vec<Fault> {
    let mut faults = Vec::new();

    for (stack_id, members) in group_by_stack(contexts) {
      let mut incoming = TagSet::new();
      for &i in &members {
        for tag in contexts[i].event.tags.iter() {
          incoming.insert(tag);
        }
      }

      let first = members[0];
      let already_present = contexts[first]
        .stack
        .as_ref()
        .is_some_and(|s| incoming.iter().all(|t| s.tags.contains(t)));
      if incoming.is_empty() || already_present {
        continue;
      }

      match self.stacks.merge_tags(&stack_id, &incoming, self.max_tags) {
        Ok(Some(updated)) => {
          self
            .stacks
            .invalidate_cache(&updated.project_id, &updated.id, &updated.signature_hash);
          trace!(%stack_id, tags = updated.tags.len(), "stack tags updated");
          for &i in &members {
            contexts[i].stack = Some(updated.clone());
            contexts[i].mark_handled();
          }
        }
        Ok(None) => {}
        Err(e) => faults.push(Fault::new(members, e)),
      }
    }

    faults
  }
}
