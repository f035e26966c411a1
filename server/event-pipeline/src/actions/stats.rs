use std::sync::Arc;

use super::{group_by, priority};
use crate::context::EventContext;
use crate::pipeline::{EventAction, Fault};
use crate::storage::StackRepository;

/// Folds each stack group's stored occurrences into the stack's usage counters
/// with one atomic storage update per group. Contexts whose save failed are
/// left out so a redelivery does not count them twice.
pub struct UpdateStackStatsAction {
  stacks: Arc<dyn StackRepository>,
}

impl UpdateStackStatsAction {
  pub fn new(stacks: Arc<dyn StackRepository>) -> Self {
    Self { stacks }
  }
}

impl EventAction for UpdateStackStatsAction {
  fn name(&self) -> &'static str {
    "update_stack_stats"
  }

  fn priority(&self) -> u32 {
    priority::UPDATE_STATS
  }

  fn continue_on_error(&self) -> bool {
    true
  }

  fn process_batch(&self, contexts: &mut [&mut EventContext]) -> Vec<Fault> {
    let mut faults = Vec::new();

    let groups = group_by(contexts, |ctx| {
      ctx.is_processed.then(|| ctx.stack_id().map(str::to_string)).flatten()
    });
    for (stack_id, members) in groups {
      let dates = members.iter().map(|&i| contexts[i].event.date);
      let (Some(first), Some(last)) = (dates.clone().min(), dates.max()) else {
        continue;
      };

      match self.stacks.record_occurrences(&stack_id, first, last, members.len() as u64) {
        Ok(updated) => {
          for &i in &members {
            contexts[i].stack = Some(updated.clone());
            contexts[i].mark_handled();
          }
        }
        Err(e) => faults.push(Fault::new(members, e)),
      }
    }

    faults
  }
}
