use std::sync::Arc;

use tracing::{debug, info, trace};

use super::{group_by, priority};
use crate::context::EventContext;
use crate::error::ActionError;
use crate::pipeline::{EventAction, Fault};
use crate::storage::{EventRepository, StackRepository};
use crate::types::Stack;

/// Reopens fixed stacks that see a new occurrence after their fix date.
///
/// Only the first context of a stack group (batch order) is flagged as the
/// regression, and only when this batch is the one that flipped the stack;
/// every context in the group has its event's fixed flag cleared.
pub struct CheckForRegressionAction {
  stacks: Arc<dyn StackRepository>,
  events: Arc<dyn EventRepository>,
}

impl CheckForRegressionAction {
  pub fn new(stacks: Arc<dyn StackRepository>, events: Arc<dyn EventRepository>) -> Self {
    Self { stacks, events }
  }

  /// Stored events are cleared before the flag flips, so a failure here
  /// leaves the stack eligible for the next attempt.
  fn regress(&self, ctx: &EventContext, stack: &Stack) -> Result<(Stack, bool), ActionError> {
    let cleared = self
      .events
      .mark_not_fixed_by_stack(&ctx.event.organization_id, &stack.id)?;
    trace!(stack_id = %stack.id, cleared, "cleared fixed flag on stored events");
    let (updated, changed) = self.stacks.mark_regressed(&stack.id)?;
    self
      .stacks
      .invalidate_cache(&ctx.event.project_id, &stack.id, &stack.signature_hash);
    Ok((updated, changed))
  }
}

impl EventAction for CheckForRegressionAction {
  fn name(&self) -> &'static str {
    "check_for_regression"
  }

  fn priority(&self) -> u32 {
    priority::CHECK_REGRESSION
  }

  fn continue_on_error(&self) -> bool {
    true
  }

  fn process_batch(&self, contexts: &mut [&mut EventContext]) -> Vec<Fault> {
    let groups = group_by(contexts, |ctx| {
      let stack = ctx.stack.as_ref()?;
      (!stack.is_regressed && stack.fixed_before(ctx.event.date)).then(|| stack.id.clone())
    });

    let mut faults = Vec::new();
    for (stack_id, members) in groups {
      let first = members[0];
      let Some(stack) = contexts[first].stack.clone() else {
        continue;
      };

      info!(%stack_id, contexts = members.len(), "marking stack and events as regressed");
      match self.regress(&contexts[first], &stack) {
        Ok((updated, changed)) => {
          if !changed {
            debug!(%stack_id, "stack already regressed by a concurrent batch");
          }
          for (n, &i) in members.iter().enumerate() {
            let ctx = &mut contexts[i];
            ctx.event.is_fixed = false;
            ctx.is_regression = changed && n == 0;
            ctx.stack = Some(updated.clone());
            ctx.mark_handled();
          }
        }
        Err(error) => faults.push(Fault::new(members, error)),
      }
    }

    faults
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::storage::{InMemoryEventRepository, InMemoryStackRepository};
  use crate::types::{Event, Fingerprint};
  use chrono::{Duration, Utc};

  fn fixed_stack(stacks: &InMemoryStackRepository) -> Stack {
    let now = Utc::now();
    let stack = Stack {
      id: "stack-1".into(),
      organization_id: "org".into(),
      project_id: "proj".into(),
      signature_hash: Fingerprint("abc".into()),
      title: "TypeError".into(),
      stack_type: "error".into(),
      tags: Default::default(),
      date_fixed: Some(now - Duration::hours(1)),
      is_regressed: false,
      first_occurrence: now - Duration::days(1),
      last_occurrence: now - Duration::days(1),
      total_occurrences: 1,
    };
    stacks.create_if_absent(stack.clone()).unwrap();
    stack
  }

  fn resolved(stack: &Stack) -> EventContext {
    let mut event = Event::new("org", "proj", "error", Utc::now());
    event.stack_id = Some(stack.id.clone());
    event.is_fixed = true;
    let mut ctx = EventContext::new(event);
    ctx.stack = Some(stack.clone());
    ctx
  }

  #[test]
  fn racing_batches_raise_one_regression() {
    let stacks = Arc::new(InMemoryStackRepository::new());
    let action = CheckForRegressionAction::new(stacks.clone(), Arc::new(InMemoryEventRepository::new()));
    let snapshot = fixed_stack(&stacks);

    // Both batches resolved the stack before either one regressed it.
    let mut first = resolved(&snapshot);
    let mut second = resolved(&snapshot);
    assert!(action.process_batch(&mut [&mut first]).is_empty());
    assert!(action.process_batch(&mut [&mut second]).is_empty());

    assert!(first.is_regression);
    assert!(!second.is_regression);
    assert!(!second.event.is_fixed);
    assert!(stacks.get_by_id(&snapshot.id).unwrap().unwrap().is_regressed);
  }
}
