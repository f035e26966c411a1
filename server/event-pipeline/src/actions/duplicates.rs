use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use super::priority;
use crate::context::EventContext;
use crate::pipeline::{EventAction, Fault};
use crate::storage::EventRepository;

/// Discards events whose client reference id was already seen, either in
/// storage or earlier in the same batch.
pub struct SuppressDuplicatesAction {
  events: Arc<dyn EventRepository>,
}

impl SuppressDuplicatesAction {
  pub fn new(events: Arc<dyn EventRepository>) -> Self {
    Self { events }
  }
}

impl EventAction for SuppressDuplicatesAction {
  fn name(&self) -> &'static str {
    "suppress_duplicates"
  }

  fn priority(&self) -> u32 {
    priority::SUPPRESS_DUPLICATES
  }

  fn continue_on_error(&self) -> bool {
    true
  }

  fn process_batch(&self, contexts: &mut [&mut EventContext]) -> Vec<Fault> {
    let mut faults = Vec::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();

    for (i, ctx) in contexts.iter_mut().enumerate() {
      ctx.mark_handled();
      let Some(reference_id) = ctx.event.reference_id.clone() else {
        continue;
      };
      let project_id = ctx.event.project_id.clone();

      if !seen.insert((project_id.clone(), reference_id.clone())) {
        debug!(%reference_id, "duplicate reference within batch");
        ctx.discard();
        continue;
      }

      match self.events.exists_by_reference(&project_id, &reference_id) {
        Ok(true) => {
          debug!(%reference_id, "reference already stored");
          ctx.discard();
        }
        Ok(false) => {}
        Err(e) => faults.push(Fault::new(vec![i], e)),
      }
    }

    faults
  }
}
