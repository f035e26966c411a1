use std::sync::Arc;

use tracing::trace;

use super::priority;
use crate::context::EventContext;
use crate::error::ActionError;
use crate::pipeline::EventAction;
use crate::storage::EventRepository;

/// Persists the event. A context is processed only once this succeeds; a
/// failed save leaves that one context unprocessed and the rest of the batch
/// carries on.
pub struct SaveEventAction {
  events: Arc<dyn EventRepository>,
}

impl SaveEventAction {
  pub fn new(events: Arc<dyn EventRepository>) -> Self {
    Self { events }
  }
}

impl EventAction for SaveEventAction {
  fn name(&self) -> &'static str {
    "save_event"
  }

  fn priority(&self) -> u32 {
    priority::SAVE_EVENT
  }

  fn continue_on_error(&self) -> bool {
    true
  }

  fn process(&self, ctx: &mut EventContext) -> Result<(), ActionError> {
    ctx.event.stack_id = ctx.stack_id().map(str::to_string);
    self.events.save(&mut ctx.event)?;
    ctx.is_processed = true;
    trace!(event_id = ctx.event.id.as_deref().unwrap_or_default(), "event saved");
    Ok(())
  }
}
