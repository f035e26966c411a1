use super::priority;
use crate::context::EventContext;
use crate::error::ActionError;
use crate::extended_data;
use crate::pipeline::EventAction;

/// Rebuilds the event's search fields from its extended data.
pub struct IndexExtendedDataAction;

impl EventAction for IndexExtendedDataAction {
  fn name(&self) -> &'static str {
    "index_extended_data"
  }

  fn priority(&self) -> u32 {
    priority::INDEX_EXTENDED_DATA
  }

  fn continue_on_error(&self) -> bool {
    true
  }

  fn process(&self, ctx: &mut EventContext) -> Result<(), ActionError> {
    ctx.event.idx = extended_data::flatten(&ctx.event.data);
    Ok(())
  }
}
