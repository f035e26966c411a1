use chrono::Utc;

use super::priority;
use crate::context::EventContext;
use crate::error::ActionError;
use crate::normalize;
use crate::pipeline::EventAction;

/// Validates identifiers, clamps future dates and canonicalizes frames.
pub struct NormalizeEventAction;

impl EventAction for NormalizeEventAction {
  fn name(&self) -> &'static str {
    "normalize_event"
  }

  fn priority(&self) -> u32 {
    priority::NORMALIZE
  }

  fn process(&self, ctx: &mut EventContext) -> Result<(), ActionError> {
    normalize::normalize(&mut ctx.event, Utc::now())
  }
}
