//! Pipeline engine: runs a fixed, priority-ordered list of actions over a batch.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::actions;
use crate::config::Config;
use crate::context::{EventContext, Outcome};
use crate::error::{ActionError, PipelineError};
use crate::storage::{EventRepository, StackRepository};
use crate::types::Event;

/// A fault reported by an action for one context or a group of contexts.
///
/// `contexts` are positions in the slice the action was handed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
  pub contexts: Vec<usize>,
  pub error: ActionError,
}

impl Fault {
  pub fn new(contexts: Vec<usize>, error: impl Into<ActionError>) -> Self {
    Self {
      contexts,
      error: error.into(),
    }
  }
}

/// One step of the pipeline.
///
/// The engine calls `process_batch` with every live context, then `process` on
/// each context the batch pass neither handled nor faulted. An action that does
/// all its work per batch leaves `process` as the default no-op.
pub trait EventAction: Send + Sync {
  fn name(&self) -> &'static str;

  /// Lower runs first.
  fn priority(&self) -> u32;

  /// When true a fault skips only the affected contexts; when false it aborts
  /// the rest of the pipeline for the whole batch.
  fn continue_on_error(&self) -> bool {
    false
  }

  fn process_batch(&self, _contexts: &mut [&mut EventContext]) -> Vec<Fault> {
    Vec::new()
  }

  fn process(&self, _ctx: &mut EventContext) -> Result<(), ActionError> {
    Ok(())
  }
}

/// Per-batch outcome counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
  pub processed: usize,
  pub failed: usize,
  pub discarded: usize,
  /// Name of the action that aborted the batch, if any.
  pub aborted_by: Option<&'static str>,
}

pub struct Pipeline {
  actions: Vec<Box<dyn EventAction>>,
}

impl Pipeline {
  /// Build a pipeline from an explicit action list, ordered by ascending
  /// priority (registration order breaks ties).
  pub fn new(mut actions: Vec<Box<dyn EventAction>>) -> Self {
    actions.sort_by_key(|a| a.priority());
    Self { actions }
  }

  /// The standard ingestion pipeline over the given storage collaborators.
  pub fn with_storage(
    events: Arc<dyn EventRepository>,
    stacks: Arc<dyn StackRepository>,
    config: Config,
  ) -> Self {
    Self::new(actions::default_actions(events, stacks, &config))
  }

  pub fn action_names(&self) -> Vec<&'static str> {
    self.actions.iter().map(|a| a.name()).collect()
  }

  /// Run a single event as a one-element batch.
  pub fn run(&self, event: Event) -> EventContext {
    let mut ctx = EventContext::new(event);
    self.run_context(&mut ctx);
    ctx
  }

  pub fn run_context(&self, ctx: &mut EventContext) -> BatchSummary {
    self.run_batch(std::slice::from_mut(ctx))
  }

  /// Run every action over the batch. Contexts are updated in place; the
  /// returned summary mirrors their final outcomes.
  pub fn run_batch(&self, contexts: &mut [EventContext]) -> BatchSummary {
    let mut aborted_by = None;

    for action in &self.actions {
      let mut live: Vec<&mut EventContext> = contexts.iter_mut().filter(|c| c.is_live()).collect();
      if live.is_empty() {
        break;
      }
      for ctx in live.iter_mut() {
        ctx.reset_handled();
      }

      let continue_on_error = action.continue_on_error();
      let mut faults = action.process_batch(&mut live);

      if faults.is_empty() || continue_on_error {
        let skipped: HashSet<usize> = faults.iter().flat_map(|f| f.contexts.iter().copied()).collect();
        for (i, ctx) in live.iter_mut().enumerate() {
          if ctx.is_handled() || !ctx.is_live() || skipped.contains(&i) {
            continue;
          }
          if let Err(error) = action.process(ctx) {
            faults.push(Fault::new(vec![i], error));
            if !continue_on_error {
              break;
            }
          }
        }
      }

      if let Some(first) = faults.first() {
        if continue_on_error {
          for fault in &faults {
            warn!(
              action = action.name(),
              contexts = fault.contexts.len(),
              error = %fault.error,
              "action failed; skipping affected contexts"
            );
          }
        } else {
          error!(
            action = action.name(),
            error = %first.error,
            "action failed; aborting batch"
          );
          let failure = PipelineError::Aborted {
            action: action.name(),
            source: first.error.clone(),
          };
          for ctx in live.iter_mut().filter(|c| !c.is_processed) {
            ctx.fail(failure.clone());
          }
          aborted_by = Some(action.name());
          break;
        }
      }

      let discarded = live.iter().filter(|c| c.is_discarded).count();
      if discarded > 0 {
        debug!(action = action.name(), discarded, "dropping discarded contexts");
      }
    }

    let mut summary = BatchSummary {
      aborted_by,
      ..BatchSummary::default()
    };
    for ctx in contexts.iter() {
      match ctx.outcome() {
        Outcome::Processed => summary.processed += 1,
        Outcome::Failed => summary.failed += 1,
        Outcome::Discarded => summary.discarded += 1,
      }
    }
    debug!(
      processed = summary.processed,
      failed = summary.failed,
      discarded = summary.discarded,
      "batch complete"
    );
    summary
  }
}
