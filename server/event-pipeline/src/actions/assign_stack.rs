use std::sync::Arc;

use tracing::{debug, trace};
use uuid::Uuid;

use super::{group_by, priority};
use crate::config::Config;
use crate::context::EventContext;
use crate::error::{ActionError, StorageError};
use crate::fingerprint;
use crate::pipeline::{EventAction, Fault};
use crate::storage::{StackInsert, StackRepository};
use crate::types::{Fingerprint, Stack};

/// How a context finds its stack.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum StackKey {
  /// The event already names its stack; keyed by (project, stack id) so the
  /// ownership check covers every member of the group.
  Id(String, String),
  /// Resolve (or create) by fingerprint within the project.
  Signature(String, Fingerprint),
}

/// Resolves every context to a stack, creating at most one stack per
/// (project, fingerprint) group.
pub struct AssignToStackAction {
  stacks: Arc<dyn StackRepository>,
  config: Config,
}

impl AssignToStackAction {
  pub fn new(stacks: Arc<dyn StackRepository>, config: Config) -> Self {
    Self { stacks, config }
  }

  fn stack_by_id(&self, id: &str, project_id: &str) -> Result<Stack, ActionError> {
    let stack = self
      .stacks
      .get_by_id(id)?
      .ok_or_else(|| ActionError::from(StorageError::not_found("stack", id)))?;
    if stack.project_id != project_id {
      return Err(ActionError::validation("stack_id", "stack belongs to another project"));
    }
    Ok(stack)
  }

  /// Look the stack up, or create it from the group's first context.
  /// Returns the stack and whether this call created it.
  fn resolve_signature(
    &self,
    project_id: &str,
    hash: &Fingerprint,
    first: &EventContext,
  ) -> Result<(Stack, bool), ActionError> {
    if let Some(stack) = self.stacks.get_by_signature(project_id, hash)? {
      return Ok((stack, false));
    }

    match self.stacks.create_if_absent(self.new_stack(first, hash))? {
      StackInsert::Created(stack) => {
        debug!(stack_id = %stack.id, signature = %hash, "created stack");
        Ok((stack, true))
      }
      StackInsert::Existing(stack) => {
        debug!(stack_id = %stack.id, signature = %hash, "stack created concurrently; using stored stack");
        Ok((stack, false))
      }
    }
  }

  fn new_stack(&self, ctx: &EventContext, hash: &Fingerprint) -> Stack {
    let event = &ctx.event;
    let title = event
      .error
      .as_ref()
      .and_then(|e| e.message.clone().or_else(|| Some(e.error_type.clone())))
      .or_else(|| event.message.clone())
      .filter(|t| !t.trim().is_empty())
      .unwrap_or_else(|| event.event_type.clone());

    Stack {
      id: Uuid::new_v4().simple().to_string(),
      organization_id: event.organization_id.clone(),
      project_id: event.project_id.clone(),
      signature_hash: hash.clone(),
      title: title.chars().take(self.config.stack_title_max_len).collect(),
      stack_type: event.event_type.clone(),
      tags: Default::default(),
      date_fixed: None,
      is_regressed: false,
      first_occurrence: event.date,
      last_occurrence: event.date,
      total_occurrences: 0,
    }
  }
}

impl EventAction for AssignToStackAction {
  fn name(&self) -> &'static str {
    "assign_to_stack"
  }

  fn priority(&self) -> u32 {
    priority::ASSIGN_TO_STACK
  }

  fn process_batch(&self, contexts: &mut [&mut EventContext]) -> Vec<Fault> {
    let max_frames = self.config.fingerprint_max_frames;
    for ctx in contexts.iter_mut() {
      if ctx.event.stack_id.is_none() && ctx.signature_hash.is_none() {
        ctx.signature_hash = Some(fingerprint::compute(&ctx.event, max_frames));
      }
    }

    let groups = group_by(contexts, |ctx| match (&ctx.event.stack_id, &ctx.signature_hash) {
      (Some(id), _) => Some(StackKey::Id(ctx.event.project_id.clone(), id.clone())),
      (None, Some(hash)) => Some(StackKey::Signature(ctx.event.project_id.clone(), hash.clone())),
      (None, None) => None,
    });

    for (key, members) in groups {
      let first = members[0];
      let resolved = match &key {
        StackKey::Id(project_id, id) => self.stack_by_id(id, project_id).map(|stack| (stack, false)),
        StackKey::Signature(project_id, hash) => self.resolve_signature(project_id, hash, &contexts[first]),
      };

      let (stack, created) = match resolved {
        Ok(found) => found,
        Err(error) => return vec![Fault::new(members, error)],
      };
      trace!(stack_id = %stack.id, contexts = members.len(), created, "assigned stack");

      let is_fixed = stack.date_fixed.is_some() && !stack.is_regressed;
      for (n, &i) in members.iter().enumerate() {
        let ctx = &mut contexts[i];
        ctx.is_new = created && n == 0;
        ctx.signature_hash = Some(stack.signature_hash.clone());
        ctx.event.stack_id = Some(stack.id.clone());
        ctx.event.is_fixed = is_fixed;
        ctx.stack = Some(stack.clone());
        ctx.mark_handled();
      }
    }

    Vec::new()
  }
}
