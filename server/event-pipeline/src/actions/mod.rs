//! The standard ingestion actions, in execution order.

mod assign_stack;
mod duplicates;
mod index;
mod normalize;
mod regression;
mod save;
mod stats;
mod tags;

pub use assign_stack::AssignToStackAction;
pub use duplicates::SuppressDuplicatesAction;
pub use index::IndexExtendedDataAction;
pub use normalize::NormalizeEventAction;
pub use regression::CheckForRegressionAction;
pub use save::SaveEventAction;
pub use stats::UpdateStackStatsAction;
pub use tags::SyncStackTagsAction;

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use crate::config::Config;
use crate::context::EventContext;
use crate::pipeline::EventAction;
use crate::storage::{EventRepository, StackRepository};

pub mod priority {
  pub const NORMALIZE: u32 = 0;
  pub const SUPPRESS_DUPLICATES: u32 = 1;
  pub const INDEX_EXTENDED_DATA: u32 = 5;
  pub const ASSIGN_TO_STACK: u32 = 10;
  pub const CHECK_REGRESSION: u32 = 30;
  pub const SYNC_TAGS: u32 = 40;
  pub const SAVE_EVENT: u32 = 50;
  /// After persistence, so only stored events are counted.
  pub const UPDATE_STATS: u32 = 60;
}

pub fn default_actions(
  events: Arc<dyn EventRepository>,
  stacks: Arc<dyn StackRepository>,
  config: &Config,
) -> Vec<Box<dyn EventAction>> {
  vec![
    Box::new(NormalizeEventAction),
    Box::new(SuppressDuplicatesAction::new(Arc::clone(&events))),
    Box::new(IndexExtendedDataAction),
    Box::new(AssignToStackAction::new(Arc::clone(&stacks), config.clone())),
    Box::new(CheckForRegressionAction::new(Arc::clone(&stacks), Arc::clone(&events))),
    Box::new(SyncStackTagsAction::new(Arc::clone(&stacks), config.max_tags_per_stack)),
    Box::new(SaveEventAction::new(events)),
    Box::new(UpdateStackStatsAction::new(stacks)),
  ]
}

/// Group context positions by key, keeping first-appearance order for groups
/// and batch order within each group. Contexts with no key are left out.
pub(crate) fn group_by<K, F>(contexts: &[&mut EventContext], key: F) -> Vec<(K, Vec<usize>)>
where
  K: Eq + Hash + Clone,
  F: Fn(&EventContext) -> Option<K>,
{
  let mut positions: HashMap<K, usize> = HashMap::new();
  let mut groups: Vec<(K, Vec<usize>)> = Vec::new();
  for (i, ctx) in contexts.iter().enumerate() {
    let Some(k) = key(&**ctx) else {
      continue;
    };
    match positions.get(&k) {
      Some(&g) => groups[g].1.push(i),
      None => {
        positions.insert(k.clone(), groups.len());
        groups.push((k, vec![i]));
      }
    }
  }
  groups
}

/// Group live contexts by the id of their resolved stack.
pub(crate) fn group_by_stack(contexts: &[&mut EventContext]) -> Vec<(String, Vec<usize>)> {
  group_by(contexts, |ctx| ctx.stack_id().map(str::to_string))
}
