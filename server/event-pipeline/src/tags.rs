//! Ordered tag set with case-insensitive membership.

use serde::{Deserialize, Serialize};

/// Tags in first-seen order. Two tags that differ only by case are the same tag;
/// the casing of the first one inserted is the one that is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagSet(Vec<String>);

impl TagSet {
  pub fn new() -> Self {
    Self::default()
  }

  /// Insert a tag unless an equal (ignoring case) tag is already present.
  /// Blank tags are ignored. Returns true when the set changed.
  pub fn insert(&mut self, tag: &str) -> bool {
    let tag = tag.trim();
    if tag.is_empty() || self.contains(tag) {
      return false;
    }
    self.0.push(tag.to_string());
    true
  }

  pub fn contains(&self, tag: &str) -> bool {
    let needle = tag.trim().to_lowercase();
    self.0.iter().any(|t| t.to_lowercase() == needle)
  }

  /// Merge `other` into this set, stopping once `limit` tags are held.
  /// Returns true when at least one tag was added.
  pub fn merge(&mut self, other: &TagSet, limit: usize) -> bool {
    let mut changed = false;
    for tag in other.iter() {
      if self.0.len() >= limit {
        break;
      }
      changed |= self.insert(tag);
    }
    changed
  }

  pub fn iter(&self) -> impl Iterator<Item = &str> {
    self.0.iter().map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

impl<S: AsRef<str>> FromIterator<S> for TagSet {
  fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
    let mut set = TagSet::new();
    for tag in iter {
      set.insert(tag.as_ref());
    }
    set
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn case_only_duplicates_are_ignored() {
    let mut tags = TagSet::new();
    assert!(tags.insert("Tag One"));
    assert!(tags.insert("Tag Two"));
    assert!(!tags.insert("tag two"));
    assert_eq!(tags.iter().collect::<Vec<_>>(), vec!["Tag One", "Tag Two"]);
  }

  #[test]
  fn first_seen_casing_wins() {
    let tags: TagSet = ["Beta", "BETA", "beta"].into_iter().collect();
    assert_eq!(tags.len(), 1);
    assert!(tags.contains("bEtA"));
    assert_eq!(tags.iter().next(), Some("Beta"));
  }

  #[test]
  fn merge_respects_limit() {
    let mut tags: TagSet = ["a", "b"].into_iter().collect();
    let incoming: TagSet = ["c", "d", "e"].into_iter().collect();
    assert!(tags.merge(&incoming, 3));
    assert_eq!(tags.len(), 3);
    assert!(!tags.merge(&incoming, 3));
  }

  #[test]
  fn blank_tags_are_skipped() {
    let mut tags = TagSet::new();
    assert!(!tags.insert("   "));
    assert!(tags.is_empty());
  }
}
