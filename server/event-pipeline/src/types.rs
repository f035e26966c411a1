//! Core models: events, stacks, fingerprints and indexed field values.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::tags::TagSet;

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// Known event types. Anything else is carried through as-is.
pub mod known_types {
  pub const LOG: &str = "log";
}

/// One normalized event occurrence, as handed over by the parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
  /// Assigned by storage on first save.
  #[serde(default)]
  pub id: Option<String>,
  pub organization_id: String,
  pub project_id: String,
  #[serde(default)]
  pub stack_id: Option<String>,
  #[serde(rename = "type", default)]
  pub event_type: String,
  pub date: DateTime<Utc>,
  #[serde(default)]
  pub source: Option<String>,
  #[serde(default)]
  pub message: Option<String>,
  /// Client-supplied id used to drop resubmissions of the same event.
  #[serde(default)]
  pub reference_id: Option<String>,
  #[serde(default)]
  pub tags: TagSet,
  #[serde(default)]
  pub error: Option<ErrorInfo>,
  /// Explicit signature data. When present it alone decides the fingerprint.
  #[serde(default)]
  pub signature: BTreeMap<String, String>,
  /// Arbitrary extended data.
  #[serde(default)]
  pub data: Map<String, Value>,
  /// Flattened search fields derived from `data`.
  #[serde(default)]
  pub idx: BTreeMap<String, IndexValue>,
  #[serde(default)]
  pub is_fixed: bool,
}

impl Event {
  pub fn new(
    organization_id: impl Into<String>,
    project_id: impl Into<String>,
    event_type: impl Into<String>,
    date: DateTime<Utc>,
  ) -> Self {
    Self {
      id: None,
      organization_id: organization_id.into(),
      project_id: project_id.into(),
      stack_id: None,
      event_type: event_type.into(),
      date,
      source: None,
      message: None,
      reference_id: None,
      tags: TagSet::new(),
      error: None,
      signature: BTreeMap::new(),
      data: Map::new(),
      idx: BTreeMap::new(),
      is_fixed: false,
    }
  }

  /// Set one extended data property.
  pub fn set_property(&mut self, name: impl Into<String>, value: impl Into<Value>) {
    self.data.insert(name.into(), value.into());
  }
}

/// Error details attached to an error event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
  #[serde(rename = "type")]
  pub error_type: String,
  #[serde(default)]
  pub message: Option<String>,
  #[serde(default)]
  pub stacktrace: Vec<Frame>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Frame {
  pub file: String,
  #[serde(default)]
  pub function: String,
  #[serde(default)]
  pub line: Option<u32>,
}

// ---------------------------------------------------------------------------
// Fingerprint
// ---------------------------------------------------------------------------

/// A stable hex string identifying a unique issue group within a project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(pub String);

impl fmt::Display for Fingerprint {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

// ---------------------------------------------------------------------------
// Stack
// ---------------------------------------------------------------------------

/// Aggregate of every event in a project that shares a fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stack {
  pub id: String,
  pub organization_id: String,
  pub project_id: String,
  pub signature_hash: Fingerprint,
  pub title: String,
  #[serde(rename = "type")]
  pub stack_type: String,
  #[serde(default)]
  pub tags: TagSet,
  /// When the issue was marked fixed. Kept after a regression for history.
  #[serde(default)]
  pub date_fixed: Option<DateTime<Utc>>,
  #[serde(default)]
  pub is_regressed: bool,
  pub first_occurrence: DateTime<Utc>,
  pub last_occurrence: DateTime<Utc>,
  #[serde(default)]
  pub total_occurrences: u64,
}

impl Stack {
  /// True when the stack was marked fixed before `date`.
  pub fn fixed_before(&self, date: DateTime<Utc>) -> bool {
    matches!(self.date_fixed, Some(fixed) if fixed < date)
  }
}

// ---------------------------------------------------------------------------
// Index values
// ---------------------------------------------------------------------------

/// Typed value of one flattened search field.
///
/// Variant order matters for untagged deserialization: booleans and numbers
/// first, dates before plain strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IndexValue {
  Boolean(bool),
  Integer(i64),
  Float(f64),
  Date(DateTime<FixedOffset>),
  String(String),
}

impl IndexValue {
  /// Field-name suffix recording the logical kind of the value.
  pub fn suffix(&self) -> &'static str {
    match self {
      Self::String(_) => "s",
      Self::Boolean(_) => "b",
      Self::Integer(_) | Self::Float(_) => "n",
      Self::Date(_) => "d",
    }
  }
}
