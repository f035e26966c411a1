//! Flatten arbitrary extended data into typed search fields.
//!
//! `{"First Name": "Eric", "Address": {"State": "Texas"}, "Age": "42"}` becomes
//! `first-name-s = "Eric"`, `address.state-s = "Texas"`, `age-n = 42`.
//!
//! Field names are lowercased with runs of whitespace/punctuation collapsed to
//! `-`, nested objects join with `.`, and every name ends with a kind suffix.
//! A name segment starting with `@` is reserved and never indexed.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime};
use serde_json::{Map, Value};

use crate::types::IndexValue;

pub const RESERVED_MARKER: char = '@';
const NAME_SEPARATOR: char = '-';
const PATH_SEPARATOR: char = '.';

const NAIVE_DATE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Flatten `data` into a map of normalized field name -> typed value.
///
/// Pure and deterministic: the same input always yields the same map.
pub fn flatten(data: &Map<String, Value>) -> BTreeMap<String, IndexValue> {
  let mut out = BTreeMap::new();
  flatten_into(data, None, &mut out);
  out
}

fn flatten_into(
  map: &Map<String, Value>,
  prefix: Option<&str>,
  out: &mut BTreeMap<String, IndexValue>,
) {
  for (name, value) in map {
    let Some(segment) = normalize_name(name) else {
      continue;
    };
    if segment.starts_with(RESERVED_MARKER) {
      continue;
    }

    let path = match prefix {
      Some(p) => format!("{p}{PATH_SEPARATOR}{segment}"),
      None => segment,
    };

    match value {
      Value::Object(child) => flatten_into(child, Some(&path), out),
      other => {
        if let Some(typed) = classify(other) {
          out.insert(format!("{path}{NAME_SEPARATOR}{}", typed.suffix()), typed);
        }
      }
    }
  }
}

/// Normalize one name segment. Returns `None` when nothing indexable remains.
pub fn normalize_name(name: &str) -> Option<String> {
  let mut out = String::with_capacity(name.len());
  let mut pending_separator = false;
  for ch in name.trim().chars() {
    if ch.is_alphanumeric() || ch == '_' {
      if pending_separator && !out.is_empty() {
        out.push(NAME_SEPARATOR);
      }
      pending_separator = false;
      out.extend(ch.to_lowercase());
    } else if ch == RESERVED_MARKER && out.is_empty() {
      out.push(ch);
    } else {
      pending_separator = true;
    }
  }

  if out.is_empty() {
    None
  } else {
    Some(out)
  }
}

/// Classify a scalar JSON value. Nulls and arrays are not indexed.
fn classify(value: &Value) -> Option<IndexValue> {
  match value {
    Value::Bool(b) => Some(IndexValue::Boolean(*b)),
    Value::Number(n) => {
      if let Some(i) = n.as_i64() {
        Some(IndexValue::Integer(i))
      } else {
        n.as_f64().map(IndexValue::Float)
      }
    }
    Value::String(s) => Some(parse_text(s)),
    Value::Null | Value::Array(_) | Value::Object(_) => None,
  }
}

/// Convert text that cleanly parses as a boolean, number or date/time.
fn parse_text(s: &str) -> IndexValue {
  let t = s.trim();
  if t.eq_ignore_ascii_case("true") {
    return IndexValue::Boolean(true);
  }
  if t.eq_ignore_ascii_case("false") {
    return IndexValue::Boolean(false);
  }
  if let Ok(i) = t.parse::<i64>() {
    return IndexValue::Integer(i);
  }
  if let Ok(f) = t.parse::<f64>() {
    if f.is_finite() {
      return IndexValue::Float(f);
    }
  }
  if let Ok(dt) = DateTime::parse_from_rfc3339(t) {
    return IndexValue::Date(dt);
  }
  for format in NAIVE_DATE_FORMATS {
    if let Ok(naive) = NaiveDateTime::parse_from_str(t, format) {
      return IndexValue::Date(naive.and_utc().fixed_offset());
    }
  }
  IndexValue::String(s.to_string())
}

#[cfg(test)]
mod tests {
  use super::*;
  use proptest::prelude::*;
  use serde_json::json;

  fn data(value: Value) -> Map<String, Value> {
    match value {
      Value::Object(map) => map,
      _ => panic!("expected object"),
    }
  }

  #[test]
  fn indexes_typed_properties() {
    let input = data(json!({
      "First Name": "Eric",
      "IsVerified": true,
      "IsVerified1": "True",
      "Age": i32::MAX,
      "Age1": i32::MAX.to_string(),
      "AgeDec": 79228162514264337593543950335.0,
      "AgeDec1": "79228162514264337593543950335",
      "AgeDbl": f64::MAX,
      "AgeDbl1": f64::MAX.to_string(),
      " Birthday ": "0001-01-01T00:00:00",
      "BirthdayWithOffset": "0001-01-01T00:00:00+00:00",
      "@excluded": "0001-01-01T00:00:00",
      "Address": { "State": "Texas" }
    }));

    let idx = flatten(&input);
    let mut keys: Vec<&str> = idx.keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(
      keys,
      vec![
        "address.state-s",
        "age-n",
        "age1-n",
        "agedbl-n",
        "agedbl1-n",
        "agedec-n",
        "agedec1-n",
        "birthday-d",
        "birthdaywithoffset-d",
        "first-name-s",
        "isverified-b",
        "isverified1-b",
      ]
    );
    assert_eq!(idx["first-name-s"], IndexValue::String("Eric".into()));
    assert_eq!(idx["isverified1-b"], IndexValue::Boolean(true));
    assert_eq!(idx["age1-n"], IndexValue::Integer(i64::from(i32::MAX)));
    assert_eq!(idx["address.state-s"], IndexValue::String("Texas".into()));
  }

  #[test]
  fn names_collapse_punctuation_runs() {
    assert_eq!(normalize_name("  Request -- Path  ").as_deref(), Some("request-path"));
    assert_eq!(normalize_name("user.name").as_deref(), Some("user-name"));
    assert_eq!(normalize_name("@Secret").as_deref(), Some("@secret"));
    assert_eq!(normalize_name(" !! "), None);
  }

  #[test]
  fn reserved_fields_are_dropped_at_any_depth() {
    let input = data(json!({
      "@stack": { "signature": "x" },
      "@": 1,
      "outer": { "@hidden": true, "kept": 1 }
    }));
    let idx = flatten(&input);
    assert_eq!(idx.len(), 1);
    assert!(idx.contains_key("outer.kept-n"));
  }

  #[test]
  fn nulls_and_arrays_are_skipped() {
    let input = data(json!({ "none": null, "list": [1, 2] }));
    assert!(flatten(&input).is_empty());
  }

  #[test]
  fn non_finite_text_stays_string() {
    let input = data(json!({ "ratio": "NaN", "big": "1e400" }));
    let idx = flatten(&input);
    assert_eq!(idx["ratio-s"], IndexValue::String("NaN".into()));
    assert_eq!(idx["big-s"], IndexValue::String("1e400".into()));
  }

  fn json_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
      Just(Value::Null),
      any::<bool>().prop_map(Value::Bool),
      any::<i64>().prop_map(Value::from),
      (-1.0e12f64..1.0e12).prop_map(Value::from),
      "[ -~]{0,12}".prop_map(Value::String),
      prop_oneof![Just("true"), Just("42"), Just("2024-05-01T08:30:00+02:00"), Just("0001-01-01T00:00:00")]
        .prop_map(Value::from),
    ];
    leaf.prop_recursive(3, 32, 4, |inner| {
      prop_oneof![
        proptest::collection::btree_map("[ -~]{0,8}", inner.clone(), 0..4)
          .prop_map(|m| Value::Object(m.into_iter().collect())),
        proptest::collection::vec(inner, 0..3).prop_map(Value::Array),
      ]
    })
  }

  fn json_object() -> impl Strategy<Value = Map<String, Value>> {
    proptest::collection::btree_map("[ -~]{0,10}", json_value(), 0..8).prop_map(|m| m.into_iter().collect())
  }

  proptest! {
    #[test]
    fn flatten_is_idempotent(map in json_object()) {
      prop_assert_eq!(flatten(&map), flatten(&map));
    }

    #[test]
    fn every_key_is_suffixed_and_unreserved(map in json_object()) {
      for (key, value) in flatten(&map) {
        let expected = format!("{NAME_SEPARATOR}{}", value.suffix());
        prop_assert!(key.ends_with(&expected), "{} lacks {}", key, expected);
        prop_assert!(key.split(PATH_SEPARATOR).all(|segment| !segment.starts_with(RESERVED_MARKER)));
      }
    }

    #[test]
    fn reserved_prefix_never_indexed(suffix in "[a-z]{1,10}", value in "[ -~]{0,16}", flag in any::<bool>(), n in any::<i64>()) {
      let mut map = Map::new();
      map.insert(format!("@{suffix}"), Value::String(value));
      map.insert(format!("@{suffix}_b"), Value::Bool(flag));
      map.insert(format!("@{suffix}_n"), Value::from(n));
      map.insert(format!("@{suffix}_o"), json!({ "inner": 1 }));
      prop_assert!(flatten(&map).is_empty());
    }
  }
}
