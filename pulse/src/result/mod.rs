//! Canonical results and response normalization
//!
//! Every response shape the engine understands is reduced to a single JSON
//! object keyed primarily by `RES`:
//!
//! - scalar metric aggregation: `{"RES": 42}`
//! - bucket aggregation: `{"RES": [bucket, ...], "sum_other_doc_count": n, ...}`
//! - several aggregations: `{"a": {"RES": ...}, "b": {"RES": ...}}`
//! - document hits: `{"RES": [row, ...]}` with `_id` on every row
//! - empty hits or count endpoints: `{"RES": total}`
//!
//! Anything else is passed through untouched.

pub mod normalize;
pub mod tabular;
pub mod unpivot;

pub use normalize::{after_key, classify, normalize, normalize_body, Shape};
pub use tabular::parse_tabular;
pub use unpivot::flatten;

use crate::schema::RES;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One flat record: column name to value.
pub type Row = Map<String, Value>;

/// Normalized engine output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalResult(Map<String, Value>);

impl CanonicalResult {
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn from_res(res: Value) -> Self {
        let mut map = Map::new();
        map.insert(RES.to_string(), res);
        Self(map)
    }

    pub fn res(&self) -> Option<&Value> {
        self.0.get(RES)
    }

    /// `RES` as a list of rows; `None` unless every element is an object.
    pub fn rows(&self) -> Option<Vec<&Row>> {
        self.res()?.as_array()?.iter().map(Value::as_object).collect()
    }

    pub fn scalar(&self) -> Option<f64> {
        self.res()?.as_f64()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Sub-result of a multi-aggregation response.
    pub fn aggregation(&self, name: &str) -> Option<CanonicalResult> {
        self.0
            .get(name)?
            .as_object()
            .filter(|sub| sub.contains_key(RES))
            .map(|sub| Self(sub.clone()))
    }

    /// True when the response was recognized and reshaped.
    pub fn has_res(&self) -> bool {
        self.0.contains_key(RES)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for CanonicalResult {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// One batch response tagged with its descriptor's correlation key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedResponse {
    pub key: Option<String>,
    pub response: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_accessors() {
        let result = CanonicalResult::from_res(json!([{"a": 1}, {"a": 2}]));
        assert_eq!(result.rows().unwrap().len(), 2);
        assert!(result.scalar().is_none());

        let result = CanonicalResult::from_res(json!(7));
        assert_eq!(result.scalar(), Some(7.0));
        assert!(result.rows().is_none());
    }

    #[test]
    fn test_aggregation_lookup() {
        let value = json!({"users": {"RES": 3}, "sessions": {"RES": 9}, "other": 1});
        let result = CanonicalResult::new(value.as_object().unwrap().clone());
        assert_eq!(result.aggregation("users").unwrap().scalar(), Some(3.0));
        assert!(result.aggregation("other").is_none());
        assert!(!result.has_res());
    }

    #[test]
    fn test_serializes_as_plain_object() {
        let result = CanonicalResult::from_res(json!(1));
        assert_eq!(serde_json::to_value(&result).unwrap(), json!({"RES": 1}));
    }
}
