//! Response classification and reshaping

use super::tabular::parse_tabular;
use super::{CanonicalResult, Row};
use crate::schema::{
    AFTER_KEY, AGGREGATIONS, BUCKETS, COUNT, DOC_COUNT_ERROR, FIELDS, GROUP_BY, HITS, ID, RES,
    SOURCE, SUM_OTHER_DOC_COUNT, TOTAL, VALUE, VALUES,
};
use serde_json::{Map, Value};
use tracing::{debug, trace};

type Object = Map<String, Value>;

/// Aggregation fields copied next to `RES` when present.
const SIDE_FIELDS: [&str; 3] = [DOC_COUNT_ERROR, SUM_OTHER_DOC_COUNT, AFTER_KEY];

/// The response shapes the normalizer recognizes.
#[derive(Debug, PartialEq)]
pub enum Shape<'a> {
    /// `aggregations.groupby`, the common single-level group-by
    GroupBy(&'a Object),
    /// Exactly one aggregation
    Aggregation(&'a Object),
    /// Several aggregations, each unwrapped under its own name
    MultiAggregation(Vec<(&'a str, &'a Object)>),
    /// Hit list present but empty; carries `hits.total`
    EmptyHits(&'a Value),
    /// Hits carrying a `fields` selection
    FieldHits(&'a [Value]),
    /// Hits carrying full document bodies
    DocumentHits(&'a [Value]),
    /// Plain count endpoint
    Count(&'a Value),
    Passthrough,
}

impl Shape<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Self::GroupBy(_) => "groupby",
            Self::Aggregation(_) => "aggregation",
            Self::MultiAggregation(_) => "multi_aggregation",
            Self::EmptyHits(_) => "empty_hits",
            Self::FieldHits(_) => "field_hits",
            Self::DocumentHits(_) => "document_hits",
            Self::Count(_) => "count",
            Self::Passthrough => "passthrough",
        }
    }
}

/// Decide which shape a response has. First match wins.
pub fn classify(response: &Object) -> Shape<'_> {
    if let Some(aggs) = response.get(AGGREGATIONS).and_then(Value::as_object) {
        if let Some(group_by) = aggs.get(GROUP_BY) {
            return match group_by.as_object() {
                Some(group_by) => Shape::GroupBy(group_by),
                None => Shape::Passthrough,
            };
        }

        let named: Option<Vec<(&str, &Object)>> = aggs
            .iter()
            .map(|(name, agg)| agg.as_object().map(|agg| (name.as_str(), agg)))
            .collect();
        match named {
            None => return Shape::Passthrough,
            Some(named) if named.len() == 1 => return Shape::Aggregation(named[0].1),
            Some(named) if named.len() > 1 => return Shape::MultiAggregation(named),
            // Empty aggregations fall through to hits
            Some(_) => {}
        }
    }

    if let Some(hits) = response.get(HITS) {
        let Some(hits) = hits.as_object() else {
            return Shape::Passthrough;
        };
        return match hits.get(HITS).and_then(Value::as_array) {
            None => Shape::Passthrough,
            Some(list) if list.is_empty() => match hits.get(TOTAL) {
                Some(total) => Shape::EmptyHits(total),
                None => Shape::Passthrough,
            },
            Some(list) if list[0].get(FIELDS).is_some() => Shape::FieldHits(list),
            Some(list) => Shape::DocumentHits(list),
        };
    }

    if let Some(count) = response.get(COUNT) {
        return Shape::Count(count);
    }

    Shape::Passthrough
}

/// Unwrap one aggregation body into `RES` plus side fields.
fn unwrap_aggregation(agg: &Object) -> Object {
    let res = match agg.get(BUCKETS) {
        Some(buckets) => buckets.clone(),
        None => agg
            .get(VALUES)
            .or_else(|| agg.get(VALUE))
            .cloned()
            .unwrap_or_else(|| Value::Object(agg.clone())),
    };

    let mut out = Object::new();
    out.insert(RES.to_string(), res);
    for field in SIDE_FIELDS {
        if let Some(value) = agg.get(field) {
            out.insert(field.to_string(), value.clone());
        }
    }
    out
}

fn unwrap_multi(aggs: &[(&str, &Object)]) -> Object {
    aggs.iter()
        .map(|(name, agg)| (name.to_string(), Value::Object(unwrap_aggregation(agg))))
        .collect()
}

/// `hits.total` is a number in older engines and `{"value": n}` in newer ones.
fn total_count(total: &Value) -> Option<Value> {
    match total {
        Value::Object(total) => total.get(VALUE).cloned(),
        Value::Number(_) => Some(total.clone()),
        _ => None,
    }
}

fn document_rows(hits: &[Value]) -> Option<Vec<Value>> {
    hits.iter()
        .map(|hit| {
            let hit = hit.as_object()?;
            let mut row: Row = hit
                .get(SOURCE)
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            if let Some(id) = hit.get(ID) {
                row.insert(ID.to_string(), id.clone());
            }
            Some(Value::Object(row))
        })
        .collect()
}

fn field_rows(hits: &[Value]) -> Option<Vec<Value>> {
    hits.iter()
        .map(|hit| {
            let hit = hit.as_object()?;
            let source = hit.get(SOURCE).and_then(Value::as_object);
            let Some(fields) = hit.get(FIELDS).and_then(Value::as_object) else {
                return Some(Value::Object(Row::new()));
            };

            let row: Row = fields
                .iter()
                .map(|(name, selected)| {
                    let value = source
                        .and_then(|source| source.get(name))
                        .cloned()
                        .or_else(|| match selected {
                            Value::Array(values) => values.first().cloned(),
                            other => Some(other.clone()),
                        })
                        .unwrap_or(Value::Null);
                    (name.clone(), value)
                })
                .collect();
            Some(Value::Object(row))
        })
        .collect()
}

fn reshape(shape: &Shape<'_>) -> Option<Object> {
    let res = match shape {
        Shape::GroupBy(agg) | Shape::Aggregation(agg) => return Some(unwrap_aggregation(agg)),
        Shape::MultiAggregation(aggs) => return Some(unwrap_multi(aggs)),
        Shape::EmptyHits(total) => total_count(total)?,
        Shape::FieldHits(hits) => Value::Array(field_rows(hits)?),
        Shape::DocumentHits(hits) => Value::Array(document_rows(hits)?),
        Shape::Count(count) => (*count).clone(),
        Shape::Passthrough => return None,
    };
    let mut out = Object::new();
    out.insert(RES.to_string(), res);
    Some(out)
}

/// Normalize a decoded JSON response. Unrecognized or inconsistent shapes
/// come back unchanged.
pub fn normalize(response: Object) -> CanonicalResult {
    let (name, normalized) = {
        let shape = classify(&response);
        (shape.name(), reshape(&shape))
    };
    metrics::counter!("pulse_normalized_total", "shape" => name).increment(1);
    match normalized {
        Some(normalized) => {
            trace!("Normalized response as {}", name);
            CanonicalResult::new(normalized)
        }
        None => {
            if name != "passthrough" {
                debug!("Response looked like {} but did not match; passing through", name);
            }
            CanonicalResult::new(response)
        }
    }
}

/// Normalize a raw response body.
///
/// JSON objects go through [`normalize`]; other JSON values are wrapped in
/// `RES`; bodies that are not JSON are read as pipe-delimited tables.
pub fn normalize_body(body: &str) -> CanonicalResult {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(response)) => normalize(response),
        Ok(other) => CanonicalResult::from_res(other),
        Err(_) => CanonicalResult::from_res(Value::Array(
            parse_tabular(body).into_iter().map(Value::Object).collect(),
        )),
    }
}

/// Composite `after_key` of `aggregation`, serialized for use as the next
/// page's cursor.
pub fn after_key(response: &Value, aggregation: &str) -> Option<String> {
    response
        .get(AGGREGATIONS)?
        .get(aggregation)?
        .get(AFTER_KEY)
        .filter(|key| !key.is_null())
        .map(Value::to_string)
}
