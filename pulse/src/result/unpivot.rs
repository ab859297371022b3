//! Multi-level group-by flattening
//!
//! Nested bucket aggregations such as
//!
//! ```text
//! day: buckets[ {key: mon, type: buckets[ {key: crash, count: {value: 3}}, ... ]}, ... ]
//! ```
//!
//! become one row per leaf bucket: `{day: mon, type: crash, count: 3}`.

use super::Row;
use crate::schema::{AGGREGATIONS, BUCKETS, KEY, MEDIAN_KEYS, VALUE, VALUES};
use serde_json::{Map, Value};
use tracing::debug;

type Object = Map<String, Value>;

/// One bucket of a group-by level.
struct BucketNode<'a> {
    key: &'a Value,
    body: &'a Object,
}

/// Buckets of aggregation `name` directly under `source`.
fn level<'a>(source: &'a Object, name: &str) -> Option<Vec<BucketNode<'a>>> {
    source
        .get(name)?
        .get(BUCKETS)?
        .as_array()?
        .iter()
        .map(|bucket| {
            let body = bucket.as_object()?;
            Some(BucketNode {
                key: body.get(KEY)?,
                body,
            })
        })
        .collect()
}

/// Metric value of a leaf bucket: the median of a percentile metric, else
/// the `value` of a plain metric, or the field itself when it is a scalar
/// such as `doc_count`.
fn metric_value(bucket: &Object, metric: &str) -> Option<Value> {
    match bucket.get(metric)? {
        Value::Object(agg) => agg
            .get(VALUES)
            .and_then(|values| MEDIAN_KEYS.iter().find_map(|k| values.get(*k)))
            .or_else(|| agg.get(VALUE))
            .cloned(),
        scalar => Some(scalar.clone()),
    }
}

fn walk<'s>(
    source: &'s Object,
    group_by: &[&str],
    metrics: &[&str],
    path: &mut Vec<&'s Value>,
    rows: &mut Vec<Row>,
) -> Option<()> {
    let depth = path.len();
    let is_leaf = depth + 1 == group_by.len();

    for bucket in level(source, group_by[depth])? {
        if is_leaf {
            let mut row = Row::new();
            for (name, key) in group_by.iter().zip(path.iter()) {
                row.insert(name.to_string(), (*key).clone());
            }
            row.insert(group_by[depth].to_string(), bucket.key.clone());
            for metric in metrics {
                row.insert(metric.to_string(), metric_value(bucket.body, metric)?);
            }
            rows.push(row);
        } else {
            path.push(bucket.key);
            walk(bucket.body, group_by, metrics, path, rows)?;
            path.pop();
        }
    }
    Some(())
}

/// Flatten nested group-by buckets into rows.
///
/// `source` is either a response (its `aggregations` are used) or the
/// aggregations object itself. Returns `None` when the tree does not have
/// the expected shape, which is distinct from an empty result.
pub fn flatten<G, M>(source: &Value, group_by: &[G], metrics: &[M]) -> Option<Vec<Row>>
where
    G: AsRef<str>,
    M: AsRef<str>,
{
    if group_by.is_empty() {
        return None;
    }
    let group_by: Vec<&str> = group_by.iter().map(AsRef::as_ref).collect();
    let metrics: Vec<&str> = metrics.iter().map(AsRef::as_ref).collect();

    let root = source.as_object()?;
    let root = match root.get(AGGREGATIONS).and_then(Value::as_object) {
        Some(aggs) => aggs,
        None => root,
    };

    let mut path = Vec::with_capacity(group_by.len());
    let mut rows = Vec::new();
    match walk(root, &group_by, &metrics, &mut path, &mut rows) {
        Some(()) => Some(rows),
        None => {
            debug!(
                "Aggregation tree did not match group-by {:?} / metrics {:?}",
                group_by, metrics
            );
            None
        }
    }
}
