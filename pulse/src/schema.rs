//! Field and parameter names shared by the query pipeline and the normalizer.

/// Key holding the normalized payload of every canonical result.
pub const RES: &str = "RES";

/// Document identifier injected into hit rows.
pub const ID: &str = "_id";
pub const INDEX: &str = "_index";
pub const SOURCE: &str = "_source";
pub const FOUND: &str = "found";
pub const DOCS: &str = "docs";

pub const AGGREGATIONS: &str = "aggregations";
pub const GROUP_BY: &str = "groupby";
pub const BUCKETS: &str = "buckets";
pub const KEY: &str = "key";
pub const VALUE: &str = "value";
pub const VALUES: &str = "values";
pub const AFTER_KEY: &str = "after_key";
pub const DOC_COUNT_ERROR: &str = "doc_count_error_upper_bound";
pub const SUM_OTHER_DOC_COUNT: &str = "sum_other_doc_count";

pub const HITS: &str = "hits";
pub const TOTAL: &str = "total";
pub const FIELDS: &str = "fields";
pub const COUNT: &str = "count";
pub const RESPONSES: &str = "responses";

/// Percentile keys tried, in order, when a metric carries `values`.
pub const MEDIAN_KEYS: [&str; 2] = ["50.0", "50"];

/// Parameters starting with this prefix are injected verbatim.
pub const RAW_PREFIX: &str = "raw";

/// Composite pagination cursor, both as parameter and as dynamic block name.
pub const CURSOR: &str = "afterKey";

/// Selects SQL quoting when true.
pub const IS_SQL: &str = "isSql";
