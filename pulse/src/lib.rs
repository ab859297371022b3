//! Templated query execution and result normalization for APM analytics
//! backed by an Elasticsearch/OpenSearch-class engine.
//!
//! The pipeline: a [`QueryDescriptor`] names a template and the values that
//! fill it; the [`QueryBuilder`] resolves dynamic blocks and substitutes
//! parameters; the [`SearchClient`] sends the query (alone or in a
//! multi-search batch); the normalizer reshapes the response into a
//! [`CanonicalResult`] keyed by `RES`.

pub mod client;
pub mod config;
pub mod error;
pub mod query;
pub mod result;
pub mod schema;
pub mod template;

pub use client::{LookupClient, SearchClient};
pub use config::Config;
pub use error::{Error, Result};
pub use query::{HttpMethod, QueryBuilder, QueryDescriptor};
pub use result::{flatten, normalize, CanonicalResult, Row, TaggedResponse};
