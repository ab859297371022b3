//! Templated query execution: single queries, batches and composite paging

use super::connection::Connection;
use crate::config::Config;
use crate::query::{QueryBuilder, QueryDescriptor};
use crate::result::{after_key, normalize_body, parse_tabular, CanonicalResult, Row, TaggedResponse};
use crate::schema::{AGGREGATIONS, BUCKETS, RESPONSES};
use crate::template::{FileTemplateStore, TemplateSource};
use crate::{Error, Result};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, warn};

const JSON: &str = "application/json";
const NDJSON: &str = "application/x-ndjson";

/// Executes templated queries against the search engine.
#[derive(Clone)]
pub struct SearchClient {
    connection: Connection,
    builder: QueryBuilder,
    batch_endpoint: String,
    max_pages: usize,
}

impl SearchClient {
    pub fn new(connection: Connection, templates: Arc<dyn TemplateSource>) -> Self {
        Self {
            connection,
            builder: QueryBuilder::new(templates),
            batch_endpoint: "/_msearch".to_string(),
            max_pages: 100,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let connection = Connection::from_config(&config.engine)?;
        let templates = Arc::new(FileTemplateStore::from_config(&config.templates));
        Ok(Self::new(connection, templates)
            .with_batch_endpoint(&config.engine.batch_endpoint)
            .with_max_pages(config.paging.max_pages))
    }

    pub fn with_batch_endpoint(mut self, endpoint: &str) -> Self {
        self.batch_endpoint = if endpoint.starts_with('/') {
            endpoint.to_string()
        } else {
            format!("/{}", endpoint)
        };
        self
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    pub fn builder(&self) -> &QueryBuilder {
        &self.builder
    }

    /// Build the query a descriptor would send, without sending it.
    pub fn render(&self, descriptor: &QueryDescriptor) -> Result<String> {
        descriptor.validate()?;
        self.builder.build(descriptor)
    }

    /// Execute one query and normalize its response.
    pub async fn execute(&self, descriptor: &QueryDescriptor) -> Result<CanonicalResult> {
        let body = self.send_query(descriptor).await?;
        Ok(normalize_body(&body))
    }

    /// Execute one query and return the decoded, unnormalized response.
    pub async fn execute_raw(&self, descriptor: &QueryDescriptor) -> Result<Value> {
        let body = self.send_query(descriptor).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Execute a query against a tabular (SQL text) endpoint and return its rows.
    pub async fn execute_rows(&self, descriptor: &QueryDescriptor) -> Result<Vec<Row>> {
        let body = self.send_query(descriptor).await?;
        Ok(parse_tabular(&body))
    }

    async fn send_query(&self, descriptor: &QueryDescriptor) -> Result<String> {
        descriptor.validate()?;
        let method = descriptor
            .method
            .ok_or(Error::Validation { field: "method" })?;
        let query = self.builder.build(descriptor)?;
        let url = self.connection.url(&descriptor.path());

        debug!("{:?} {} <- {}", method, url, query);
        let start = Instant::now();

        let request = self
            .connection
            .request(method.as_reqwest(), &url)
            .query(&descriptor.request_params)
            .header(reqwest::header::CONTENT_TYPE, JSON)
            .body(query.clone());
        let result = self.connection.send_ok(request).await;

        let elapsed = start.elapsed();
        metrics::counter!("pulse_queries_total", "kind" => "single").increment(1);
        metrics::histogram!("pulse_query_duration_seconds", "kind" => "single")
            .record(elapsed.as_secs_f64());

        match result {
            Ok(body) => {
                debug!(
                    "{} answered in {:.1}ms ({} bytes)",
                    url,
                    elapsed.as_secs_f64() * 1000.0,
                    body.len()
                );
                Ok(body)
            }
            Err(e) => {
                metrics::counter!("pulse_query_errors_total", "kind" => "single").increment(1);
                error!("Query to {} failed: {} -- query: {}", url, e, query);
                Err(e)
            }
        }
    }

    /// Execute several queries in one multi-search request.
    ///
    /// Descriptors that fail validation are logged and skipped, so the output
    /// may be shorter than the input. Responses are matched to descriptors by
    /// position and returned unnormalized.
    pub async fn execute_batch(
        &self,
        descriptors: &[QueryDescriptor],
    ) -> Result<Vec<TaggedResponse>> {
        if descriptors.is_empty() {
            return Ok(Vec::new());
        }

        let mut body = String::new();
        let mut keys = Vec::with_capacity(descriptors.len());

        for (position, descriptor) in descriptors.iter().enumerate() {
            if let Err(e) = descriptor.validate_for_batch() {
                metrics::counter!("pulse_batch_skipped_total").increment(1);
                warn!(
                    "Skipping batch entry {} ({:?}): {}",
                    position, descriptor.correlation_key, e
                );
                continue;
            }

            let query = self.builder.build(descriptor)?;
            let header = json!({ "index": descriptor.index.as_deref().unwrap_or_default().trim() });
            body.push_str(&header.to_string());
            body.push('\n');
            body.push_str(&query);
            body.push('\n');
            keys.push(descriptor.correlation_key.clone());
        }

        if keys.is_empty() {
            warn!("No valid entries in batch of {}", descriptors.len());
            return Ok(Vec::new());
        }

        let url = self.connection.url(&self.batch_endpoint);
        debug!("Batch of {} queries -> {}", keys.len(), url);
        let start = Instant::now();

        let request = self
            .connection
            .request(reqwest::Method::POST, &url)
            .header(reqwest::header::CONTENT_TYPE, NDJSON)
            .body(body.clone());
        let result = self.connection.send_ok(request).await;

        let elapsed = start.elapsed();
        metrics::counter!("pulse_queries_total", "kind" => "batch").increment(1);
        metrics::histogram!("pulse_query_duration_seconds", "kind" => "batch")
            .record(elapsed.as_secs_f64());

        let text = match result {
            Ok(text) => text,
            Err(e) => {
                metrics::counter!("pulse_query_errors_total", "kind" => "batch").increment(1);
                error!("Batch to {} failed: {} -- body: {}", url, e, body);
                return Err(e);
            }
        };
        debug!(
            "Batch answered in {:.1}ms",
            elapsed.as_secs_f64() * 1000.0
        );

        let mut parsed: Value = serde_json::from_str(&text)?;
        let responses = match parsed.get_mut(RESPONSES).map(Value::take) {
            Some(Value::Array(responses)) => responses,
            _ => {
                return Err(Error::BatchMismatch {
                    sent: keys.len(),
                    received: 0,
                })
            }
        };
        if responses.len() != keys.len() {
            return Err(Error::BatchMismatch {
                sent: keys.len(),
                received: responses.len(),
            });
        }

        Ok(keys
            .into_iter()
            .zip(responses)
            .map(|(key, response)| TaggedResponse { key, response })
            .collect())
    }

    /// Walk every page of a composite aggregation and collect its buckets.
    ///
    /// Each page's `after_key` becomes the next page's cursor. Stops on an
    /// empty page, a missing `after_key`, an `after_key` equal to the cursor
    /// just sent, or after the configured page limit.
    pub async fn execute_all_pages(
        &self,
        descriptor: &QueryDescriptor,
        aggregation: &str,
    ) -> Result<CanonicalResult> {
        let mut page = descriptor.clone();
        let mut buckets = Vec::new();

        for page_number in 1..=self.max_pages {
            let response = self.execute_raw(&page).await?;
            let page_buckets = response
                .get(AGGREGATIONS)
                .and_then(|aggs| aggs.get(aggregation))
                .and_then(|agg| agg.get(BUCKETS))
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            let next = after_key(&response, aggregation);
            if next.is_some() && next == page.paging_cursor {
                // Same cursor back: this page repeats the previous one
                warn!(
                    "Paging {} made no progress at page {} (cursor {:?}); stopping",
                    aggregation, page_number, next
                );
                return Ok(CanonicalResult::from_res(Value::Array(buckets)));
            }
            let exhausted = page_buckets.is_empty();
            buckets.extend(page_buckets);

            match next {
                Some(cursor) if !exhausted => {
                    debug!("Page {} of {} done, next cursor {}", page_number, aggregation, cursor);
                    page.paging_cursor = Some(cursor);
                }
                _ => return Ok(CanonicalResult::from_res(Value::Array(buckets))),
            }
        }

        warn!(
            "Stopped paging {} after {} pages; result truncated",
            aggregation, self.max_pages
        );
        Ok(CanonicalResult::from_res(Value::Array(buckets)))
    }
}
