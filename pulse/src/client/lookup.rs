//! Point lookups by document identifier
//!
//! These bypass the template pipeline and talk to the engine's document
//! APIs directly.

use super::connection::Connection;
use crate::config::Config;
use crate::result::Row;
use crate::schema::{DOCS, FOUND, HITS, ID, INDEX, SOURCE};
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};
use tracing::debug;

/// Document access used by the lookup helpers.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch by identifier from one concrete index; `None` when absent.
    async fn get_document(&self, index: &str, id: &str) -> Result<Option<Row>>;

    /// Find by identifier through a search over a pattern or alias.
    async fn search_document(&self, pattern: &str, id: &str) -> Result<Option<Row>>;
}

/// Document body with `_id` and `_index` added.
fn document_row(hit: &Value) -> Option<Row> {
    let hit = hit.as_object()?;
    let mut row = hit
        .get(SOURCE)
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    for field in [ID, INDEX] {
        if let Some(value) = hit.get(field) {
            row.insert(field.to_string(), value.clone());
        }
    }
    Some(row)
}

pub async fn get_by_id<S>(store: &S, index: &str, id: &str) -> Result<Row>
where
    S: DocumentStore + ?Sized,
{
    store
        .get_document(index, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("{}/{}", index, id)))
}

/// Try each index in order and return the first document found.
pub async fn get_from_any<S, I>(store: &S, indices: &[I], id: &str) -> Result<Row>
where
    S: DocumentStore + ?Sized,
    I: AsRef<str> + Sync,
{
    for index in indices {
        let index: &str = index.as_ref();
        if let Some(document) = store.get_document(index, id).await? {
            debug!("Found {} in {}", id, index);
            return Ok(document);
        }
    }
    let tried: Vec<&str> = indices.iter().map(AsRef::as_ref).collect();
    Err(Error::NotFound(format!("{} in [{}]", id, tried.join(", "))))
}

/// Search-based lookup for indices addressed by wildcard or alias.
/// Identifiers shorter than `min_id_length` are rejected without any I/O.
pub async fn search_by_id<S>(store: &S, pattern: &str, id: &str, min_id_length: usize) -> Result<Row>
where
    S: DocumentStore + ?Sized,
{
    let id = id.trim();
    if id.chars().count() < min_id_length {
        return Err(Error::MalformedId(format!(
            "'{}' is shorter than {} characters",
            id, min_id_length
        )));
    }
    store
        .search_document(pattern, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("{}/{}", pattern, id)))
}

/// HTTP client for the engine's document APIs.
#[derive(Debug, Clone)]
pub struct LookupClient {
    connection: Connection,
    min_id_length: usize,
}

impl LookupClient {
    pub fn new(connection: Connection) -> Self {
        Self {
            connection,
            min_id_length: 8,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(Connection::from_config(&config.engine)?)
            .with_min_id_length(config.lookup.min_id_length))
    }

    pub fn with_min_id_length(mut self, min_id_length: usize) -> Self {
        self.min_id_length = min_id_length;
        self
    }

    pub async fn get(&self, index: &str, id: &str) -> Result<Row> {
        get_by_id(self, index, id).await
    }

    pub async fn get_any<I: AsRef<str> + Sync>(&self, indices: &[I], id: &str) -> Result<Row> {
        get_from_any(self, indices, id).await
    }

    pub async fn find(&self, pattern: &str, id: &str) -> Result<Row> {
        search_by_id(self, pattern, id, self.min_id_length).await
    }

    /// Create or replace a document; returns the engine's `result` string.
    pub async fn index_document(&self, index: &str, id: &str, document: &Value) -> Result<String> {
        let url = self.connection.segment_url(&[index, "_doc", id])?;
        let request = self.connection.request(Method::PUT, url).json(document);
        let body: Value = serde_json::from_str(&self.connection.send_ok(request).await?)?;
        Ok(body
            .get("result")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    /// Delete a document; `false` when it did not exist.
    pub async fn delete_document(&self, index: &str, id: &str) -> Result<bool> {
        let url = self.connection.segment_url(&[index, "_doc", id])?;
        let (status, body) = self
            .connection
            .send(self.connection.request(Method::DELETE, url))
            .await?;
        match status {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(Error::Engine {
                status: status.as_u16(),
                body,
            }),
        }
    }

    /// Fetch several documents from one index, in request order. Missing
    /// identifiers are skipped.
    pub async fn multi_get<I: AsRef<str>>(&self, index: &str, ids: &[I]) -> Result<Vec<Row>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<&str> = ids.iter().map(AsRef::as_ref).collect();
        let url = self.connection.segment_url(&[index, "_mget"])?;
        let request = self
            .connection
            .request(Method::POST, url)
            .json(&json!({ "ids": ids }));
        let body: Value = serde_json::from_str(&self.connection.send_ok(request).await?)?;

        Ok(body
            .get(DOCS)
            .and_then(Value::as_array)
            .map(|docs| {
                docs.iter()
                    .filter(|doc| doc.get(FOUND).and_then(Value::as_bool).unwrap_or(false))
                    .filter_map(document_row)
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl DocumentStore for LookupClient {
    async fn get_document(&self, index: &str, id: &str) -> Result<Option<Row>> {
        let url = self.connection.segment_url(&[index, "_doc", id])?;
        let (status, body) = self
            .connection
            .send(self.connection.request(Method::GET, url))
            .await?;

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(Error::Engine {
                status: status.as_u16(),
                body,
            });
        }

        let document: Value = serde_json::from_str(&body)?;
        if !document.get(FOUND).and_then(Value::as_bool).unwrap_or(true) {
            return Ok(None);
        }
        Ok(document_row(&document))
    }

    async fn search_document(&self, pattern: &str, id: &str) -> Result<Option<Row>> {
        let url = self.connection.segment_url(&[pattern, "_search"])?;
        let query = json!({
            "size": 1,
            "query": { "term": { ID: id } }
        });
        let request = self.connection.request(Method::POST, url).json(&query);
        let response: Value = serde_json::from_str(&self.connection.send_ok(request).await?)?;

        Ok(response
            .get(HITS)
            .and_then(|hits| hits.get(HITS))
            .and_then(Value::as_array)
            .and_then(|hits| hits.first())
            .and_then(document_row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// In-memory store that records every call.
    #[derive(Default)]
    struct FakeStore {
        documents: HashMap<(String, String), Row>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeStore {
        fn with(mut self, index: &str, id: &str, doc: Value) -> Self {
            self.documents.insert(
                (index.to_string(), id.to_string()),
                doc.as_object().unwrap().clone(),
            );
            self
        }
    }

    #[async_trait]
    impl DocumentStore for FakeStore {
        async fn get_document(&self, index: &str, id: &str) -> Result<Option<Row>> {
            self.calls.lock().push(format!("get {}", index));
            Ok(self.documents.get(&(index.to_string(), id.to_string())).cloned())
        }

        async fn search_document(&self, pattern: &str, id: &str) -> Result<Option<Row>> {
            self.calls.lock().push(format!("search {}", pattern));
            let prefix = pattern.trim_end_matches('*');
            Ok(self
                .documents
                .iter()
                .find(|((index, doc_id), _)| index.starts_with(prefix) && doc_id == id)
                .map(|(_, doc)| doc.clone()))
        }
    }

    #[tokio::test]
    async fn test_multi_index_fallback() {
        let store = FakeStore::default().with("B", "X", json!({"from": "B"}));

        let doc = get_from_any(&store, &["A", "B"], "X").await.unwrap();
        assert_eq!(doc["from"], json!("B"));
        assert_eq!(*store.calls.lock(), vec!["get A", "get B"]);
    }

    #[tokio::test]
    async fn test_multi_index_stops_at_first_hit() {
        let store = FakeStore::default()
            .with("A", "X", json!({"from": "A"}))
            .with("B", "X", json!({"from": "B"}));

        let doc = get_from_any(&store, &["A", "B"], "X").await.unwrap();
        assert_eq!(doc["from"], json!("A"));
        assert_eq!(store.calls.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_multi_index_exhausted() {
        let store = FakeStore::default();
        let err = get_from_any(&store, &["A", "B"], "X").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(store.calls.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_single_index() {
        let store = FakeStore::default().with("A", "X", json!({"v": 1}));
        assert!(get_by_id(&store, "A", "X").await.is_ok());
        assert!(get_by_id(&store, "A", "Y").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_search_rejects_short_ids_without_io() {
        let store = FakeStore::default();
        let err = search_by_id(&store, "crashes-*", "abc", 8).await.unwrap_err();
        assert!(matches!(err, Error::MalformedId(_)));
        assert!(store.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_search_by_id() {
        let store = FakeStore::default().with("crashes-2024", "0123456789", json!({"v": 2}));
        let doc = search_by_id(&store, "crashes-*", "0123456789", 8).await.unwrap();
        assert_eq!(doc["v"], json!(2));

        let err = search_by_id(&store, "crashes-*", "9999999999", 8).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_document_row() {
        let row = document_row(&json!({"_id": "1", "_index": "i", "_source": {"a": 1}})).unwrap();
        assert_eq!(Value::Object(row), json!({"_id": "1", "_index": "i", "a": 1}));
    }
}
