//! A fake search engine served over real HTTP for client tests.

#![allow(dead_code)]

use axum::extract::{Path, Query, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub query: HashMap<String, String>,
    pub body: String,
}

#[derive(Clone, Default)]
pub struct EngineState {
    pub requests: Arc<Mutex<Vec<Recorded>>>,
}

impl EngineState {
    fn record(&self, method: Method, path: String, query: HashMap<String, String>, body: &str) {
        self.requests.lock().push(Recorded {
            method: method.to_string(),
            path,
            query,
            body: body.to_string(),
        });
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().clone()
    }
}

pub const CRASH_LIST: &str = r#"{
  "size": {{rawSize}},
  "query": { "bool": { "filter": [
    { "term": { "appId": {{appId}} } }
    {{#os}}, { "term": { "os": {{os}} } }{{/os}}
  ] } }
}"#;

pub const COMPOSITE: &str = r#"{
  "size": 0,
  "aggs": { "groupby": { "composite": {
    {{#afterKey}}"after": {{afterKey}},{{/afterKey}}
    "sources": [ { "day": { "terms": { "field": "day" } } } ]
  } } }
}"#;

pub const COUNT: &str = r#"{ "query": { "term": { "appId": {{appId}} } } }"#;

pub const SQL: &str = r#"{ "query": "SELECT day, crashes FROM crashes WHERE app = {{app}}" }"#;

/// Write the test templates into a fresh directory.
pub fn template_dir() -> TempDir {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("crash_list.json"), CRASH_LIST).unwrap();
    std::fs::write(temp.path().join("composite.json"), COMPOSITE).unwrap();
    std::fs::write(temp.path().join("count.json"), COUNT).unwrap();
    std::fs::write(temp.path().join("sql.json"), SQL).unwrap();
    temp
}

async fn search(
    State(state): State<EngineState>,
    Path(index): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    body: String,
) -> Response {
    state.record(Method::POST, format!("/{}/_search", index), query, &body);
    let request: Value = serde_json::from_str(&body).unwrap_or(Value::Null);

    match index.as_str() {
        "crashes" => Json(json!({
            "took": 3,
            "hits": {"total": {"value": 2, "relation": "eq"}, "hits": [
                {"_index": "crashes", "_id": "c1", "_source": {"appId": 42, "os": "ios"}},
                {"_index": "crashes", "_id": "c2", "_source": {"appId": 42, "os": "android"}}
            ]}
        }))
        .into_response(),
        "empty" => Json(json!({"hits": {"total": {"value": 7}, "hits": []}})).into_response(),
        "paged" => {
            let after = request["aggs"]["groupby"]["composite"]["after"]["day"].as_str();
            let (buckets, after_key) = match after {
                None => (json!([{"key": {"day": "d1"}}, {"key": {"day": "d2"}}]), json!({"day": "d2"})),
                Some("d2") => (json!([{"key": {"day": "d3"}}]), json!({"day": "d3"})),
                Some(_) => (json!([]), Value::Null),
            };
            let mut groupby = json!({"buckets": buckets});
            if !after_key.is_null() {
                groupby["after_key"] = after_key;
            }
            Json(json!({"aggregations": {"groupby": groupby}})).into_response()
        }
        "broken" => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": {"type": "search_phase_execution_exception"}})),
        )
            .into_response(),
        _ => {
            // Term lookup on _id across a pattern
            let id = request["query"]["term"]["_id"].as_str().unwrap_or_default();
            let hits = if id == "0123456789abcdef" {
                json!([{"_index": "lookup-2024", "_id": id, "_source": {"kind": "session"}}])
            } else {
                json!([])
            };
            Json(json!({"hits": {"total": {"value": hits.as_array().map(Vec::len)}, "hits": hits}}))
                .into_response()
        }
    }
}

async fn count(
    State(state): State<EngineState>,
    Path(index): Path<String>,
    body: String,
) -> Json<Value> {
    state.record(Method::POST, format!("/{}/_count", index), HashMap::new(), &body);
    Json(json!({"count": 12, "_shards": {"total": 1, "successful": 1}}))
}

async fn sql(
    State(state): State<EngineState>,
    Query(query): Query<HashMap<String, String>>,
    body: String,
) -> String {
    state.record(Method::POST, "/_sql".to_string(), query, &body);
    "     day      |crashes\n--------------+-------\n2024-01-01    |4\n2024-01-02    |6\n"
        .to_string()
}

async fn msearch(State(state): State<EngineState>, body: String) -> Json<Value> {
    state.record(Method::POST, "/_msearch".to_string(), HashMap::new(), &body);
    let lines: Vec<&str> = body.lines().filter(|l| !l.is_empty()).collect();
    let responses: Vec<Value> = lines
        .chunks(2)
        .enumerate()
        .map(|(position, pair)| {
            let header: Value = serde_json::from_str(pair[0]).unwrap_or(Value::Null);
            json!({
                "echo_index": header["index"],
                "position": position,
                "hits": {"total": {"value": position}, "hits": []}
            })
        })
        .collect();
    Json(json!({"took": 1, "responses": responses}))
}

/// Multi-search that drops the last response.
async fn msearch_short(State(state): State<EngineState>, body: String) -> Json<Value> {
    state.record(Method::POST, "/_msearch_short".to_string(), HashMap::new(), &body);
    let sent = body.lines().filter(|l| !l.is_empty()).count() / 2;
    let responses: Vec<Value> = (0..sent.saturating_sub(1))
        .map(|position| json!({"position": position}))
        .collect();
    Json(json!({"took": 1, "responses": responses}))
}

/// Multi-search answering without a `responses` array.
async fn msearch_bare(State(state): State<EngineState>, body: String) -> Json<Value> {
    state.record(Method::POST, "/_msearch_bare".to_string(), HashMap::new(), &body);
    Json(json!({"took": 1, "error": {"type": "illegal_argument_exception"}}))
}

fn stored_document(index: &str, id: &str) -> Option<Value> {
    (index == "B" && id == "X").then(|| json!({"app": "shop", "stored_in": "B"}))
}

async fn get_doc(
    State(state): State<EngineState>,
    Path((index, id)): Path<(String, String)>,
) -> Response {
    state.record(Method::GET, format!("/{}/_doc/{}", index, id), HashMap::new(), "");
    match stored_document(&index, &id) {
        Some(source) => Json(json!({
            "_index": index, "_id": id, "found": true, "_source": source
        }))
        .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"_index": index, "_id": id, "found": false})),
        )
            .into_response(),
    }
}

async fn put_doc(
    State(state): State<EngineState>,
    Path((index, id)): Path<(String, String)>,
    body: String,
) -> Json<Value> {
    state.record(Method::PUT, format!("/{}/_doc/{}", index, id), HashMap::new(), &body);
    Json(json!({"_index": index, "_id": id, "result": "created"}))
}

async fn delete_doc(
    State(state): State<EngineState>,
    Path((index, id)): Path<(String, String)>,
) -> Response {
    state.record(Method::DELETE, format!("/{}/_doc/{}", index, id), HashMap::new(), "");
    if stored_document(&index, &id).is_some() {
        Json(json!({"result": "deleted"})).into_response()
    } else {
        (StatusCode::NOT_FOUND, Json(json!({"result": "not_found"}))).into_response()
    }
}

async fn mget(
    State(state): State<EngineState>,
    Path(index): Path<String>,
    body: String,
) -> Json<Value> {
    state.record(Method::POST, format!("/{}/_mget", index), HashMap::new(), &body);
    let request: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
    let docs: Vec<Value> = request["ids"]
        .as_array()
        .cloned()
        .unwrap_or_default()
        .into_iter()
        .map(|id| {
            let id = id.as_str().unwrap_or_default().to_string();
            match stored_document(&index, &id) {
                Some(source) => json!({"_index": index, "_id": id, "found": true, "_source": source}),
                None => json!({"_index": index, "_id": id, "found": false}),
            }
        })
        .collect();
    Json(json!({"docs": docs}))
}

/// Start the fake engine on a random port and return its base URL.
pub async fn start_engine() -> (EngineState, String, tokio::task::JoinHandle<()>) {
    let state = EngineState::default();
    let router = Router::new()
        .route("/_msearch", post(msearch))
        .route("/_msearch_short", post(msearch_short))
        .route("/_msearch_bare", post(msearch_bare))
        .route("/_sql", post(sql))
        .route("/:index/_search", post(search))
        .route("/:index/_count", post(count))
        .route("/:index/_mget", post(mget))
        .route(
            "/:index/_doc/:id",
            get(get_doc).put(put_doc).delete(delete_doc),
        )
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base_url = format!("http://{}", addr);

    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

    (state, base_url, handle)
}
