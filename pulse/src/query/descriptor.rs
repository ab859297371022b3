//! Query descriptors: one executable query per request

use crate::schema::CURSOR;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Head,
}

impl HttpMethod {
    pub fn as_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
            Self::Put => reqwest::Method::PUT,
            Self::Delete => reqwest::Method::DELETE,
            Self::Head => reqwest::Method::HEAD,
        }
    }
}

/// Describes one query: where it goes, which template builds it, and the
/// values that fill the template.
///
/// Either `endpoint` is set, or both `index` and `api` are.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryDescriptor {
    #[serde(default)]
    pub method: Option<HttpMethod>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub index: Option<String>,
    #[serde(default)]
    pub api: Option<String>,
    #[serde(default)]
    pub template_file: String,
    /// URL query parameters, e.g. `format=txt`
    #[serde(default)]
    pub request_params: HashMap<String, String>,
    /// Template placeholder values
    #[serde(default)]
    pub query_params: HashMap<String, Value>,
    /// Dynamic block flags
    #[serde(default)]
    pub dynamic_params: HashMap<String, bool>,
    /// Batch mode only
    #[serde(default)]
    pub correlation_key: Option<String>,
    #[serde(default)]
    pub paging_cursor: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.trim().is_empty())
}

/// Strip quoting the engine or a previous serialization wrapped a cursor in.
fn clean_cursor(raw: &str) -> &str {
    let trimmed = raw.trim();
    let bytes = trimmed.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if first == last && (first == b'"' || first == b'\'') {
            return trimmed[1..trimmed.len() - 1].trim();
        }
    }
    trimmed
}

impl QueryDescriptor {
    /// `POST /{index}/_search` with the given template.
    pub fn search(index: impl Into<String>, template_file: impl Into<String>) -> Self {
        Self::indexed(HttpMethod::Post, index, "_search", template_file)
    }

    /// `POST /{index}/_count` with the given template.
    pub fn count(index: impl Into<String>, template_file: impl Into<String>) -> Self {
        Self::indexed(HttpMethod::Post, index, "_count", template_file)
    }

    pub fn indexed(
        method: HttpMethod,
        index: impl Into<String>,
        api: impl Into<String>,
        template_file: impl Into<String>,
    ) -> Self {
        Self {
            method: Some(method),
            index: Some(index.into()),
            api: Some(api.into()),
            template_file: template_file.into(),
            ..Default::default()
        }
    }

    /// Query against an explicit endpoint such as `/_sql`.
    pub fn at_endpoint(
        method: HttpMethod,
        endpoint: impl Into<String>,
        template_file: impl Into<String>,
    ) -> Self {
        Self {
            method: Some(method),
            endpoint: Some(endpoint.into()),
            template_file: template_file.into(),
            ..Default::default()
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query_params.insert(name.into(), value.into());
        self
    }

    pub fn with_flag(mut self, name: impl Into<String>, enabled: bool) -> Self {
        self.dynamic_params.insert(name.into(), enabled);
        self
    }

    pub fn with_request_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request_params.insert(name.into(), value.into());
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.correlation_key = Some(key.into());
        self
    }

    pub fn with_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.paging_cursor = Some(cursor.into());
        self
    }

    /// Check the fields a single query needs.
    pub fn validate(&self) -> Result<()> {
        if self.method.is_none() {
            return Err(Error::Validation { field: "method" });
        }
        if non_empty(&self.endpoint).is_none() {
            if non_empty(&self.index).is_none() {
                return Err(Error::Validation { field: "index" });
            }
            if non_empty(&self.api).is_none() {
                return Err(Error::Validation { field: "api" });
            }
        }
        if self.template_file.trim().is_empty() {
            return Err(Error::Validation {
                field: "templateFile",
            });
        }
        Ok(())
    }

    /// Check the fields a batch entry needs. Batch entries are always
    /// index-scoped, so method and endpoint are not required.
    pub fn validate_for_batch(&self) -> Result<()> {
        if non_empty(&self.index).is_none() {
            return Err(Error::Validation { field: "index" });
        }
        if self.template_file.trim().is_empty() {
            return Err(Error::Validation {
                field: "templateFile",
            });
        }
        Ok(())
    }

    /// Request path, derived from `index`/`api` when no endpoint is given.
    pub fn path(&self) -> String {
        let path = match non_empty(&self.endpoint) {
            Some(endpoint) => endpoint.trim().to_string(),
            None => format!(
                "{}/{}",
                self.index.as_deref().unwrap_or_default().trim(),
                self.api.as_deref().unwrap_or_default().trim()
            ),
        };
        if path.starts_with('/') {
            path
        } else {
            format!("/{}", path)
        }
    }

    /// Placeholder values and block flags with the paging cursor folded in.
    pub fn template_inputs(&self) -> (HashMap<String, Value>, HashMap<String, bool>) {
        let mut params = self.query_params.clone();
        let mut flags = self.dynamic_params.clone();

        if let Some(cursor) = self.paging_cursor.as_deref().map(clean_cursor) {
            if !cursor.is_empty() {
                params.insert(CURSOR.to_string(), Value::String(cursor.to_string()));
                flags.insert(CURSOR.to_string(), true);
            }
        }
        (params, flags)
    }
}
