//! HTTP connection settings shared by the search and lookup clients

use crate::config::EngineConfig;
use crate::{Error, Result};
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use std::time::Duration;

#[derive(Debug, Clone)]
enum Auth {
    None,
    Basic {
        username: String,
        password: Option<String>,
    },
    ApiKey(String),
}

/// Base URL, credentials and the underlying HTTP client.
///
/// Connections are owned by the HTTP client; every request releases its
/// connection when the response is consumed or dropped.
#[derive(Debug, Clone)]
pub struct Connection {
    http: Client,
    base_url: String,
    auth: Auth,
}

impl Connection {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::build(base_url, Auth::None, None)
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let auth = match (&config.api_key, &config.username) {
            (Some(key), _) => Auth::ApiKey(key.clone()),
            (None, Some(username)) => Auth::Basic {
                username: username.clone(),
                password: config.password.clone(),
            },
            (None, None) => Auth::None,
        };
        Self::build(
            &config.url,
            auth,
            Some(Duration::from_millis(config.connect_timeout_ms)),
        )
    }

    fn build(base_url: &str, auth: Auth, connect_timeout: Option<Duration>) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url)
            .map_err(|e| Error::Config(format!("Invalid engine url '{}': {}", base_url, e)))?;

        let mut builder = Client::builder();
        if let Some(timeout) = connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url,
            auth,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL for a path that already starts with `/`.
    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// URL built from individually percent-encoded path segments.
    pub(crate) fn segment_url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| Error::Config(format!("Invalid engine url: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("Engine url cannot be a base: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub(crate) fn request(&self, method: reqwest::Method, url: impl reqwest::IntoUrl) -> RequestBuilder {
        let request = self.http.request(method, url);
        match &self.auth {
            Auth::None => request,
            Auth::Basic { username, password } => request.basic_auth(username, password.as_ref()),
            Auth::ApiKey(key) => {
                request.header(reqwest::header::AUTHORIZATION, format!("ApiKey {}", key))
            }
        }
    }

    /// Send a request and read the whole body.
    pub(crate) async fn send(&self, request: RequestBuilder) -> Result<(StatusCode, String)> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        Ok((status, body))
    }

    /// Send a request, treating any non-2xx status as an engine error.
    pub(crate) async fn send_ok(&self, request: RequestBuilder) -> Result<String> {
        let (status, body) = self.send(request).await?;
        if !status.is_success() {
            return Err(Error::Engine {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}
