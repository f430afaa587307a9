use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Url;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the API base, e.g. `/api/users`.
    pub path: String,
    pub body: Option<Value>,
    /// Full `Authorization` header value.
    pub bearer: Option<String>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self { method, path: path.into(), body: None, bearer: None }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Raw response: status code and decoded JSON body (`Null` when the body is
/// empty or not JSON).
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool { (200..300).contains(&self.status) }
}

/// Failure to obtain any response at all.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request timed out")]
    Timeout,
    #[error("malformed response: {0}")]
    Decode(String),
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, req: ApiRequest) -> Result<ApiResponse, TransportError>;
    fn describe(&self) -> String;
}

/// reqwest-backed transport rooted at a base URL.
pub struct HttpTransport {
    base: Url,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(base: &str, timeout: Duration) -> anyhow::Result<Self> {
        let mut base_url = Url::parse(base).context("invalid base URL")?;
        // keep any path prefix when joining relative request paths
        if !base_url.path().ends_with('/') {
            let p = format!("{}/", base_url.path());
            base_url.set_path(&p);
        }
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { base: base_url, client })
    }

    pub fn base(&self) -> &Url { &self.base }

    fn url_for(&self, path: &str) -> Result<Url, TransportError> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|e| TransportError::InvalidRequest(format!("{}: {}", path, e)))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, req: ApiRequest) -> Result<ApiResponse, TransportError> {
        let url = self.url_for(&req.path)?;
        let mut builder = match req.method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
            Method::Put => self.client.put(url),
            Method::Delete => self.client.delete(url),
        };
        if let Some(bearer) = req.bearer.as_deref() {
            let hv = HeaderValue::from_str(bearer)
                .map_err(|_| TransportError::InvalidRequest("credential is not a valid header value".into()))?;
            builder = builder.header(AUTHORIZATION, hv);
        }
        if let Some(body) = req.body.as_ref() {
            builder = builder.json(body);
        }
        let resp = builder.send().await.map_err(|e| {
            if e.is_timeout() { TransportError::Timeout } else { TransportError::Connect(e.to_string()) }
        })?;
        let status = resp.status().as_u16();
        let bytes = resp.bytes().await.map_err(|e| TransportError::Decode(e.to_string()))?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            match serde_json::from_slice::<Value>(&bytes) {
                Ok(v) => v,
                // a 2xx must carry the envelope; error bodies may be anything
                Err(e) if (200..300).contains(&status) => return Err(TransportError::Decode(e.to_string())),
                Err(_) => Value::Null,
            }
        };
        debug!(target: "http", method = req.method.as_str(), path = %req.path, status, "response");
        Ok(ApiResponse { status, body })
    }

    fn describe(&self) -> String { format!("http:{}", self.base) }
}
