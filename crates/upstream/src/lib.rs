use bytes::Bytes;
use reqwest::{header::HeaderMap, redirect, Method, StatusCode};
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("connect failed: {0}")] Connect(String),
    #[error("Timeout")] Timeout,
    #[error("reading upstream body failed: {0}")] Body(String),
    #[error("Upstream request failed: {0}")] Request(String),
    #[error("invalid upstream target: {0}")] Target(String),
}

pub type UpstreamResult<T> = Result<T, UpstreamError>;

/// Fixed origin base. Inbound path and query are appended, never the host.
#[derive(Debug, Clone)]
pub struct OriginTarget { base: Url }

impl OriginTarget {
    pub fn new(base: &str) -> UpstreamResult<Self> {
        let base = Url::parse(base).map_err(|e| UpstreamError::Target(e.to_string()))?;
        if base.host_str().is_none() {
            return Err(UpstreamError::Target("base has no host".into()));
        }
        Ok(Self { base })
    }

    /// Appends `path` and `query` verbatim. Paths with dot segments are
    /// rejected since URL parsing would collapse them into a different path.
    pub fn resolve(&self, path: &str, query: Option<&str>) -> UpstreamResult<Url> {
        if has_dot_segment(path) {
            return Err(UpstreamError::Target("path contains a dot segment".into()));
        }
        let mut target = self.base.as_str().trim_end_matches('/').to_string();
        if !path.starts_with('/') {
            target.push('/');
        }
        target.push_str(path);
        if let Some(q) = query.filter(|q| !q.is_empty()) {
            target.push('?');
            target.push_str(q);
        }
        let url = Url::parse(&target).map_err(|e| UpstreamError::Target(e.to_string()))?;
        if url.origin() != self.base.origin() {
            return Err(UpstreamError::Target("resolved outside the configured origin".into()));
        }
        Ok(url)
    }
}

fn has_dot_segment(path: &str) -> bool {
    path.split(['/', '\\']).any(|segment| {
        let decoded = segment.to_ascii_lowercase().replace("%2e", ".");
        decoded == "." || decoded == ".."
    })
}

#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl UpstreamRequest {
    /// GET and HEAD never carry a body upstream; every other method forwards
    /// the inbound bytes as received.
    pub fn new(method: Method, url: Url, headers: HeaderMap, body: Bytes) -> Self {
        let body = if method == Method::GET || method == Method::HEAD { None } else { Some(body) };
        Self { method, url, headers, body }
    }
}

#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[async_trait::async_trait]
pub trait Upstream: Send + Sync + 'static {
    async fn forward(&self, req: UpstreamRequest) -> UpstreamResult<UpstreamResponse>;
}

pub struct HttpUpstream {
    client: reqwest::Client,
}

impl HttpUpstream {
    pub fn new(timeout: Duration, connect_timeout: Duration) -> UpstreamResult<Self> {
        let client = reqwest::Client::builder()
            .redirect(redirect::Policy::none())
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| UpstreamError::Request(e.to_string()))?;
        Ok(Self { client })
    }
}

fn classify(e: reqwest::Error) -> UpstreamError {
    if e.is_timeout() {
        UpstreamError::Timeout
    } else if e.is_connect() {
        UpstreamError::Connect(e.to_string())
    } else {
        UpstreamError::Request(e.to_string())
    }
}

#[async_trait::async_trait]
impl Upstream for HttpUpstream {
    async fn forward(&self, req: UpstreamRequest) -> UpstreamResult<UpstreamResponse> {
        tracing::debug!(method = %req.method, path = req.url.path(), "forwarding upstream");
        let mut builder = self.client.request(req.method, req.url).headers(req.headers);
        if let Some(body) = req.body {
            builder = builder.body(body);
        }
        let resp = builder.send().await.map_err(classify)?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.bytes().await.map_err(|e| {
            if e.is_timeout() { UpstreamError::Timeout } else { UpstreamError::Body(e.to_string()) }
        })?;
        Ok(UpstreamResponse { status, headers, body })
    }
}
