//! Network access for the worker.
//!
//! `Fetcher` is the seam between routing policy and the network: the worker
//! only sees a response or a `FetchError`. HTTP error statuses are responses,
//! not errors; only transport failures surface as `FetchError::Network`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{header, Client};
use tracing::debug;

use super::{CacheMode, Headers, Request, Response};
use crate::error::FetchError;

/// HTTP request timeout in seconds.
/// Past this the request is reported as a network failure and routing falls back.
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError>;
}

#[async_trait]
impl<F: Fetcher + ?Sized> Fetcher for Arc<F> {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        (**self).fetch(request).await
    }
}

/// Fetcher backed by a real HTTP client.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    fn build_headers(request: &Request) -> header::HeaderMap {
        let mut headers = header::HeaderMap::new();
        for (name, value) in request.headers.iter() {
            match (
                header::HeaderName::from_bytes(name.as_bytes()),
                header::HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => debug!(header = name, "Skipping header that is not valid HTTP"),
            }
        }
        if request.cache_mode == CacheMode::NoCache {
            headers.insert(header::CACHE_CONTROL, header::HeaderValue::from_static("no-cache"));
            headers.insert(header::PRAGMA, header::HeaderValue::from_static("no-cache"));
        }
        headers
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        let response = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(Self::build_headers(request))
            .send()
            .await?;

        let status = response.status().as_u16();
        let mut headers = Headers::new();
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                headers.insert(name.as_str(), value);
            }
        }
        let body = response.bytes().await?;
        debug!(url = %request.url, status, bytes = body.len(), "Fetched from network");

        Ok(Response {
            status,
            headers,
            body: Some(body),
            kind: Default::default(),
        })
    }
}

/// A network that is never reachable. Lets callers exercise the offline paths.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineFetcher;

#[async_trait]
impl Fetcher for OfflineFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        Err(FetchError::Network(format!("offline: {}", request.url)))
    }
}
