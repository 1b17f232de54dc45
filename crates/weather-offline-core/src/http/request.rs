use reqwest::Method;
use url::Url;

use super::Headers;
use crate::error::FetchError;

/// How the page issued a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    /// Top-level page load.
    Navigate,
    SameOrigin,
    #[default]
    NoCors,
    Cors,
}

/// Cache semantics requested from the network layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    #[default]
    Default,
    /// Revalidate with the origin, bypassing any HTTP cache in between.
    NoCache,
}

/// A read-only description of an outgoing request observed by the worker.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub url: Url,
    pub method: Method,
    pub headers: Headers,
    pub mode: RequestMode,
    pub cache_mode: CacheMode,
}

impl Request {
    pub fn get(url: Url) -> Self {
        Self {
            url,
            method: Method::GET,
            headers: Headers::new(),
            mode: RequestMode::default(),
            cache_mode: CacheMode::default(),
        }
    }

    /// A top-level page load, as a browser would send it.
    pub fn navigate(url: Url) -> Self {
        Self::get(url)
            .with_mode(RequestMode::Navigate)
            .with_header("accept", "text/html,application/xhtml+xml")
    }

    /// Parse `target` as an absolute URL, or resolve it against `origin`.
    pub fn resolve(origin: &Url, target: &str) -> Result<Url, FetchError> {
        match Url::parse(target) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => Ok(origin.join(target)?),
            Err(e) => Err(e.into()),
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_cache_mode(mut self, cache_mode: CacheMode) -> Self {
        self.cache_mode = cache_mode;
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// True for explicit navigations and for requests that accept HTML.
    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
            || self
                .headers
                .get("accept")
                .map(|accept| accept.contains("text/html"))
                .unwrap_or(false)
    }
}
