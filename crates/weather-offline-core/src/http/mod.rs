//! Request/response model shared by the worker, the cache and the fetchers.
//!
//! Requests and responses are plain snapshots: the worker never streams
//! bodies, so a `Response` clone is all it takes to hand one copy to the page
//! and store another in a cache container.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub mod fetcher;
pub mod request;
pub mod response;

pub use fetcher::{Fetcher, HttpFetcher, OfflineFetcher};
pub use request::{CacheMode, Request, RequestMode};
pub use response::{Response, ResponseKind};

/// Header map with case-insensitive names (stored lowercased).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Headers(BTreeMap<String, String>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.0.insert(name.to_ascii_lowercase(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(&name.to_ascii_lowercase())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<const N: usize> From<[(&str, &str); N]> for Headers {
    fn from(pairs: [(&str, &str); N]) -> Self {
        let mut headers = Headers::new();
        for (name, value) in pairs {
            headers.insert(name, value);
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_case_insensitive() {
        let mut headers = Headers::from([("Content-Type", "text/css")]);
        assert_eq!(headers.get("content-type"), Some("text/css"));
        assert!(headers.contains("CONTENT-TYPE"));

        headers.insert("content-type", "text/html");
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("Content-Type"), Some("text/html"));
    }
}
