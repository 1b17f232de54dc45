use std::collections::BTreeMap;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::CacheError;
use crate::http::{Headers, Request, Response};

/// HTTP status that may never be stored.
const PARTIAL_CONTENT: u16 = 206;

/// Marker stored in the vary map for `Vary: *`.
const VARY_ANY: &str = "*";

/// Request identity used as the key inside a cache container.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey {
    pub method: String,
    pub url: String,
}

impl CacheKey {
    pub fn from_request(request: &Request) -> Self {
        let mut url = request.url.clone();
        url.set_fragment(None);
        Self {
            method: request.method.as_str().to_string(),
            url: url.to_string(),
        }
    }

    /// Stable file-name-safe digest of the key.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.method.as_bytes());
        hasher.update(b" ");
        hasher.update(self.url.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// A response snapshot stored in a cache container.
///
/// The body is kept out of the serialized form; storages persist it next to
/// the metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedResponse {
    pub key: CacheKey,
    pub status: u16,
    pub headers: Headers,
    /// Request header values captured for each name listed in `Vary`.
    #[serde(default)]
    pub vary: BTreeMap<String, Option<String>>,
    pub has_body: bool,
    pub cached_at: DateTime<Utc>,
    #[serde(skip)]
    pub body: Option<Bytes>,
}

impl CachedResponse {
    /// Snapshot `response` for `request`, rejecting what may not be cached.
    pub fn new(request: &Request, response: &Response) -> Result<Self, CacheError> {
        if request.method != Method::GET {
            return Err(CacheError::UnsupportedMethod(request.method.to_string()));
        }
        if response.status == PARTIAL_CONTENT {
            return Err(CacheError::PartialResponse(request.url.to_string()));
        }

        let vary = response
            .headers
            .get("vary")
            .map(|value| {
                value
                    .split(',')
                    .map(|name| name.trim().to_ascii_lowercase())
                    .filter(|name| !name.is_empty())
                    .map(|name| {
                        let captured = request.headers.get(&name).map(str::to_string);
                        (name, captured)
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            key: CacheKey::from_request(request),
            status: response.status,
            headers: response.headers.clone(),
            vary,
            has_body: response.body.is_some(),
            cached_at: Utc::now(),
            body: response.body.clone(),
        })
    }

    /// Whether this entry answers `request`, honoring the captured `Vary` headers.
    pub fn matches(&self, request: &Request) -> bool {
        if request.method != Method::GET || CacheKey::from_request(request) != self.key {
            return false;
        }
        if self.vary.contains_key(VARY_ANY) {
            return false;
        }
        self.vary
            .iter()
            .all(|(name, captured)| request.headers.get(name) == captured.as_deref())
    }

    pub fn to_response(&self) -> Response {
        Response {
            status: self.status,
            headers: self.headers.clone(),
            body: self.body.clone(),
            kind: Default::default(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        let now = Utc::now();
        (now - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            let remaining_mins = minutes % 60;
            if remaining_mins >= 30 {
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            let remaining_hours = (minutes % 1440) / 60;
            if remaining_hours >= 12 {
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }
}
