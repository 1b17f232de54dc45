use async_trait::async_trait;

use super::CachedResponse;
use crate::error::CacheError;
use crate::http::{Request, Response};

/// A set of named cache containers.
///
/// Each container maps a request identity to one stored response; writing
/// the same key again replaces the previous entry. Implementations serialize
/// access per key but do not order concurrent writers.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Open the container `name`, creating it empty if absent.
    async fn open(&self, name: &str) -> Result<(), CacheError>;

    async fn has(&self, name: &str) -> Result<bool, CacheError>;

    /// Container names in creation order.
    async fn keys(&self) -> Result<Vec<String>, CacheError>;

    /// Delete the container `name`. Returns false if it did not exist.
    async fn delete(&self, name: &str) -> Result<bool, CacheError>;

    /// Store `response` under `request` in the existing container `name`.
    async fn put(&self, name: &str, request: &Request, response: &Response) -> Result<(), CacheError>;

    /// Look up `request` in `name`. A missing container is a miss.
    async fn match_request(&self, name: &str, request: &Request) -> Result<Option<Response>, CacheError>;

    /// Every entry of `name`, oldest first.
    async fn entries(&self, name: &str) -> Result<Vec<CachedResponse>, CacheError>;
}
