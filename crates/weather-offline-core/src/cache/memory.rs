use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{CacheKey, CacheStorage, CachedResponse};
use crate::error::CacheError;
use crate::http::{Request, Response};

/// In-process cache storage. Contents live as long as the value.
#[derive(Debug, Default)]
pub struct MemoryCacheStorage {
    containers: RwLock<Vec<(String, HashMap<CacheKey, CachedResponse>)>>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn open(&self, name: &str) -> Result<(), CacheError> {
        let mut containers = self.containers.write().await;
        if !containers.iter().any(|(n, _)| n == name) {
            containers.push((name.to_string(), HashMap::new()));
        }
        Ok(())
    }

    async fn has(&self, name: &str) -> Result<bool, CacheError> {
        Ok(self.containers.read().await.iter().any(|(n, _)| n == name))
    }

    async fn keys(&self) -> Result<Vec<String>, CacheError> {
        Ok(self
            .containers
            .read()
            .await
            .iter()
            .map(|(n, _)| n.clone())
            .collect())
    }

    async fn delete(&self, name: &str) -> Result<bool, CacheError> {
        let mut containers = self.containers.write().await;
        let before = containers.len();
        containers.retain(|(n, _)| n != name);
        Ok(containers.len() != before)
    }

    async fn put(&self, name: &str, request: &Request, response: &Response) -> Result<(), CacheError> {
        let entry = CachedResponse::new(request, response)?;
        let mut containers = self.containers.write().await;
        let (_, entries) = containers
            .iter_mut()
            .find(|(n, _)| n == name)
            .ok_or_else(|| CacheError::NotFound(name.to_string()))?;
        entries.insert(entry.key.clone(), entry);
        Ok(())
    }

    async fn match_request(&self, name: &str, request: &Request) -> Result<Option<Response>, CacheError> {
        let containers = self.containers.read().await;
        let found = containers
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, entries)| entries.get(&CacheKey::from_request(request)))
            .filter(|entry| entry.matches(request))
            .map(CachedResponse::to_response);
        Ok(found)
    }

    async fn entries(&self, name: &str) -> Result<Vec<CachedResponse>, CacheError> {
        let containers = self.containers.read().await;
        let (_, entries) = containers
            .iter()
            .find(|(n, _)| n == name)
            .ok_or_else(|| CacheError::NotFound(name.to_string()))?;
        let mut list: Vec<CachedResponse> = entries.values().cloned().collect();
        list.sort_by_key(|e| e.cached_at);
        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn get(path: &str) -> Request {
        Request::get(Url::parse("http://localhost:3000/").unwrap().join(path).unwrap())
    }

    #[tokio::test]
    async fn test_open_put_match() {
        let storage = MemoryCacheStorage::new();
        storage.open("v1").await.unwrap();
        storage.open("v1").await.unwrap();
        assert_eq!(storage.keys().await.unwrap(), vec!["v1".to_string()]);

        let response = Response::new(200, "body { }").with_header("content-type", "text/css");
        storage.put("v1", &get("/app.css"), &response).await.unwrap();

        let hit = storage.match_request("v1", &get("/app.css")).await.unwrap();
        assert_eq!(hit, Some(response));
        assert!(storage.match_request("v1", &get("/other.css")).await.unwrap().is_none());
        assert!(storage.match_request("v0", &get("/app.css")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_into_missing_container_fails() {
        let storage = MemoryCacheStorage::new();
        let err = storage
            .put("v1", &get("/"), &Response::new(200, "<html>"))
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_overwrite_keeps_single_entry() {
        let storage = MemoryCacheStorage::new();
        storage.open("v1").await.unwrap();
        storage.put("v1", &get("/"), &Response::new(200, "old")).await.unwrap();
        storage.put("v1", &get("/"), &Response::new(200, "new")).await.unwrap();

        let entries = storage.entries("v1").await.unwrap();
        assert_eq!(entries.len(), 1);
        let hit = storage.match_request("v1", &get("/")).await.unwrap().unwrap();
        assert_eq!(hit.text(), "new");
    }

    #[tokio::test]
    async fn test_delete_and_keys_order() {
        let storage = MemoryCacheStorage::new();
        storage.open("weather-app-v0").await.unwrap();
        storage.open("weather-app-v1").await.unwrap();
        storage.open("other").await.unwrap();

        assert!(storage.delete("weather-app-v0").await.unwrap());
        assert!(!storage.delete("weather-app-v0").await.unwrap());
        assert_eq!(
            storage.keys().await.unwrap(),
            vec!["weather-app-v1".to_string(), "other".to_string()]
        );
    }
}
