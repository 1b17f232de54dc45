//! Per-request routing policy.
//!
//! Branches, checked in order:
//! 1. `DataApi`: network first, refresh the cache in the background, fall
//!    back to the last cached answer
//! 2. `Navigation`: network first, fall back to the cached offline page
//! 3. `StaticAsset`: cache first, then network, then a synthesized 404

use std::sync::Arc;

use tracing::{debug, warn};

use super::OfflineWorker;
use crate::config::WorkerConfig;
use crate::error::CacheError;
use crate::http::{Request, Response};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    DataApi,
    Navigation,
    StaticAsset,
}

/// Classify an intercepted request. Pure: depends only on the request and config.
pub fn classify(request: &Request, config: &WorkerConfig) -> RequestClass {
    if config.is_api_url(&request.url) {
        RequestClass::DataApi
    } else if request.is_navigation() {
        RequestClass::Navigation
    } else {
        RequestClass::StaticAsset
    }
}

impl OfflineWorker {
    /// Handle one fetch event. Never fails: the worst case is an error or 404 response.
    pub async fn handle_fetch(&self, request: &Request) -> Response {
        let class = classify(request, &self.config);
        debug!(url = %request.url, ?class, "Routing request");
        match class {
            RequestClass::DataApi => self.network_first_refresh(request).await,
            RequestClass::Navigation => self.network_first_offline_page(request).await,
            RequestClass::StaticAsset => self.cache_first(request).await,
        }
    }

    async fn network_first_refresh(&self, request: &Request) -> Response {
        match self.fetcher.fetch(request).await {
            Ok(response) => {
                self.store_in_background(request.clone(), response.clone());
                response
            }
            Err(e) => {
                debug!(url = %request.url, error = %e, "API fetch failed, trying cache");
                self.lookup(request).await.unwrap_or_else(Response::error)
            }
        }
    }

    async fn network_first_offline_page(&self, request: &Request) -> Response {
        match self.fetcher.fetch(request).await {
            Ok(response) => response,
            Err(e) => {
                debug!(url = %request.url, error = %e, "Navigation failed, serving offline page");
                let offline = match self.resolve(&self.config.offline_url) {
                    Ok(url) => Request::get(url),
                    Err(e) => {
                        warn!(offline_url = %self.config.offline_url, error = %e, "Invalid offline URL");
                        return Response::error();
                    }
                };
                self.lookup(&offline).await.unwrap_or_else(Response::error)
            }
        }
    }

    async fn cache_first(&self, request: &Request) -> Response {
        if let Some(cached) = self.lookup(request).await {
            return cached;
        }
        match self.fetcher.fetch(request).await {
            Ok(response) => response,
            Err(e) => {
                debug!(url = %request.url, error = %e, "Asset unavailable");
                Response::not_found()
            }
        }
    }

    /// Cache lookup in the current generation. Read errors count as a miss.
    async fn lookup(&self, request: &Request) -> Option<Response> {
        match self
            .storage
            .match_request(&self.config.cache_name, request)
            .await
        {
            Ok(found) => found,
            Err(e) => {
                warn!(url = %request.url, error = %e, "Cache lookup failed");
                None
            }
        }
    }

    /// Store a copy without delaying the response to the page.
    fn store_in_background(&self, request: Request, response: Response) {
        let storage = Arc::clone(&self.storage);
        let cache_name = self.config.cache_name.clone();
        self.background.spawn(async move {
            let result = async {
                storage.open(&cache_name).await?;
                storage.put(&cache_name, &request, &response).await?;
                Ok::<(), CacheError>(())
            }
            .await;
            if let Err(e) = result {
                warn!(url = %request.url, error = %e, "Failed to cache API response");
            }
        });
    }
}
