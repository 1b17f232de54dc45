use futures::future::join_all;
use thiserror::Error;
use tracing::{info, warn};

use super::OfflineWorker;
use crate::error::{CacheError, FetchError};
use crate::http::{CacheMode, Request};

/// Outcome of one install run. Callers never see per-asset errors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub cached: Vec<String>,
    pub failed: Vec<String>,
}

#[derive(Error, Debug)]
enum AssetError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Bad response status {0}")]
    BadStatus(u16),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl OfflineWorker {
    /// Handle the install event.
    ///
    /// Every static asset is fetched and stored independently and
    /// concurrently; failures are logged and skipped. Once all attempts have
    /// settled the worker asks the host to skip waiting.
    pub async fn install(&self) -> InstallReport {
        let cache_name = &self.config.cache_name;
        if let Err(e) = self.storage.open(cache_name).await {
            warn!(cache = %cache_name, error = %e, "Failed to open cache");
        }

        let attempts = self.config.static_assets.iter().map(|asset| async move {
            let result = self.cache_asset(asset).await;
            (asset, result)
        });

        let mut report = InstallReport::default();
        for (asset, result) in join_all(attempts).await {
            match result {
                Ok(()) => report.cached.push(asset.clone()),
                Err(e) => {
                    warn!(worker = %self.id, asset = %asset, error = %e, "Failed to cache");
                    report.failed.push(asset.clone());
                }
            }
        }

        info!(
            worker = %self.id,
            cache = %cache_name,
            cached = report.cached.len(),
            failed = report.failed.len(),
            "Install complete"
        );

        self.host.skip_waiting(self.id).await;
        report
    }

    async fn cache_asset(&self, asset: &str) -> Result<(), AssetError> {
        let request = Request::get(self.resolve(asset)?);
        let response = self
            .fetcher
            .fetch(&request.clone().with_cache_mode(CacheMode::NoCache))
            .await?;
        if !response.is_ok() {
            return Err(AssetError::BadStatus(response.status));
        }
        self.storage
            .put(&self.config.cache_name, &request, &response)
            .await?;
        Ok(())
    }
}
