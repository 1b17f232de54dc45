use futures::future::join_all;
use tracing::{debug, info, warn};

use super::OfflineWorker;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivateReport {
    /// Stale generations removed.
    pub deleted: Vec<String>,
    /// Stale generations that could not be removed and were left behind.
    pub failed: Vec<String>,
    /// Clients taken over after cleanup.
    pub claimed: usize,
}

impl OfflineWorker {
    /// Handle the activate event.
    ///
    /// Deletes every cache container not named by the current generation,
    /// then claims open clients. A container that fails to delete is logged
    /// and left in place.
    pub async fn activate(&self) -> ActivateReport {
        let current = &self.config.cache_name;
        let names = match self.storage.keys().await {
            Ok(names) => names,
            Err(e) => {
                warn!(worker = %self.id, error = %e, "Failed to enumerate caches");
                Vec::new()
            }
        };

        let deletions = names
            .into_iter()
            .filter(|name| name != current)
            .map(|name| async move {
                let result = self.storage.delete(&name).await;
                (name, result)
            });

        let mut report = ActivateReport::default();
        for (name, result) in join_all(deletions).await {
            match result {
                Ok(true) => {
                    debug!(cache = %name, "Deleted stale cache");
                    report.deleted.push(name);
                }
                Ok(false) => debug!(cache = %name, "Stale cache already gone"),
                Err(e) => {
                    warn!(cache = %name, error = %e, "Failed to delete stale cache");
                    report.failed.push(name);
                }
            }
        }

        report.claimed = self.host.claim(self.id).await;
        info!(
            worker = %self.id,
            cache = %current,
            deleted = report.deleted.len(),
            claimed = report.claimed,
            "Activate complete"
        );
        report
    }
}
