//! Event dispatch for a running worker.
//!
//! Lifecycle and fetch events arrive on a channel; each carries a oneshot
//! sender the handler completes with its outcome. Every event runs on its
//! own task, so a slow fetch never holds up unrelated requests.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use super::{ActivateReport, InstallReport, OfflineWorker, WorkerId};
use crate::error::{FetchError, WorkerError};
use crate::http::{Fetcher, Request, Response};

/// Buffer size for the event channel.
/// Senders wait once this many events are queued but not yet dispatched.
const EVENT_BUFFER_SIZE: usize = 64;

pub enum WorkerEvent {
    Install {
        done: oneshot::Sender<InstallReport>,
    },
    Activate {
        done: oneshot::Sender<ActivateReport>,
    },
    Fetch {
        request: Request,
        respond_with: oneshot::Sender<Response>,
    },
}

/// Page-side handle to a running worker.
#[derive(Clone)]
pub struct WorkerHandle {
    id: WorkerId,
    tx: mpsc::Sender<WorkerEvent>,
}

impl WorkerHandle {
    pub fn id(&self) -> WorkerId {
        self.id
    }

    async fn send<T>(&self, event: impl FnOnce(oneshot::Sender<T>) -> WorkerEvent) -> Result<T, WorkerError> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(event(tx))
            .await
            .map_err(|_| WorkerError::Terminated)?;
        rx.await.map_err(|_| WorkerError::Terminated)
    }

    pub async fn install(&self) -> Result<InstallReport, WorkerError> {
        self.send(|done| WorkerEvent::Install { done }).await
    }

    pub async fn activate(&self) -> Result<ActivateReport, WorkerError> {
        self.send(|done| WorkerEvent::Activate { done }).await
    }

    /// Route `request` through the worker, as a controlled page would.
    pub async fn fetch(&self, request: Request) -> Result<Response, WorkerError> {
        self.send(|respond_with| WorkerEvent::Fetch {
            request,
            respond_with,
        })
        .await
    }
}

/// Pages see the worker's error response as a failed fetch.
#[async_trait]
impl Fetcher for WorkerHandle {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        let response = WorkerHandle::fetch(self, request.clone())
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;
        if response.is_error() {
            return Err(FetchError::Network(format!("no response for {}", request.url)));
        }
        Ok(response)
    }
}

/// Start the event loop for `worker`.
///
/// The loop ends once every handle is dropped; the returned task completes
/// after in-flight events and background cache writes have drained.
pub fn spawn_worker(worker: OfflineWorker) -> (WorkerHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(EVENT_BUFFER_SIZE);
    let handle = WorkerHandle { id: worker.id(), tx };
    let task = tokio::spawn(run_event_loop(Arc::new(worker), rx));
    (handle, task)
}

async fn run_event_loop(worker: Arc<OfflineWorker>, mut rx: mpsc::Receiver<WorkerEvent>) {
    debug!(
        worker = %worker.id(),
        origin = %worker.origin(),
        cache = %worker.config().cache_name,
        "Event loop started"
    );
    while let Some(event) = rx.recv().await {
        let handler = Arc::clone(&worker);
        worker.background.spawn(async move {
            dispatch(&handler, event).await;
        });
    }
    worker.background.close();
    worker.background.wait().await;
    debug!(worker = %worker.id(), "Event loop stopped");
}

async fn dispatch(worker: &OfflineWorker, event: WorkerEvent) {
    // A dropped receiver means the page went away; nothing to report to.
    match event {
        WorkerEvent::Install { done } => {
            let _ = done.send(worker.install().await);
        }
        WorkerEvent::Activate { done } => {
            let _ = done.send(worker.activate().await);
        }
        WorkerEvent::Fetch {
            request,
            respond_with,
        } => {
            let response = worker.handle_fetch(&request).await;
            trace!(url = %request.url, status = response.status, "Responded");
            let _ = respond_with.send(response);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheStorage, MemoryCacheStorage};
    use crate::config::WorkerConfig;
    use crate::worker::testing::{get, StubFetcher, ORIGIN};
    use crate::worker::{Registration, WorkerState};
    use url::Url;

    fn spawn(
        fetcher: Arc<StubFetcher>,
        storage: Arc<MemoryCacheStorage>,
        registration: Arc<Registration>,
    ) -> (WorkerHandle, JoinHandle<()>) {
        let config = WorkerConfig {
            static_assets: vec!["/".to_string(), "/manifest.json".to_string()],
            ..Default::default()
        };
        let worker = OfflineWorker::new(
            Url::parse(ORIGIN).unwrap(),
            config,
            storage,
            fetcher,
            registration,
        );
        spawn_worker(worker)
    }

    #[tokio::test]
    async fn test_register_installs_and_activates() {
        let fetcher = Arc::new(StubFetcher::new());
        fetcher.serve("/", crate::http::Response::new(200, "<html>"));
        let storage = Arc::new(MemoryCacheStorage::new());
        storage.open("weather-app-v0").await.unwrap();
        let registration = Arc::new(Registration::new(Url::parse(ORIGIN).unwrap()));
        let page = registration.add_client(Url::parse(ORIGIN).unwrap()).await;

        let (handle, task) = spawn(fetcher, storage.clone(), registration.clone());
        let state = registration.register(&handle).await.unwrap();

        assert_eq!(state, WorkerState::Activated);
        assert_eq!(registration.active().await, Some(handle.id()));
        assert_eq!(registration.controller_of(page).await, Some(handle.id()));
        assert_eq!(storage.keys().await.unwrap(), vec!["weather-app-v1".to_string()]);
        assert_eq!(storage.entries("weather-app-v1").await.unwrap().len(), 1);

        drop(handle);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_register_same_worker_twice_fails() {
        let fetcher = Arc::new(StubFetcher::new());
        let storage = Arc::new(MemoryCacheStorage::new());
        let registration = Arc::new(Registration::new(Url::parse(ORIGIN).unwrap()));
        let (handle, _task) = spawn(fetcher, storage, registration.clone());

        assert_eq!(registration.register(&handle).await, Ok(WorkerState::Activated));
        let err = registration.register(&handle).await.unwrap_err();
        assert!(matches!(err, WorkerError::RegistrationFailed(_)));
        assert_eq!(registration.active().await, Some(handle.id()));
    }

    #[tokio::test]
    async fn test_handle_as_fetcher_maps_error_response() {
        let fetcher = Arc::new(StubFetcher::new());
        let storage = Arc::new(MemoryCacheStorage::new());
        let registration = Arc::new(Registration::new(Url::parse(ORIGIN).unwrap()));
        let (handle, _task) = spawn(fetcher.clone(), storage, registration);

        let api = Request::get(Url::parse("https://api.openweathermap.org/data/2.5/weather?q=Oslo").unwrap());
        let result = Fetcher::fetch(&handle, &api).await;
        assert!(matches!(result, Err(FetchError::Network(_))));

        // Static assets degrade to a 404 response rather than an error
        let response = Fetcher::fetch(&handle, &get("/missing.css")).await.unwrap();
        assert_eq!(response.status, 404);
    }

    #[tokio::test]
    async fn test_shutdown_drains_background_writes() {
        let fetcher = Arc::new(StubFetcher::new());
        let api = "https://api.openweathermap.org/data/2.5/weather?q=Paris";
        fetcher.serve(api, crate::http::Response::new(200, r#"{"name":"Paris"}"#));
        let storage = Arc::new(MemoryCacheStorage::new());
        let registration = Arc::new(Registration::new(Url::parse(ORIGIN).unwrap()));
        let (handle, task) = spawn(fetcher, storage.clone(), registration);

        let request = Request::get(Url::parse(api).unwrap());
        let response = handle.fetch(request.clone()).await.unwrap();
        assert_eq!(response.status, 200);

        drop(handle);
        task.await.unwrap();
        assert!(storage
            .match_request("weather-app-v1", &request)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_handle_after_shutdown_reports_terminated() {
        let fetcher = Arc::new(StubFetcher::new());
        let storage = Arc::new(MemoryCacheStorage::new());
        let registration = Arc::new(Registration::new(Url::parse(ORIGIN).unwrap()));
        let (handle, task) = spawn(fetcher, storage, registration);
        task.abort();
        let _ = task.await;

        assert_eq!(handle.install().await, Err(WorkerError::Terminated));
    }
}
