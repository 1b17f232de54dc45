//! The offline worker: cache lifecycle and request routing.
//!
//! A worker version goes through three kinds of events:
//! - install: pre-populate the current cache generation with static assets
//! - activate: delete every other cache generation, then claim open clients
//! - fetch: route one intercepted request (network-first for the weather API
//!   and navigations, cache-first for everything else)
//!
//! `OfflineWorker` holds no state across events besides its handles; the
//! cache containers behind `CacheStorage` are the only persistent state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio_util::task::TaskTracker;
use url::Url;

use crate::cache::CacheStorage;
use crate::config::WorkerConfig;
use crate::error::FetchError;
use crate::http::{Fetcher, Request};

pub mod activate;
pub mod events;
pub mod install;
pub mod lifecycle;
pub mod router;

pub use activate::ActivateReport;
pub use events::{spawn_worker, WorkerEvent, WorkerHandle};
pub use install::InstallReport;
pub use lifecycle::{ClientId, Registration, WorkerHost, WorkerState};
pub use router::{classify, RequestClass};

/// Unique identifier for a worker version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkerId(u64);

impl WorkerId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

pub struct OfflineWorker {
    id: WorkerId,
    origin: Url,
    config: WorkerConfig,
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    host: Arc<dyn WorkerHost>,
    /// Detached cache writes started by the router.
    background: TaskTracker,
}

impl OfflineWorker {
    pub fn new(
        origin: Url,
        config: WorkerConfig,
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
        host: Arc<dyn WorkerHost>,
    ) -> Self {
        Self {
            id: WorkerId::next(),
            origin,
            config,
            storage,
            fetcher,
            host,
            background: TaskTracker::new(),
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    fn resolve(&self, target: &str) -> Result<Url, FetchError> {
        Request::resolve(&self.origin, target)
    }

    /// Wait until every detached cache write started so far has finished.
    #[cfg(test)]
    pub(crate) async fn wait_for_background(&self) {
        self.background.close();
        self.background.wait().await;
        self.background.reopen();
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Test doubles for driving a worker without a network.

    use std::collections::{HashMap, HashSet};
    use std::io;
    use std::sync::atomic::AtomicBool;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::cache::{CachedResponse, MemoryCacheStorage};
    use crate::error::CacheError;
    use crate::http::Response;

    pub const ORIGIN: &str = "http://localhost:3000/";

    /// Serves canned responses by URL; anything unknown is a network failure.
    #[derive(Default)]
    pub struct StubFetcher {
        responses: Mutex<HashMap<String, Response>>,
        calls: Mutex<Vec<Request>>,
    }

    impl StubFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn serve(&self, url: &str, response: Response) {
            let url = Request::resolve(&Url::parse(ORIGIN).unwrap(), url).unwrap();
            self.responses.lock().unwrap().insert(url.to_string(), response);
        }

        pub fn go_offline(&self) {
            self.responses.lock().unwrap().clear();
        }

        pub fn calls(&self) -> Vec<Request> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Fetcher for StubFetcher {
        async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
            self.calls.lock().unwrap().push(request.clone());
            self.responses
                .lock()
                .unwrap()
                .get(request.url.as_str())
                .cloned()
                .ok_or_else(|| FetchError::Network(format!("unreachable: {}", request.url)))
        }
    }

    /// In-memory storage whose `open`, `put` and `delete` can be made to fail.
    #[derive(Default)]
    pub struct FailingStorage {
        inner: MemoryCacheStorage,
        fail_open: AtomicBool,
        fail_put: AtomicBool,
        fail_delete: Mutex<HashSet<String>>,
    }

    impl FailingStorage {
        pub fn fail_open(&self) {
            self.fail_open.store(true, Ordering::SeqCst);
        }

        pub fn fail_put(&self) {
            self.fail_put.store(true, Ordering::SeqCst);
        }

        pub fn fail_delete_of(&self, name: &str) {
            self.fail_delete.lock().unwrap().insert(name.to_string());
        }

        fn denied(op: &str, name: &str) -> CacheError {
            CacheError::Io(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("{} {} denied", op, name),
            ))
        }
    }

    #[async_trait]
    impl CacheStorage for FailingStorage {
        async fn open(&self, name: &str) -> Result<(), CacheError> {
            if self.fail_open.load(Ordering::SeqCst) {
                return Err(Self::denied("open", name));
            }
            self.inner.open(name).await
        }

        async fn has(&self, name: &str) -> Result<bool, CacheError> {
            self.inner.has(name).await
        }

        async fn keys(&self) -> Result<Vec<String>, CacheError> {
            self.inner.keys().await
        }

        async fn delete(&self, name: &str) -> Result<bool, CacheError> {
            if self.fail_delete.lock().unwrap().contains(name) {
                return Err(Self::denied("delete", name));
            }
            self.inner.delete(name).await
        }

        async fn put(&self, name: &str, request: &Request, response: &Response) -> Result<(), CacheError> {
            if self.fail_put.load(Ordering::SeqCst) {
                return Err(Self::denied("put", name));
            }
            self.inner.put(name, request, response).await
        }

        async fn match_request(&self, name: &str, request: &Request) -> Result<Option<Response>, CacheError> {
            self.inner.match_request(name, request).await
        }

        async fn entries(&self, name: &str) -> Result<Vec<CachedResponse>, CacheError> {
            self.inner.entries(name).await
        }
    }

    pub struct Harness {
        pub worker: Arc<OfflineWorker>,
        pub storage: Arc<FailingStorage>,
        pub fetcher: Arc<StubFetcher>,
        pub registration: Arc<Registration>,
    }

    pub fn harness(config: WorkerConfig) -> Harness {
        let origin = Url::parse(ORIGIN).unwrap();
        let storage = Arc::new(FailingStorage::default());
        let fetcher = Arc::new(StubFetcher::new());
        let registration = Arc::new(Registration::new(origin.clone()));
        let worker = Arc::new(OfflineWorker::new(
            origin,
            config,
            storage.clone(),
            fetcher.clone(),
            registration.clone(),
        ));
        Harness {
            worker,
            storage,
            fetcher,
            registration,
        }
    }

    pub fn get(path: &str) -> Request {
        Request::get(Request::resolve(&Url::parse(ORIGIN).unwrap(), path).unwrap())
    }
}
