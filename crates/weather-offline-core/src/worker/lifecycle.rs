//! Worker lifecycle bookkeeping on the hosting side.
//!
//! ```text
//! Registration (scope)
//!     ├── installing  Parsed → Installing
//!     ├── waiting     Installed
//!     ├── active      Activating → Activated
//!     └── clients     open pages, each with an optional controller
//! ```
//!
//! A new version waits behind the active one unless it asked to skip
//! waiting; superseded versions become `Redundant` and release their clients.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use super::{WorkerHandle, WorkerId};
use crate::error::WorkerError;

/// Worker version state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    Redundant,
}

/// Services the hosting runtime offers to a running worker.
#[async_trait]
pub trait WorkerHost: Send + Sync {
    /// Make `worker` eligible for activation as soon as it is installed.
    async fn skip_waiting(&self, worker: WorkerId);

    /// Take control of every uncontrolled client. Returns how many were claimed.
    async fn claim(&self, worker: WorkerId) -> usize;
}

/// Identifier of an open page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(u64);

impl ClientId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone)]
struct Client {
    id: ClientId,
    url: Url,
    controller: Option<WorkerId>,
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    id: WorkerId,
    state: WorkerState,
    skip_waiting: bool,
}

impl Slot {
    fn new(id: WorkerId, state: WorkerState) -> Self {
        Self {
            id,
            state,
            skip_waiting: false,
        }
    }
}

#[derive(Debug, Default)]
struct RegistrationState {
    installing: Option<Slot>,
    waiting: Option<Slot>,
    active: Option<Slot>,
    redundant: Vec<WorkerId>,
    clients: Vec<Client>,
}

impl RegistrationState {
    fn retire(&mut self, slot: Slot) {
        debug!(worker = %slot.id, "Worker is redundant");
        for client in &mut self.clients {
            if client.controller == Some(slot.id) {
                client.controller = None;
            }
        }
        self.redundant.push(slot.id);
    }

    fn slot_mut(&mut self, id: WorkerId) -> Option<&mut Slot> {
        [&mut self.installing, &mut self.waiting, &mut self.active]
            .into_iter()
            .flatten()
            .find(|slot| slot.id == id)
    }
}

/// Registration of worker versions for one scope.
pub struct Registration {
    scope: Url,
    state: Mutex<RegistrationState>,
}

impl Registration {
    pub fn new(scope: Url) -> Self {
        Self {
            scope,
            state: Mutex::new(RegistrationState::default()),
        }
    }

    pub fn scope(&self) -> &Url {
        &self.scope
    }

    fn in_scope(&self, url: &Url) -> bool {
        url.origin() == self.scope.origin() && url.path().starts_with(self.scope.path())
    }

    /// Install `handle`'s worker and activate it when eligible.
    ///
    /// Returns the state the worker ended in: `Activated`, or `Installed` if
    /// it has to wait for the current version to go away. A worker can only
    /// be registered once.
    pub async fn register(&self, handle: &WorkerHandle) -> Result<WorkerState, WorkerError> {
        let id = handle.id();
        if let Some(state) = self.state_of(id).await {
            return Err(WorkerError::RegistrationFailed(format!(
                "{} already registered ({:?})",
                id, state
            )));
        }
        self.begin_install(id).await;
        let report = handle.install().await?;
        debug!(worker = %id, cached = report.cached.len(), failed = report.failed.len(), "Installed");

        if !self.install_finished(id).await {
            info!(worker = %id, "Installed, waiting for the active worker to be released");
            return Ok(WorkerState::Installed);
        }

        self.begin_activate(id).await;
        let report = handle.activate().await?;
        self.activate_finished(id).await;
        info!(worker = %id, deleted = report.deleted.len(), claimed = report.claimed, "Activated");
        Ok(WorkerState::Activated)
    }

    pub async fn begin_install(&self, id: WorkerId) {
        let mut state = self.state.lock().await;
        if let Some(previous) = state.installing.replace(Slot::new(id, WorkerState::Installing)) {
            state.retire(previous);
        }
    }

    /// Move the installing worker to waiting. Returns whether it may activate now.
    pub async fn install_finished(&self, id: WorkerId) -> bool {
        let mut state = self.state.lock().await;
        let mut slot = match state.installing.take() {
            Some(slot) if slot.id == id => slot,
            other => {
                state.installing = other;
                warn!(worker = %id, "Install finished for a worker that is not installing");
                return false;
            }
        };
        slot.state = WorkerState::Installed;
        if let Some(previous) = state.waiting.replace(slot) {
            state.retire(previous);
        }
        slot.skip_waiting || state.active.is_none()
    }

    /// Promote the waiting worker to active, retiring the previous one.
    pub async fn begin_activate(&self, id: WorkerId) -> Option<WorkerId> {
        let mut state = self.state.lock().await;
        let mut slot = match state.waiting.take() {
            Some(slot) if slot.id == id => slot,
            other => {
                state.waiting = other;
                warn!(worker = %id, "Activation requested for a worker that is not waiting");
                return None;
            }
        };
        slot.state = WorkerState::Activating;
        let previous = state.active.replace(slot);
        previous.map(|previous| {
            state.retire(previous);
            previous.id
        })
    }

    pub async fn activate_finished(&self, id: WorkerId) {
        let mut state = self.state.lock().await;
        match state.active.as_mut() {
            Some(slot) if slot.id == id => slot.state = WorkerState::Activated,
            _ => warn!(worker = %id, "Activation finished for a worker that is not active"),
        }
    }

    pub async fn state_of(&self, id: WorkerId) -> Option<WorkerState> {
        let mut state = self.state.lock().await;
        if let Some(slot) = state.slot_mut(id) {
            return Some(slot.state);
        }
        state
            .redundant
            .contains(&id)
            .then_some(WorkerState::Redundant)
    }

    pub async fn active(&self) -> Option<WorkerId> {
        self.state.lock().await.active.map(|slot| slot.id)
    }

    pub async fn waiting(&self) -> Option<WorkerId> {
        self.state.lock().await.waiting.map(|slot| slot.id)
    }

    /// Open a page. It is controlled by the activated worker when in scope.
    pub async fn add_client(&self, url: Url) -> ClientId {
        let in_scope = self.in_scope(&url);
        let mut state = self.state.lock().await;
        let controller = state
            .active
            .filter(|slot| in_scope && slot.state == WorkerState::Activated)
            .map(|slot| slot.id);
        let id = ClientId::next();
        state.clients.push(Client { id, url, controller });
        id
    }

    pub async fn controller_of(&self, id: ClientId) -> Option<WorkerId> {
        self.state
            .lock()
            .await
            .clients
            .iter()
            .find(|c| c.id == id)
            .and_then(|c| c.controller)
    }
}

#[async_trait]
impl WorkerHost for Registration {
    async fn skip_waiting(&self, worker: WorkerId) {
        match self.state.lock().await.slot_mut(worker) {
            Some(slot) => slot.skip_waiting = true,
            None => debug!(worker = %worker, "skip_waiting from an unregistered worker"),
        }
    }

    async fn claim(&self, worker: WorkerId) -> usize {
        let mut state = self.state.lock().await;
        if state.active.map(|slot| slot.id) != Some(worker) {
            debug!(worker = %worker, "Only the active worker can claim clients");
            return 0;
        }
        let mut claimed = 0;
        for client in &mut state.clients {
            if client.controller.is_none() && self.in_scope(&client.url) {
                client.controller = Some(worker);
                claimed += 1;
            }
        }
        claimed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration() -> Registration {
        Registration::new(Url::parse("http://localhost:3000/").unwrap())
    }

    async fn activate(reg: &Registration, id: WorkerId) {
        reg.begin_install(id).await;
        reg.install_finished(id).await;
        reg.begin_activate(id).await;
        reg.activate_finished(id).await;
    }

    #[tokio::test]
    async fn test_first_worker_activates_without_waiting() {
        let reg = registration();
        let id = WorkerId::next();
        reg.begin_install(id).await;
        assert_eq!(reg.state_of(id).await, Some(WorkerState::Installing));
        assert!(reg.install_finished(id).await);

        reg.begin_activate(id).await;
        assert_eq!(reg.state_of(id).await, Some(WorkerState::Activating));
        reg.activate_finished(id).await;
        assert_eq!(reg.state_of(id).await, Some(WorkerState::Activated));
        assert_eq!(reg.active().await, Some(id));
    }

    #[tokio::test]
    async fn test_new_version_waits_unless_skip_waiting() {
        let reg = registration();
        let old = WorkerId::next();
        activate(&reg, old).await;

        let patient = WorkerId::next();
        reg.begin_install(patient).await;
        assert!(!reg.install_finished(patient).await);
        assert_eq!(reg.waiting().await, Some(patient));

        let eager = WorkerId::next();
        reg.begin_install(eager).await;
        reg.skip_waiting(eager).await;
        assert!(reg.install_finished(eager).await);
        assert_eq!(reg.state_of(patient).await, Some(WorkerState::Redundant));

        assert_eq!(reg.begin_activate(eager).await, Some(old));
        assert_eq!(reg.state_of(old).await, Some(WorkerState::Redundant));
    }

    #[tokio::test]
    async fn test_claim_takes_uncontrolled_clients() {
        let reg = registration();
        let page = reg.add_client(Url::parse("http://localhost:3000/").unwrap()).await;
        let other_site = reg.add_client(Url::parse("https://example.com/").unwrap()).await;
        assert_eq!(reg.controller_of(page).await, None);

        let id = WorkerId::next();
        activate(&reg, id).await;
        assert_eq!(reg.claim(id).await, 1);
        assert_eq!(reg.controller_of(page).await, Some(id));
        assert_eq!(reg.controller_of(other_site).await, None);

        let later = reg.add_client(Url::parse("http://localhost:3000/about").unwrap()).await;
        assert_eq!(reg.controller_of(later).await, Some(id));
    }

    #[tokio::test]
    async fn test_replacement_releases_and_reclaims_clients() {
        let reg = registration();
        let old = WorkerId::next();
        activate(&reg, old).await;
        let page = reg.add_client(Url::parse("http://localhost:3000/").unwrap()).await;
        assert_eq!(reg.controller_of(page).await, Some(old));

        let new = WorkerId::next();
        reg.begin_install(new).await;
        reg.skip_waiting(new).await;
        reg.install_finished(new).await;
        reg.begin_activate(new).await;
        assert_eq!(reg.controller_of(page).await, None);

        assert_eq!(reg.claim(new).await, 1);
        assert_eq!(reg.controller_of(page).await, Some(new));
        assert_eq!(reg.claim(old).await, 0);
    }
}
