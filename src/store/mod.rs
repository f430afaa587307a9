//! Application state container.
//!
//! [`AppStore`] is built explicitly and passed by reference to the view
//! layer. It owns the session and directory stores and the event bus they
//! publish on.

pub mod directory;
pub mod events;
pub mod persist;
pub mod session;

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::client::{ApiClient, HttpAuthBackend, HttpDirectoryBackend, HttpTransport};
use crate::config::Config;
use crate::directory::MockDirectory;
use crate::error::AppResult;
use crate::identity::MockAuthProvider;

pub use directory::{DirectoryState, DirectoryStore};
pub use events::{Event, EventBus};
pub use persist::{FileStorage, MemoryStorage, StateStorage};
pub use session::{SessionCore, SessionState, SessionStore};

#[derive(Clone)]
pub struct AppStore {
    bus: EventBus,
    session: SessionStore,
    directory: DirectoryStore,
    backend_desc: String,
}

impl AppStore {
    /// In-process mock backends sharing one user table.
    pub fn mock(latency: Duration, storage: Arc<dyn StateStorage>) -> Self {
        let bus = EventBus::default();
        let table = Arc::new(MockDirectory::seeded(latency));
        let core = SessionCore::new(storage, bus.clone());
        let session = SessionStore::new(core, Arc::new(MockAuthProvider::new(table.clone(), latency)));
        let directory = DirectoryStore::new(table, bus.clone());
        Self { bus, session, directory, backend_desc: "mock".into() }
    }

    /// Backends reached through the HTTP client adapter.
    pub fn remote(base: &str, timeout: Duration, storage: Arc<dyn StateStorage>) -> AppResult<Self> {
        let transport = HttpTransport::new(base, timeout)?;
        Ok(Self::with_transport(Arc::new(transport), storage))
    }

    pub fn with_transport(transport: Arc<dyn crate::client::Transport>, storage: Arc<dyn StateStorage>) -> Self {
        let bus = EventBus::default();
        let core = SessionCore::new(storage, bus.clone());
        let api = ApiClient::new(transport, Arc::new(core.clone()), bus.clone());
        let backend_desc = api.describe();
        let session = SessionStore::new(core, Arc::new(HttpAuthBackend::new(api.clone())));
        let directory = DirectoryStore::new(Arc::new(HttpDirectoryBackend::new(api)), bus.clone());
        Self { bus, session, directory, backend_desc }
    }

    /// Pick mock or remote from configuration, with file-backed persistence
    /// under the state directory.
    pub fn from_config(cfg: &Config) -> AppResult<Self> {
        let storage: Arc<dyn StateStorage> = Arc::new(FileStorage::new(&cfg.state_dir));
        let store = match cfg.api_base.as_deref() {
            Some(base) => Self::remote(base, cfg.timeout, storage)?,
            None => Self::mock(cfg.latency, storage),
        };
        info!(target: "startup", backend = %store.backend_desc, state_dir = %cfg.state_dir.display(), "store ready");
        Ok(store)
    }

    pub fn bus(&self) -> &EventBus { &self.bus }
    pub fn session(&self) -> &SessionStore { &self.session }
    pub fn directory(&self) -> &DirectoryStore { &self.directory }
    pub fn backend_desc(&self) -> &str { &self.backend_desc }
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> { self.bus.subscribe() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn logout_leaves_roster_intact() {
        let app = AppStore::mock(Duration::ZERO, Arc::new(MemoryStorage::new()));
        app.session().login("admin", "admin").await.unwrap();
        app.directory().list().await.unwrap();
        let roster = app.directory().roster();
        assert_eq!(roster.len(), 3);

        app.session().logout();
        let s = app.session().snapshot();
        assert!(!s.authenticated && s.identity.is_none() && s.credential.is_none());
        assert_eq!(app.directory().roster(), roster);
    }

    #[tokio::test]
    async fn registered_identity_shows_up_in_directory() {
        let app = AppStore::mock(Duration::ZERO, Arc::new(MemoryStorage::new()));
        app.directory().list().await.unwrap();
        let existing: Vec<String> = app.directory().roster().into_iter().map(|u| u.id).collect();
        let me = app.session().register("carol", "carol@example.com", "secret1").await.unwrap();
        assert!(!existing.contains(&me.id));
        app.directory().list().await.unwrap();
        assert!(app.directory().get(&me.id).is_some());
    }

    #[test]
    fn remote_rejects_bad_base() {
        let err = AppStore::remote("::nope::", Duration::from_secs(1), Arc::new(MemoryStorage::new())).err();
        assert!(err.is_some());
    }
}
