use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, warn};

use super::ids::IdGenerator;
use crate::error::{AppError, AppResult};
use crate::identity::{Identity, IdentityDraft, IdentityPatch, Roles};

/// Directory collaborator: CRUD over identities keyed by id.
/// `list` returns the full ordered snapshot.
#[async_trait]
pub trait DirectoryBackend: Send + Sync {
    async fn list(&self) -> AppResult<Vec<Identity>>;
    async fn create(&self, draft: &IdentityDraft) -> AppResult<Identity>;
    /// Unknown ids are accepted and change nothing.
    async fn update(&self, id: &str, patch: &IdentityPatch) -> AppResult<()>;
    /// Unknown ids are accepted and change nothing.
    async fn remove(&self, id: &str) -> AppResult<()>;
}

fn seed_users() -> Vec<Identity> {
    vec![
        IdentityDraft::new("admin", "admin@example.com", Roles::parse_csv("admin")).into_identity("1".into()),
        IdentityDraft::new("user1", "user1@example.com", Roles::parse_csv("user")).into_identity("2".into()),
        IdentityDraft::new("user2", "user2@example.com", Roles::parse_csv("user")).into_identity("3".into()),
    ]
}

/// In-memory user table with simulated latency. Shared by the in-process
/// backends and by the mock API server.
pub struct MockDirectory {
    users: RwLock<Vec<Identity>>,
    ids: IdGenerator,
    latency: Duration,
    offline: AtomicBool,
}

impl MockDirectory {
    /// Table seeded with the three demo users.
    pub fn seeded(latency: Duration) -> Self { Self::with_users(seed_users(), latency) }

    pub fn with_users(users: Vec<Identity>, latency: Duration) -> Self {
        let ids = IdGenerator::new();
        for u in &users { ids.observe(&u.id); }
        Self { users: RwLock::new(users), ids, latency, offline: AtomicBool::new(false) }
    }

    /// While offline every directory call fails with a backend error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
        warn!(target: "directory", offline, "mock directory availability changed");
    }

    pub fn snapshot(&self) -> Vec<Identity> { self.users.read().clone() }

    /// Append a new identity under a fresh id.
    pub fn insert(&self, draft: IdentityDraft) -> Identity {
        let mut users = self.users.write();
        let mut id = self.ids.next_id();
        while users.iter().any(|u| u.id == id) { id = self.ids.next_id(); }
        let identity = draft.into_identity(id);
        users.push(identity.clone());
        debug!(target: "directory", id = %identity.id, "mock insert");
        identity
    }

    pub fn patch(&self, id: &str, patch: &IdentityPatch) -> Option<Identity> {
        let mut users = self.users.write();
        let entry = users.iter_mut().find(|u| u.id == id)?;
        patch.apply(entry);
        Some(entry.clone())
    }

    pub fn delete(&self, id: &str) -> bool {
        let mut users = self.users.write();
        let before = users.len();
        users.retain(|u| u.id != id);
        users.len() != before
    }

    async fn round_trip(&self) -> AppResult<()> {
        if !self.latency.is_zero() { tokio::time::sleep(self.latency).await; }
        if self.offline.load(Ordering::SeqCst) {
            return Err(AppError::backend("backend_unavailable", "Directory backend unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl DirectoryBackend for MockDirectory {
    async fn list(&self) -> AppResult<Vec<Identity>> {
        self.round_trip().await?;
        Ok(self.snapshot())
    }

    async fn create(&self, draft: &IdentityDraft) -> AppResult<Identity> {
        self.round_trip().await?;
        Ok(self.insert(draft.clone()))
    }

    async fn update(&self, id: &str, patch: &IdentityPatch) -> AppResult<()> {
        self.round_trip().await?;
        if self.patch(id, patch).is_none() {
            debug!(target: "directory", id, "mock update for unknown id ignored");
        }
        Ok(())
    }

    async fn remove(&self, id: &str) -> AppResult<()> {
        self.round_trip().await?;
        self.delete(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn seeded_list_has_three_users_in_order() {
        let d = MockDirectory::seeded(Duration::ZERO);
        let users = d.list().await.unwrap();
        let names: Vec<_> = users.iter().map(|u| u.display_name.as_str()).collect();
        assert_eq!(names, vec!["admin", "user1", "user2"]);
    }

    #[tokio::test]
    async fn create_never_reuses_seed_ids() {
        let d = MockDirectory::seeded(Duration::ZERO);
        let created = d.create(&IdentityDraft::new("x", "x@x.com", Roles::new())).await.unwrap();
        assert!(!["1", "2", "3"].contains(&created.id.as_str()));
        assert_eq!(d.snapshot().len(), 4);
    }

    #[tokio::test]
    async fn unknown_ids_are_accepted() {
        let d = MockDirectory::seeded(Duration::ZERO);
        d.update("nope", &IdentityPatch::roles(Roles::parse_csv("admin"))).await.unwrap();
        d.remove("nope").await.unwrap();
        assert_eq!(d.snapshot().len(), 3);
    }

    #[tokio::test]
    async fn offline_fails_every_call() {
        let d = MockDirectory::seeded(Duration::ZERO);
        d.set_offline(true);
        let err = d.list().await.unwrap_err();
        assert_eq!(err.code_str(), "backend_unavailable");
        assert!(d.remove("1").await.is_err());
        assert_eq!(d.snapshot().len(), 3);
    }
}
