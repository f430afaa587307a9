use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::*;
use crate::directory::MockDirectory;
use crate::identity::{mock_admin_identity, MockAuthProvider, Roles};
use crate::store::events::drain;
use crate::store::persist::MemoryStorage;

fn mock_store() -> (SessionStore, Arc<MemoryStorage>, EventBus) {
    let storage = Arc::new(MemoryStorage::new());
    let bus = EventBus::default();
    let core = SessionCore::new(storage.clone(), bus.clone());
    let dir = Arc::new(MockDirectory::seeded(Duration::ZERO));
    let backend = Arc::new(MockAuthProvider::new(dir, Duration::ZERO));
    (SessionStore::new(core, backend), storage, bus)
}

/// Backend whose login answer and delay depend on the username.
struct Scripted;

#[async_trait]
impl AuthBackend for Scripted {
    async fn login(&self, req: &LoginRequest) -> AppResult<AuthGrant> {
        let delay = if req.username.starts_with("slow") { 60 } else { 5 };
        tokio::time::sleep(Duration::from_millis(delay)).await;
        if req.username.ends_with("bad") {
            return Err(AppError::auth("invalid_credentials", ""));
        }
        let mut identity = mock_admin_identity();
        identity.display_name = req.username.clone();
        Ok(AuthGrant { identity, credential: Credential::new(format!("tok-{}", req.username)) })
    }
    async fn register(&self, _req: &RegisterRequest) -> AppResult<AuthGrant> {
        Err(AppError::validation("taken", "Username already taken"))
    }
    async fn update_profile(&self, current: &Identity, patch: &IdentityPatch) -> AppResult<Identity> {
        tokio::time::sleep(Duration::from_millis(30)).await;
        Ok(patch.merged(current))
    }
    async fn change_password(&self, _identity: &Identity, _change: &PasswordChange) -> AppResult<()> { Ok(()) }
}

fn scripted_store() -> (SessionStore, EventBus) {
    let bus = EventBus::default();
    let core = SessionCore::new(Arc::new(MemoryStorage::new()), bus.clone());
    (SessionStore::new(core, Arc::new(Scripted)), bus)
}

#[tokio::test]
async fn login_with_demo_pair_authenticates_and_persists() {
    let (store, storage, bus) = mock_store();
    let mut rx = bus.subscribe();
    let who = store.login("admin", "admin").await.unwrap();
    assert_eq!(who.display_name, "admin");
    assert!(who.roles.contains("admin"));

    let s = store.snapshot();
    assert!(s.authenticated && !s.pending && s.last_error.is_none());
    assert!(s.credential.as_ref().is_some_and(|c| !c.is_empty()));

    let saved = load_session(storage.as_ref()).unwrap().unwrap();
    assert!(saved.authenticated);
    assert_eq!(saved.token, s.credential);

    let phases: Vec<_> = drain(&mut rx)
        .into_iter()
        .filter_map(|e| match e { Event::Session { op: SessionOp::Login, phase, .. } => Some(phase), _ => None })
        .collect();
    assert_eq!(phases, vec![Phase::Pending, Phase::Success]);
}

#[tokio::test]
async fn wrong_password_leaves_anonymous_with_message() {
    let (store, _storage, bus) = mock_store();
    let mut rx = bus.subscribe();
    let err = store.login("admin", "wrong").await.unwrap_err();
    assert_eq!(err.code_str(), "invalid_credentials");
    let s = store.snapshot();
    assert!(!s.authenticated && !s.pending);
    assert!(s.identity.is_none() && s.credential.is_none());
    assert_eq!(s.last_error.as_deref(), Some("Invalid credentials"));
    let failure = drain(&mut rx).into_iter().find_map(|e| match e {
        Event::Session { op: SessionOp::Login, phase: Phase::Failure, error } => error,
        _ => None,
    });
    assert_eq!(failure.as_deref(), Some("Invalid credentials"));
}

#[tokio::test]
async fn failed_login_after_success_drops_previous_identity() {
    let (store, _bus) = scripted_store();
    store.login("alice", "pw").await.unwrap();
    assert!(store.is_authenticated());
    store.login("alice-bad", "pw").await.unwrap_err();
    let s = store.snapshot();
    assert!(!s.authenticated && s.identity.is_none());
    // empty backend message falls back
    assert_eq!(s.last_error.as_deref(), Some(LOGIN_FAILED));
}

#[tokio::test]
async fn retry_after_failure_clears_error() {
    let (store, _storage, bus) = mock_store();
    store.login("admin", "nope").await.unwrap_err();
    assert!(store.snapshot().last_error.is_some());
    let mut rx = bus.subscribe();
    store.login("admin", "admin").await.unwrap();
    assert!(store.snapshot().last_error.is_none());
    let first = drain(&mut rx).into_iter().next();
    assert_eq!(first, Some(Event::Session { op: SessionOp::Login, phase: Phase::Pending, error: None }));
}

#[tokio::test]
async fn register_joins_directory_and_authenticates() {
    let storage = Arc::new(MemoryStorage::new());
    let bus = EventBus::default();
    let dir = Arc::new(MockDirectory::seeded(Duration::ZERO));
    let backend = Arc::new(MockAuthProvider::new(dir.clone(), Duration::ZERO));
    let store = SessionStore::new(SessionCore::new(storage, bus), backend);

    let who = store.register("newbie", "newbie@example.com", "secret1").await.unwrap();
    assert_eq!(who.roles, Roles::parse_csv("user"));
    assert!(store.is_authenticated());
    assert!(dir.snapshot().iter().any(|u| u.id == who.id && u.display_name == "newbie"));
}

#[tokio::test]
async fn register_failure_uses_server_message() {
    let (store, _bus) = scripted_store();
    store.register("x", "x@x.com", "secret1").await.unwrap_err();
    assert_eq!(store.snapshot().last_error.as_deref(), Some("Username already taken"));
    store.clear_error();
    assert!(store.snapshot().last_error.is_none());
}

#[tokio::test]
async fn logout_resets_and_persists_anonymous_slice() {
    let (store, storage, _bus) = mock_store();
    store.login("admin", "admin").await.unwrap();
    store.logout();
    let s = store.snapshot();
    assert!(!s.authenticated && s.identity.is_none() && s.credential.is_none());
    let saved = load_session(storage.as_ref()).unwrap().unwrap();
    assert_eq!(saved, PersistedSession::default());
    // idempotent
    store.logout();
    assert!(!store.is_authenticated());
}

#[tokio::test]
async fn concurrent_logins_apply_in_completion_order() {
    let (store, _bus) = scripted_store();
    let (a, b) = tokio::join!(store.login("slow-first", "pw"), store.login("fast-second", "pw"));
    a.unwrap();
    b.unwrap();
    // slow one completed last and wins
    let s = store.snapshot();
    assert_eq!(s.identity.as_ref().map(|i| i.display_name.as_str()), Some("slow-first"));
    assert_eq!(s.credential.as_ref().map(|c| c.as_str()), Some("tok-slow-first"));
    assert!(s.is_consistent());
}

#[tokio::test]
async fn profile_update_is_dropped_after_logout() {
    let (store, _bus) = scripted_store();
    store.login("alice", "pw").await.unwrap();
    let patch = IdentityPatch { email: Some("new@example.com".into()), ..Default::default() };
    let (res, ()) = tokio::join!(store.update_profile(&patch), async {
        tokio::time::sleep(Duration::from_millis(5)).await;
        store.logout();
    });
    assert_eq!(res.unwrap().email, "new@example.com");
    let s = store.snapshot();
    assert!(!s.authenticated && s.identity.is_none());
}

#[tokio::test]
async fn profile_update_applies_to_current_identity() {
    let (store, _storage, _bus) = mock_store();
    store.login("admin", "admin").await.unwrap();
    let patch = IdentityPatch { email: Some("root@example.com".into()), ..Default::default() };
    store.update_profile(&patch).await.unwrap();
    assert_eq!(store.snapshot().identity.unwrap().email, "root@example.com");
}

#[tokio::test]
async fn anonymous_profile_and_password_calls_are_rejected() {
    let (store, _storage, _bus) = mock_store();
    let err = store.update_profile(&IdentityPatch::default()).await.unwrap_err();
    assert!(err.is_unauthorized());
    assert!(store.change_password("a", "b").await.unwrap_err().is_unauthorized());
}

#[tokio::test]
async fn change_password_failure_records_message() {
    let (store, _storage, _bus) = mock_store();
    store.login("admin", "admin").await.unwrap();
    store.change_password("", "newsecret").await.unwrap_err();
    assert_eq!(store.snapshot().last_error.as_deref(), Some("Current password is required"));
    store.change_password("admin", "newsecret").await.unwrap();
    assert!(store.snapshot().last_error.is_none());
    assert!(store.is_authenticated());
}

#[tokio::test]
async fn restore_rehydrates_from_storage() {
    let (store, storage, _bus) = mock_store();
    store.login("admin", "admin").await.unwrap();
    let token = store.snapshot().credential;

    let fresh = SessionCore::new(storage.clone(), EventBus::default());
    assert!(fresh.restore().unwrap());
    let s = fresh.snapshot();
    assert!(s.authenticated && !s.pending);
    assert_eq!(s.credential, token);
    assert_eq!(s.identity.unwrap().display_name, "admin");
}

#[tokio::test]
async fn evict_clears_session_like_logout() {
    let (store, storage, bus) = mock_store();
    let mut rx = bus.subscribe();
    store.login("admin", "admin").await.unwrap();
    store.core().evict();
    assert!(!store.is_authenticated());
    assert!(store.core().credential().is_none());
    assert!(!load_session(storage.as_ref()).unwrap().unwrap().authenticated);
    assert!(drain(&mut rx)
        .iter()
        .any(|e| matches!(e, Event::Session { op: SessionOp::Evict, phase: Phase::Success, .. })));
}

/// Memory storage that stalls while writing an authenticated slice.
#[derive(Default)]
struct SlowSignedInWrites {
    inner: MemoryStorage,
    stalled: std::sync::atomic::AtomicBool,
}

impl StateStorage for SlowSignedInWrites {
    fn load(&self, key: &str) -> AppResult<Option<String>> { self.inner.load(key) }
    fn save(&self, key: &str, value: &str) -> AppResult<()> {
        if value.contains("\"isAuthenticated\":true") {
            self.stalled.store(true, std::sync::atomic::Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(300));
        }
        self.inner.save(key, value)
    }
    fn remove(&self, key: &str) -> AppResult<()> { self.inner.remove(key) }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn logout_racing_login_save_is_what_lands_on_disk() {
    let storage = Arc::new(SlowSignedInWrites::default());
    let core = SessionCore::new(storage.clone(), EventBus::default());
    let dir = Arc::new(MockDirectory::seeded(Duration::ZERO));
    let store = SessionStore::new(core, Arc::new(MockAuthProvider::new(dir, Duration::ZERO)));

    let login = tokio::spawn({
        let store = store.clone();
        async move { store.login("admin", "admin").await }
    });
    while !storage.stalled.load(std::sync::atomic::Ordering::SeqCst) {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let s = store.clone();
    tokio::task::spawn_blocking(move || s.logout()).await.unwrap();
    login.await.unwrap().unwrap();

    let mem = store.snapshot();
    let disk = load_session(storage.as_ref()).unwrap().unwrap_or_default();
    assert!(!mem.authenticated);
    assert_eq!(disk.authenticated, mem.authenticated);
    assert_eq!(disk.user, mem.identity);
    assert_eq!(disk.token, mem.credential);

    let fresh = SessionCore::new(storage.clone(), EventBus::default());
    assert!(!fresh.restore().unwrap());
}

#[tokio::test]
async fn anonymous_record_with_user_restores_without_identity() {
    let storage = Arc::new(MemoryStorage::new());
    let stale = PersistedSession { user: Some(mock_admin_identity()), token: None, authenticated: false };
    save_session(storage.as_ref(), &stale).unwrap();

    let dir = Arc::new(MockDirectory::seeded(Duration::ZERO));
    let store = SessionStore::new(
        SessionCore::new(storage, EventBus::default()),
        Arc::new(MockAuthProvider::new(dir, Duration::ZERO)),
    );
    assert!(!store.restore().unwrap());
    let s = store.snapshot();
    assert!(s.identity.is_none() && s.credential.is_none());
    assert!(s.is_consistent());

    let patch = IdentityPatch { email: Some("x@example.com".into()), ..Default::default() };
    assert!(store.update_profile(&patch).await.unwrap_err().is_unauthorized());
    assert!(store.change_password("admin", "admin2").await.unwrap_err().is_unauthorized());
}
