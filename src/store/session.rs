//! Session store: the current client's authentication context.
//!
//! State lives in a [`SessionCore`] that is cheap to clone. The HTTP client
//! adapter holds one so it can read the credential and evict the session on a
//! 401 without depending on the store's backend. Every state change writes the
//! persisted slice synchronously and publishes a session event.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, error, info, warn};

use super::events::{Event, EventBus, Phase, SessionOp};
use super::persist::{load_session, save_session, PersistedSession, StateStorage};
use crate::client::SessionGate;
use crate::error::{AppError, AppResult};
use crate::identity::{
    AuthBackend, AuthGrant, Credential, Identity, IdentityPatch, LoginRequest, PasswordChange, RegisterRequest,
};

pub const LOGIN_FAILED: &str = "Login failed";
pub const REGISTRATION_FAILED: &str = "Registration failed";
pub const PROFILE_UPDATE_FAILED: &str = "Profile update failed";
pub const PASSWORD_CHANGE_FAILED: &str = "Password change failed";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub identity: Option<Identity>,
    pub credential: Option<Credential>,
    pub authenticated: bool,
    pub pending: bool,
    pub last_error: Option<String>,
}

impl SessionState {
    /// `authenticated` holds exactly when both identity and credential do.
    pub fn is_consistent(&self) -> bool {
        self.authenticated == (self.identity.is_some() && self.credential.is_some())
    }

    fn establish(&mut self, grant: AuthGrant) {
        self.identity = Some(grant.identity);
        self.credential = Some(grant.credential);
        self.authenticated = true;
        self.last_error = None;
    }

    fn clear_identity(&mut self) {
        self.identity = None;
        self.credential = None;
        self.authenticated = false;
    }

    fn persisted(&self) -> PersistedSession {
        PersistedSession {
            user: self.identity.clone(),
            token: self.credential.clone(),
            authenticated: self.authenticated,
        }
    }
}

fn failure_message(err: &AppError, fallback: &str) -> String {
    let msg = err.message().trim();
    if msg.is_empty() { fallback.to_string() } else { msg.to_string() }
}

#[derive(Clone)]
pub struct SessionCore {
    state: Arc<RwLock<SessionState>>,
    storage: Arc<dyn StateStorage>,
    bus: EventBus,
}

impl SessionCore {
    pub fn new(storage: Arc<dyn StateStorage>, bus: EventBus) -> Self {
        Self { state: Arc::new(RwLock::new(SessionState::default())), storage, bus }
    }

    pub fn snapshot(&self) -> SessionState { self.state.read().clone() }
    pub fn is_authenticated(&self) -> bool { self.state.read().authenticated }
    pub fn identity(&self) -> Option<Identity> { self.state.read().identity.clone() }

    /// Apply one phase: mutate, persist and publish under the write guard so
    /// disk and subscribers see changes in the order memory does.
    fn apply<F>(&self, op: SessionOp, phase: Phase, f: F)
    where
        F: FnOnce(&mut SessionState),
    {
        let mut s = self.state.write();
        f(&mut s);
        debug_assert!(s.is_consistent(), "session invariant broken by {:?}/{:?}", op, phase);
        if let Err(e) = save_session(self.storage.as_ref(), &s.persisted()) {
            error!(target: "session", error = %e, "failed to persist session slice");
        }
        let error = if phase == Phase::Failure { s.last_error.clone() } else { None };
        self.bus.publish(Event::Session { op, phase, error });
    }

    /// Rehydrate from the persisted slice. Returns true when an authenticated
    /// session was restored.
    pub fn restore(&self) -> AppResult<bool> {
        let Some(slice) = load_session(self.storage.as_ref())? else { return Ok(false); };
        let restored = slice.authenticated;
        {
            let mut s = self.state.write();
            if restored {
                s.identity = slice.user;
                s.credential = slice.token;
                s.authenticated = true;
            } else {
                // an anonymous record never carries an identity forward
                s.clear_identity();
            }
            s.pending = false;
            s.last_error = None;
            self.bus.publish(Event::Session { op: SessionOp::Restore, phase: Phase::Success, error: None });
        }
        info!(target: "session", restored, "session rehydrated");
        Ok(restored)
    }
}

impl SessionGate for SessionCore {
    fn credential(&self) -> Option<Credential> { self.state.read().credential.clone() }

    fn evict(&self) {
        warn!(target: "session", "credential rejected; evicting session");
        self.apply(SessionOp::Evict, Phase::Success, |s| {
            s.clear_identity();
            s.last_error = None;
        });
    }
}

/// Session operations against an authentication backend.
#[derive(Clone)]
pub struct SessionStore {
    core: SessionCore,
    backend: Arc<dyn AuthBackend>,
}

impl SessionStore {
    pub fn new(core: SessionCore, backend: Arc<dyn AuthBackend>) -> Self { Self { core, backend } }

    pub fn core(&self) -> &SessionCore { &self.core }
    pub fn snapshot(&self) -> SessionState { self.core.snapshot() }
    pub fn is_authenticated(&self) -> bool { self.core.is_authenticated() }
    pub fn restore(&self) -> AppResult<bool> { self.core.restore() }

    fn begin(&self, op: SessionOp) {
        self.core.apply(op, Phase::Pending, |s| {
            s.pending = true;
            s.last_error = None;
        });
    }

    /// Shared tail of login and register. A rejected attempt leaves the
    /// session anonymous regardless of what it was before.
    fn finish_grant(&self, op: SessionOp, res: AppResult<AuthGrant>, fallback: &str) -> AppResult<Identity> {
        match res {
            Ok(grant) => {
                let identity = grant.identity.clone();
                self.core.apply(op, Phase::Success, |s| {
                    s.pending = false;
                    s.establish(grant);
                });
                info!(target: "session", ?op, id = %identity.id, "authenticated");
                Ok(identity)
            }
            Err(e) => {
                let msg = failure_message(&e, fallback);
                self.core.apply(op, Phase::Failure, |s| {
                    s.pending = false;
                    s.clear_identity();
                    s.last_error = Some(msg);
                });
                debug!(target: "session", ?op, error = %e, "rejected");
                Err(e)
            }
        }
    }

    pub async fn login(&self, username: &str, password: &str) -> AppResult<Identity> {
        self.begin(SessionOp::Login);
        let req = LoginRequest { username: username.to_string(), password: password.to_string() };
        let res = self.backend.login(&req).await;
        self.finish_grant(SessionOp::Login, res, LOGIN_FAILED)
    }

    pub async fn register(&self, username: &str, email: &str, password: &str) -> AppResult<Identity> {
        self.begin(SessionOp::Register);
        let req = RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        };
        let res = self.backend.register(&req).await;
        self.finish_grant(SessionOp::Register, res, REGISTRATION_FAILED)
    }

    /// Clears identity, credential, authenticated and error. Directory data is
    /// not touched.
    pub fn logout(&self) {
        self.core.apply(SessionOp::Logout, Phase::Success, |s| {
            s.clear_identity();
            s.last_error = None;
        });
        info!(target: "session", "logged out");
    }

    pub fn clear_error(&self) {
        self.core.apply(SessionOp::ClearError, Phase::Success, |s| s.last_error = None);
    }

    fn require_identity(&self) -> AppResult<Identity> {
        let s = self.core.state.read();
        match &s.identity {
            Some(identity) if s.authenticated => Ok(identity.clone()),
            _ => Err(AppError::unauthorized("not_authenticated", "Not signed in")),
        }
    }

    pub async fn update_profile(&self, patch: &IdentityPatch) -> AppResult<Identity> {
        let current = self.require_identity()?;
        self.begin(SessionOp::UpdateProfile);
        match self.backend.update_profile(&current, patch).await {
            Ok(updated) => {
                let out = updated.clone();
                self.core.apply(SessionOp::UpdateProfile, Phase::Success, |s| {
                    s.pending = false;
                    // a logout or a different login while in flight wins
                    let same = s.identity.as_ref().is_some_and(|i| i.id == updated.id);
                    if s.authenticated && same { s.identity = Some(updated); }
                });
                Ok(out)
            }
            Err(e) => {
                let msg = failure_message(&e, PROFILE_UPDATE_FAILED);
                self.core.apply(SessionOp::UpdateProfile, Phase::Failure, |s| {
                    s.pending = false;
                    s.last_error = Some(msg);
                });
                Err(e)
            }
        }
    }

    pub async fn change_password(&self, current: &str, new: &str) -> AppResult<()> {
        let identity = self.require_identity()?;
        self.begin(SessionOp::ChangePassword);
        let change = PasswordChange { current: current.to_string(), new: new.to_string() };
        match self.backend.change_password(&identity, &change).await {
            Ok(()) => {
                self.core.apply(SessionOp::ChangePassword, Phase::Success, |s| s.pending = false);
                Ok(())
            }
            Err(e) => {
                let msg = failure_message(&e, PASSWORD_CHANGE_FAILED);
                self.core.apply(SessionOp::ChangePassword, Phase::Failure, |s| {
                    s.pending = false;
                    s.last_error = Some(msg);
                });
                Err(e)
            }
        }
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod session_tests;
