use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::credential::Credential;
use super::model::{Identity, IdentityDraft, IdentityPatch, Roles};
use crate::directory::MockDirectory;
use crate::error::{AppError, AppResult};
use crate::tprintln;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordChange {
    #[serde(rename = "currentPassword")]
    pub current: String,
    #[serde(rename = "newPassword")]
    pub new: String,
}

/// What a successful login or registration hands back.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthGrant {
    #[serde(rename = "user")]
    pub identity: Identity,
    #[serde(rename = "token")]
    pub credential: Credential,
}

/// Authentication collaborator used by the session store.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn login(&self, req: &LoginRequest) -> AppResult<AuthGrant>;
    async fn register(&self, req: &RegisterRequest) -> AppResult<AuthGrant>;
    async fn update_profile(&self, current: &Identity, patch: &IdentityPatch) -> AppResult<Identity>;
    async fn change_password(&self, identity: &Identity, change: &PasswordChange) -> AppResult<()>;
}

pub const MOCK_ADMIN_USER: &str = "admin";
pub const MOCK_ADMIN_PASSWORD: &str = "admin";

pub fn mock_admin_identity() -> Identity {
    Identity {
        id: "1".into(),
        display_name: MOCK_ADMIN_USER.into(),
        email: "admin@example.com".into(),
        avatar: None,
        roles: Roles::parse_csv("admin"),
    }
}

/// In-process authentication backend. Accepts exactly one hard-coded pair;
/// registration always succeeds and lands the new identity in the shared
/// mock directory so it shows up in user management.
pub struct MockAuthProvider {
    directory: Arc<MockDirectory>,
    latency: Duration,
}

impl MockAuthProvider {
    pub fn new(directory: Arc<MockDirectory>, latency: Duration) -> Self { Self { directory, latency } }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() { tokio::time::sleep(self.latency).await; }
    }
}

#[async_trait]
impl AuthBackend for MockAuthProvider {
    async fn login(&self, req: &LoginRequest) -> AppResult<AuthGrant> {
        self.simulate_latency().await;
        if req.username != MOCK_ADMIN_USER || req.password != MOCK_ADMIN_PASSWORD {
            debug!(target: "auth", user = %req.username, "mock login rejected");
            return Err(AppError::auth("invalid_credentials", "Invalid credentials"));
        }
        let grant = AuthGrant { identity: mock_admin_identity(), credential: Credential::generate()? };
        tprintln!("auth.login user={} id={}", req.username, grant.identity.id);
        Ok(grant)
    }

    async fn register(&self, req: &RegisterRequest) -> AppResult<AuthGrant> {
        self.simulate_latency().await;
        let draft = IdentityDraft::new(req.username.clone(), req.email.clone(), Roles::parse_csv("user"));
        let credential = Credential::generate()?;
        let identity = self.directory.insert(draft);
        tprintln!("auth.register user={} id={}", req.username, identity.id);
        Ok(AuthGrant { identity, credential })
    }

    async fn update_profile(&self, current: &Identity, patch: &IdentityPatch) -> AppResult<Identity> {
        self.simulate_latency().await;
        // roles are managed through the directory, never self-assigned
        let patch = IdentityPatch { roles: None, ..patch.clone() };
        let merged = patch.merged(current);
        // keep the directory copy in step when the identity is listed there
        self.directory.patch(&current.id, &patch);
        Ok(merged)
    }

    async fn change_password(&self, identity: &Identity, change: &PasswordChange) -> AppResult<()> {
        self.simulate_latency().await;
        if change.current.is_empty() {
            return Err(AppError::auth("invalid_credentials", "Current password is required"));
        }
        debug!(target: "auth", id = %identity.id, "mock password change accepted");
        Ok(())
    }
}
