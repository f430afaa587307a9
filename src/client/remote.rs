use async_trait::async_trait;
use serde::de::IgnoredAny;

use super::ApiClient;
use crate::directory::DirectoryBackend;
use crate::error::AppResult;
use crate::identity::{
    AuthBackend, AuthGrant, Identity, IdentityDraft, IdentityPatch, LoginRequest, PasswordChange, RegisterRequest,
};

fn user_path(id: &str) -> String { format!("/api/users/{}", urlencoding::encode(id)) }

/// Authentication over the HTTP API.
pub struct HttpAuthBackend {
    api: ApiClient,
}

impl HttpAuthBackend {
    pub fn new(api: ApiClient) -> Self { Self { api } }
}

#[async_trait]
impl AuthBackend for HttpAuthBackend {
    async fn login(&self, req: &LoginRequest) -> AppResult<AuthGrant> {
        self.api.post("/api/auth/login", serde_json::to_value(req)?).await
    }

    async fn register(&self, req: &RegisterRequest) -> AppResult<AuthGrant> {
        self.api.post("/api/auth/register", serde_json::to_value(req)?).await
    }

    async fn update_profile(&self, _current: &Identity, patch: &IdentityPatch) -> AppResult<Identity> {
        self.api.put("/api/auth/profile", serde_json::to_value(patch)?).await
    }

    async fn change_password(&self, _identity: &Identity, change: &PasswordChange) -> AppResult<()> {
        self.api.post("/api/auth/password", serde_json::to_value(change)?).await
    }
}

/// Directory CRUD over the HTTP API.
pub struct HttpDirectoryBackend {
    api: ApiClient,
}

impl HttpDirectoryBackend {
    pub fn new(api: ApiClient) -> Self { Self { api } }
}

#[async_trait]
impl DirectoryBackend for HttpDirectoryBackend {
    async fn list(&self) -> AppResult<Vec<Identity>> { self.api.get("/api/users").await }

    async fn create(&self, draft: &IdentityDraft) -> AppResult<Identity> {
        self.api.post("/api/users", serde_json::to_value(draft)?).await
    }

    async fn update(&self, id: &str, patch: &IdentityPatch) -> AppResult<()> {
        // the server echoes the entry (or null for unknown ids); the store
        // applies the patch itself
        let _echo: Option<Identity> = self.api.put(&user_path(id), serde_json::to_value(patch)?).await?;
        Ok(())
    }

    async fn remove(&self, id: &str) -> AppResult<()> {
        let _: IgnoredAny = self.api.delete(&user_path(id)).await?;
        Ok(())
    }
}
