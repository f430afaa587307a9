//!
//! adminboard mock API server
//! --------------------------
//! Axum HTTP API over the in-process mock backends, so the console (or any
//! other client) can run against a real network boundary.
//!
//! Responsibilities:
//! - Login/registration endpoints issuing bearer credentials.
//! - Profile and password endpoints for the signed-in identity.
//! - User CRUD over the shared mock user table.
//! - `{"status":"ok","data":..}` / `{"status":"error","code":..,"message":..}`
//!   envelopes with statuses taken from `AppError::http_status`.

use std::{collections::HashMap, net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::extract::{Path, State};
use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::Config;
use crate::directory::{DirectoryBackend, MockDirectory};
use crate::error::AppError;
use crate::identity::{
    AuthBackend, Credential, Identity, IdentityDraft, IdentityPatch, LoginRequest, MockAuthProvider, PasswordChange,
    RegisterRequest,
};

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct ServerState {
    pub directory: Arc<MockDirectory>,
    pub auth: Arc<MockAuthProvider>,
    /// Issued credential -> identity it was issued to
    pub sessions: Arc<RwLock<HashMap<String, Identity>>>,
}

impl ServerState {
    pub fn new(directory: Arc<MockDirectory>, latency: Duration) -> Self {
        let auth = Arc::new(MockAuthProvider::new(directory.clone(), latency));
        Self { directory, auth, sessions: Arc::new(RwLock::new(HashMap::new())) }
    }

    /// Forget every issued credential; subsequent calls with them get 401.
    pub async fn revoke_all(&self) -> usize {
        let mut map = self.sessions.write().await;
        let n = map.len();
        map.clear();
        warn!(target: "http", revoked = n, "all credentials revoked");
        n
    }
}

fn ok<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(json!({"status": "ok", "data": data}))).into_response()
}

fn fail(err: AppError) -> Response {
    let status = StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(err.to_envelope())).into_response()
}

async fn authorize(state: &ServerState, headers: &HeaderMap) -> Result<(String, Identity), AppError> {
    let denied = || AppError::unauthorized("unauthorized", "Missing or invalid credential");
    let header = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()).ok_or_else(denied)?;
    let cred = Credential::from_bearer(header).ok_or_else(denied)?;
    let map = state.sessions.read().await;
    let identity = map.get(cred.as_str()).cloned().ok_or_else(denied)?;
    Ok((cred.as_str().to_string(), identity))
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/", get(|| async { "adminboard ok" }))
        .route("/api/auth/login", post(login))
        .route("/api/auth/register", post(register))
        .route("/api/auth/profile", put(update_profile))
        .route("/api/auth/password", post(change_password))
        .route("/api/users", get(list_users).post(create_user))
        .route("/api/users/{id}", put(update_user).delete(delete_user))
        .with_state(state)
}

/// Serve on an already-bound listener. Tests bind port 0 and read the
/// address back.
pub async fn serve(listener: tokio::net::TcpListener, state: ServerState) -> anyhow::Result<()> {
    axum::serve(listener, router(state)).await.context("server terminated")?;
    Ok(())
}

pub async fn run(cfg: &Config) -> anyhow::Result<()> {
    let directory = Arc::new(MockDirectory::seeded(cfg.latency));
    let state = ServerState::new(directory, cfg.latency);
    let addr: SocketAddr = format!("0.0.0.0:{}", cfg.http_port).parse()?;
    info!(target: "startup", "Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    serve(listener, state).await
}

async fn issue(state: &ServerState, grant: crate::identity::AuthGrant) -> Response {
    state.sessions.write().await.insert(grant.credential.as_str().to_string(), grant.identity.clone());
    ok(grant)
}

async fn login(State(state): State<ServerState>, Json(payload): Json<LoginRequest>) -> Response {
    match state.auth.login(&payload).await {
        Ok(grant) => {
            info!(target: "http", user = %payload.username, "login");
            issue(&state, grant).await
        }
        Err(e) => fail(e),
    }
}

async fn register(State(state): State<ServerState>, Json(payload): Json<RegisterRequest>) -> Response {
    if payload.username.trim().is_empty() || payload.email.trim().is_empty() {
        return fail(AppError::validation("missing_field", "Username and email are required"));
    }
    match state.auth.register(&payload).await {
        Ok(grant) => {
            info!(target: "http", user = %payload.username, id = %grant.identity.id, "register");
            issue(&state, grant).await
        }
        Err(e) => fail(e),
    }
}

async fn update_profile(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Json(mut patch): Json<IdentityPatch>,
) -> Response {
    if patch.roles.take().is_some() {
        warn!(target: "http", "profile update tried to set roles; ignored");
    }
    let (token, current) = match authorize(&state, &headers).await {
        Ok(v) => v,
        Err(e) => return fail(e),
    };
    match state.auth.update_profile(&current, &patch).await {
        Ok(updated) => {
            state.sessions.write().await.insert(token, updated.clone());
            ok(updated)
        }
        Err(e) => fail(e),
    }
}

async fn change_password(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Json(change): Json<PasswordChange>,
) -> Response {
    let (_, current) = match authorize(&state, &headers).await {
        Ok(v) => v,
        Err(e) => return fail(e),
    };
    match state.auth.change_password(&current, &change).await {
        Ok(()) => ok(()),
        Err(e) => fail(e),
    }
}

async fn list_users(State(state): State<ServerState>, headers: HeaderMap) -> Response {
    if let Err(e) = authorize(&state, &headers).await { return fail(e); }
    match state.directory.list().await {
        Ok(users) => ok(users),
        Err(e) => fail(e),
    }
}

async fn create_user(State(state): State<ServerState>, headers: HeaderMap, Json(draft): Json<IdentityDraft>) -> Response {
    if let Err(e) = authorize(&state, &headers).await { return fail(e); }
    if draft.display_name.trim().is_empty() || draft.email.trim().is_empty() {
        return fail(AppError::validation("missing_field", "Username and email are required"));
    }
    match state.directory.create(&draft).await {
        Ok(created) => ok(created),
        Err(e) => fail(e),
    }
}

async fn update_user(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(patch): Json<IdentityPatch>,
) -> Response {
    if let Err(e) = authorize(&state, &headers).await { return fail(e); }
    match state.directory.update(&id, &patch).await {
        Ok(()) => ok(state.directory.snapshot().into_iter().find(|u| u.id == id)),
        Err(e) => fail(e),
    }
}

async fn delete_user(State(state): State<ServerState>, headers: HeaderMap, Path(id): Path<String>) -> Response {
    if let Err(e) = authorize(&state, &headers).await { return fail(e); }
    match state.directory.remove(&id).await {
        Ok(()) => ok(()),
        Err(e) => fail(e),
    }
}
