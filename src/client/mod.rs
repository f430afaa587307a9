//! HTTP client adapter shared by the remote backends.
//!
//! Every call attaches the session credential, unwraps the `data` payload of
//! a success envelope and turns failures into notices. A 401 evicts the
//! session and raises [`Escalation::Unauthorized`] for the entry-point layer.

pub mod remote;
pub mod transport;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};
use crate::identity::Credential;
use crate::store::events::{Escalation, EventBus, NoticeLevel};

pub use remote::{HttpAuthBackend, HttpDirectoryBackend};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Method, Transport, TransportError};

pub const SESSION_EXPIRED: &str = "Session expired, please sign in again";
pub const SERVER_ERROR: &str = "Server error, please try again later";
pub const REQUEST_FAILED: &str = "Request failed, please try again later";

/// Where the adapter reads the credential from and how it drops it.
pub trait SessionGate: Send + Sync {
    fn credential(&self) -> Option<Credential>;
    /// Reset the session after the backend rejected the credential.
    fn evict(&self);
}

#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    session: Arc<dyn SessionGate>,
    bus: EventBus,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>, session: Arc<dyn SessionGate>, bus: EventBus) -> Self {
        Self { transport, session, bus }
    }

    pub fn describe(&self) -> String { self.transport.describe() }

    pub async fn request<T: DeserializeOwned>(&self, mut req: ApiRequest) -> AppResult<T> {
        if let Some(cred) = self.session.credential() {
            req.bearer = Some(cred.bearer());
        }
        let method = req.method;
        let path = req.path.clone();
        let resp = match self.transport.send(req).await {
            Ok(r) => r,
            Err(e) => {
                warn!(target: "http", method = method.as_str(), %path, error = %e, "transport failure");
                self.bus.notify(NoticeLevel::Error, REQUEST_FAILED);
                return Err(AppError::transport("transport_error", REQUEST_FAILED));
            }
        };
        if resp.is_success() {
            let data = match resp.body {
                Value::Object(mut map) => map.remove("data").unwrap_or(Value::Null),
                other => other,
            };
            return serde_json::from_value(data).map_err(|e| {
                warn!(target: "http", %path, error = %e, "unexpected payload shape");
                self.bus.notify(NoticeLevel::Error, REQUEST_FAILED);
                AppError::transport("decode_error", REQUEST_FAILED)
            });
        }
        Err(self.reject(resp, method, &path))
    }

    fn reject(&self, resp: ApiResponse, method: Method, path: &str) -> AppError {
        let field = |k: &str| resp.body.get(k).and_then(Value::as_str).map(str::trim).filter(|s| !s.is_empty());
        if resp.status == 401 {
            warn!(target: "http", method = method.as_str(), %path, "credential rejected");
            self.bus.notify(NoticeLevel::Error, SESSION_EXPIRED);
            self.session.evict();
            self.bus.escalate(Escalation::Unauthorized);
            return AppError::unauthorized("unauthorized", SESSION_EXPIRED);
        }
        let message = field("message").unwrap_or(SERVER_ERROR).to_string();
        debug!(target: "http", method = method.as_str(), %path, status = resp.status, %message, "request rejected");
        self.bus.notify(NoticeLevel::Error, message.clone());
        AppError::from_status(resp.status, field("code"), message)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> AppResult<T> {
        self.request(ApiRequest::new(Method::Get, path)).await
    }

    pub async fn post<T: DeserializeOwned>(&self, path: &str, body: Value) -> AppResult<T> {
        self.request(ApiRequest::new(Method::Post, path).with_body(body)).await
    }

    pub async fn put<T: DeserializeOwned>(&self, path: &str, body: Value) -> AppResult<T> {
        self.request(ApiRequest::new(Method::Put, path).with_body(body)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> AppResult<T> {
        self.request(ApiRequest::new(Method::Delete, path)).await
    }
}
