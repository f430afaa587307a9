//! Unified application error model and mapping helpers.
//! This module provides a common error enum used across the stores, the HTTP
//! client adapter and the mock API server, along with helper mappers to HTTP
//! statuses and wire envelopes.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    Validation { code: String, message: String },
    Auth { code: String, message: String },
    Unauthorized { code: String, message: String },
    NotFound { code: String, message: String },
    Backend { code: String, message: String },
    Transport { code: String, message: String },
    Storage { code: String, message: String },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::Validation { code, .. }
            | AppError::Auth { code, .. }
            | AppError::Unauthorized { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::Backend { code, .. }
            | AppError::Transport { code, .. }
            | AppError::Storage { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::Validation { message, .. }
            | AppError::Auth { message, .. }
            | AppError::Unauthorized { message, .. }
            | AppError::NotFound { message, .. }
            | AppError::Backend { message, .. }
            | AppError::Transport { message, .. }
            | AppError::Storage { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn validation<S: Into<String>>(code: S, msg: S) -> Self { AppError::Validation { code: code.into(), message: msg.into() } }
    pub fn auth<S: Into<String>>(code: S, msg: S) -> Self { AppError::Auth { code: code.into(), message: msg.into() } }
    pub fn unauthorized<S: Into<String>>(code: S, msg: S) -> Self { AppError::Unauthorized { code: code.into(), message: msg.into() } }
    pub fn not_found<S: Into<String>>(code: S, msg: S) -> Self { AppError::NotFound { code: code.into(), message: msg.into() } }
    pub fn backend<S: Into<String>>(code: S, msg: S) -> Self { AppError::Backend { code: code.into(), message: msg.into() } }
    pub fn transport<S: Into<String>>(code: S, msg: S) -> Self { AppError::Transport { code: code.into(), message: msg.into() } }
    pub fn storage<S: Into<String>>(code: S, msg: S) -> Self { AppError::Storage { code: code.into(), message: msg.into() } }
    pub fn internal<S: Into<String>>(code: S, msg: S) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::Validation { .. } => 400,
            AppError::Auth { .. } => 400,
            AppError::Unauthorized { .. } => 401,
            AppError::NotFound { .. } => 404,
            AppError::Backend { .. } => 500,
            AppError::Transport { .. } => 503,
            AppError::Storage { .. } => 503,
            AppError::Internal { .. } => 500,
        }
    }

    /// Rebuild an error from a non-2xx wire response.
    /// 401 maps to `Unauthorized`; a rejected login travels as 400 with an
    /// `invalid_credentials` code; everything else keeps the server's code.
    pub fn from_status(status: u16, code: Option<&str>, message: String) -> Self {
        let code = code.unwrap_or("http_error").to_string();
        match status {
            400 if code == "invalid_credentials" => AppError::Auth { code, message },
            400 => AppError::Validation { code, message },
            401 => AppError::Unauthorized { code, message },
            404 => AppError::NotFound { code, message },
            _ => AppError::Backend { code, message },
        }
    }

    /// True for the escalation class: the credential is no longer accepted.
    pub fn is_unauthorized(&self) -> bool { matches!(self, AppError::Unauthorized { .. }) }

    /// Error envelope as sent by the mock API server.
    pub fn to_envelope(&self) -> serde_json::Value {
        serde_json::json!({
            "status": "error",
            "code": self.code_str(),
            "message": self.message(),
        })
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        // Keep a typed AppError if one was wrapped; otherwise treat as internal
        match err.downcast::<AppError>() {
            Ok(app) => app,
            Err(other) => AppError::Internal { code: "internal_error".into(), message: other.to_string() },
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage { code: "io_error".into(), message: err.to_string() }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Storage { code: "decode_error".into(), message: err.to_string() }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod error_tests;
