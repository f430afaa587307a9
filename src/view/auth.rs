//! Sign-in and registration pages.

use super::forms::{describe, LoginForm, RegisterForm};
use crate::error::AppError;
use crate::store::events::{Notice, NoticeLevel};
use crate::store::SessionStore;

pub const BAD_CREDENTIALS: &str = "Invalid username or password";
pub const LOGIN_UNAVAILABLE: &str = "Login failed, please try again later";
pub const REGISTER_UNAVAILABLE: &str = "Registration failed, please try again later";

fn note(level: NoticeLevel, message: impl Into<String>) -> Notice { Notice { level, message: message.into() } }

/// Validate, then sign in. Rejected credentials and unreachable backends are
/// worded differently.
pub async fn submit_login(session: &SessionStore, form: &LoginForm) -> Notice {
    if let Err(errs) = form.validate() {
        return note(NoticeLevel::Error, describe(&errs));
    }
    match session.login(form.username.trim(), &form.password).await {
        Ok(who) => note(NoticeLevel::Success, format!("Signed in as {}", who.display_name)),
        Err(AppError::Auth { .. }) => note(NoticeLevel::Error, BAD_CREDENTIALS),
        Err(_) => note(NoticeLevel::Error, LOGIN_UNAVAILABLE),
    }
}

pub async fn submit_register(session: &SessionStore, form: &RegisterForm) -> Notice {
    if let Err(errs) = form.validate() {
        return note(NoticeLevel::Error, describe(&errs));
    }
    match session.register(form.username.trim(), form.email.trim(), &form.password).await {
        Ok(who) => note(NoticeLevel::Success, format!("Account {} created", who.display_name)),
        Err(AppError::Validation { message, .. }) if !message.is_empty() => note(NoticeLevel::Error, message),
        Err(_) => note(NoticeLevel::Error, REGISTER_UNAVAILABLE),
    }
}
