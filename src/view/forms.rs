//! Form validation. Failures are reported to the user and never reach a
//! store.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::identity::{IdentityDraft, IdentityPatch, Roles};

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap_or_else(|e| panic!("email pattern: {e}"))
});

/// One rejected field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    fn new(field: &'static str, message: impl Into<String>) -> Self { Self { field, message: message.into() } }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "{}: {}", self.field, self.message) }
}

pub type FormResult<T> = Result<T, Vec<FieldError>>;

fn required(errs: &mut Vec<FieldError>, field: &'static str, value: &str, label: &str) -> bool {
    if value.trim().is_empty() {
        errs.push(FieldError::new(field, format!("Please enter {label}")));
        return false;
    }
    true
}

fn username(errs: &mut Vec<FieldError>, value: &str, max: Option<usize>) {
    if !required(errs, "username", value, "a username") { return; }
    let n = value.trim().chars().count();
    if n < 3 {
        errs.push(FieldError::new("username", "Username must be at least 3 characters"));
    } else if max.is_some_and(|m| n > m) {
        errs.push(FieldError::new("username", "Username must be at most 20 characters"));
    }
}

fn email(errs: &mut Vec<FieldError>, value: &str) {
    if !required(errs, "email", value, "an email") { return; }
    if !EMAIL_RE.is_match(value.trim()) {
        errs.push(FieldError::new("email", "Please enter a valid email address"));
    }
}

fn new_password(errs: &mut Vec<FieldError>, field: &'static str, value: &str) {
    if !required(errs, field, value, "a password") { return; }
    if value.chars().count() < 6 {
        errs.push(FieldError::new(field, "Password must be at least 6 characters"));
    }
}

fn finish<T>(errs: Vec<FieldError>, value: T) -> FormResult<T> {
    if errs.is_empty() { Ok(value) } else { Err(errs) }
}

#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> FormResult<()> {
        let mut errs = Vec::new();
        required(&mut errs, "username", &self.username, "a username");
        required(&mut errs, "password", &self.password, "a password");
        finish(errs, ())
    }
}

#[derive(Debug, Clone, Default)]
pub struct RegisterForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm: String,
}

impl RegisterForm {
    pub fn validate(&self) -> FormResult<()> {
        let mut errs = Vec::new();
        username(&mut errs, &self.username, Some(20));
        email(&mut errs, &self.email);
        new_password(&mut errs, "password", &self.password);
        new_password(&mut errs, "confirm", &self.confirm);
        if !self.password.is_empty() && !self.confirm.is_empty() && self.password != self.confirm {
            errs.push(FieldError::new("confirm", "The two passwords do not match"));
        }
        finish(errs, ())
    }
}

/// Add/edit modal of the user management page.
#[derive(Debug, Clone, Default)]
pub struct UserForm {
    pub username: String,
    pub email: String,
    /// Comma separated, e.g. `admin, user`.
    pub roles: String,
}

impl UserForm {
    fn check(&self) -> FormResult<Roles> {
        let mut errs = Vec::new();
        username(&mut errs, &self.username, None);
        email(&mut errs, &self.email);
        let roles = Roles::parse_csv(&self.roles);
        if roles.is_empty() {
            errs.push(FieldError::new("roles", "Please enter roles, separated by commas"));
        }
        finish(errs, roles)
    }

    pub fn to_draft(&self) -> FormResult<IdentityDraft> {
        let roles = self.check()?;
        Ok(IdentityDraft::new(self.username.trim(), self.email.trim(), roles))
    }

    /// Full replacement of the editable fields.
    pub fn to_patch(&self) -> FormResult<IdentityPatch> {
        let roles = self.check()?;
        Ok(IdentityPatch {
            display_name: Some(self.username.trim().to_string()),
            email: Some(self.email.trim().to_string()),
            avatar: None,
            roles: Some(roles),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProfileForm {
    pub username: String,
    pub email: String,
}

impl ProfileForm {
    pub fn to_patch(&self) -> FormResult<IdentityPatch> {
        let mut errs = Vec::new();
        required(&mut errs, "username", &self.username, "a username");
        email(&mut errs, &self.email);
        finish(
            errs,
            IdentityPatch {
                display_name: Some(self.username.trim().to_string()),
                email: Some(self.email.trim().to_string()),
                ..Default::default()
            },
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct PasswordForm {
    pub current: String,
    pub new: String,
    pub confirm: String,
}

impl PasswordForm {
    pub fn validate(&self) -> FormResult<()> {
        let mut errs = Vec::new();
        required(&mut errs, "current", &self.current, "the current password");
        new_password(&mut errs, "new", &self.new);
        if required(&mut errs, "confirm", &self.confirm, "the new password again") && self.new != self.confirm {
            errs.push(FieldError::new("confirm", "The two passwords do not match"));
        }
        finish(errs, ())
    }
}

pub fn describe(errs: &[FieldError]) -> String {
    errs.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}
