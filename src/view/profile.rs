//! Profile page: identity card, basic-info form and password change.

use super::forms::{describe, PasswordForm, ProfileForm};
use crate::identity::Identity;
use crate::store::events::{Notice, NoticeLevel};
use crate::store::SessionStore;

fn note(level: NoticeLevel, message: impl Into<String>) -> Notice { Notice { level, message: message.into() } }

pub fn render(identity: &Identity) -> String {
    let roles: Vec<&str> = identity.roles.iter().collect();
    let mut lines = vec![
        format!("{} (id {})", identity.display_name, identity.id),
        format!("  email:  {}", identity.email),
        format!("  roles:  {}", roles.join(", ")),
    ];
    if let Some(avatar) = &identity.avatar {
        lines.push(format!("  avatar: {}", avatar));
    }
    lines.join("\n")
}

/// Basic-info form prefilled from the current identity.
pub fn prefill(identity: &Identity) -> ProfileForm {
    ProfileForm { username: identity.display_name.clone(), email: identity.email.clone() }
}

pub async fn save_profile(session: &SessionStore, form: &ProfileForm) -> Notice {
    let patch = match form.to_patch() {
        Ok(p) => p,
        Err(errs) => return note(NoticeLevel::Error, describe(&errs)),
    };
    match session.update_profile(&patch).await {
        Ok(_) => note(NoticeLevel::Success, "Profile updated"),
        Err(e) => note(NoticeLevel::Error, e.message().to_string()),
    }
}

pub async fn change_password(session: &SessionStore, form: &PasswordForm) -> Notice {
    if let Err(errs) = form.validate() {
        return note(NoticeLevel::Error, describe(&errs));
    }
    match session.change_password(&form.current, &form.new).await {
        Ok(()) => note(NoticeLevel::Success, "Password updated"),
        Err(e) => note(NoticeLevel::Error, e.message().to_string()),
    }
}
