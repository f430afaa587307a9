//! User management page: searchable roster with add/edit modal and delete
//! confirmation.

use super::forms::{describe, UserForm};
use super::table;
use crate::identity::Identity;
use crate::store::events::{Notice, NoticeLevel};
use crate::store::DirectoryStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modal {
    Add,
    Edit { id: String },
}

impl Modal {
    pub fn title(&self) -> &'static str {
        match self {
            Modal::Add => "Add user",
            Modal::Edit { .. } => "Edit user",
        }
    }
}

/// Local state of the page. The roster itself stays in the store.
#[derive(Debug, Clone, Default)]
pub struct RosterPage {
    pub search: String,
    modal: Option<Modal>,
    pending_delete: Option<String>,
    /// Local busy flag while a submission is in flight.
    busy: bool,
}

fn note(level: NoticeLevel, message: impl Into<String>) -> Notice { Notice { level, message: message.into() } }

fn store_error(store: &DirectoryStore, fallback: &str) -> Notice {
    note(NoticeLevel::Error, store.snapshot().error.unwrap_or_else(|| fallback.to_string()))
}

impl RosterPage {
    pub fn new() -> Self { Self::default() }
    pub fn modal(&self) -> Option<&Modal> { self.modal.as_ref() }
    pub fn pending_delete(&self) -> Option<&str> { self.pending_delete.as_deref() }
    pub fn is_busy(&self) -> bool { self.busy }

    pub fn set_search(&mut self, q: &str) { self.search = q.trim().to_string(); }

    pub fn visible(&self, store: &DirectoryStore) -> Vec<Identity> { store.filter(&self.search) }

    pub fn render(&self, store: &DirectoryStore) -> String {
        let state = store.snapshot();
        let rows: Vec<Vec<String>> = self
            .visible(store)
            .into_iter()
            .map(|u| vec![u.id, u.display_name, u.email, u.roles.iter().collect::<Vec<_>>().join(", ")])
            .collect();
        let mut out = Vec::new();
        if !self.search.is_empty() {
            out.push(format!("search: \"{}\" ({} of {})", self.search, rows.len(), state.roster.len()));
        }
        if state.loading { out.push("loading...".to_string()); }
        if rows.is_empty() {
            out.push("(no users)".to_string());
        } else {
            out.push(table::render(&["ID", "Username", "Email", "Roles"], &rows));
        }
        if let Some(id) = &self.pending_delete {
            out.push(format!("Delete user {}? This cannot be undone. (confirm / cancel)", id));
        }
        out.join("\n")
    }

    pub fn open_add(&mut self) -> UserForm {
        self.modal = Some(Modal::Add);
        UserForm::default()
    }

    /// Open the edit modal prefilled from the roster entry.
    pub fn open_edit(&mut self, store: &DirectoryStore, id: &str) -> Option<UserForm> {
        let u = store.get(id)?;
        self.modal = Some(Modal::Edit { id: u.id.clone() });
        Some(UserForm { username: u.display_name, email: u.email, roles: u.roles.to_csv() })
    }

    pub fn close_modal(&mut self) { self.modal = None; }

    /// Submit the open modal. Validation failures keep the modal open and
    /// never reach the store.
    pub async fn submit(&mut self, store: &DirectoryStore, form: &UserForm) -> Notice {
        let Some(modal) = self.modal.clone() else {
            return note(NoticeLevel::Warning, "No form is open");
        };
        self.busy = true;
        let out = match &modal {
            Modal::Add => match form.to_draft() {
                Err(errs) => note(NoticeLevel::Error, describe(&errs)),
                Ok(draft) => match store.create(&draft).await {
                    Ok(u) => {
                        self.modal = None;
                        note(NoticeLevel::Success, format!("User {} added", u.display_name))
                    }
                    Err(_) => store_error(store, crate::store::directory::CREATE_FAILED),
                },
            },
            Modal::Edit { id } => match form.to_patch() {
                Err(errs) => note(NoticeLevel::Error, describe(&errs)),
                Ok(patch) => match store.update(id, &patch).await {
                    Ok(found) => {
                        self.modal = None;
                        if found {
                            note(NoticeLevel::Success, "User updated")
                        } else {
                            note(NoticeLevel::Warning, "User no longer exists")
                        }
                    }
                    Err(_) => store_error(store, crate::store::directory::UPDATE_FAILED),
                },
            },
        };
        self.busy = false;
        out
    }

    pub fn request_delete(&mut self, id: &str) { self.pending_delete = Some(id.to_string()); }
    pub fn cancel_delete(&mut self) { self.pending_delete = None; }

    pub async fn confirm_delete(&mut self, store: &DirectoryStore) -> Notice {
        let Some(id) = self.pending_delete.take() else {
            return note(NoticeLevel::Warning, "Nothing to delete");
        };
        self.busy = true;
        let out = match store.remove(&id).await {
            Ok(_) => note(NoticeLevel::Success, "User deleted"),
            Err(_) => store_error(store, crate::store::directory::REMOVE_FAILED),
        };
        self.busy = false;
        out
    }
}
