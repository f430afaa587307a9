use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use super::events::{DirectoryOp, Event, EventBus, Phase};
use crate::directory::{filter_roster, DirectoryBackend};
use crate::error::{AppError, AppResult};
use crate::identity::{Identity, IdentityDraft, IdentityPatch};

pub const LIST_FAILED: &str = "Failed to fetch users";
pub const CREATE_FAILED: &str = "Failed to add user";
pub const UPDATE_FAILED: &str = "Failed to update user";
pub const REMOVE_FAILED: &str = "Failed to delete user";

/// Client-side copy of the managed identities.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryState {
    pub roster: Vec<Identity>,
    pub loading: bool,
    pub error: Option<String>,
}

/// Collapse duplicate ids, keeping the first occurrence.
fn dedup_by_id(list: Vec<Identity>) -> Vec<Identity> {
    let mut seen = std::collections::HashSet::new();
    let before = list.len();
    let out: Vec<Identity> = list.into_iter().filter(|u| seen.insert(u.id.clone())).collect();
    if out.len() != before {
        warn!(target: "directory", dropped = before - out.len(), "backend returned duplicate ids");
    }
    out
}

#[derive(Clone)]
pub struct DirectoryStore {
    state: Arc<RwLock<DirectoryState>>,
    backend: Arc<dyn DirectoryBackend>,
    bus: EventBus,
}

impl DirectoryStore {
    pub fn new(backend: Arc<dyn DirectoryBackend>, bus: EventBus) -> Self {
        Self { state: Arc::new(RwLock::new(DirectoryState::default())), backend, bus }
    }

    pub fn snapshot(&self) -> DirectoryState { self.state.read().clone() }
    pub fn roster(&self) -> Vec<Identity> { self.state.read().roster.clone() }
    pub fn get(&self, id: &str) -> Option<Identity> { self.state.read().roster.iter().find(|u| u.id == id).cloned() }

    /// Roster entries whose username or email contains `query`,
    /// case-insensitively, in roster order.
    pub fn filter(&self, query: &str) -> Vec<Identity> {
        let state = self.state.read();
        filter_roster(&state.roster, query).into_iter().cloned().collect()
    }

    fn apply<F>(&self, op: DirectoryOp, phase: Phase, f: F)
    where
        F: FnOnce(&mut DirectoryState),
    {
        let mut s = self.state.write();
        f(&mut s);
        let error = if phase == Phase::Failure { s.error.clone() } else { None };
        // published under the guard so event order matches state order
        self.bus.publish(Event::Directory { op, phase, error });
    }

    fn begin(&self, op: DirectoryOp) {
        self.apply(op, Phase::Pending, |s| {
            s.loading = true;
            s.error = None;
        });
    }

    fn fail(&self, op: DirectoryOp, err: &AppError, fallback: &str) {
        let msg = match err.message().trim() {
            "" => fallback.to_string(),
            m => m.to_string(),
        };
        debug!(target: "directory", ?op, error = %err, "operation failed");
        self.apply(op, Phase::Failure, |s| {
            s.loading = false;
            s.error = Some(msg);
        });
    }

    /// Replace the roster with the backend's current list.
    pub async fn list(&self) -> AppResult<Vec<Identity>> {
        self.begin(DirectoryOp::List);
        match self.backend.list().await {
            Ok(list) => {
                let list = dedup_by_id(list);
                let out = list.clone();
                self.apply(DirectoryOp::List, Phase::Success, |s| {
                    s.loading = false;
                    s.roster = list;
                });
                info!(target: "directory", count = out.len(), "roster loaded");
                Ok(out)
            }
            Err(e) => {
                self.fail(DirectoryOp::List, &e, LIST_FAILED);
                Err(e)
            }
        }
    }

    /// Append the created identity. An id already present in the roster is
    /// replaced in place so ids stay unique.
    pub async fn create(&self, draft: &IdentityDraft) -> AppResult<Identity> {
        self.begin(DirectoryOp::Create);
        match self.backend.create(draft).await {
            Ok(created) => {
                let out = created.clone();
                self.apply(DirectoryOp::Create, Phase::Success, |s| {
                    s.loading = false;
                    match s.roster.iter_mut().find(|u| u.id == created.id) {
                        Some(slot) => *slot = created,
                        None => s.roster.push(created),
                    }
                });
                info!(target: "directory", id = %out.id, "identity created");
                Ok(out)
            }
            Err(e) => {
                self.fail(DirectoryOp::Create, &e, CREATE_FAILED);
                Err(e)
            }
        }
    }

    /// Merge `patch` into the roster entry with this id. Returns whether an
    /// entry was present when the backend confirmed.
    pub async fn update(&self, id: &str, patch: &IdentityPatch) -> AppResult<bool> {
        self.begin(DirectoryOp::Update);
        match self.backend.update(id, patch).await {
            Ok(()) => {
                let mut found = false;
                self.apply(DirectoryOp::Update, Phase::Success, |s| {
                    s.loading = false;
                    if let Some(entry) = s.roster.iter_mut().find(|u| u.id == id) {
                        patch.apply(entry);
                        found = true;
                    }
                });
                if !found { debug!(target: "directory", id, "update confirmed for id not in roster"); }
                Ok(found)
            }
            Err(e) => {
                self.fail(DirectoryOp::Update, &e, UPDATE_FAILED);
                Err(e)
            }
        }
    }

    /// Drop the entry with this id. Removing an absent id succeeds.
    pub async fn remove(&self, id: &str) -> AppResult<bool> {
        self.begin(DirectoryOp::Remove);
        match self.backend.remove(id).await {
            Ok(()) => {
                let mut removed = false;
                self.apply(DirectoryOp::Remove, Phase::Success, |s| {
                    s.loading = false;
                    let before = s.roster.len();
                    s.roster.retain(|u| u.id != id);
                    removed = s.roster.len() != before;
                });
                info!(target: "directory", id, removed, "identity removed");
                Ok(removed)
            }
            Err(e) => {
                self.fail(DirectoryOp::Remove, &e, REMOVE_FAILED);
                Err(e)
            }
        }
    }

    pub fn clear_error(&self) {
        self.apply(DirectoryOp::ClearError, Phase::Success, |s| s.error = None);
    }
}

#[cfg(test)]
#[path = "directory_tests.rs"]
mod directory_tests;
