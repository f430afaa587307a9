use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::AppResult;
use crate::identity::{Credential, Identity};
use crate::paths::persist_file;

/// Fixed namespace of the one durable record.
pub const PERSIST_KEY: &str = "persist:root";
const PERSIST_VERSION: u32 = 1;

/// Durable key/value record storage. Writes are synchronous.
pub trait StateStorage: Send + Sync {
    fn load(&self, key: &str) -> AppResult<Option<String>>;
    fn save(&self, key: &str, value: &str) -> AppResult<()>;
    fn remove(&self, key: &str) -> AppResult<()>;
}

/// One JSON file per key under a state directory.
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self { Self { dir: dir.as_ref().to_path_buf() } }
    pub fn dir(&self) -> &Path { &self.dir }
}

impl StateStorage for FileStorage {
    fn load(&self, key: &str) -> AppResult<Option<String>> {
        let path = persist_file(&self.dir, key);
        match std::fs::read_to_string(&path) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, key: &str, value: &str) -> AppResult<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = persist_file(&self.dir, key);
        // write-then-rename so a crash never leaves a half-written record
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        debug!(target: "persist", path = %path.display(), bytes = value.len(), "saved");
        Ok(())
    }

    fn remove(&self, key: &str) -> AppResult<()> {
        let path = persist_file(&self.dir, key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Process-local storage for tests and throwaway sessions.
#[derive(Default)]
pub struct MemoryStorage {
    map: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self { Self::default() }
}

impl StateStorage for MemoryStorage {
    fn load(&self, key: &str) -> AppResult<Option<String>> { Ok(self.map.lock().get(key).cloned()) }
    fn save(&self, key: &str, value: &str) -> AppResult<()> {
        self.map.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
    fn remove(&self, key: &str) -> AppResult<()> {
        self.map.lock().remove(key);
        Ok(())
    }
}

/// The persisted slice of the session: identity, credential and the
/// authenticated flag. Pending and error state are never written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSession {
    #[serde(default)]
    pub user: Option<Identity>,
    #[serde(default)]
    pub token: Option<Credential>,
    #[serde(default, rename = "isAuthenticated")]
    pub authenticated: bool,
}

impl PersistedSession {
    /// A record is only trusted when the flag agrees with the fields.
    pub fn is_consistent(&self) -> bool {
        self.authenticated == (self.user.is_some() && self.token.as_ref().is_some_and(|t| !t.is_empty()))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedRoot {
    version: u32,
    auth: PersistedSession,
}

pub fn save_session(storage: &dyn StateStorage, slice: &PersistedSession) -> AppResult<()> {
    let root = PersistedRoot { version: PERSIST_VERSION, auth: slice.clone() };
    let text = serde_json::to_string(&root)?;
    storage.save(PERSIST_KEY, &text)
}

/// Read the persisted slice. Unknown versions and inconsistent records are
/// discarded with a warning rather than failing startup.
pub fn load_session(storage: &dyn StateStorage) -> AppResult<Option<PersistedSession>> {
    let Some(text) = storage.load(PERSIST_KEY)? else { return Ok(None); };
    let root: PersistedRoot = match serde_json::from_str(&text) {
        Ok(r) => r,
        Err(e) => {
            warn!(target: "persist", error = %e, "discarding unreadable session record");
            return Ok(None);
        }
    };
    if root.version != PERSIST_VERSION {
        warn!(target: "persist", version = root.version, "discarding session record with unknown version");
        return Ok(None);
    }
    if !root.auth.is_consistent() {
        warn!(target: "persist", "discarding inconsistent session record");
        return Ok(None);
    }
    Ok(Some(root.auth))
}

#[cfg(test)]
#[path = "persist_tests.rs"]
mod persist_tests;
