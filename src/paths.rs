use std::path::{Path, PathBuf};

/// Centralized helpers for on-disk locations rooted at the state directory.
/// This keeps locations consistent across the console and the tests.
pub const DEFAULT_STATE_DIR: &str = ".adminboard";

#[inline]
pub fn default_state_dir() -> PathBuf { PathBuf::from(DEFAULT_STATE_DIR) }

/// File holding one persisted record. The key's namespace separator is
/// flattened so `persist:root` lands in `persist_root.json`.
#[inline]
pub fn persist_file(state_dir: &Path, key: &str) -> PathBuf {
    let name: String = key
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    state_dir.join(format!("{}.json", name))
}
