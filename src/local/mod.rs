//! Local persistence of notes and preferences
//!
//! A small key/value contract with two backends: a durable on-device store and an
//! in-process store for targets without a file system. The backend is picked once
//! at startup and handed around as a [`SharedLocalStore`].

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

pub use memory::Memory;
pub use sqlite::Sqlite;

mod memory;
mod sqlite;

/// Keys used in the local store
pub mod keys {
    /// JSON array of public notes
    pub const NOTES: &str = "notes";

    /// JSON array of private notes
    pub const PRIVATE_NOTES: &str = "privateNotes";

    /// Local changes the remote store has not seen yet
    pub const PENDING_WRITES: &str = "pending_writes";

    /// "true" or "false"
    pub const SYNC_ENABLED: &str = "sync_enabled";

    /// "light" or "dark"
    pub const THEME: &str = "theme";

    /// Hashed PIN guarding private notes
    pub const PIN: &str = "pin";

    /// Persisted session state
    pub const AUTH_STATE: &str = "auth_state";

    /// Legacy marker for an explicit sign-out, only read to migrate it
    pub const USER_SIGNED_OUT: &str = "user_signed_out";
}

/// Key/value store with string keys and string values
///
/// Reads never fail: a value that can not be read is reported as absent (and logged)
/// so callers fall back to their defaults. Writes report their failures.
#[async_trait]
pub trait LocalStore: fmt::Debug + Send + Sync + 'static {
    /// Get the value of a key
    async fn get(&self, key: &str) -> Option<String>;

    /// Set the value of a key, replacing any previous value
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a key, removing an absent key is fine
    async fn remove(&self, key: &str) -> Result<()>;
}

/// A local store shared between the services
pub type SharedLocalStore = Arc<dyn LocalStore>;

/// Which local store to use
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LocalBackend {
    /// In-process only, lost on shutdown
    Memory,

    /// `SQLite` database at the given path
    Sqlite(PathBuf),
}

impl LocalBackend {
    /// Default database file of the durable store
    pub const DEFAULT_PATH: &'static str = "notesync.db";

    /// Backend for the platform we run on
    pub fn detect() -> Self {
        if cfg!(target_family = "wasm") {
            LocalBackend::Memory
        } else {
            LocalBackend::Sqlite(PathBuf::from(Self::DEFAULT_PATH))
        }
    }

    /// Parse `memory` or `sqlite:<path>`
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "memory" => Some(LocalBackend::Memory),
            "sqlite" => Some(LocalBackend::Sqlite(PathBuf::from(Self::DEFAULT_PATH))),
            other => other
                .strip_prefix("sqlite:")
                .filter(|path| !path.is_empty())
                .map(|path| LocalBackend::Sqlite(PathBuf::from(path))),
        }
    }
}

/// Setup the local store
///
/// # Errors
///
/// Will return `Err` when the database can not be opened or migrated
pub async fn setup(backend: &LocalBackend) -> Result<SharedLocalStore> {
    match backend {
        LocalBackend::Memory => {
            tracing::debug!("Using in-memory local store");
            Ok(Arc::new(Memory::new()))
        }
        LocalBackend::Sqlite(path) => {
            tracing::debug!("Using SQLite local store at {}", path.display());
            Ok(Arc::new(Sqlite::open(path).await?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_backend() {
        assert_eq!(Some(LocalBackend::Memory), LocalBackend::parse("memory"));
        assert_eq!(
            Some(LocalBackend::Sqlite(PathBuf::from("/tmp/notes.db"))),
            LocalBackend::parse("sqlite:/tmp/notes.db")
        );
        assert_eq!(
            Some(LocalBackend::Sqlite(PathBuf::from(LocalBackend::DEFAULT_PATH))),
            LocalBackend::parse("sqlite")
        );
        assert_eq!(None, LocalBackend::parse("sqlite:"));
        assert_eq!(None, LocalBackend::parse("redis"));
    }

    #[test]
    fn test_detect_backend() {
        assert_eq!(
            LocalBackend::Sqlite(PathBuf::from(LocalBackend::DEFAULT_PATH)),
            LocalBackend::detect()
        );
    }

    async fn exercise(store: SharedLocalStore) {
        assert_eq!(None, store.get(keys::THEME).await);

        store.set(keys::THEME, "dark").await.unwrap();
        assert_eq!(Some("dark".to_string()), store.get(keys::THEME).await);

        store.set(keys::THEME, "light").await.unwrap();
        assert_eq!(Some("light".to_string()), store.get(keys::THEME).await);

        store.remove(keys::THEME).await.unwrap();
        assert_eq!(None, store.get(keys::THEME).await);

        // removing twice is fine
        store.remove(keys::THEME).await.unwrap();
    }

    #[tokio::test]
    async fn test_memory_store() {
        exercise(setup(&LocalBackend::Memory).await.unwrap()).await;
    }

    #[tokio::test]
    async fn test_sqlite_store() {
        let path = std::env::temp_dir().join(format!("notesync-{}.db", uuid::Uuid::new_v4()));

        exercise(setup(&LocalBackend::Sqlite(path.clone())).await.unwrap()).await;

        // survives a reopen
        let store = setup(&LocalBackend::Sqlite(path.clone())).await.unwrap();
        store.set(keys::SYNC_ENABLED, "true").await.unwrap();
        drop(store);

        let store = setup(&LocalBackend::Sqlite(path.clone())).await.unwrap();
        assert_eq!(Some("true".to_string()), store.get(keys::SYNC_ENABLED).await);
        drop(store);

        let _ = std::fs::remove_file(path);
    }
}
