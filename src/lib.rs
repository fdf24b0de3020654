#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Offline-first note storage with cloud document sync
//!
//! Notes live in two partitions, public and private. They are always kept in a local
//! store and, when sync is enabled and a session is confirmed, mirrored to a remote
//! document store. Remote failures never lose a local change.
//!
//! ```no_run
//! # async fn example() -> notesync::Result<()> {
//! use notesync::Config;
//! use notesync::NoteSync;
//! use notesync::note::NoteDraft;
//!
//! let app = NoteSync::from_config(&Config::from_env()?).await?;
//! let _watcher = app.start().await;
//!
//! app.auth.sign_in("someone@example.com", "verysecret").await?;
//! app.notes.set_sync_enabled(true).await?;
//!
//! app.notes
//!     .add(NoteDraft {
//!         title: "Groceries".to_string(),
//!         ..NoteDraft::default()
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use tokio::task::JoinHandle;

pub use config::Config;
pub use error::Error;
pub use error::Result;

use crate::auth::AuthClient;
use crate::local::SharedLocalStore;
use crate::preferences::Preferences;
use crate::remote::RestClient;
use crate::remote::SharedRemoteStore;
use crate::session::SessionGate;
use crate::sync::SyncService;

pub mod auth;
pub mod config;
pub mod document;
pub mod error;
pub mod local;
pub mod note;
pub mod password;
pub mod preferences;
pub mod remote;
pub mod server;
pub mod session;
pub mod sync;
#[cfg(test)]
mod tests;
pub mod utils;

/// All client services, wired together
#[derive(Clone, Debug)]
pub struct NoteSync {
    /// Local store shared by all services
    pub local: SharedLocalStore,

    /// Whether a remote session is confirmed
    pub session: SessionGate,

    /// Sign up, in and out
    pub auth: AuthClient,

    /// The notes
    pub notes: Arc<SyncService>,

    /// Theme and PIN
    pub preferences: Preferences,
}

impl NoteSync {
    /// Setup the local store of the configuration and everything on top of it
    ///
    /// # Errors
    ///
    /// Will return `Err` when the local store can not be opened or the HTTP client can not
    /// be created
    pub async fn from_config(config: &Config) -> Result<Self> {
        let local = local::setup(&config.local).await?;

        Self::with_local_store(config, local).await
    }

    /// Setup everything on top of a given local store
    ///
    /// # Errors
    ///
    /// Will return `Err` when the HTTP client can not be created
    pub async fn with_local_store(config: &Config, local: SharedLocalStore) -> Result<Self> {
        let session = SessionGate::restore(local.clone()).await;

        let remote: SharedRemoteStore = Arc::new(RestClient::new(config, session.clone())?);
        let auth = AuthClient::new(config, session.clone())?;
        let notes = Arc::new(SyncService::new(local.clone(), remote, session.clone()));
        let preferences = Preferences::new(local.clone());

        Ok(Self {
            local,
            session,
            auth,
            notes,
            preferences,
        })
    }

    /// Load the notes and keep reloading them whenever the session changes
    ///
    /// A failed load is logged, the state then holds whatever the local cache had
    pub async fn start(&self) -> JoinHandle<()> {
        let watcher = self.notes.watch_session();

        if let Err(err) = self.notes.load().await {
            tracing::warn!("Initial load of notes failed: {err}");
        }

        watcher
    }
}
