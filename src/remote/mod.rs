//! Remote document store
//!
//! Both partitions live in their own collection, every document is owned by a user

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::note::Note;
use crate::note::Partition;

pub use rest::RestClient;

pub(crate) use http::Http;

mod http;
mod rest;

/// Remote store with all supported operations
///
/// Operations act on behalf of the signed in user
#[async_trait]
pub trait RemoteStore: fmt::Debug + Send + Sync + 'static {
    /// All notes of the user in a partition, newest first
    ///
    /// Without a session this is an empty list, not an error
    async fn list(&self, partition: Partition) -> Result<Vec<Note>>;

    /// Create a note, the store assigns its ID
    ///
    /// Returns the note as stored, with the new ID
    async fn create(&self, note: &Note) -> Result<Note>;

    /// Replace a note in the partition matching its privacy flag
    async fn update(&self, note: &Note) -> Result<()>;

    /// Delete a note by ID, deleting an absent note is fine
    async fn delete(&self, id: &str, partition: Partition) -> Result<()>;

    /// Create or replace many notes, keeping their IDs
    ///
    /// Runs in chunks, a failing chunk stops the run but earlier chunks stay committed
    async fn batch_upsert(&self, notes: &[Note]) -> Result<()>;
}

/// A remote store shared between the services
pub type SharedRemoteStore = Arc<dyn RemoteStore>;
