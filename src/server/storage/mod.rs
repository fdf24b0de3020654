//! All things related to the storage of users and documents

use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::document::Document;
use crate::document::Value;

use super::users::User;

pub use memory::Memory;

mod memory;

/// Setup the storage
pub fn setup() -> Memory {
    Memory::new()
}

/// Storage errors
#[derive(Debug, Error)]
pub enum Error {
    /// The write is refused, something else already holds the place
    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Result type for all storage interactions
pub type Result<T> = core::result::Result<T, Error>;

/// Values to create a User
pub struct CreateUserValues<'a> {
    /// The normalized email address
    pub email: &'a str,

    /// The hashed password
    pub hashed_password: &'a str,
}

/// A single document write, creating or replacing the document
#[derive(Clone, Debug)]
pub struct DocumentWrite {
    /// Collection of the document
    pub collection: String,

    /// ID of the document within its collection
    pub id: String,

    /// The complete new fields
    pub fields: BTreeMap<String, Value>,
}

impl DocumentWrite {
    /// Full name of the written document
    pub fn name(&self) -> String {
        Document::path(&self.collection, &self.id)
    }
}

/// Owner of a document, the `userId` field
pub fn owner_of(document: &Document) -> Option<&str> {
    document.string_field("userId")
}

#[async_trait]
pub trait Storage: Clone + Send + Sync + 'static {
    /// Find a single user by its normalized email address
    async fn find_single_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Create a user
    ///
    /// Fails with [`Error::Conflict`] when the email address is taken
    async fn create_user(&self, values: &CreateUserValues) -> Result<User>;

    /// Find all documents of a collection owned by a user, newest first
    async fn find_all_documents(&self, collection: &str, owner_id: &str) -> Result<Vec<Document>>;

    /// Find a single document owned by a user
    async fn find_single_document(
        &self,
        collection: &str,
        id: &str,
        owner_id: &str,
    ) -> Result<Option<Document>>;

    /// Apply writes on behalf of a user, all of them or none
    ///
    /// A replaced document keeps its creation time. Fails with [`Error::Conflict`] when any
    /// of the documents exists and belongs to another user.
    async fn write_documents(&self, owner_id: &str, writes: &[DocumentWrite])
    -> Result<Vec<Document>>;

    /// Delete a document owned by a user, `false` when there was none
    async fn delete_document(&self, collection: &str, id: &str, owner_id: &str) -> Result<bool>;
}
