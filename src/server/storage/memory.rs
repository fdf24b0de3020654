//! Memory storage
//!
//! Will be destroyed on system shutdown

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::document::Document;
use crate::server::users::User;

use super::CreateUserValues;
use super::DocumentWrite;
use super::Error;
use super::Result;
use super::Storage;
use super::owner_of;

/// An in-memory storage
///
/// Will be destroyed on system shutdown
#[derive(Clone, Debug, Default)]
pub struct Memory {
    /// All users in storage
    users: Arc<Mutex<HashMap<Uuid, User>>>,

    /// All documents in storage, by full name
    documents: Arc<Mutex<BTreeMap<String, Document>>>,
}

impl Memory {
    /// Create a new empty Memory storage
    pub fn new() -> Self {
        Self::default()
    }
}

fn is_owned_by(document: &Document, owner_id: &str) -> bool {
    owner_of(document) == Some(owner_id)
}

#[async_trait]
impl Storage for Memory {
    async fn find_single_user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .lock()
            .await
            .values()
            .find(|user| user.email == email)
            .cloned())
    }

    async fn create_user(&self, values: &CreateUserValues) -> Result<User> {
        let mut users = self.users.lock().await;

        if users.values().any(|user| user.email == values.email) {
            return Err(Error::Conflict(format!(
                "Email address {} is taken",
                values.email
            )));
        }

        let user = User {
            id: Uuid::new_v4(),
            email: values.email.to_string(),
            hashed_password: values.hashed_password.to_string(),
            created_at: Utc::now(),
        };

        users.insert(user.id, user.clone());

        Ok(user)
    }

    async fn find_all_documents(&self, collection: &str, owner_id: &str) -> Result<Vec<Document>> {
        let mut documents = self
            .documents
            .lock()
            .await
            .values()
            .filter(|document| document.collection() == Some(collection))
            .filter(|document| is_owned_by(document, owner_id))
            .cloned()
            .collect::<Vec<_>>();

        documents.sort_by(|one, other| other.create_time.cmp(&one.create_time));

        Ok(documents)
    }

    async fn find_single_document(
        &self,
        collection: &str,
        id: &str,
        owner_id: &str,
    ) -> Result<Option<Document>> {
        Ok(self
            .documents
            .lock()
            .await
            .get(&Document::path(collection, id))
            .filter(|document| is_owned_by(document, owner_id))
            .cloned())
    }

    async fn write_documents(
        &self,
        owner_id: &str,
        writes: &[DocumentWrite],
    ) -> Result<Vec<Document>> {
        let mut documents = self.documents.lock().await;

        for write in writes {
            let name = write.name();

            if let Some(existing) = documents.get(&name)
                && !is_owned_by(existing, owner_id)
            {
                return Err(Error::Conflict(format!(
                    "Document {name} belongs to another user"
                )));
            }
        }

        let now = Utc::now();
        let mut written = Vec::with_capacity(writes.len());

        for write in writes {
            let name = write.name();

            let create_time = documents
                .get(&name)
                .and_then(|existing| existing.create_time)
                .unwrap_or(now);

            let document = Document {
                name: Some(name.clone()),
                fields: write.fields.clone(),
                create_time: Some(create_time),
                update_time: Some(now),
            };

            documents.insert(name, document.clone());
            written.push(document);
        }

        Ok(written)
    }

    async fn delete_document(&self, collection: &str, id: &str, owner_id: &str) -> Result<bool> {
        let mut documents = self.documents.lock().await;
        let name = Document::path(collection, id);

        if documents
            .get(&name)
            .is_some_and(|document| is_owned_by(document, owner_id))
        {
            documents.remove(&name);
            return Ok(true);
        }

        Ok(false)
    }
}
