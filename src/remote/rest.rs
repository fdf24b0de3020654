//! REST client for the remote document store
//!
//! Documents travel in their typed-field form, see [`crate::document`]
//!
//! - `GET    v1/documents/{collection}`: list the documents of the caller
//! - `POST   v1/documents/{collection}`: create a document, the store picks the ID
//! - `PATCH  v1/documents/{collection}/{id}`: create or replace a document
//! - `DELETE v1/documents/{collection}/{id}`: delete a document
//! - `POST   v1/documents:commit`: create or replace many documents at once

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;

use crate::config::Config;
use crate::document::Document;
use crate::document::decode_note;
use crate::document::encode_note;
use crate::error::Error;
use crate::error::Result;
use crate::note::Note;
use crate::note::Partition;
use crate::session::Identity;
use crate::session::SessionGate;

use super::Http;
use super::RemoteStore;
use super::http::is_not_found;
use super::http::is_unauthenticated;

/// Answer of a list call
#[derive(Debug, Deserialize)]
struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<Document>,
}

/// Body of a commit call
#[derive(Debug, Serialize)]
struct CommitRequest {
    writes: Vec<Write>,
}

/// A single write of a commit
#[derive(Debug, Serialize)]
struct Write {
    update: Document,
}

/// Remote store over HTTP
#[derive(Clone, Debug)]
pub struct RestClient {
    /// Connection to the store
    http: Http,

    /// Source of the identity to act as
    session: SessionGate,

    /// Maximum number of writes per commit
    batch_size: usize,
}

impl RestClient {
    /// Create a client acting as whoever is signed in at the session gate
    ///
    /// # Errors
    ///
    /// Will return `Err` when the HTTP client can not be created
    pub fn new(config: &Config, session: SessionGate) -> Result<Self> {
        Ok(Self {
            http: Http::new(config)?,
            session,
            batch_size: config.batch_size.max(1),
        })
    }

    /// Identity for a mutation, these need an owner
    fn require_identity(&self) -> Result<Identity> {
        self.session.identity().ok_or(Error::NotAuthenticated)
    }

    /// A rejected token means the session is no longer confirmed
    async fn observe<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result
            && is_unauthenticated(err)
            && let Err(persist_err) = self.session.invalidate().await
        {
            tracing::warn!("Could not invalidate rejected session: {persist_err}");
        }

        result
    }

    async fn commit(&self, identity: &Identity, notes: &[Note]) -> Result<()> {
        let request = CommitRequest {
            writes: notes
                .iter()
                .map(|note| Write {
                    update: encode_note(note, &identity.user_id),
                })
                .collect(),
        };

        let request = self
            .http
            .client()
            .post(self.http.rpc_url("v1/documents:commit")?)
            .bearer_auth(&identity.id_token)
            .json(&request);

        self.observe(self.http.send(request).await).await?;

        Ok(())
    }
}

#[async_trait]
impl RemoteStore for RestClient {
    async fn list(&self, partition: Partition) -> Result<Vec<Note>> {
        let Some(identity) = self.session.identity() else {
            tracing::debug!("Not signed in, no remote {partition} notes");
            return Ok(Vec::new());
        };

        let request = self
            .http
            .client()
            .get(self.http.url(&["v1", "documents", partition.collection()])?)
            .bearer_auth(&identity.id_token);

        let response = self
            .observe(self.http.send_json::<ListDocumentsResponse>(request).await)
            .await?;

        let mut notes = Vec::with_capacity(response.documents.len());
        for document in &response.documents {
            match decode_note(document) {
                Ok(owned) if owned.owner_id == identity.user_id => notes.push(owned.note),
                Ok(owned) => {
                    tracing::warn!(
                        "Skipping document {:?} owned by {}",
                        document.name,
                        owned.owner_id
                    );
                }
                Err(err) => {
                    tracing::warn!("Skipping undecodable document {:?}: {err}", document.name);
                }
            }
        }

        tracing::debug!("Fetched {} remote {partition} notes", notes.len());

        Ok(notes)
    }

    async fn create(&self, note: &Note) -> Result<Note> {
        let identity = self.require_identity()?;

        let mut document = encode_note(note, &identity.user_id);
        document.name = None;

        let request = self
            .http
            .client()
            .post(self.http.url(&["v1", "documents", note.partition().collection()])?)
            .bearer_auth(&identity.id_token)
            .json(&document);

        let document = self
            .observe(self.http.send_json::<Document>(request).await)
            .await?;

        let created = decode_note(&document)?;

        tracing::debug!("Created remote note {}", created.note.id);

        Ok(created.note)
    }

    async fn update(&self, note: &Note) -> Result<()> {
        let identity = self.require_identity()?;

        let request = self
            .http
            .client()
            .patch(self.http.url(&[
                "v1",
                "documents",
                note.partition().collection(),
                note.id.as_str(),
            ])?)
            .bearer_auth(&identity.id_token)
            .json(&encode_note(note, &identity.user_id));

        self.observe(self.http.send(request).await).await?;

        tracing::debug!("Updated remote note {}", note.id);

        Ok(())
    }

    async fn delete(&self, id: &str, partition: Partition) -> Result<()> {
        let identity = self.require_identity()?;

        let request = self
            .http
            .client()
            .delete(self.http.url(&["v1", "documents", partition.collection(), id])?)
            .bearer_auth(&identity.id_token);

        match self.observe(self.http.send(request).await).await {
            Ok(_) => {
                tracing::debug!("Deleted remote note {id}");
                Ok(())
            }
            Err(err) if is_not_found(&err) => {
                tracing::debug!("Remote note {id} was already gone");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    async fn batch_upsert(&self, notes: &[Note]) -> Result<()> {
        let identity = self.require_identity()?;

        let total = notes.len();
        let mut committed = 0;

        for chunk in notes.chunks(self.batch_size) {
            if let Err(err) = self.commit(&identity, chunk).await {
                tracing::warn!("Batch upsert stopped after {committed} of {total} notes: {err}");

                return Err(Error::PartialBatch {
                    committed,
                    total,
                    source: Box::new(err),
                });
            }

            committed += chunk.len();
        }

        tracing::debug!("Upserted {total} remote notes");

        Ok(())
    }
}
