//! Document API
//!
//! Every call acts for the current user: only their documents are visible, and every
//! written document has to carry their ID in its `userId` field.

use std::collections::BTreeMap;

use axum::Extension;
use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use crate::document::Document;
use crate::document::Value;
use crate::server::storage::DocumentWrite;
use crate::server::storage::Storage;

use super::CurrentUser;
use super::Error;
use super::Form;
use super::PathParameters;
use super::Success;
use super::parse_segment;

/// All documents of a collection
#[derive(Debug, Serialize)]
pub struct ListDocumentsResponse {
    documents: Vec<Document>,
}

/// Body of a commit
#[derive(Debug, Deserialize)]
pub struct CommitForm {
    writes: Vec<WriteForm>,
}

/// A single write of a commit, only updates (upserts) are supported
#[derive(Debug, Deserialize)]
pub struct WriteForm {
    update: Document,
}

/// Outcome of a commit
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitResponse {
    write_results: Vec<WriteResult>,
    commit_time: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    update_time: Option<DateTime<Utc>>,
}

/// Path of a collection
#[derive(Debug, Deserialize)]
pub struct CollectionPath {
    collection: String,
}

/// Path of a single document
#[derive(Debug, Deserialize)]
pub struct DocumentPath {
    collection: String,
    id: String,
}

/// Only documents owned by the current user may be written
fn ensure_owner(
    current_user: &CurrentUser,
    fields: &BTreeMap<String, Value>,
) -> Result<(), Error> {
    match fields.get("userId") {
        Some(Value::String(owner_id)) if *owner_id == current_user.id => Ok(()),
        Some(_) => Err(Error::forbidden("`userId` does not match the current user")),
        None => Err(Error::bad_request("Missing `userId` field")),
    }
}

/// List the documents of a collection, newest first
///
/// Request:
/// ```sh
/// curl -v -H 'Authorization: Bearer tokentokentoken' \
///     http://localhost:6000/v1/documents/notes
/// ```
///
/// Response:
/// ```json
/// { "documents": [{ "name": "notes/...", "fields": { ... }, "createTime": "...", "updateTime": "..." }] }
/// ```
pub async fn list<S: Storage>(
    current_user: CurrentUser,
    Extension(storage): Extension<S>,
    PathParameters(path): PathParameters<CollectionPath>,
) -> Result<Success<ListDocumentsResponse>, Error> {
    let collection = parse_segment(&path.collection)?;

    let documents = storage
        .find_all_documents(collection, &current_user.id)
        .await
        .map_err(Error::internal_server_error)?;

    Ok(Success::ok(ListDocumentsResponse { documents }))
}

/// Create a document, its ID is generated
///
/// Request:
/// ```sh
/// curl -v -H 'Content-Type: application/json' \
///     -H 'Authorization: Bearer tokentokentoken' \
///     -d '{ "fields": { "userId": { "stringValue": "..." }, "title": { "stringValue": "Groceries" } } }' \
///     http://localhost:6000/v1/documents/notes
/// ```
///
/// Response: the created document
pub async fn create<S: Storage>(
    current_user: CurrentUser,
    Extension(storage): Extension<S>,
    PathParameters(path): PathParameters<CollectionPath>,
    Form(document): Form<Document>,
) -> Result<Success<Document>, Error> {
    let collection = parse_segment(&path.collection)?;

    ensure_owner(&current_user, &document.fields)?;

    let write = DocumentWrite {
        collection: collection.to_string(),
        id: Uuid::new_v4().to_string(),
        fields: document.fields,
    };

    let document = storage
        .write_documents(&current_user.id, &[write])
        .await?
        .pop()
        .ok_or_else(|| Error::internal_server_error("Could not create document"))?;

    tracing::debug!("Created document {:?}", document.name);

    Ok(Success::ok(document))
}

/// Get a single document
///
/// Request:
/// ```sh
/// curl -v -H 'Authorization: Bearer tokentokentoken' \
///     http://localhost:6000/v1/documents/notes/some-id
/// ```
pub async fn single<S: Storage>(
    current_user: CurrentUser,
    Extension(storage): Extension<S>,
    PathParameters(path): PathParameters<DocumentPath>,
) -> Result<Success<Document>, Error> {
    let collection = parse_segment(&path.collection)?;
    let id = parse_segment(&path.id)?;

    storage
        .find_single_document(collection, id, &current_user.id)
        .await
        .map_err(Error::internal_server_error)?
        .map(Success::ok)
        .ok_or_else(|| Error::not_found("Document not found"))
}

/// Create or replace a document with a given ID
///
/// Request:
/// ```sh
/// curl -v -X PATCH -H 'Content-Type: application/json' \
///     -H 'Authorization: Bearer tokentokentoken' \
///     -d '{ "fields": { "userId": { "stringValue": "..." }, "title": { "stringValue": "Groceries" } } }' \
///     http://localhost:6000/v1/documents/notes/some-id
/// ```
///
/// Response: the stored document
pub async fn upsert<S: Storage>(
    current_user: CurrentUser,
    Extension(storage): Extension<S>,
    PathParameters(path): PathParameters<DocumentPath>,
    Form(document): Form<Document>,
) -> Result<Success<Document>, Error> {
    let collection = parse_segment(&path.collection)?;
    let id = parse_segment(&path.id)?;

    ensure_owner(&current_user, &document.fields)?;

    let write = DocumentWrite {
        collection: collection.to_string(),
        id: id.to_string(),
        fields: document.fields,
    };

    let document = storage
        .write_documents(&current_user.id, &[write])
        .await?
        .pop()
        .ok_or_else(|| Error::internal_server_error("Could not write document"))?;

    tracing::debug!("Wrote document {:?}", document.name);

    Ok(Success::ok(document))
}

/// Delete a document
///
/// Request:
/// ```sh
/// curl -v -X DELETE -H 'Authorization: Bearer tokentokentoken' \
///     http://localhost:6000/v1/documents/notes/some-id
/// ```
pub async fn delete<S: Storage>(
    current_user: CurrentUser,
    Extension(storage): Extension<S>,
    PathParameters(path): PathParameters<DocumentPath>,
) -> Result<Success<()>, Error> {
    let collection = parse_segment(&path.collection)?;
    let id = parse_segment(&path.id)?;

    let deleted = storage
        .delete_document(collection, id, &current_user.id)
        .await
        .map_err(Error::internal_server_error)?;

    if deleted {
        tracing::debug!("Deleted document {collection}/{id}");
        Ok(Success::no_content())
    } else {
        Err(Error::not_found("Document not found"))
    }
}

/// Create or replace many documents at once, all of them or none
///
/// Request:
/// ```sh
/// curl -v -H 'Content-Type: application/json' \
///     -H 'Authorization: Bearer tokentokentoken' \
///     -d '{ "writes": [{ "update": { "name": "notes/some-id", "fields": { ... } } }] }' \
///     http://localhost:6000/v1/documents:commit
/// ```
///
/// Response:
/// ```json
/// { "writeResults": [{ "updateTime": "..." }], "commitTime": "..." }
/// ```
pub async fn commit<S: Storage>(
    current_user: CurrentUser,
    Extension(storage): Extension<S>,
    Form(form): Form<CommitForm>,
) -> Result<Success<CommitResponse>, Error> {
    let mut writes = Vec::with_capacity(form.writes.len());

    for WriteForm { update } in form.writes {
        let (Some(collection), Some(id)) = (update.collection(), update.id()) else {
            return Err(Error::bad_request(
                "Every update needs a name of the form `{collection}/{id}`",
            ));
        };

        let write = DocumentWrite {
            collection: parse_segment(collection)?.to_string(),
            id: parse_segment(id)?.to_string(),
            fields: update.fields.clone(),
        };

        ensure_owner(&current_user, &write.fields)?;

        writes.push(write);
    }

    let written = storage.write_documents(&current_user.id, &writes).await?;

    tracing::debug!("Committed {} documents", written.len());

    Ok(Success::ok(CommitResponse {
        write_results: written
            .iter()
            .map(|document| WriteResult {
                update_time: document.update_time,
            })
            .collect(),
        commit_time: Utc::now(),
    }))
}
