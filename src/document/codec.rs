//! Mapping between notes and documents

use std::collections::BTreeMap;

use chrono::DateTime;
use chrono::Utc;

use crate::error::Error;
use crate::error::Result;
use crate::note::Category;
use crate::note::Note;
use crate::note::Partition;

use super::Document;
use super::Value;

const TITLE: &str = "title";
const CONTENT: &str = "content";
const CATEGORY: &str = "category";
const IS_PRIVATE: &str = "isPrivate";
const USER_ID: &str = "userId";
const CREATED_AT: &str = "createdAt";
const UPDATED_AT: &str = "updatedAt";

/// A note together with the user owning it remotely
#[derive(Clone, Debug, PartialEq)]
pub struct OwnedNote {
    pub owner_id: String,
    pub note: Note,
}

/// Encode a note owned by a user into a document of the note's partition
pub fn encode_note(note: &Note, owner_id: &str) -> Document {
    let mut fields = BTreeMap::new();

    fields.insert(TITLE.to_string(), Value::String(note.title.clone()));
    fields.insert(CONTENT.to_string(), Value::String(note.content.clone()));
    fields.insert(
        CATEGORY.to_string(),
        Value::String(note.category.label().to_string()),
    );
    fields.insert(IS_PRIVATE.to_string(), Value::Boolean(note.is_private));
    fields.insert(USER_ID.to_string(), Value::String(owner_id.to_string()));
    fields.insert(CREATED_AT.to_string(), Value::Timestamp(note.created_at));
    fields.insert(UPDATED_AT.to_string(), Value::Timestamp(note.updated_at));

    Document {
        name: Some(Document::path(note.partition().collection(), &note.id)),
        fields,
        create_time: None,
        update_time: None,
    }
}

/// Decode a named document into a note
///
/// # Errors
///
/// Will return `Err` when a field is missing or has the wrong kind, when the
/// document sits in the collection of the other partition, or when the note it
/// holds is invalid
pub fn decode_note(document: &Document) -> Result<OwnedNote> {
    let name = document
        .name
        .as_deref()
        .ok_or_else(|| Error::Codec("Document has no name".to_string()))?;
    let id = document
        .id()
        .ok_or_else(|| Error::Codec(format!("Document name `{name}` has no ID")))?;

    let is_private = boolean(document, IS_PRIVATE)?;

    if let Some(collection) = document.collection().and_then(Partition::from_collection)
        && collection != Partition::from_private(is_private)
    {
        return Err(Error::PartitionMismatch {
            name: name.to_string(),
            partition: Partition::from_private(is_private),
        });
    }

    let label = string(document, CATEGORY)?;
    let category = Category::from_label(label)
        .ok_or_else(|| Error::Codec(format!("Unknown category `{label}`")))?;

    let content = match document.fields.get(CONTENT) {
        None | Some(Value::Null) => String::new(),
        Some(_) => string(document, CONTENT)?.to_string(),
    };

    let note = Note {
        id: id.to_string(),
        title: string(document, TITLE)?.to_string(),
        content,
        category,
        is_private,
        created_at: timestamp(document, CREATED_AT)?,
        updated_at: timestamp(document, UPDATED_AT)?,
    };

    note.validate()?;

    Ok(OwnedNote {
        owner_id: string(document, USER_ID)?.to_string(),
        note,
    })
}

fn field<'d>(document: &'d Document, key: &str) -> Result<&'d Value> {
    document
        .fields
        .get(key)
        .ok_or_else(|| Error::Codec(format!("Missing field `{key}`")))
}

fn wrong_kind(key: &str, expected: &str, value: &Value) -> Error {
    Error::Codec(format!(
        "Field `{key}` should be a {expected}, got {}",
        value.kind()
    ))
}

fn string<'d>(document: &'d Document, key: &str) -> Result<&'d str> {
    match field(document, key)? {
        Value::String(value) => Ok(value),
        other => Err(wrong_kind(key, "stringValue", other)),
    }
}

fn boolean(document: &Document, key: &str) -> Result<bool> {
    match field(document, key)? {
        Value::Boolean(value) => Ok(*value),
        other => Err(wrong_kind(key, "booleanValue", other)),
    }
}

fn timestamp(document: &Document, key: &str) -> Result<DateTime<Utc>> {
    match field(document, key)? {
        Value::Timestamp(value) => Ok(*value),
        other => Err(wrong_kind(key, "timestampValue", other)),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::note::NoteDraft;

    use super::*;

    fn note(is_private: bool) -> Note {
        Note::create(NoteDraft {
            title: "Groceries".to_string(),
            content: "Milk\nEggs".to_string(),
            category: Category::Lists,
            is_private,
        })
        .unwrap()
    }

    #[test]
    fn test_note_round_trip() {
        for is_private in [false, true] {
            let note = note(is_private);
            let document = encode_note(&note, "user-1");

            let decoded = decode_note(&document).unwrap();
            assert_eq!("user-1", decoded.owner_id);
            assert_eq!(note, decoded.note);

            assert_eq!(document, encode_note(&decoded.note, &decoded.owner_id));
        }
    }

    #[test]
    fn test_wire_document_round_trip() {
        let wire = json!({
            "name": "notes/n1",
            "fields": {
                "title": { "stringValue": "Standup" },
                "content": { "stringValue": "" },
                "category": { "stringValue": "To-Do" },
                "isPrivate": { "booleanValue": false },
                "userId": { "stringValue": "u1" },
                "createdAt": { "timestampValue": "2024-05-01T08:00:00Z" },
                "updatedAt": { "timestampValue": "2024-05-01T08:15:30.250Z" },
            },
        });

        let document = serde_json::from_value::<Document>(wire.clone()).unwrap();
        let decoded = decode_note(&document).unwrap();

        assert_eq!("n1", decoded.note.id);
        assert_eq!(Category::ToDo, decoded.note.category);
        assert_eq!(document, encode_note(&decoded.note, &decoded.owner_id));
        assert_eq!(
            wire,
            serde_json::to_value(encode_note(&decoded.note, &decoded.owner_id)).unwrap()
        );
    }

    #[test]
    fn test_document_lands_in_partition_collection() {
        assert_eq!(
            Some("notes"),
            encode_note(&note(false), "u1").collection()
        );
        assert_eq!(
            Some("privateNotes"),
            encode_note(&note(true), "u1").collection()
        );
    }

    #[test]
    fn test_partition_mismatch_is_rejected() {
        let mut document = encode_note(&note(true), "u1");
        document.name = Some(Document::path("notes", "n1"));

        assert!(matches!(
            decode_note(&document),
            Err(Error::PartitionMismatch { .. })
        ));
    }

    #[test]
    fn test_missing_content_is_empty() {
        let mut document = encode_note(&note(false), "u1");
        document.fields.remove(CONTENT);

        assert_eq!("", decode_note(&document).unwrap().note.content);
    }

    #[test]
    fn test_missing_and_mistyped_fields() {
        let mut document = encode_note(&note(false), "u1");
        document.fields.remove(TITLE);
        assert!(matches!(decode_note(&document), Err(Error::Codec(_))));

        let mut document = encode_note(&note(false), "u1");
        document
            .fields
            .insert(IS_PRIVATE.to_string(), Value::String("false".to_string()));
        assert!(matches!(decode_note(&document), Err(Error::Codec(_))));

        let mut document = encode_note(&note(false), "u1");
        document
            .fields
            .insert(CATEGORY.to_string(), Value::String("Recipes".to_string()));
        assert!(matches!(decode_note(&document), Err(Error::Codec(_))));
    }

    #[test]
    fn test_category_must_match_privacy() {
        let mut document = encode_note(&note(true), "u1");
        document
            .fields
            .insert(CATEGORY.to_string(), Value::String("Work".to_string()));
        assert!(matches!(decode_note(&document), Err(Error::InvalidNote(_))));

        let mut document = encode_note(&note(false), "u1");
        document
            .fields
            .insert(CATEGORY.to_string(), Value::String("Private".to_string()));
        assert!(matches!(decode_note(&document), Err(Error::InvalidNote(_))));
    }

    #[test]
    fn test_invalid_title_is_rejected() {
        let mut document = encode_note(&note(false), "u1");
        document
            .fields
            .insert(TITLE.to_string(), Value::String("   ".to_string()));
        assert!(matches!(decode_note(&document), Err(Error::InvalidNote(_))));

        let mut document = encode_note(&note(false), "u1");
        document
            .fields
            .insert(TITLE.to_string(), Value::String("x".repeat(101)));
        assert!(matches!(decode_note(&document), Err(Error::InvalidNote(_))));
    }

    #[test]
    fn test_unnamed_document_is_rejected() {
        let mut document = encode_note(&note(false), "u1");
        document.name = None;

        assert!(matches!(decode_note(&document), Err(Error::Codec(_))));
    }
}
