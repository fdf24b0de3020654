//! Typed-field documents, as stored by the remote document store

use std::collections::BTreeMap;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

pub use codec::OwnedNote;
pub use codec::decode_note;
pub use codec::encode_note;
pub use value::Value;

mod codec;
mod value;

/// A document: a name, typed fields and the instants the store keeps
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Path of the document, `{collection}/{id}`
    ///
    /// Absent on documents the store still has to assign an ID to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// The fields
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,

    /// When the store first saw the document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<DateTime<Utc>>,

    /// When the store last replaced the document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<DateTime<Utc>>,
}

impl Document {
    /// Path of a document in a collection
    pub fn path(collection: &str, id: &str) -> String {
        format!("{collection}/{id}")
    }

    /// ID of the document, the last segment of its name
    pub fn id(&self) -> Option<&str> {
        self.name
            .as_deref()
            .and_then(|name| name.rsplit('/').next())
            .filter(|id| !id.is_empty())
    }

    /// Collection of the document, the segment before its ID
    pub fn collection(&self) -> Option<&str> {
        self.name
            .as_deref()
            .and_then(|name| name.rsplit('/').nth(1))
            .filter(|collection| !collection.is_empty())
    }

    /// A string field
    pub fn string_field(&self, key: &str) -> Option<&str> {
        match self.fields.get(key) {
            Some(Value::String(value)) => Some(value),
            _ => None,
        }
    }
}
