//! The note, its categories and the two partitions it can live in

use core::fmt;

use chrono::DateTime;
use chrono::Local;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

use crate::error::Error;
use crate::error::Result;

/// Maximum length of a title, in characters
pub const MAX_TITLE_LENGTH: usize = 100;

/// Category a note is filed under
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum Category {
    #[default]
    General,
    Work,
    Personal,
    Ideas,
    Lists,
    #[serde(rename = "To-Do")]
    ToDo,
    /// Reserved for private notes
    Private,
}

impl Category {
    /// Categories a user can pick for a public note
    pub const SELECTABLE: [Category; 6] = [
        Category::General,
        Category::Work,
        Category::Personal,
        Category::Ideas,
        Category::Lists,
        Category::ToDo,
    ];

    /// Label as shown to the user and stored remotely
    pub fn label(self) -> &'static str {
        match self {
            Category::General => "General",
            Category::Work => "Work",
            Category::Personal => "Personal",
            Category::Ideas => "Ideas",
            Category::Lists => "Lists",
            Category::ToDo => "To-Do",
            Category::Private => "Private",
        }
    }

    /// Parse a label, as produced by [`Category::label`]
    pub fn from_label(label: &str) -> Option<Self> {
        Category::SELECTABLE
            .into_iter()
            .chain([Category::Private])
            .find(|category| category.label() == label)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One of the two disjoint groups notes are stored in
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Partition {
    Public,
    Private,
}

impl Partition {
    /// Both partitions, public first
    pub const ALL: [Partition; 2] = [Partition::Public, Partition::Private];

    /// Partition matching a privacy flag
    pub fn from_private(is_private: bool) -> Self {
        if is_private {
            Partition::Private
        } else {
            Partition::Public
        }
    }

    /// Name of the remote collection, also the local cache key
    pub fn collection(self) -> &'static str {
        match self {
            Partition::Public => "notes",
            Partition::Private => "privateNotes",
        }
    }

    /// Partition for a collection name
    pub fn from_collection(collection: &str) -> Option<Self> {
        Partition::ALL
            .into_iter()
            .find(|partition| partition.collection() == collection)
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Partition::Public => f.write_str("public"),
            Partition::Private => f.write_str("private"),
        }
    }
}

/// User input to create or edit a note
#[derive(Clone, Debug, Default)]
pub struct NoteDraft {
    pub title: String,
    pub content: String,
    pub category: Category,
    pub is_private: bool,
}

/// A single note
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub category: Category,
    pub is_private: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Note {
    /// Create a new note with a fresh ID
    ///
    /// # Errors
    ///
    /// Will return `Err` when the title is empty or too long
    pub fn create(draft: NoteDraft) -> Result<Self> {
        let now = Utc::now();
        let title = normalize_title(&draft.title)?;

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            title,
            content: draft.content,
            category: file_under(draft.category, draft.is_private),
            is_private: draft.is_private,
            created_at: now,
            updated_at: now,
        })
    }

    /// Replace the user-editable parts of the note
    ///
    /// # Errors
    ///
    /// Will return `Err` when the title is empty or too long, the note is left untouched
    pub fn edit(&mut self, draft: NoteDraft) -> Result<()> {
        let title = normalize_title(&draft.title)?;

        self.title = title;
        self.content = draft.content;
        self.category = file_under(draft.category, draft.is_private);
        self.is_private = draft.is_private;
        self.updated_at = Utc::now();

        Ok(())
    }

    /// Partition the note belongs in
    pub fn partition(&self) -> Partition {
        Partition::from_private(self.is_private)
    }

    /// Check the invariants of a note that did not come from [`Note::create`]
    ///
    /// # Errors
    ///
    /// Will return `Err` when any invariant is broken
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(Error::InvalidNote("ID can not be empty".to_string()));
        }

        if self.title.trim().is_empty() {
            return Err(Error::InvalidNote("Title can not be empty".to_string()));
        }

        if self.title.chars().count() > MAX_TITLE_LENGTH {
            return Err(Error::InvalidNote(format!(
                "Title can not be longer than {MAX_TITLE_LENGTH} characters"
            )));
        }

        if self.is_private != (self.category == Category::Private) {
            return Err(Error::InvalidNote(
                "Only private notes are filed under Private".to_string(),
            ));
        }

        Ok(())
    }

    /// Creation instant formatted in local time, for display only
    pub fn display_timestamp(&self) -> String {
        self.created_at
            .with_timezone(&Local)
            .format("%b %-d, %Y %-I:%M %p")
            .to_string()
    }
}

/// Trim and NFC-normalize a title, then check its length
fn normalize_title(title: &str) -> Result<String> {
    let title = title.trim().nfc().collect::<String>();

    if title.is_empty() {
        return Err(Error::InvalidNote("Title can not be empty".to_string()));
    }

    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(Error::InvalidNote(format!(
            "Title can not be longer than {MAX_TITLE_LENGTH} characters"
        )));
    }

    Ok(title)
}

/// Private notes always go under Private, public ones never do
fn file_under(category: Category, is_private: bool) -> Category {
    if is_private {
        Category::Private
    } else if category == Category::Private {
        Category::General
    } else {
        category
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(title: &str) -> NoteDraft {
        NoteDraft {
            title: title.to_string(),
            content: "Some content".to_string(),
            category: Category::Work,
            is_private: false,
        }
    }

    #[test]
    fn test_create_note() {
        let note = Note::create(draft("  Groceries ")).unwrap();

        assert_eq!("Groceries", note.title);
        assert_eq!(Category::Work, note.category);
        assert_eq!(Partition::Public, note.partition());
        assert_eq!(note.created_at, note.updated_at);
        assert!(Uuid::parse_str(&note.id).is_ok());
        assert!(note.validate().is_ok());
    }

    #[test]
    fn test_create_note_ids_are_unique() {
        let one = Note::create(draft("One")).unwrap();
        let two = Note::create(draft("Two")).unwrap();

        assert_ne!(one.id, two.id);
    }

    #[test]
    fn test_empty_title() {
        assert!(matches!(
            Note::create(draft("   ")),
            Err(Error::InvalidNote(_))
        ));
    }

    #[test]
    fn test_title_length_counts_characters() {
        // 100 multi-byte characters still fit
        let title = "é".repeat(MAX_TITLE_LENGTH);
        assert!(Note::create(draft(&title)).is_ok());

        let title = "a".repeat(MAX_TITLE_LENGTH + 1);
        assert!(matches!(
            Note::create(draft(&title)),
            Err(Error::InvalidNote(_))
        ));
    }

    #[test]
    fn test_title_is_nfc_normalized() {
        // "e" followed by a combining acute accent
        let note = Note::create(draft("Cafe\u{301}")).unwrap();

        assert_eq!("Caf\u{e9}", note.title);
    }

    #[test]
    fn test_private_note_is_filed_under_private() {
        let note = Note::create(NoteDraft {
            is_private: true,
            ..draft("Secret")
        })
        .unwrap();

        assert_eq!(Category::Private, note.category);
        assert_eq!(Partition::Private, note.partition());
    }

    #[test]
    fn test_public_note_can_not_pick_private() {
        let note = Note::create(NoteDraft {
            category: Category::Private,
            ..draft("Not so secret")
        })
        .unwrap();

        assert_eq!(Category::General, note.category);
        assert!(!note.is_private);
    }

    #[test]
    fn test_edit_note() {
        let mut note = Note::create(draft("Before")).unwrap();
        let id = note.id.clone();
        let created_at = note.created_at;

        note.edit(NoteDraft {
            is_private: true,
            ..draft("After")
        })
        .unwrap();

        assert_eq!(id, note.id);
        assert_eq!(created_at, note.created_at);
        assert_eq!("After", note.title);
        assert_eq!(Category::Private, note.category);
        assert!(note.updated_at >= created_at);
    }

    #[test]
    fn test_failed_edit_leaves_note_untouched() {
        let mut note = Note::create(draft("Before")).unwrap();
        let before = note.clone();

        assert!(note.edit(draft("")).is_err());
        assert_eq!(before, note);
    }

    #[test]
    fn test_validate_partition_agreement() {
        let mut note = Note::create(draft("Mismatch")).unwrap();
        note.is_private = true;

        assert!(matches!(note.validate(), Err(Error::InvalidNote(_))));
    }

    #[test]
    fn test_category_labels() {
        assert_eq!(Some(Category::ToDo), Category::from_label("To-Do"));
        assert_eq!(Some(Category::Private), Category::from_label("Private"));
        assert_eq!(None, Category::from_label("Groceries"));

        assert_eq!(
            "\"To-Do\"",
            serde_json::to_string(&Category::ToDo).unwrap()
        );
    }

    #[test]
    fn test_partition_collections() {
        assert_eq!("notes", Partition::Public.collection());
        assert_eq!("privateNotes", Partition::Private.collection());
        assert_eq!(
            Some(Partition::Private),
            Partition::from_collection("privateNotes")
        );
        assert_eq!(None, Partition::from_collection("users"));
    }

    #[test]
    fn test_cache_json_shape() {
        let note = Note::create(draft("Shape")).unwrap();
        let json = serde_json::to_value(&note).unwrap();

        assert!(json.get("isPrivate").is_some());
        assert!(json.get("createdAt").is_some());
        assert_eq!(note, serde_json::from_value::<Note>(json).unwrap());
    }
}
