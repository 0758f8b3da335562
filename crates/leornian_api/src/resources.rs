//! JSON resource shapes.

use leornian_core::drill::DrawnEntry;
use leornian_core::time::epoch_ms_to_rfc3339;
use leornian_core::{Note, Settings};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoteResource {
    pub code: String,
    pub url: String,
    pub text: String,
    pub html: String,
    /// Stored visibility value: 1 normal, 2 unlisted.
    pub visibility: i64,
    pub visibility_label: &'static str,
    pub visibility_locked: bool,
    pub author: Option<String>,
    pub author_url: Option<String>,
    pub created: String,
}

impl NoteResource {
    pub fn from_note(note: &Note, settings: &Settings) -> Self {
        Self {
            code: note.code.clone(),
            url: settings.absolute_url(&format!("/api/notes/{}", note.code)),
            text: note.text.clone(),
            html: note.html(),
            visibility: note.visibility.as_db(),
            visibility_label: note.visibility.label(),
            visibility_locked: note.visibility_locked,
            author: note.author_username.clone(),
            author_url: note
                .author_username
                .as_ref()
                .map(|username| settings.absolute_url(&format!("/api/authors/{username}"))),
            created: epoch_ms_to_rfc3339(note.created_at),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DrawResource {
    pub note: NoteResource,
    pub promoted: bool,
    pub recent_count: u64,
}

impl DrawResource {
    pub fn new(entry: &DrawnEntry, note: &Note, settings: &Settings) -> Self {
        Self {
            note: NoteResource::from_note(note, settings),
            promoted: entry.promoted,
            recent_count: entry.recent_count,
        }
    }
}
