//! Note domain model.
//!
//! # Responsibility
//! - Define the short Markdown note record and its visibility states.
//! - Validate user-provided note text.
//!
//! # Invariants
//! - `code` is unique and never reused; it is the public identifier.
//! - `author` becomes `None` when the author is deleted or deattributes.
//! - `visibility_locked` notes can only change visibility through moderation.

use crate::markdown::render_note_html;
use crate::model::user::UserId;
use crate::model::validation::{validate_text_field, ValidationError};
use crate::time::EpochMs;
use serde::{Deserialize, Serialize};

/// Internal row identifier. Never exposed outside core.
pub type NoteId = i64;

pub const NOTE_TEXT_MAX_CHARS: usize = 1200;

/// Who can discover a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Listed on the author's page and eligible for random discovery.
    Normal,
    /// Reachable by code only.
    Unlisted,
}

impl Visibility {
    pub fn as_db(self) -> i64 {
        match self {
            Self::Normal => 1,
            Self::Unlisted => 2,
        }
    }

    pub fn from_db(value: i64) -> Option<Self> {
        match value {
            1 => Some(Self::Normal),
            2 => Some(Self::Unlisted),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::Unlisted => "Unlisted",
        }
    }
}

impl Default for Visibility {
    fn default() -> Self {
        Self::Normal
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub code: String,
    /// Markdown source.
    pub text: String,
    pub visibility: Visibility,
    pub visibility_locked: bool,
    pub author_id: Option<UserId>,
    /// Joined from `users`; `None` for deattributed or orphaned notes.
    pub author_username: Option<String>,
    pub created_at: EpochMs,
}

impl Note {
    /// Renders the restricted-Markdown HTML for this note.
    pub fn html(&self) -> String {
        render_note_html(&self.text)
    }

    /// Site-relative permalink.
    pub fn path(&self) -> String {
        format!("/{}/", self.code)
    }

    pub fn is_authored_by(&self, user_id: UserId) -> bool {
        self.author_id == Some(user_id)
    }
}

/// Input for note creation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewNote {
    pub text: String,
    pub visibility: Visibility,
}

impl NewNote {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            visibility: Visibility::Normal,
        }
    }

    pub fn unlisted(mut self) -> Self {
        self.visibility = Visibility::Unlisted;
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_note_text(&self.text)
    }
}

pub fn validate_note_text(text: &str) -> Result<(), ValidationError> {
    validate_text_field("text", text, NOTE_TEXT_MAX_CHARS)
}

/// Record of an author removing their name from a note.
///
/// Kept for a limited time so moderation can still trace recent content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deattribution {
    pub note_id: NoteId,
    pub author_id: UserId,
    pub created_at: EpochMs,
}
