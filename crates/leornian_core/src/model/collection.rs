//! Collection entry model: the per-user saved-note relation.
//!
//! # Invariants
//! - At most one entry per `(user_id, note_id)`.
//! - `last_reviewed` starts at creation time and only moves forward when
//!   the entry is drawn by the drill.
//! - Every lookup and mutation is scoped by `user_id`.

use crate::model::note::{Note, NoteId};
use crate::model::user::UserId;
use crate::time::EpochMs;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionEntry {
    pub user_id: UserId,
    pub note_id: NoteId,
    /// Public code of the collected note.
    pub note_code: String,
    pub created_at: EpochMs,
    pub last_reviewed: EpochMs,
    pub promoted: bool,
}

/// Collection list views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionFilter {
    All,
    AuthoredByMe,
    AuthoredByOthers,
    Promoted,
    /// Authored by the user but not (or no longer) in their collection.
    AuthoredNotCollected,
}

/// A collection entry joined with the note it points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectedNote {
    pub entry: CollectionEntry,
    pub note: Note,
}
