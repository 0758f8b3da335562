//! Collection use-cases: save, unsave and list views.
//!
//! # Invariants
//! - Saving is idempotent; unsaving a note that is not saved is a no-op.
//! - Unknown note codes are `NotFound` for both actions.
//! - List views are 10 per page, newest note first, pages past the end
//!   serve the last page.

use crate::model::collection::CollectionFilter;
use crate::model::note::Note;
use crate::model::page::{Page, PageWindow};
use crate::model::user::User;
use crate::repo::collection_repo::{CollectionRepository, SqliteCollectionRepository};
use crate::repo::note_repo::{NoteRepository, SqliteNoteRepository};
use crate::service::{ServiceError, ServiceResult};
use crate::time::now_epoch_ms;
use log::info;
use rusqlite::Connection;

pub const COLLECTION_NOTES_PER_PAGE: u32 = 10;

/// What a save/unsave request changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionChange {
    pub note: Note,
    /// False when the collection already was in the requested state.
    pub changed: bool,
}

pub struct CollectionService<'conn> {
    conn: &'conn Connection,
}

impl<'conn> CollectionService<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn save(&self, user: &User, code: &str) -> ServiceResult<CollectionChange> {
        let note = self.require_note(code)?;
        let changed =
            SqliteCollectionRepository::try_new(self.conn)?.add(user.id, note.id, now_epoch_ms())?;
        info!(
            "event=collection_save module=service status=ok user_id={} note_code={code} changed={changed}",
            user.id
        );
        Ok(CollectionChange { note, changed })
    }

    pub fn unsave(&self, user: &User, code: &str) -> ServiceResult<CollectionChange> {
        let note = self.require_note(code)?;
        let changed = SqliteCollectionRepository::try_new(self.conn)?.remove(user.id, note.id)?;
        info!(
            "event=collection_unsave module=service status=ok user_id={} note_code={code} changed={changed}",
            user.id
        );
        Ok(CollectionChange { note, changed })
    }

    pub fn is_saved(&self, user: &User, code: &str) -> ServiceResult<bool> {
        let note = self.require_note(code)?;
        Ok(SqliteCollectionRepository::try_new(self.conn)?.contains(user.id, note.id)?)
    }

    /// One page of a collection view.
    pub fn list(
        &self,
        user: &User,
        filter: CollectionFilter,
        page: Option<i64>,
    ) -> ServiceResult<Page<Note>> {
        let collections = SqliteCollectionRepository::try_new(self.conn)?;
        let total = collections.count_notes(user.id, filter)?;
        let window = PageWindow::resolve(page, total, COLLECTION_NOTES_PER_PAGE)?;
        let items = collections.list_notes(user.id, filter, window.limit(), window.offset())?;
        Ok(window.into_page(items))
    }

    fn require_note(&self, code: &str) -> ServiceResult<Note> {
        SqliteNoteRepository::try_new(self.conn)?
            .get_by_code(code)?
            .ok_or_else(|| ServiceError::not_found("note", code))
    }
}
