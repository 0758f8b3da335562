//! Note use-case service.
//!
//! # Responsibility
//! - Create notes (auto-collected by their author) and render previews.
//! - Serve single notes, author pages and random discovery.
//! - Apply author and moderator visibility changes, deattribution and deletion.
//!
//! # Invariants
//! - Note creation and the author's collection entry commit together.
//! - Author pages list `Normal` notes only, 10 per page, newest first.
//! - Authors cannot change the visibility of a locked note.

use crate::codes::{generate_reference_code, NOTE_CODE_LENGTH};
use crate::markdown::render_note_html;
use crate::model::note::{validate_note_text, NewNote, Note, Visibility};
use crate::model::page::{Page, PageWindow};
use crate::model::user::User;
use crate::model::validation::ValidationError;
use crate::repo::collection_repo::{CollectionRepository, SqliteCollectionRepository};
use crate::repo::note_repo::{NoteRepository, SqliteNoteRepository};
use crate::repo::user_repo::{SqliteUserRepository, UserRepository};
use crate::repo::RepoError;
use crate::service::{ServiceError, ServiceResult, CODE_GENERATION_ATTEMPTS};
use crate::time::{now_epoch_ms, EpochMs, DAY_MS};
use log::{info, warn};
use rand::Rng;
use rusqlite::{Connection, TransactionBehavior};

pub const NOTES_PER_PAGE: u32 = 10;

/// Renders note Markdown without persisting anything.
pub fn preview_html(text: &str) -> Result<String, ValidationError> {
    validate_note_text(text)?;
    Ok(render_note_html(text))
}

pub struct NoteService<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> NoteService<'conn> {
    pub fn new(conn: &'conn mut Connection) -> Self {
        Self { conn }
    }

    /// Creates a note authored by `author` and adds it to their collection.
    pub fn create_note(&mut self, author: &User, draft: &NewNote) -> ServiceResult<Note> {
        draft.validate()?;

        let now = now_epoch_ms();
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let note = {
            let notes = SqliteNoteRepository::try_new(&tx)?;
            let collections = SqliteCollectionRepository::try_new(&tx)?;
            let note = insert_with_fresh_code(&notes, draft, author, now)?;
            collections.add(author.id, note.id, now)?;
            note
        };
        tx.commit()?;

        info!(
            "event=note_create module=service status=ok note_code={} author_id={} visibility={}",
            note.code,
            author.id,
            note.visibility.as_db()
        );
        Ok(note)
    }

    pub fn get_note(&self, code: &str) -> ServiceResult<Note> {
        SqliteNoteRepository::try_new(self.conn)?
            .get_by_code(code)?
            .ok_or_else(|| ServiceError::not_found("note", code))
    }

    /// Lists an author's `Normal` notes.
    pub fn notes_by_author(&self, username: &str, page: Option<i64>) -> ServiceResult<Page<Note>> {
        let author = SqliteUserRepository::try_new(self.conn)?
            .find_by_username(username)?
            .ok_or_else(|| ServiceError::not_found("user", username))?;
        let notes = SqliteNoteRepository::try_new(self.conn)?;

        let total = notes.count_listed_by_author(author.id)?;
        let window = PageWindow::resolve(page, total, NOTES_PER_PAGE)?;
        let items = notes.list_listed_by_author(author.id, window.limit(), window.offset())?;
        Ok(window.into_page(items))
    }

    /// Picks a random `Normal` note `viewer` neither wrote nor collected.
    pub fn random_note<G: Rng + ?Sized>(
        &self,
        viewer: Option<&User>,
        rng: &mut G,
    ) -> ServiceResult<Option<Note>> {
        let notes = SqliteNoteRepository::try_new(self.conn)?;
        let viewer_id = viewer.map(|user| user.id);
        let total = notes.count_discoverable(viewer_id)?;
        if total == 0 {
            return Ok(None);
        }
        let offset = rng.gen_range(0..total);
        Ok(notes.discoverable_at(viewer_id, offset)?)
    }

    /// Author-initiated visibility change.
    pub fn set_visibility(
        &self,
        author: &User,
        code: &str,
        visibility: Visibility,
    ) -> ServiceResult<Note> {
        let notes = SqliteNoteRepository::try_new(self.conn)?;
        let note = self.get_note(code)?;
        if !note.is_authored_by(author.id) {
            return Err(ServiceError::permission_denied(
                "only the author can change a note's visibility",
            ));
        }
        if note.visibility_locked {
            return Err(ServiceError::permission_denied(
                "the visibility of this note has been locked by a moderator",
            ));
        }
        notes.update_visibility(note.id, visibility, false)?;
        self.get_note(code)
    }

    /// Staff-only visibility override; `locked` blocks later author changes.
    pub fn moderate_visibility(
        &self,
        moderator: &User,
        code: &str,
        visibility: Visibility,
        locked: bool,
    ) -> ServiceResult<Note> {
        if !moderator.is_staff {
            return Err(ServiceError::permission_denied("staff only"));
        }
        let note = self.get_note(code)?;
        SqliteNoteRepository::try_new(self.conn)?.update_visibility(note.id, visibility, locked)?;
        info!(
            "event=note_moderate module=service status=ok note_code={code} moderator_id={} visibility={} locked={locked}",
            moderator.id,
            visibility.as_db()
        );
        self.get_note(code)
    }

    /// Removes the author's name from one of their notes.
    pub fn deattribute(&mut self, author: &User, code: &str) -> ServiceResult<Note> {
        let note = self.get_note(code)?;
        if !note.is_authored_by(author.id) {
            return Err(ServiceError::permission_denied(
                "only the author can remove their name from a note",
            ));
        }

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        SqliteNoteRepository::try_new(&tx)?.deattribute(note.id, author.id, now_epoch_ms())?;
        tx.commit()?;

        info!(
            "event=note_deattribute module=service status=ok note_code={code} author_id={}",
            author.id
        );
        self.get_note(code)
    }

    /// Author-only deletion; collection entries go with the note.
    pub fn delete_note(&self, author: &User, code: &str) -> ServiceResult<()> {
        let note = self.get_note(code)?;
        if !note.is_authored_by(author.id) {
            return Err(ServiceError::permission_denied(
                "only the author can delete a note",
            ));
        }
        SqliteNoteRepository::try_new(self.conn)?.delete_note(note.id)?;
        info!(
            "event=note_delete module=service status=ok note_code={code} author_id={}",
            author.id
        );
        Ok(())
    }

    /// Deletes deattribution records older than `num_days` days.
    pub fn purge_deattributions(&self, num_days: i64) -> ServiceResult<usize> {
        if num_days < 1 {
            return Err(ValidationError::new("num_days", "num_days should be positive.").into());
        }
        let cutoff = now_epoch_ms() - num_days.saturating_mul(DAY_MS);
        let deleted =
            SqliteNoteRepository::try_new(self.conn)?.purge_deattributions_until(cutoff)?;
        info!(
            "event=deattribution_purge module=service status=ok num_days={num_days} deleted={deleted}"
        );
        Ok(deleted)
    }
}

fn insert_with_fresh_code<R: NoteRepository>(
    notes: &R,
    draft: &NewNote,
    author: &User,
    now: EpochMs,
) -> ServiceResult<Note> {
    let mut rng = rand::thread_rng();
    for attempt in 1..=CODE_GENERATION_ATTEMPTS {
        let code = generate_reference_code(&mut rng, NOTE_CODE_LENGTH);
        match notes.insert_note(&code, draft, Some(author.id), now) {
            Ok(note) => return Ok(note),
            Err(RepoError::Conflict(_)) => {
                warn!("event=note_create module=service status=retry error_code=code_collision attempt={attempt}");
            }
            Err(err) => return Err(err.into()),
        }
    }
    Err(ServiceError::Conflict(
        "could not allocate a unique note code".to_string(),
    ))
}
