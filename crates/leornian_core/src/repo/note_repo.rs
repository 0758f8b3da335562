//! Note and deattribution repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist notes and resolve them by public code.
//! - Serve author listings and random discovery candidates.
//! - Record and purge deattributions.
//!
//! # Invariants
//! - Author listings and discovery only ever return `Normal` notes.
//! - Lists are ordered newest first (`created_at DESC, id DESC`).
//! - Note codes are unique; a clash surfaces as `RepoError::Conflict`.

use crate::model::note::{Deattribution, NewNote, Note, NoteId, Visibility};
use crate::model::user::UserId;
use crate::repo::{bool_to_int, ensure_connection_ready, int_to_bool, map_unique_violation};
use crate::repo::{RepoError, RepoResult};
use crate::time::EpochMs;
use rusqlite::{params, Connection, OptionalExtension, Row};

/// Columns read by [`parse_note_row`]; expects `notes n` and `users u` aliases.
pub(crate) const NOTE_COLUMNS_SQL: &str = "n.id,
    n.code,
    n.text,
    n.visibility,
    n.visibility_locked,
    n.author_id,
    u.username AS author_username,
    n.created_at";

const NOTE_FROM_SQL: &str = "FROM notes n LEFT JOIN users u ON u.id = n.author_id";

// Eligible for discovery by ?1 (NULL = anonymous visitor).
const DISCOVERABLE_WHERE_SQL: &str = "WHERE n.visibility = 1
   AND (?1 IS NULL OR n.author_id IS NULL OR n.author_id <> ?1)
   AND (?1 IS NULL OR NOT EXISTS (
        SELECT 1 FROM collections c WHERE c.note_id = n.id AND c.user_id = ?1
   ))";

/// Repository interface for notes.
pub trait NoteRepository {
    /// Inserts a validated note under `code`.
    fn insert_note(
        &self,
        code: &str,
        note: &NewNote,
        author_id: Option<UserId>,
        now: EpochMs,
    ) -> RepoResult<Note>;
    fn get_note(&self, id: NoteId) -> RepoResult<Option<Note>>;
    fn get_by_code(&self, code: &str) -> RepoResult<Option<Note>>;
    /// Counts an author's `Normal` notes.
    fn count_listed_by_author(&self, author_id: UserId) -> RepoResult<u64>;
    /// Lists an author's `Normal` notes, newest first.
    fn list_listed_by_author(
        &self,
        author_id: UserId,
        limit: u32,
        offset: u64,
    ) -> RepoResult<Vec<Note>>;
    /// Counts notes `viewer` may discover at random.
    fn count_discoverable(&self, viewer: Option<UserId>) -> RepoResult<u64>;
    /// Returns the discoverable note at `offset` in newest-first order.
    fn discoverable_at(&self, viewer: Option<UserId>, offset: u64) -> RepoResult<Option<Note>>;
    /// Sets visibility and lock flag together.
    fn update_visibility(
        &self,
        id: NoteId,
        visibility: Visibility,
        locked: bool,
    ) -> RepoResult<()>;
    fn delete_note(&self, id: NoteId) -> RepoResult<()>;
    /// Nulls authorship of `id` when authored by `author_id` and records it.
    fn deattribute(&self, id: NoteId, author_id: UserId, now: EpochMs) -> RepoResult<()>;
    fn list_deattributions(&self) -> RepoResult<Vec<Deattribution>>;
    /// Deletes deattribution records created at or before `cutoff`.
    fn purge_deattributions_until(&self, cutoff: EpochMs) -> RepoResult<usize>;
}

/// SQLite-backed note repository.
pub struct SqliteNoteRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNoteRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }

    fn query_one(&self, sql: &str, params: impl rusqlite::Params) -> RepoResult<Option<Note>> {
        self.conn
            .query_row(sql, params, |row| Ok(parse_note_row(row)))
            .optional()?
            .transpose()
    }
}

impl NoteRepository for SqliteNoteRepository<'_> {
    fn insert_note(
        &self,
        code: &str,
        note: &NewNote,
        author_id: Option<UserId>,
        now: EpochMs,
    ) -> RepoResult<Note> {
        note.validate()?;

        self.conn
            .execute(
                "INSERT INTO notes (code, text, visibility, author_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5);",
                params![
                    code,
                    note.text.as_str(),
                    note.visibility.as_db(),
                    author_id,
                    now
                ],
            )
            .map_err(|err| map_unique_violation(err, format!("note code `{code}` is taken")))?;

        let id = self.conn.last_insert_rowid();
        self.get_note(id)?
            .ok_or_else(|| RepoError::InvalidData(format!("note {id} missing after insert")))
    }

    fn get_note(&self, id: NoteId) -> RepoResult<Option<Note>> {
        self.query_one(
            &format!("SELECT {NOTE_COLUMNS_SQL} {NOTE_FROM_SQL} WHERE n.id = ?1;"),
            [id],
        )
    }

    fn get_by_code(&self, code: &str) -> RepoResult<Option<Note>> {
        self.query_one(
            &format!("SELECT {NOTE_COLUMNS_SQL} {NOTE_FROM_SQL} WHERE n.code = ?1;"),
            [code],
        )
    }

    fn count_listed_by_author(&self, author_id: UserId) -> RepoResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM notes WHERE author_id = ?1 AND visibility = 1;",
            [author_id],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    fn list_listed_by_author(
        &self,
        author_id: UserId,
        limit: u32,
        offset: u64,
    ) -> RepoResult<Vec<Note>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {NOTE_COLUMNS_SQL} {NOTE_FROM_SQL}
             WHERE n.author_id = ?1 AND n.visibility = 1
             ORDER BY n.created_at DESC, n.id DESC
             LIMIT ?2 OFFSET ?3;"
        ))?;
        let mut rows = stmt.query(params![author_id, i64::from(limit), offset as i64])?;
        let mut notes = Vec::new();
        while let Some(row) = rows.next()? {
            notes.push(parse_note_row(row)?);
        }
        Ok(notes)
    }

    fn count_discoverable(&self, viewer: Option<UserId>) -> RepoResult<u64> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM notes n {DISCOVERABLE_WHERE_SQL};"),
            params![viewer],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    fn discoverable_at(&self, viewer: Option<UserId>, offset: u64) -> RepoResult<Option<Note>> {
        self.query_one(
            &format!(
                "SELECT {NOTE_COLUMNS_SQL} {NOTE_FROM_SQL}
                 {DISCOVERABLE_WHERE_SQL}
                 ORDER BY n.created_at DESC, n.id DESC
                 LIMIT 1 OFFSET ?2;"
            ),
            params![viewer, offset as i64],
        )
    }

    fn update_visibility(
        &self,
        id: NoteId,
        visibility: Visibility,
        locked: bool,
    ) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE notes SET visibility = ?2, visibility_locked = ?3 WHERE id = ?1;",
            params![id, visibility.as_db(), bool_to_int(locked)],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("note", id));
        }
        Ok(())
    }

    fn delete_note(&self, id: NoteId) -> RepoResult<()> {
        let changed = self.conn.execute("DELETE FROM notes WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::not_found("note", id));
        }
        Ok(())
    }

    fn deattribute(&self, id: NoteId, author_id: UserId, now: EpochMs) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE notes SET author_id = NULL WHERE id = ?1 AND author_id = ?2;",
            params![id, author_id],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("authored note", id));
        }
        self.conn
            .execute(
                "INSERT INTO deattributions (note_id, author_id, created_at)
                 VALUES (?1, ?2, ?3);",
                params![id, author_id, now],
            )
            .map_err(|err| map_unique_violation(err, format!("note {id} already deattributed")))?;
        Ok(())
    }

    fn list_deattributions(&self) -> RepoResult<Vec<Deattribution>> {
        let mut stmt = self.conn.prepare(
            "SELECT note_id, author_id, created_at
             FROM deattributions
             ORDER BY created_at DESC, note_id DESC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(Deattribution {
                note_id: row.get("note_id")?,
                author_id: row.get("author_id")?,
                created_at: row.get("created_at")?,
            });
        }
        Ok(records)
    }

    fn purge_deattributions_until(&self, cutoff: EpochMs) -> RepoResult<usize> {
        let deleted = self
            .conn
            .execute("DELETE FROM deattributions WHERE created_at <= ?1;", [cutoff])?;
        Ok(deleted)
    }
}

pub(crate) fn parse_note_row(row: &Row<'_>) -> RepoResult<Note> {
    let visibility_raw: i64 = row.get("visibility")?;
    let visibility = Visibility::from_db(visibility_raw).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid visibility `{visibility_raw}` in notes.visibility"
        ))
    })?;

    Ok(Note {
        id: row.get("id")?,
        code: row.get("code")?,
        text: row.get("text")?,
        visibility,
        visibility_locked: int_to_bool(
            row.get("visibility_locked")?,
            "notes.visibility_locked",
        )?,
        author_id: row.get("author_id")?,
        author_username: row.get("author_username")?,
        created_at: row.get("created_at")?,
    })
}
