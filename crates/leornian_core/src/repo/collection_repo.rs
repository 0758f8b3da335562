//! Collection store: per-user saved notes with drill metadata.
//!
//! # Responsibility
//! - Save/unsave notes for a user.
//! - Serve the recency-ordered reads and scoped writes the drill needs.
//! - Serve filtered collection listings and export rows.
//!
//! # Invariants
//! - Every statement filters by `user_id`; no method can touch another
//!   user's entries.
//! - Recency order is `last_reviewed DESC, id DESC` so ties are stable.
//! - `touch_reviewed` moves `last_reviewed` strictly forward.

use crate::model::collection::{CollectedNote, CollectionEntry, CollectionFilter};
use crate::model::note::{Note, NoteId};
use crate::model::user::UserId;
use crate::repo::note_repo::{parse_note_row, NOTE_COLUMNS_SQL};
use crate::repo::{bool_to_int, ensure_connection_ready, int_to_bool, RepoError, RepoResult};
use crate::time::EpochMs;
use rusqlite::{params, Connection, OptionalExtension, Row};

/// Persistence operations over one user's collection.
pub trait CollectionRepository {
    /// Adds `note_id` to the collection. Returns `false` when already saved.
    fn add(&self, user_id: UserId, note_id: NoteId, now: EpochMs) -> RepoResult<bool>;
    /// Removes `note_id` from the collection. Returns `false` when absent.
    fn remove(&self, user_id: UserId, note_id: NoteId) -> RepoResult<bool>;
    fn contains(&self, user_id: UserId, note_id: NoteId) -> RepoResult<bool>;
    /// All entries, most recently reviewed first.
    fn entries_by_recency(&self, user_id: UserId) -> RepoResult<Vec<CollectionEntry>>;
    /// Sets `promoted` on the entry whose note has `code`. Returns rows changed.
    fn set_promoted_by_code(
        &self,
        user_id: UserId,
        code: &str,
        promoted: bool,
    ) -> RepoResult<usize>;
    /// Marks an entry reviewed at `now`, or 1 ms after its previous review if
    /// that is later. Returns the stored timestamp.
    fn touch_reviewed(
        &self,
        user_id: UserId,
        note_id: NoteId,
        now: EpochMs,
    ) -> RepoResult<EpochMs>;
    fn count(&self, user_id: UserId) -> RepoResult<u64>;
    /// Counts entries with `last_reviewed >= since`.
    fn count_reviewed_since(&self, user_id: UserId, since: EpochMs) -> RepoResult<u64>;
    fn count_notes(&self, user_id: UserId, filter: CollectionFilter) -> RepoResult<u64>;
    /// Lists notes for a view, newest note first.
    fn list_notes(
        &self,
        user_id: UserId,
        filter: CollectionFilter,
        limit: u32,
        offset: u64,
    ) -> RepoResult<Vec<Note>>;
    /// Every entry with its note, oldest note first.
    fn list_collected(&self, user_id: UserId) -> RepoResult<Vec<CollectedNote>>;
}

/// SQLite-backed collection store.
pub struct SqliteCollectionRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCollectionRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl CollectionRepository for SqliteCollectionRepository<'_> {
    fn add(&self, user_id: UserId, note_id: NoteId, now: EpochMs) -> RepoResult<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO collections (note_id, user_id, created_at, last_reviewed)
             VALUES (?1, ?2, ?3, ?3);",
            params![note_id, user_id, now],
        )?;
        Ok(inserted == 1)
    }

    fn remove(&self, user_id: UserId, note_id: NoteId) -> RepoResult<bool> {
        let deleted = self.conn.execute(
            "DELETE FROM collections WHERE user_id = ?1 AND note_id = ?2;",
            params![user_id, note_id],
        )?;
        Ok(deleted == 1)
    }

    fn contains(&self, user_id: UserId, note_id: NoteId) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM collections WHERE user_id = ?1 AND note_id = ?2
            );",
            params![user_id, note_id],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn entries_by_recency(&self, user_id: UserId) -> RepoResult<Vec<CollectionEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                c.user_id,
                c.note_id,
                n.code AS note_code,
                c.created_at,
                c.last_reviewed,
                c.promoted
             FROM collections c
             INNER JOIN notes n ON n.id = c.note_id
             WHERE c.user_id = ?1
             ORDER BY c.last_reviewed DESC, c.id DESC;",
        )?;
        let mut rows = stmt.query([user_id])?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(parse_entry_row(row)?);
        }
        Ok(entries)
    }

    fn set_promoted_by_code(
        &self,
        user_id: UserId,
        code: &str,
        promoted: bool,
    ) -> RepoResult<usize> {
        let changed = self.conn.execute(
            "UPDATE collections
             SET promoted = ?3
             WHERE user_id = ?1
               AND note_id IN (SELECT id FROM notes WHERE code = ?2);",
            params![user_id, code, bool_to_int(promoted)],
        )?;
        Ok(changed)
    }

    fn touch_reviewed(
        &self,
        user_id: UserId,
        note_id: NoteId,
        now: EpochMs,
    ) -> RepoResult<EpochMs> {
        self.conn
            .query_row(
                "UPDATE collections
                 SET last_reviewed = MAX(?3, last_reviewed + 1)
                 WHERE user_id = ?1 AND note_id = ?2
                 RETURNING last_reviewed;",
                params![user_id, note_id, now],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| RepoError::not_found("collection entry", note_id))
    }

    fn count(&self, user_id: UserId) -> RepoResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM collections WHERE user_id = ?1;",
            [user_id],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    fn count_reviewed_since(&self, user_id: UserId, since: EpochMs) -> RepoResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM collections WHERE user_id = ?1 AND last_reviewed >= ?2;",
            params![user_id, since],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    fn count_notes(&self, user_id: UserId, filter: CollectionFilter) -> RepoResult<u64> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) {};", filter_source_sql(filter)),
            [user_id],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    fn list_notes(
        &self,
        user_id: UserId,
        filter: CollectionFilter,
        limit: u32,
        offset: u64,
    ) -> RepoResult<Vec<Note>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {NOTE_COLUMNS_SQL} {}
             ORDER BY n.created_at DESC, n.id DESC
             LIMIT ?2 OFFSET ?3;",
            filter_source_sql(filter)
        ))?;
        let mut rows = stmt.query(params![user_id, i64::from(limit), offset as i64])?;
        let mut notes = Vec::new();
        while let Some(row) = rows.next()? {
            notes.push(parse_note_row(row)?);
        }
        Ok(notes)
    }

    fn list_collected(&self, user_id: UserId) -> RepoResult<Vec<CollectedNote>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT
                {NOTE_COLUMNS_SQL},
                c.user_id,
                c.note_id,
                n.code AS note_code,
                c.created_at AS entry_created_at,
                c.last_reviewed,
                c.promoted
             FROM collections c
             INNER JOIN notes n ON n.id = c.note_id
             LEFT JOIN users u ON u.id = n.author_id
             WHERE c.user_id = ?1
             ORDER BY n.created_at ASC, n.id ASC;"
        ))?;
        let mut rows = stmt.query([user_id])?;
        let mut collected = Vec::new();
        while let Some(row) = rows.next()? {
            let note = parse_note_row(row)?;
            let entry = CollectionEntry {
                user_id: row.get("user_id")?,
                note_id: row.get("note_id")?,
                note_code: row.get("note_code")?,
                created_at: row.get("entry_created_at")?,
                last_reviewed: row.get("last_reviewed")?,
                promoted: int_to_bool(row.get("promoted")?, "collections.promoted")?,
            };
            collected.push(CollectedNote { entry, note });
        }
        Ok(collected)
    }
}

/// `FROM ... WHERE ...` for a view; `?1` is the viewing user.
fn filter_source_sql(filter: CollectionFilter) -> &'static str {
    match filter {
        CollectionFilter::All => {
            "FROM collections c
             INNER JOIN notes n ON n.id = c.note_id
             LEFT JOIN users u ON u.id = n.author_id
             WHERE c.user_id = ?1"
        }
        CollectionFilter::AuthoredByMe => {
            "FROM collections c
             INNER JOIN notes n ON n.id = c.note_id
             LEFT JOIN users u ON u.id = n.author_id
             WHERE c.user_id = ?1 AND n.author_id = ?1"
        }
        CollectionFilter::AuthoredByOthers => {
            "FROM collections c
             INNER JOIN notes n ON n.id = c.note_id
             LEFT JOIN users u ON u.id = n.author_id
             WHERE c.user_id = ?1 AND (n.author_id IS NULL OR n.author_id <> ?1)"
        }
        CollectionFilter::Promoted => {
            "FROM collections c
             INNER JOIN notes n ON n.id = c.note_id
             LEFT JOIN users u ON u.id = n.author_id
             WHERE c.user_id = ?1 AND c.promoted = 1"
        }
        CollectionFilter::AuthoredNotCollected => {
            "FROM notes n
             LEFT JOIN users u ON u.id = n.author_id
             WHERE n.author_id = ?1
               AND NOT EXISTS (
                   SELECT 1 FROM collections c WHERE c.note_id = n.id AND c.user_id = ?1
               )"
        }
    }
}

fn parse_entry_row(row: &Row<'_>) -> RepoResult<CollectionEntry> {
    Ok(CollectionEntry {
        user_id: row.get("user_id")?,
        note_id: row.get("note_id")?,
        note_code: row.get("note_code")?,
        created_at: row.get("created_at")?,
        last_reviewed: row.get("last_reviewed")?,
        promoted: int_to_bool(row.get("promoted")?, "collections.promoted")?,
    })
}
