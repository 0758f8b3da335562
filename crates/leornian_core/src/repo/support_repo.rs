//! Support message repository.

use crate::model::support::{SupportMessage, SupportMessageDraft, SupportMessageId};
use crate::model::user::UserId;
use crate::repo::{ensure_connection_ready, RepoError, RepoResult};
use crate::time::EpochMs;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

const MESSAGE_SELECT_SQL: &str = "SELECT
    m.id,
    m.from_user_id,
    u.username AS from_username,
    m.to_email,
    m.subject,
    m.message,
    m.created_at
FROM support_messages m
LEFT JOIN users u ON u.id = m.from_user_id";

pub trait SupportRepository {
    /// Stores a message under a fresh UUID.
    fn insert_message(
        &self,
        draft: &SupportMessageDraft,
        from_user_id: Option<UserId>,
        to_email: &str,
        now: EpochMs,
    ) -> RepoResult<SupportMessage>;
    fn get_message(&self, id: SupportMessageId) -> RepoResult<Option<SupportMessage>>;
    fn count_messages(&self) -> RepoResult<u64>;
    /// Lists messages newest first.
    fn list_messages(&self, limit: u32, offset: u64) -> RepoResult<Vec<SupportMessage>>;
}

pub struct SqliteSupportRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSupportRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl SupportRepository for SqliteSupportRepository<'_> {
    fn insert_message(
        &self,
        draft: &SupportMessageDraft,
        from_user_id: Option<UserId>,
        to_email: &str,
        now: EpochMs,
    ) -> RepoResult<SupportMessage> {
        draft.validate()?;

        let id = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO support_messages (id, from_user_id, to_email, subject, message, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                id.to_string(),
                from_user_id,
                to_email.trim(),
                draft.subject.trim(),
                draft.message.as_str(),
                now
            ],
        )?;

        self.get_message(id)?
            .ok_or_else(|| RepoError::InvalidData(format!("support message {id} missing")))
    }

    fn get_message(&self, id: SupportMessageId) -> RepoResult<Option<SupportMessage>> {
        self.conn
            .query_row(
                &format!("{MESSAGE_SELECT_SQL} WHERE m.id = ?1;"),
                [id.to_string()],
                |row| Ok(parse_message_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn count_messages(&self) -> RepoResult<u64> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM support_messages;", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    fn list_messages(&self, limit: u32, offset: u64) -> RepoResult<Vec<SupportMessage>> {
        let mut stmt = self.conn.prepare(&format!(
            "{MESSAGE_SELECT_SQL}
             ORDER BY m.created_at DESC, m.rowid DESC
             LIMIT ?1 OFFSET ?2;"
        ))?;
        let mut rows = stmt.query(params![i64::from(limit), offset as i64])?;
        let mut messages = Vec::new();
        while let Some(row) = rows.next()? {
            messages.push(parse_message_row(row)?);
        }
        Ok(messages)
    }
}

fn parse_message_row(row: &Row<'_>) -> RepoResult<SupportMessage> {
    let id_text: String = row.get("id")?;
    let id = Uuid::parse_str(&id_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{id_text}` in support_messages.id"))
    })?;

    Ok(SupportMessage {
        id,
        from_user_id: row.get("from_user_id")?,
        from_username: row.get("from_username")?,
        to_email: row.get("to_email")?,
        subject: row.get("subject")?,
        message: row.get("message")?,
        created_at: row.get("created_at")?,
    })
}
