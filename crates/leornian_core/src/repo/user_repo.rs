//! User account repository.
//!
//! # Invariants
//! - Usernames are unique; duplicates surface as `RepoError::Conflict`.
//! - Deleting a user relies on schema cascades for collections and
//!   deattributions, and on `SET NULL` for authored notes and reports.

use crate::model::user::{NewUser, User, UserId};
use crate::repo::{bool_to_int, ensure_connection_ready, int_to_bool, map_unique_violation};
use crate::repo::{RepoError, RepoResult};
use crate::time::EpochMs;
use rusqlite::{params, Connection, OptionalExtension, Row};

const USER_SELECT_SQL: &str = "SELECT id, username, email, is_staff, date_joined FROM users";

/// Repository interface for user accounts.
pub trait UserRepository {
    fn create_user(&self, user: &NewUser, now: EpochMs) -> RepoResult<User>;
    fn get_user(&self, id: UserId) -> RepoResult<Option<User>>;
    fn find_by_username(&self, username: &str) -> RepoResult<Option<User>>;
    fn delete_user(&self, id: UserId) -> RepoResult<()>;
}

/// SQLite-backed user repository.
pub struct SqliteUserRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn create_user(&self, user: &NewUser, now: EpochMs) -> RepoResult<User> {
        user.validate()?;

        self.conn
            .execute(
                "INSERT INTO users (username, email, is_staff, date_joined)
                 VALUES (?1, ?2, ?3, ?4);",
                params![
                    user.username.as_str(),
                    user.email.trim(),
                    bool_to_int(user.is_staff),
                    now
                ],
            )
            .map_err(|err| {
                map_unique_violation(err, format!("username `{}` is taken", user.username))
            })?;

        let id = self.conn.last_insert_rowid();
        self.get_user(id)?
            .ok_or_else(|| RepoError::InvalidData(format!("user {id} missing after insert")))
    }

    fn get_user(&self, id: UserId) -> RepoResult<Option<User>> {
        self.conn
            .query_row(&format!("{USER_SELECT_SQL} WHERE id = ?1;"), [id], |row| {
                Ok(parse_user_row(row))
            })
            .optional()?
            .transpose()
    }

    fn find_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        self.conn
            .query_row(
                &format!("{USER_SELECT_SQL} WHERE username = ?1;"),
                [username],
                |row| Ok(parse_user_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn delete_user(&self, id: UserId) -> RepoResult<()> {
        let changed = self.conn.execute("DELETE FROM users WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::not_found("user", id));
        }
        Ok(())
    }
}

fn parse_user_row(row: &Row<'_>) -> RepoResult<User> {
    Ok(User {
        id: row.get("id")?,
        username: row.get("username")?,
        email: row.get("email")?,
        is_staff: int_to_bool(row.get("is_staff")?, "users.is_staff")?,
        date_joined: row.get("date_joined")?,
    })
}
