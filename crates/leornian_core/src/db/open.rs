//! Connection opening.
//!
//! # Invariants
//! - A connection is only handed out after foreign keys are enabled and
//!   every migration step has been applied.

use super::migrations::apply_migrations;
use super::DbResult;
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

/// How long a writer waits on a locked database before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens (creating when missing) the database file at `path`.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    let path = path.as_ref();
    prepare("file", Connection::open(path).map_err(Into::into))
}

/// Opens a private in-memory database; each call starts empty.
pub fn open_db_in_memory() -> DbResult<Connection> {
    prepare("memory", Connection::open_in_memory().map_err(Into::into))
}

fn prepare(mode: &'static str, opened: DbResult<Connection>) -> DbResult<Connection> {
    let started_at = Instant::now();
    let prepared = opened.and_then(|mut conn| {
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        apply_migrations(&mut conn)?;
        Ok(conn)
    });

    let elapsed_ms = started_at.elapsed().as_millis();
    match &prepared {
        Ok(_) => info!("event=db_open module=db status=ok mode={mode} duration_ms={elapsed_ms}"),
        Err(err) => error!(
            "event=db_open module=db status=error mode={mode} duration_ms={elapsed_ms} error={err}"
        ),
    }
    prepared
}
