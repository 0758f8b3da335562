//! Embedded schema steps for the Leornian database.
//!
//! # Invariants
//! - Step `n` upgrades the schema from version `n - 1` to `n`; steps are
//!   listed in order with no gaps.
//! - Each step runs in its own transaction together with the
//!   `PRAGMA user_version` bump, so a failed step leaves the previous
//!   version intact.

use crate::db::{DbError, DbResult};
use log::{error, info};
use rusqlite::Connection;

/// One schema step; its version is its 1-based position in [`STEPS`].
struct Step {
    name: &'static str,
    sql: &'static str,
}

const STEPS: &[Step] = &[
    // users, notes, collections, deattributions
    Step {
        name: "notes",
        sql: include_str!("0001_notes.sql"),
    },
    // reports, report responses
    Step {
        name: "moderation",
        sql: include_str!("0002_moderation.sql"),
    },
    Step {
        name: "support",
        sql: include_str!("0003_support.sql"),
    },
];

/// Schema version this binary migrates to.
pub fn latest_version() -> u32 {
    STEPS.len() as u32
}

/// Brings `conn` up to [`latest_version`], refusing databases from a newer
/// binary.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let from = schema_version(conn)?;
    let latest = latest_version();
    if from > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from,
            latest_supported: latest,
        });
    }

    for (version, step) in (1u32..).zip(STEPS).skip(from as usize) {
        if let Err(err) = run_step(conn, version, step) {
            error!(
                "event=db_migrate module=db status=error version={version} step={} error={err}",
                step.name
            );
            return Err(err);
        }
        info!(
            "event=db_migrate module=db status=ok version={version} step={}",
            step.name
        );
    }
    Ok(())
}

fn run_step(conn: &mut Connection, version: u32, step: &Step) -> DbResult<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(step.sql)?;
    tx.pragma_update(None, "user_version", version)?;
    tx.commit()?;
    Ok(())
}

fn schema_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}
