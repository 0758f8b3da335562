//! Drill: weighted review of a user's collection.
//!
//! # Responsibility
//! - Report whether a user can start a drill and how much they reviewed today.
//! - Draw the next note to review, biased toward entries not seen recently.
//!
//! # Invariants
//! - Every read and write goes through a `CollectionRepository` scoped by
//!   `user_id`; promote/demote codes can never reach another user's entries.
//! - The most recently reviewed entry is never drawn twice in a row.
//! - Fewer than two entries is a normal outcome
//!   (`DrawOutcome::InsufficientCollection`), not an error, and draws nothing.
//! - Unknown promote/demote codes are silently ignored.

pub mod weights;

use crate::model::note::NoteId;
use crate::model::user::UserId;
use crate::repo::collection_repo::CollectionRepository;
use crate::repo::RepoResult;
use crate::time::{EpochMs, DAY_MS};
use log::debug;
use rand::Rng;
use serde::Serialize;

pub use weights::{generate_weights, pick_weighted_index};

/// Smallest collection a draw can work with.
pub const MIN_DRILL_ENTRIES: usize = 2;

/// Result of [`Drill::peek`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DrillStatus {
    /// True when the collection is too small to drill.
    pub disable_begin: bool,
    /// Entries reviewed within the last 24 hours.
    pub recent_count: u64,
}

/// Optional promote/demote actions applied before a draw.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrawRequest {
    pub promote: Option<String>,
    pub demote: Option<String>,
}

impl DrawRequest {
    pub fn promote(code: impl Into<String>) -> Self {
        Self {
            promote: Some(code.into()),
            demote: None,
        }
    }

    pub fn demote(code: impl Into<String>) -> Self {
        Self {
            promote: None,
            demote: Some(code.into()),
        }
    }
}

/// The entry picked by a draw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DrawnEntry {
    pub note_id: NoteId,
    pub note_code: String,
    pub promoted: bool,
    pub last_reviewed: EpochMs,
    /// Recent-review count after this draw.
    pub recent_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrawOutcome {
    Drawn(DrawnEntry),
    InsufficientCollection,
}

impl DrawOutcome {
    pub fn drawn(&self) -> Option<&DrawnEntry> {
        match self {
            Self::Drawn(entry) => Some(entry),
            Self::InsufficientCollection => None,
        }
    }
}

/// Drill orchestrator over a collection store.
///
/// Transactions are the caller's concern; see
/// [`crate::service::drill_service::DrillService`].
pub struct Drill<R: CollectionRepository> {
    repo: R,
}

impl<R: CollectionRepository> Drill<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Read-only drill status for `user_id` as of `now`.
    pub fn peek(&self, user_id: UserId, now: EpochMs) -> RepoResult<DrillStatus> {
        let count = self.repo.count(user_id)?;
        Ok(DrillStatus {
            disable_begin: count < MIN_DRILL_ENTRIES as u64,
            recent_count: self.recent_count(user_id, now)?,
        })
    }

    /// Applies promote/demote, then draws and touches one entry.
    pub fn draw<G: Rng + ?Sized>(
        &self,
        user_id: UserId,
        request: &DrawRequest,
        rng: &mut G,
        now: EpochMs,
    ) -> RepoResult<DrawOutcome> {
        if let Some(code) = request.promote.as_deref() {
            let changed = self.repo.set_promoted_by_code(user_id, code, true)?;
            debug!("event=drill_promote module=drill status=ok user_id={user_id} changed={changed}");
        }
        if let Some(code) = request.demote.as_deref() {
            let changed = self.repo.set_promoted_by_code(user_id, code, false)?;
            debug!("event=drill_demote module=drill status=ok user_id={user_id} changed={changed}");
        }

        let entries = self.repo.entries_by_recency(user_id)?;
        if entries.len() < MIN_DRILL_ENTRIES {
            return Ok(DrawOutcome::InsufficientCollection);
        }

        // Index 0 is the entry reviewed last; the pool keeps descending
        // recency so the least recently reviewed entry weighs the most.
        let pool = &entries[1..];
        let flags: Vec<bool> = pool.iter().map(|entry| entry.promoted).collect();
        let weights = generate_weights(&flags);
        let Some(index) = pick_weighted_index(rng, &weights) else {
            return Ok(DrawOutcome::InsufficientCollection);
        };
        let picked = &pool[index];

        let last_reviewed = self.repo.touch_reviewed(user_id, picked.note_id, now)?;
        let recent_count = self.recent_count(user_id, now)?;

        Ok(DrawOutcome::Drawn(DrawnEntry {
            note_id: picked.note_id,
            note_code: picked.note_code.clone(),
            promoted: picked.promoted,
            last_reviewed,
            recent_count,
        }))
    }

    fn recent_count(&self, user_id: UserId, now: EpochMs) -> RepoResult<u64> {
        self.repo.count_reviewed_since(user_id, now - DAY_MS)
    }
}
