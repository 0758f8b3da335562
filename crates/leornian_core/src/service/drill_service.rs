//! Transactional wrapper around [`crate::drill::Drill`].
//!
//! # Invariants
//! - A draw (promote/demote, selection, review touch) runs in one IMMEDIATE
//!   transaction, so concurrent draws for one user serialize.
//! - An insufficient collection still commits, keeping promote/demote
//!   effects applied before the count check.
//! - [`DrillService::draw_note`] reads the drawn note inside the draw's
//!   transaction, so a concurrent delete cannot split the two.

use crate::drill::{DrawOutcome, DrawRequest, DrawnEntry, Drill, DrillStatus};
use crate::model::note::Note;
use crate::model::user::User;
use crate::repo::collection_repo::SqliteCollectionRepository;
use crate::repo::note_repo::{NoteRepository, SqliteNoteRepository};
use crate::service::{ServiceError, ServiceResult};
use crate::time::{now_epoch_ms, EpochMs};
use log::info;
use rand::Rng;
use rusqlite::{Connection, TransactionBehavior};

/// A draw together with the note it picked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteDraw {
    Drawn { entry: DrawnEntry, note: Note },
    InsufficientCollection,
}

pub struct DrillService<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> DrillService<'conn> {
    pub fn new(conn: &'conn mut Connection) -> Self {
        Self { conn }
    }

    pub fn peek(&self, user: &User) -> ServiceResult<DrillStatus> {
        self.peek_at(user, now_epoch_ms())
    }

    pub fn peek_at(&self, user: &User, now: EpochMs) -> ServiceResult<DrillStatus> {
        let status = Drill::new(SqliteCollectionRepository::try_new(self.conn)?).peek(user.id, now)?;
        info!(
            "event=drill_peek module=service status=ok user_id={} disable_begin={} recent_count={}",
            user.id, status.disable_begin, status.recent_count
        );
        Ok(status)
    }

    pub fn draw<G: Rng + ?Sized>(
        &mut self,
        user: &User,
        request: &DrawRequest,
        rng: &mut G,
    ) -> ServiceResult<DrawOutcome> {
        self.draw_at(user, request, rng, now_epoch_ms())
    }

    pub fn draw_at<G: Rng + ?Sized>(
        &mut self,
        user: &User,
        request: &DrawRequest,
        rng: &mut G,
        now: EpochMs,
    ) -> ServiceResult<DrawOutcome> {
        let (outcome, ()) = self.draw_in_transaction(user, request, rng, now, |_, _| Ok(()))?;
        Ok(outcome)
    }

    pub fn draw_note<G: Rng + ?Sized>(
        &mut self,
        user: &User,
        request: &DrawRequest,
        rng: &mut G,
    ) -> ServiceResult<NoteDraw> {
        self.draw_note_at(user, request, rng, now_epoch_ms())
    }

    /// Like [`Self::draw_at`], also returning the drawn note.
    pub fn draw_note_at<G: Rng + ?Sized>(
        &mut self,
        user: &User,
        request: &DrawRequest,
        rng: &mut G,
        now: EpochMs,
    ) -> ServiceResult<NoteDraw> {
        let (outcome, note) =
            self.draw_in_transaction(user, request, rng, now, |conn, outcome| {
                let Some(entry) = outcome.drawn() else {
                    return Ok(None);
                };
                SqliteNoteRepository::try_new(conn)?
                    .get_note(entry.note_id)?
                    .map(Some)
                    .ok_or_else(|| ServiceError::not_found("note", &entry.note_code))
            })?;

        Ok(match (outcome, note) {
            (DrawOutcome::Drawn(entry), Some(note)) => NoteDraw::Drawn { entry, note },
            _ => NoteDraw::InsufficientCollection,
        })
    }

    fn draw_in_transaction<G, T, F>(
        &mut self,
        user: &User,
        request: &DrawRequest,
        rng: &mut G,
        now: EpochMs,
        read: F,
    ) -> ServiceResult<(DrawOutcome, T)>
    where
        G: Rng + ?Sized,
        F: FnOnce(&Connection, &DrawOutcome) -> ServiceResult<T>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let outcome = Drill::new(SqliteCollectionRepository::try_new(&tx)?)
            .draw(user.id, request, rng, now)?;
        let extra = read(&*tx, &outcome)?;
        tx.commit()?;

        match &outcome {
            DrawOutcome::Drawn(entry) => info!(
                "event=drill_draw module=service status=ok user_id={} note_code={} recent_count={}",
                user.id, entry.note_code, entry.recent_count
            ),
            DrawOutcome::InsufficientCollection => info!(
                "event=drill_draw module=service status=skipped user_id={} reason=insufficient_collection",
                user.id
            ),
        }
        Ok((outcome, extra))
    }
}
