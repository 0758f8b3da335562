//! Moderation report repository.
//!
//! # Invariants
//! - Reports are listed newest first; responses oldest first.
//! - `content_label` is resolved at read time and is `None` once the
//!   reported note or account no longer exists.

use crate::model::report::{ContentKind, Report, ReportId, ReportResponse};
use crate::model::user::UserId;
use crate::repo::{ensure_connection_ready, map_unique_violation, RepoError, RepoResult};
use crate::time::EpochMs;
use rusqlite::{params, Connection, OptionalExtension, Row};

const REPORT_SELECT_SQL: &str = "SELECT
    r.id,
    r.code,
    r.content_kind,
    r.object_id,
    CASE r.content_kind
        WHEN 'note' THEN (SELECT code FROM notes WHERE id = r.object_id)
        ELSE (SELECT username FROM users WHERE id = r.object_id)
    END AS content_label,
    r.message,
    r.reporter_id,
    u.username AS reporter_username,
    r.created_at
FROM reports r
LEFT JOIN users u ON u.id = r.reporter_id";

const RESPONSE_SELECT_SQL: &str = "SELECT
    rr.id,
    rr.report_id,
    rr.message,
    rr.actor_id,
    u.username AS actor_username,
    rr.created_at
FROM report_responses rr
LEFT JOIN users u ON u.id = rr.actor_id";

/// Fields of a report about to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReport<'a> {
    pub code: &'a str,
    pub content_kind: ContentKind,
    pub object_id: i64,
    pub message: &'a str,
    pub reporter_id: Option<UserId>,
}

pub trait ReportRepository {
    fn insert_report(&self, report: &NewReport<'_>, now: EpochMs) -> RepoResult<Report>;
    fn get_by_code(&self, code: &str) -> RepoResult<Option<Report>>;
    /// Counts reports, optionally only those filed by `reporter_id`.
    fn count_reports(&self, reporter_id: Option<UserId>) -> RepoResult<u64>;
    /// Lists reports newest first, optionally only those filed by `reporter_id`.
    fn list_reports(
        &self,
        reporter_id: Option<UserId>,
        limit: u32,
        offset: u64,
    ) -> RepoResult<Vec<Report>>;
    fn insert_response(
        &self,
        report_id: ReportId,
        message: &str,
        actor_id: UserId,
        now: EpochMs,
    ) -> RepoResult<ReportResponse>;
    fn count_responses(&self, report_id: ReportId) -> RepoResult<u64>;
    fn list_responses(
        &self,
        report_id: ReportId,
        limit: u32,
        offset: u64,
    ) -> RepoResult<Vec<ReportResponse>>;
}

pub struct SqliteReportRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteReportRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }

    fn get_report(&self, id: ReportId) -> RepoResult<Option<Report>> {
        self.conn
            .query_row(&format!("{REPORT_SELECT_SQL} WHERE r.id = ?1;"), [id], |row| {
                Ok(parse_report_row(row))
            })
            .optional()?
            .transpose()
    }
}

impl ReportRepository for SqliteReportRepository<'_> {
    fn insert_report(&self, report: &NewReport<'_>, now: EpochMs) -> RepoResult<Report> {
        self.conn
            .execute(
                "INSERT INTO reports (code, content_kind, object_id, message, reporter_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
                params![
                    report.code,
                    report.content_kind.as_str(),
                    report.object_id,
                    report.message,
                    report.reporter_id,
                    now
                ],
            )
            .map_err(|err| {
                map_unique_violation(err, format!("report code `{}` is taken", report.code))
            })?;

        let id = self.conn.last_insert_rowid();
        self.get_report(id)?
            .ok_or_else(|| RepoError::InvalidData(format!("report {id} missing after insert")))
    }

    fn get_by_code(&self, code: &str) -> RepoResult<Option<Report>> {
        self.conn
            .query_row(
                &format!("{REPORT_SELECT_SQL} WHERE r.code = ?1;"),
                [code],
                |row| Ok(parse_report_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn count_reports(&self, reporter_id: Option<UserId>) -> RepoResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM reports WHERE ?1 IS NULL OR reporter_id = ?1;",
            params![reporter_id],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    fn list_reports(
        &self,
        reporter_id: Option<UserId>,
        limit: u32,
        offset: u64,
    ) -> RepoResult<Vec<Report>> {
        let mut stmt = self.conn.prepare(&format!(
            "{REPORT_SELECT_SQL}
             WHERE ?1 IS NULL OR r.reporter_id = ?1
             ORDER BY r.created_at DESC, r.id DESC
             LIMIT ?2 OFFSET ?3;"
        ))?;
        let mut rows = stmt.query(params![reporter_id, i64::from(limit), offset as i64])?;
        let mut reports = Vec::new();
        while let Some(row) = rows.next()? {
            reports.push(parse_report_row(row)?);
        }
        Ok(reports)
    }

    fn insert_response(
        &self,
        report_id: ReportId,
        message: &str,
        actor_id: UserId,
        now: EpochMs,
    ) -> RepoResult<ReportResponse> {
        self.conn.execute(
            "INSERT INTO report_responses (report_id, message, actor_id, created_at)
             VALUES (?1, ?2, ?3, ?4);",
            params![report_id, message, actor_id, now],
        )?;

        let id = self.conn.last_insert_rowid();
        self.conn
            .query_row(
                &format!("{RESPONSE_SELECT_SQL} WHERE rr.id = ?1;"),
                [id],
                |row| Ok(parse_response_row(row)),
            )
            .optional()?
            .transpose()?
            .ok_or_else(|| RepoError::InvalidData(format!("response {id} missing after insert")))
    }

    fn count_responses(&self, report_id: ReportId) -> RepoResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM report_responses WHERE report_id = ?1;",
            [report_id],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    fn list_responses(
        &self,
        report_id: ReportId,
        limit: u32,
        offset: u64,
    ) -> RepoResult<Vec<ReportResponse>> {
        let mut stmt = self.conn.prepare(&format!(
            "{RESPONSE_SELECT_SQL}
             WHERE rr.report_id = ?1
             ORDER BY rr.created_at ASC, rr.id ASC
             LIMIT ?2 OFFSET ?3;"
        ))?;
        let mut rows = stmt.query(params![report_id, i64::from(limit), offset as i64])?;
        let mut responses = Vec::new();
        while let Some(row) = rows.next()? {
            responses.push(parse_response_row(row)?);
        }
        Ok(responses)
    }
}

fn parse_report_row(row: &Row<'_>) -> RepoResult<Report> {
    let kind_text: String = row.get("content_kind")?;
    let content_kind = ContentKind::parse(&kind_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid content kind `{kind_text}` in reports.content_kind"
        ))
    })?;

    Ok(Report {
        id: row.get("id")?,
        code: row.get("code")?,
        content_kind,
        object_id: row.get("object_id")?,
        content_label: row.get("content_label")?,
        message: row.get("message")?,
        reporter_id: row.get("reporter_id")?,
        reporter_username: row.get("reporter_username")?,
        created_at: row.get("created_at")?,
    })
}

fn parse_response_row(row: &Row<'_>) -> RepoResult<ReportResponse> {
    Ok(ReportResponse {
        id: row.get("id")?,
        report_id: row.get("report_id")?,
        message: row.get("message")?,
        actor_id: row.get("actor_id")?,
        actor_username: row.get("actor_username")?,
        created_at: row.get("created_at")?,
    })
}
