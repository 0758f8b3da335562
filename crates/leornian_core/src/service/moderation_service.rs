//! Moderation reports and their response threads.
//!
//! # Responsibility
//! - File reports against notes or accounts and notify admins.
//! - Serve report lists and details to staff and to the reporter.
//! - Record responses and mail the other party.
//!
//! # Invariants
//! - Only staff and the original reporter can see or answer a report.
//! - Notification failures are logged and never undo a stored report or
//!   response.

use crate::codes::generate_date_based_reference_code;
use crate::config::Settings;
use crate::mail::{mail_admins, send_mail, MailError, Mailer};
use crate::model::page::{Page, PageWindow};
use crate::model::report::{validate_report_message, ContentRef, Report, ReportResponse};
use crate::model::user::User;
use crate::repo::note_repo::{NoteRepository, SqliteNoteRepository};
use crate::repo::report_repo::{NewReport, ReportRepository, SqliteReportRepository};
use crate::repo::user_repo::{SqliteUserRepository, UserRepository};
use crate::repo::RepoError;
use crate::service::{ServiceError, ServiceResult, CODE_GENERATION_ATTEMPTS};
use crate::time::{epoch_ms_to_date, now_epoch_ms};
use log::{info, warn};
use rusqlite::Connection;

pub const REPORTS_PER_PAGE: u32 = 50;
pub const RESPONSES_PER_PAGE: u32 = 10;

/// A report with one page of its responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportDetails {
    pub report: Report,
    pub responses: Page<ReportResponse>,
}

pub struct ModerationService<'a> {
    conn: &'a Connection,
    mailer: &'a dyn Mailer,
    settings: &'a Settings,
}

impl<'a> ModerationService<'a> {
    pub fn new(conn: &'a Connection, mailer: &'a dyn Mailer, settings: &'a Settings) -> Self {
        Self {
            conn,
            mailer,
            settings,
        }
    }

    /// Files a report by `reporter` against an existing note or account.
    pub fn submit_report(
        &self,
        reporter: &User,
        content: &ContentRef,
        message: &str,
    ) -> ServiceResult<Report> {
        validate_report_message(message)?;
        let object_id = self.resolve_content(content)?;

        let reports = SqliteReportRepository::try_new(self.conn)?;
        let now = now_epoch_ms();
        let mut rng = rand::thread_rng();
        let mut stored = None;
        for attempt in 1..=CODE_GENERATION_ATTEMPTS {
            let code = generate_date_based_reference_code(&mut rng, epoch_ms_to_date(now));
            let draft = NewReport {
                code: &code,
                content_kind: content.kind(),
                object_id,
                message,
                reporter_id: Some(reporter.id),
            };
            match reports.insert_report(&draft, now) {
                Ok(report) => {
                    stored = Some(report);
                    break;
                }
                Err(RepoError::Conflict(_)) => {
                    warn!("event=report_submit module=service status=retry error_code=code_collision attempt={attempt}");
                }
                Err(err) => return Err(err.into()),
            }
        }
        let report = stored.ok_or_else(|| {
            ServiceError::Conflict("could not allocate a unique report code".to_string())
        })?;

        info!(
            "event=report_submit module=service status=ok report_code={} content_kind={} reporter_id={}",
            report.code,
            report.content_kind.as_str(),
            reporter.id
        );
        self.notify(
            "report_submit",
            mail_admins(
                self.mailer,
                &self.settings.mail,
                "New content/account report received",
                &format!(
                    "A report requiring moderator attention has been submitted:\n\n{}",
                    self.settings.absolute_url(&report.path())
                ),
            ),
        );
        Ok(report)
    }

    /// Staff see every report; everyone else sees their own.
    pub fn list_reports(&self, viewer: &User, page: Option<i64>) -> ServiceResult<Page<Report>> {
        let reports = SqliteReportRepository::try_new(self.conn)?;
        let reporter_filter = if viewer.is_staff {
            None
        } else {
            Some(viewer.id)
        };
        let total = reports.count_reports(reporter_filter)?;
        let window = PageWindow::resolve(page, total, REPORTS_PER_PAGE)?;
        let items = reports.list_reports(reporter_filter, window.limit(), window.offset())?;
        Ok(window.into_page(items))
    }

    pub fn report_details(
        &self,
        viewer: &User,
        code: &str,
        page: Option<i64>,
    ) -> ServiceResult<ReportDetails> {
        let report = self.require_visible_report(viewer, code)?;
        let reports = SqliteReportRepository::try_new(self.conn)?;
        let total = reports.count_responses(report.id)?;
        let window = PageWindow::resolve(page, total, RESPONSES_PER_PAGE)?;
        let items = reports.list_responses(report.id, window.limit(), window.offset())?;
        Ok(ReportDetails {
            report,
            responses: window.into_page(items),
        })
    }

    /// Appends a response by staff or the reporter.
    pub fn add_response(
        &self,
        actor: &User,
        code: &str,
        message: &str,
    ) -> ServiceResult<ReportResponse> {
        let report = self.require_visible_report(actor, code)?;
        validate_report_message(message)?;
        let response = SqliteReportRepository::try_new(self.conn)?.insert_response(
            report.id,
            message,
            actor.id,
            now_epoch_ms(),
        )?;
        info!(
            "event=report_response module=service status=ok report_code={code} actor_id={} by_reporter={}",
            actor.id,
            report.is_reported_by(actor.id)
        );

        let report_url = self.settings.absolute_url(&report.path());
        if report.is_reported_by(actor.id) {
            self.notify(
                "report_response",
                mail_admins(
                    self.mailer,
                    &self.settings.mail,
                    &format!("New response from reporter received for {code}"),
                    &format!("A reporter has added a response to their report:\n\n{report_url}"),
                ),
            );
        } else if let Some(reporter) = self.reporter_with_email(&report)? {
            self.notify(
                "report_response",
                send_mail(
                    self.mailer,
                    &self.settings.mail,
                    &format!("A response has been added to your content/account report ({code})"),
                    &format!("Your report {code} has received a new response:\n\n{report_url}"),
                    vec![reporter.email],
                ),
            );
        }
        Ok(response)
    }

    fn resolve_content(&self, content: &ContentRef) -> ServiceResult<i64> {
        match content {
            ContentRef::Note(code) => SqliteNoteRepository::try_new(self.conn)?
                .get_by_code(code)?
                .map(|note| note.id)
                .ok_or_else(|| ServiceError::not_found("note", code)),
            ContentRef::User(username) => SqliteUserRepository::try_new(self.conn)?
                .find_by_username(username)?
                .map(|user| user.id)
                .ok_or_else(|| ServiceError::not_found("user", username)),
        }
    }

    fn require_visible_report(&self, viewer: &User, code: &str) -> ServiceResult<Report> {
        let report = SqliteReportRepository::try_new(self.conn)?
            .get_by_code(code)?
            .ok_or_else(|| ServiceError::not_found("report", code))?;
        if !viewer.is_staff && !report.is_reported_by(viewer.id) {
            return Err(ServiceError::permission_denied(
                "only staff and the reporter can access this report",
            ));
        }
        Ok(report)
    }

    fn reporter_with_email(&self, report: &Report) -> ServiceResult<Option<User>> {
        let Some(reporter_id) = report.reporter_id else {
            return Ok(None);
        };
        let reporter = SqliteUserRepository::try_new(self.conn)?.get_user(reporter_id)?;
        Ok(reporter.filter(User::has_email))
    }

    fn notify(&self, event: &str, result: Result<(), MailError>) {
        if let Err(err) = result {
            warn!("event={event} module=service status=degraded error_code=mail_failed error={err}");
        }
    }
}
