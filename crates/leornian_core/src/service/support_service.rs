//! Support contact form and staff outbound messages.
//!
//! # Invariants
//! - Anonymous contact requires a passing captcha; signed-in users skip it.
//! - Outbound messages, lists and details are staff only.
//! - An outbound message is stored before it is mailed; a mail failure is
//!   reported to the caller but the record stays.

use crate::captcha::{CaptchaTransport, CaptchaVerifier};
use crate::config::Settings;
use crate::mail::{mail_admins, send_mail, Mailer};
use crate::model::page::{Page, PageWindow};
use crate::model::support::{validate_recipient, SupportMessage, SupportMessageDraft, SupportMessageId};
use crate::model::user::User;
use crate::repo::support_repo::{SqliteSupportRepository, SupportRepository};
use crate::service::{ServiceError, ServiceResult};
use crate::time::now_epoch_ms;
use log::{info, warn};
use rusqlite::Connection;

pub const SUPPORT_MESSAGES_PER_PAGE: u32 = 50;

pub struct SupportService<'a> {
    conn: &'a Connection,
    mailer: &'a dyn Mailer,
    settings: &'a Settings,
}

impl<'a> SupportService<'a> {
    pub fn new(conn: &'a Connection, mailer: &'a dyn Mailer, settings: &'a Settings) -> Self {
        Self {
            conn,
            mailer,
            settings,
        }
    }

    /// Stores a contact-form message and notifies admins.
    pub fn contact_support<T: CaptchaTransport>(
        &self,
        sender: Option<&User>,
        draft: &SupportMessageDraft,
        captcha: &CaptchaVerifier<T>,
        captcha_token: Option<&str>,
    ) -> ServiceResult<SupportMessage> {
        draft.validate()?;
        captcha.verify_for(captcha_token, sender.is_some(), true)?;

        let message = SqliteSupportRepository::try_new(self.conn)?.insert_message(
            draft,
            sender.map(|user| user.id),
            "",
            now_epoch_ms(),
        )?;
        info!(
            "event=support_contact module=service status=ok message_id={} authenticated={}",
            message.id,
            sender.is_some()
        );

        if let Err(err) = mail_admins(
            self.mailer,
            &self.settings.mail,
            "New message from support contact form",
            &format!(
                "A message has been submitted through the support contact form:\n\n{}",
                self.settings.absolute_url(&message.path())
            ),
        ) {
            warn!("event=support_contact module=service status=degraded error_code=mail_failed error={err}");
        }
        Ok(message)
    }

    /// Staff-only message to `to_email`, mailed with the draft's subject and body.
    pub fn send_message(
        &self,
        staff: &User,
        to_email: &str,
        draft: &SupportMessageDraft,
    ) -> ServiceResult<SupportMessage> {
        require_staff(staff)?;
        validate_recipient(to_email)?;

        let message = SqliteSupportRepository::try_new(self.conn)?.insert_message(
            draft,
            Some(staff.id),
            to_email,
            now_epoch_ms(),
        )?;
        send_mail(
            self.mailer,
            &self.settings.mail,
            &message.subject,
            &message.message,
            vec![message.to_email.clone()],
        )?;
        info!(
            "event=support_send module=service status=ok message_id={} staff_id={}",
            message.id, staff.id
        );
        Ok(message)
    }

    pub fn list_messages(
        &self,
        staff: &User,
        page: Option<i64>,
    ) -> ServiceResult<Page<SupportMessage>> {
        require_staff(staff)?;
        let messages = SqliteSupportRepository::try_new(self.conn)?;
        let total = messages.count_messages()?;
        let window = PageWindow::resolve(page, total, SUPPORT_MESSAGES_PER_PAGE)?;
        let items = messages.list_messages(window.limit(), window.offset())?;
        Ok(window.into_page(items))
    }

    pub fn get_message(&self, staff: &User, id: SupportMessageId) -> ServiceResult<SupportMessage> {
        require_staff(staff)?;
        SqliteSupportRepository::try_new(self.conn)?
            .get_message(id)?
            .ok_or_else(|| ServiceError::not_found("support message", id))
    }
}

fn require_staff(user: &User) -> ServiceResult<()> {
    if user.is_staff {
        Ok(())
    } else {
        Err(ServiceError::permission_denied("staff only"))
    }
}
