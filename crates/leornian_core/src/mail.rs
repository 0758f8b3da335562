//! Outgoing mail hooks.
//!
//! # Responsibility
//! - Define the `Mailer` seam services notify through.
//! - Provide a logging backend for development and an in-memory outbox.
//!
//! # Invariants
//! - Mail bodies are never logged; only metadata is.
//! - Admin mail carries the `[Leornian] ` subject prefix and is sent from
//!   the server address. No configured admins means nothing is sent.

use crate::config::MailSettings;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Mutex;

pub const EMAIL_SUBJECT_PREFIX: &str = "[Leornian] ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MailError {
    NoRecipients,
    Backend(String),
}

impl Display for MailError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoRecipients => write!(f, "mail has no recipients"),
            Self::Backend(message) => write!(f, "mail backend failure: {message}"),
        }
    }
}

impl Error for MailError {}

/// Delivery backend.
pub trait Mailer: Send + Sync {
    fn send(&self, mail: &OutgoingMail) -> Result<(), MailError>;
}

/// Backend that only records delivery metadata in the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        if mail.to.is_empty() {
            return Err(MailError::NoRecipients);
        }
        info!(
            "event=mail_send module=mail status=ok backend=log recipients={} subject_chars={} body_chars={}",
            mail.to.len(),
            mail.subject.chars().count(),
            mail.body.chars().count()
        );
        Ok(())
    }
}

/// Backend that keeps every sent mail in memory.
#[derive(Debug, Default)]
pub struct OutboxMailer {
    outbox: Mutex<Vec<OutgoingMail>>,
}

impl OutboxMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of sent mail, oldest first.
    pub fn sent(&self) -> Vec<OutgoingMail> {
        match self.outbox.lock() {
            Ok(outbox) => outbox.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Mailer for OutboxMailer {
    fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        if mail.to.is_empty() {
            return Err(MailError::NoRecipients);
        }
        self.outbox
            .lock()
            .map_err(|_| MailError::Backend("outbox lock poisoned".to_string()))?
            .push(mail.clone());
        Ok(())
    }
}

/// Sends mail to users from the default sender.
pub fn send_mail(
    mailer: &dyn Mailer,
    settings: &MailSettings,
    subject: &str,
    body: &str,
    to: Vec<String>,
) -> Result<(), MailError> {
    mailer.send(&OutgoingMail {
        from: settings.default_from_email.clone(),
        to,
        subject: subject.to_string(),
        body: body.to_string(),
    })
}

/// Sends mail to every configured admin.
pub fn mail_admins(
    mailer: &dyn Mailer,
    settings: &MailSettings,
    subject: &str,
    body: &str,
) -> Result<(), MailError> {
    if settings.admins.is_empty() {
        return Ok(());
    }
    mailer.send(&OutgoingMail {
        from: settings.server_email.clone(),
        to: settings.admins.clone(),
        subject: format!("{EMAIL_SUBJECT_PREFIX}{subject}"),
        body: body.to_string(),
    })
}
