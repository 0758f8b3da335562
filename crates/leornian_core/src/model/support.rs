//! Support message record.

use crate::model::user::{validate_email, UserId};
use crate::model::validation::{validate_text_field, ValidationError};
use crate::time::EpochMs;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type SupportMessageId = Uuid;

/// Matches the RFC 5322 recommended subject line length.
pub const SUBJECT_MAX_CHARS: usize = 78;
pub const SUPPORT_MESSAGE_MAX_CHARS: usize = 5000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportMessage {
    pub id: SupportMessageId,
    pub from_user_id: Option<UserId>,
    pub from_username: Option<String>,
    /// Empty for inbound contact-form messages.
    pub to_email: String,
    pub subject: String,
    pub message: String,
    pub created_at: EpochMs,
}

impl SupportMessage {
    pub fn path(&self) -> String {
        format!("/support/messages/{}/", self.id)
    }
}

/// Subject and body shared by inbound and outbound support messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportMessageDraft {
    pub subject: String,
    pub message: String,
}

impl SupportMessageDraft {
    pub fn new(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            message: message.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_text_field("subject", &self.subject, SUBJECT_MAX_CHARS)?;
        if self.subject.contains(['\r', '\n']) {
            return Err(ValidationError::new(
                "subject",
                "Subject must be a single line.",
            ));
        }
        validate_text_field("message", &self.message, SUPPORT_MESSAGE_MAX_CHARS)
    }
}

/// Validates a required recipient address for outbound messages.
pub fn validate_recipient(to_email: &str) -> Result<(), ValidationError> {
    if to_email.trim().is_empty() {
        return Err(ValidationError::new("to_email", "This field is required."));
    }
    validate_email("to_email", to_email)
}

#[cfg(test)]
mod tests {
    use super::{validate_recipient, SupportMessageDraft};

    #[test]
    fn draft_rejects_multiline_or_long_subject() {
        assert!(SupportMessageDraft::new("Hello", "Body").validate().is_ok());
        assert!(SupportMessageDraft::new("a\nb", "Body").validate().is_err());
        assert!(SupportMessageDraft::new("x".repeat(79), "Body")
            .validate()
            .is_err());
        assert!(SupportMessageDraft::new("Hello", "").validate().is_err());
    }

    #[test]
    fn recipient_is_required() {
        assert!(validate_recipient("").is_err());
        assert!(validate_recipient("someone@example.com").is_ok());
    }
}
