//! Moderation report and response records.
//!
//! # Invariants
//! - `code` is unique, date-prefixed and stable for the report lifetime.
//! - A report targets exactly one note or one user account.
//! - Reporter/actor links become `None` when the account is deleted.

use crate::model::user::UserId;
use crate::model::validation::{validate_text_field, ValidationError};
use crate::time::EpochMs;
use serde::{Deserialize, Serialize};

pub type ReportId = i64;

pub const REPORT_MESSAGE_MAX_CHARS: usize = 5000;

/// Kind of object a report targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Note,
    User,
}

impl ContentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Note => "note",
            Self::User => "user",
        }
    }

    /// Parses the content type segment of a report request.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "note" => Some(Self::Note),
            "user" => Some(Self::User),
            _ => None,
        }
    }
}

/// Public reference to reportable content: a note code or a username.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentRef {
    Note(String),
    User(String),
}

impl ContentRef {
    pub fn kind(&self) -> ContentKind {
        match self {
            Self::Note(_) => ContentKind::Note,
            Self::User(_) => ContentKind::User,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub id: ReportId,
    pub code: String,
    pub content_kind: ContentKind,
    pub object_id: i64,
    /// Note code or username of the target; `None` once it is deleted.
    pub content_label: Option<String>,
    pub message: String,
    pub reporter_id: Option<UserId>,
    pub reporter_username: Option<String>,
    pub created_at: EpochMs,
}

impl Report {
    pub fn path(&self) -> String {
        format!("/moderation/reports/{}/", self.code)
    }

    pub fn is_reported_by(&self, user_id: UserId) -> bool {
        self.reporter_id == Some(user_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportResponse {
    pub id: i64,
    pub report_id: ReportId,
    pub message: String,
    pub actor_id: Option<UserId>,
    pub actor_username: Option<String>,
    pub created_at: EpochMs,
}

pub fn validate_report_message(message: &str) -> Result<(), ValidationError> {
    validate_text_field("message", message, REPORT_MESSAGE_MAX_CHARS)
}
