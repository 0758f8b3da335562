//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Enforce permissions (author, reporter, staff) before any write.
//! - Own transaction boundaries for multi-step writes.
//!
//! # Invariants
//! - Callers pass an already-authenticated `User` (or `None` for visitors).
//! - Permission failures never leak whether a protected record exists
//!   beyond what the caller could already see.

use crate::captcha::CaptchaError;
use crate::db::DbError;
use crate::mail::MailError;
use crate::model::validation::ValidationError;
use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod collection_service;
pub mod drill_service;
pub mod export_service;
pub mod moderation_service;
pub mod note_service;
pub mod support_service;
pub mod user_service;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Times a random reference code is regenerated after a uniqueness clash.
pub(crate) const CODE_GENERATION_ATTEMPTS: usize = 5;

#[derive(Debug)]
pub enum ServiceError {
    Validation(ValidationError),
    NotFound { entity: &'static str, key: String },
    PermissionDenied(String),
    Conflict(String),
    Captcha(CaptchaError),
    Mail(MailError),
    /// Archive or serialization failure while exporting data.
    Export(String),
    Repo(RepoError),
}

impl ServiceError {
    pub fn not_found(entity: &'static str, key: impl Display) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::PermissionDenied(message.into())
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound { entity, key } => write!(f, "{entity} not found: {key}"),
            Self::PermissionDenied(message) => write!(f, "permission denied: {message}"),
            Self::Conflict(message) => write!(f, "conflict: {message}"),
            Self::Captcha(err) => write!(f, "{err}"),
            Self::Mail(err) => write!(f, "{err}"),
            Self::Export(message) => write!(f, "export failed: {message}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Captcha(err) => Some(err),
            Self::Mail(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::NotFound { .. }
            | Self::PermissionDenied(_)
            | Self::Conflict(_)
            | Self::Export(_) => None,
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::NotFound { entity, key } => Self::NotFound { entity, key },
            RepoError::Conflict(message) => Self::Conflict(message),
            other => Self::Repo(other),
        }
    }
}

impl From<ValidationError> for ServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<CaptchaError> for ServiceError {
    fn from(value: CaptchaError) -> Self {
        Self::Captcha(value)
    }
}

impl From<MailError> for ServiceError {
    fn from(value: MailError) -> Self {
        Self::Mail(value)
    }
}

impl From<DbError> for ServiceError {
    fn from(value: DbError) -> Self {
        Self::Repo(RepoError::Db(value))
    }
}

impl From<rusqlite::Error> for ServiceError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(RepoError::from(value))
    }
}
