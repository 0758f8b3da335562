//! User account record.
//!
//! Authentication is handled outside core; this record only carries what
//! notes, moderation and support need (identity, contact email, staff flag).

use crate::model::validation::ValidationError;
use crate::time::EpochMs;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub type UserId = i64;

pub const USERNAME_MAX_CHARS: usize = 150;

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.+\-]+$").expect("valid username regex"));
static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    /// May be empty; some notifications are skipped for such accounts.
    pub email: String,
    pub is_staff: bool,
    pub date_joined: EpochMs,
}

impl User {
    pub fn has_email(&self) -> bool {
        !self.email.trim().is_empty()
    }
}

/// Input for account creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub is_staff: bool,
}

impl NewUser {
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            is_staff: false,
        }
    }

    pub fn staff(mut self) -> Self {
        self.is_staff = true;
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_username(&self.username)?;
        if !self.email.is_empty() {
            validate_email("email", &self.email)?;
        }
        Ok(())
    }
}

/// Usernames may contain letters, digits, hyphens, underscores, periods and `+`.
pub fn validate_username(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() || value.chars().count() > USERNAME_MAX_CHARS {
        return Err(ValidationError::new(
            "username",
            format!("Username must be 1 to {USERNAME_MAX_CHARS} characters."),
        ));
    }
    if !USERNAME_RE.is_match(value) {
        return Err(ValidationError::new(
            "username",
            "Can contain letters, digits, hyphens, underscores, periods, and the plus sign.",
        ));
    }
    Ok(())
}

pub fn validate_email(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if EMAIL_RE.is_match(value.trim()) {
        Ok(())
    } else {
        Err(ValidationError::new(field, "Enter a valid email address."))
    }
}
