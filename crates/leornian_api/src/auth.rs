//! Caller identity from the fronting authentication layer.
//!
//! # Invariants
//! - The `X-Remote-User` header is trusted as-is; this service performs no
//!   authentication of its own.
//! - A missing header means an anonymous visitor; a header naming an unknown
//!   account is refused.

use crate::error::{ApiError, ApiResult};
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use leornian_core::repo::user_repo::{SqliteUserRepository, UserRepository};
use leornian_core::{ServiceError, User};
use rusqlite::Connection;
use std::convert::Infallible;

pub const REMOTE_USER_HEADER: &str = "x-remote-user";

/// Username claimed by the request, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteUser(pub Option<String>);

impl<S: Send + Sync> FromRequestParts<S> for RemoteUser {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let username = parts
            .headers
            .get(REMOTE_USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);
        Ok(Self(username))
    }
}

impl RemoteUser {
    /// Resolves the account; `None` for anonymous visitors.
    pub fn resolve(&self, conn: &Connection) -> ApiResult<Option<User>> {
        let Some(username) = self.0.as_deref() else {
            return Ok(None);
        };
        let user = SqliteUserRepository::try_new(conn)
            .map_err(ServiceError::from)?
            .find_by_username(username)
            .map_err(ServiceError::from)?;
        match user {
            Some(user) => Ok(Some(user)),
            None => Err(ApiError::Forbidden("unknown user".to_string())),
        }
    }

    /// Resolves the account, refusing anonymous visitors.
    pub fn require(&self, conn: &Connection) -> ApiResult<User> {
        self.resolve(conn)?
            .ok_or_else(|| ApiError::Forbidden("authentication required".to_string()))
    }
}
