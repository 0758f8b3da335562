//! Account bootstrap and lookup.

use crate::model::user::{NewUser, User, UserId};
use crate::repo::user_repo::UserRepository;
use crate::service::{ServiceError, ServiceResult};
use crate::time::now_epoch_ms;
use log::info;

pub struct UserService<R: UserRepository> {
    repo: R,
}

impl<R: UserRepository> UserService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates an account; the username must be free.
    pub fn create_user(&self, user: &NewUser) -> ServiceResult<User> {
        let created = self.repo.create_user(user, now_epoch_ms())?;
        info!(
            "event=user_create module=service status=ok user_id={} is_staff={}",
            created.id, created.is_staff
        );
        Ok(created)
    }

    pub fn get_user(&self, id: UserId) -> ServiceResult<User> {
        self.repo
            .get_user(id)?
            .ok_or_else(|| ServiceError::not_found("user", id))
    }

    pub fn require_by_username(&self, username: &str) -> ServiceResult<User> {
        self.repo
            .find_by_username(username)?
            .ok_or_else(|| ServiceError::not_found("user", username))
    }

    /// Deletes an account and, through cascades, its collection.
    pub fn delete_user(&self, id: UserId) -> ServiceResult<()> {
        self.repo.delete_user(id)?;
        info!("event=user_delete module=service status=ok user_id={id}");
        Ok(())
    }
}
