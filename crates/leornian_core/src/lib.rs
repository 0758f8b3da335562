//! Core domain logic for Leornian.
//! This crate is the single source of truth for business invariants.

pub mod captcha;
pub mod codes;
pub mod config;
pub mod db;
pub mod drill;
pub mod logging;
pub mod mail;
pub mod markdown;
pub mod model;
pub mod repo;
pub mod service;
pub mod time;

pub use config::{ConfigError, Settings};
pub use db::{open_db, open_db_in_memory, DbError};
pub use drill::{generate_weights, DrawOutcome, DrawRequest, DrawnEntry, Drill, DrillStatus};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::collection::{CollectionEntry, CollectionFilter};
pub use model::note::{NewNote, Note, Visibility};
pub use model::page::Page;
pub use model::user::{NewUser, User};
pub use repo::{RepoError, RepoResult};
pub use service::{ServiceError, ServiceResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
