//! Domain model for notes, collections, moderation and support.
//!
//! # Responsibility
//! - Define canonical records shared by repositories and services.
//! - Own field-level validation rules (lengths, formats, enumerations).
//!
//! # Invariants
//! - Validation lives next to the record it guards; repositories never
//!   persist a value that fails these checks.

pub mod collection;
pub mod note;
pub mod page;
pub mod report;
pub mod support;
pub mod user;
pub mod validation;
