//! `loanops-core`: identifiers and domain error types shared by every crate.
//!
//! No IO, no storage, no HTTP.

pub mod entity;
pub mod error;
pub mod id;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{AgencyId, CaseId, RoleId, TrailId, UserId};
