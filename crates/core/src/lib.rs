//! `tradedesk-core`: shared building blocks for the tenant/identity boundary.
//!
//! This crate contains **pure** primitives (no infrastructure concerns).

pub mod error;
pub mod id;
pub mod value_object;

pub use error::DomainError;
pub use id::{AccountId, PrincipalId, StaffRecordId, TenantId};
pub use value_object::ValueObject;
