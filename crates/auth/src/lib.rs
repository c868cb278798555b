//! `tradedesk-auth`: pure authorization boundary (fail-closed).
//!
//! Schema, permission matrix, resolved identity/state, and the capability
//! check API. This crate is intentionally decoupled from HTTP and storage.

pub mod authorize;
pub mod claims;
pub mod guard;
pub mod matrix;
pub mod permissions;
pub mod principal;
pub mod roles;
pub mod state;

pub use authorize::{explain, AuthorizationExplanation, AuthzError, Capabilities, DenialKind};
pub use claims::{
    validate_claims, Hs256SessionValidator, Session, SessionClaims, SessionValidationError,
    SessionValidator,
};
pub use guard::{Gate, RouteDecision, RouteGuard};
pub use matrix::{ActionSet, PermissionMatrix, RawMatrix};
pub use permissions::{normalize_module_key, Action, Module, ModuleKey};
pub use principal::Identity;
pub use roles::AccountKind;
pub use state::BouncerState;
