//! Infrastructure layer: account stores, identity resolution, capability
//! cache and the permission mutation service.

pub mod bouncer;
pub mod cache;
pub mod config;
pub mod mutation;
pub mod resolver;
pub mod store;

pub use bouncer::{Bouncer, PassHandle, SessionContext};
pub use cache::{CacheEntry, CapabilityCache};
pub use config::BouncerConfig;
pub use mutation::{validate_permission_edit, MutationError, PermissionEdit, PermissionMutationService};
pub use resolver::Resolver;
pub use store::{
    AccountRow, AccountStore, InMemoryAccountStore, PostgresAccountStore, StaffLookup,
    StaffPermissionRow, StaffTier, StoreError,
};
