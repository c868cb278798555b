//! API process configuration.

use tradedesk_infra::BouncerConfig;

pub const BIND_ADDR_VAR: &str = "TRADEDESK_BIND_ADDR";
pub const SESSION_SECRET_VAR: &str = "SESSION_SECRET";
pub const DATABASE_URL_VAR: &str = "DATABASE_URL";

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub bind_addr: String,
    /// HS256 secret for session tokens. `None` means none was configured.
    pub session_secret: Option<String>,
    /// Postgres URL. Without it the process runs on the in-memory store.
    pub database_url: Option<String>,
    pub bouncer: BouncerConfig,
}

impl ApiConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Self {
            bind_addr: get(BIND_ADDR_VAR).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            session_secret: get(SESSION_SECRET_VAR),
            database_url: get(DATABASE_URL_VAR),
            bouncer: BouncerConfig::from_lookup(&lookup),
        }
    }
}
