//! Bouncer configuration.

use serde::{Deserialize, Serialize};

use tradedesk_auth::guard::{DEFAULT_LANDING_ROUTE, DEFAULT_SIGN_IN_ROUTE};
use tradedesk_auth::{BouncerState, Capabilities, RouteGuard};

pub const SIGN_IN_ROUTE_VAR: &str = "TRADEDESK_SIGN_IN_ROUTE";
pub const DEFAULT_ROUTE_VAR: &str = "TRADEDESK_DEFAULT_ROUTE";
pub const OPTIMISTIC_CHECKS_VAR: &str = "TRADEDESK_OPTIMISTIC_CHECKS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BouncerConfig {
    /// Where unauthenticated principals are sent.
    pub sign_in_route: String,
    /// Where authenticated but unauthorized principals are sent.
    pub default_route: String,
    /// Let capability checks consult a hydrated (cached, still loading) state.
    /// Off by default: checks deny until the fresh pass completes.
    pub optimistic_checks: bool,
}

impl Default for BouncerConfig {
    fn default() -> Self {
        Self {
            sign_in_route: DEFAULT_SIGN_IN_ROUTE.to_string(),
            default_route: DEFAULT_LANDING_ROUTE.to_string(),
            optimistic_checks: false,
        }
    }
}

impl BouncerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Missing or blank values keep defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        Self {
            sign_in_route: get(SIGN_IN_ROUTE_VAR).unwrap_or(defaults.sign_in_route),
            default_route: get(DEFAULT_ROUTE_VAR).unwrap_or(defaults.default_route),
            optimistic_checks: get(OPTIMISTIC_CHECKS_VAR)
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.optimistic_checks),
        }
    }

    pub fn route_guard(&self) -> RouteGuard {
        RouteGuard::new(self.sign_in_route.clone(), self.default_route.clone())
    }

    pub fn capabilities<'a>(&self, state: &'a BouncerState) -> Capabilities<'a> {
        if self.optimistic_checks {
            Capabilities::optimistic(state)
        } else {
            Capabilities::strict(state)
        }
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_block_while_loading() {
        let config = BouncerConfig::from_lookup(lookup(&[]));
        assert_eq!(config, BouncerConfig::default());
        assert!(!config.optimistic_checks);
        assert_eq!(config.sign_in_route, "/sign-in");
    }

    #[test]
    fn reads_overrides_and_ignores_blanks() {
        let config = BouncerConfig::from_lookup(lookup(&[
            (SIGN_IN_ROUTE_VAR, "/login"),
            (DEFAULT_ROUTE_VAR, "   "),
            (OPTIMISTIC_CHECKS_VAR, "TRUE"),
        ]));

        assert_eq!(config.sign_in_route, "/login");
        assert_eq!(config.default_route, "/");
        assert!(config.optimistic_checks);
    }

    #[test]
    fn unrecognized_flag_is_off() {
        let config = BouncerConfig::from_lookup(lookup(&[(OPTIMISTIC_CHECKS_VAR, "maybe")]));
        assert!(!config.optimistic_checks);
    }
}
