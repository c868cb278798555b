//! Declarative guards for dependent views and routes.

use crate::{Action, Capabilities};

pub const DEFAULT_SIGN_IN_ROUTE: &str = "/sign-in";
pub const DEFAULT_LANDING_ROUTE: &str = "/";

/// Renders children only when the principal holds `module.action`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gate {
    module: String,
    action: Action,
}

impl Gate {
    pub fn new(module: impl Into<String>, action: Action) -> Self {
        Self {
            module: module.into(),
            action,
        }
    }

    pub fn allows(&self, caps: &Capabilities<'_>) -> bool {
        caps.can(&self.module, self.action)
    }

    /// Children when allowed, nothing otherwise.
    pub fn render<V>(&self, caps: &Capabilities<'_>, children: impl FnOnce() -> V) -> Option<V> {
        self.allows(caps).then(children)
    }

    /// Children when allowed, the fallback view otherwise.
    pub fn render_or<V>(
        &self,
        caps: &Capabilities<'_>,
        children: impl FnOnce() -> V,
        fallback: impl FnOnce() -> V,
    ) -> V {
        if self.allows(caps) { children() } else { fallback() }
    }
}

/// What a route should do for the current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// Resolution in flight; show nothing or a pending view.
    Pending,
    Allow,
    Redirect(String),
}

/// Route-level guard.
///
/// Unauthenticated principals go to sign-in; authenticated principals that
/// fail the requirement (or whose resolution failed) go to the neutral
/// default route and never see the guarded content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteGuard {
    requirement: Option<(String, Action)>,
    sign_in_route: String,
    default_route: String,
}

impl Default for RouteGuard {
    fn default() -> Self {
        Self::new(DEFAULT_SIGN_IN_ROUTE, DEFAULT_LANDING_ROUTE)
    }
}

impl RouteGuard {
    pub fn new(sign_in_route: impl Into<String>, default_route: impl Into<String>) -> Self {
        Self {
            requirement: None,
            sign_in_route: sign_in_route.into(),
            default_route: default_route.into(),
        }
    }

    pub fn requiring(mut self, module: impl Into<String>, action: Action) -> Self {
        self.requirement = Some((module.into(), action));
        self
    }

    pub fn decide(&self, caps: &Capabilities<'_>) -> RouteDecision {
        let state = caps.state();

        if state.is_loading() {
            return RouteDecision::Pending;
        }
        if !state.is_authenticated() {
            return RouteDecision::Redirect(self.sign_in_route.clone());
        }
        if state.error().is_some() {
            return RouteDecision::Redirect(self.default_route.clone());
        }

        match &self.requirement {
            Some((module, action)) if !caps.can(module, *action) => {
                RouteDecision::Redirect(self.default_route.clone())
            }
            _ => RouteDecision::Allow,
        }
    }
}
