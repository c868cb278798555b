//! Permission schema: the closed sets of modules and actions.
//!
//! Stored data uses inconsistent spellings for modules (`"jobcards"`,
//! `"job cards"`, `"Job-Cards"`...). Everything entering the engine goes
//! through [`normalize_module_key`] first.

use serde::{Deserialize, Serialize};

/// A functional area subject to access control.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Module {
    Customers,
    Orders,
    Jobcards,
    Invoices,
    Inventory,
    Expenses,
    Reports,
    Messages,
    PublicProfile,
    Settings,
    Staff,
}

impl Module {
    pub const ALL: [Module; 11] = [
        Module::Customers,
        Module::Orders,
        Module::Jobcards,
        Module::Invoices,
        Module::Inventory,
        Module::Expenses,
        Module::Reports,
        Module::Messages,
        Module::PublicProfile,
        Module::Settings,
        Module::Staff,
    ];

    /// Canonical storage key.
    pub fn as_str(&self) -> &'static str {
        match self {
            Module::Customers => "customers",
            Module::Orders => "orders",
            Module::Jobcards => "jobcards",
            Module::Invoices => "invoices",
            Module::Inventory => "inventory",
            Module::Expenses => "expenses",
            Module::Reports => "reports",
            Module::Messages => "messages",
            Module::PublicProfile => "public_profile",
            Module::Settings => "settings",
            Module::Staff => "staff",
        }
    }

    /// Legacy display label still used as a key by older call sites and rows.
    pub fn legacy_alias(&self) -> Option<&'static str> {
        match self {
            Module::Jobcards => Some("job cards"),
            Module::PublicProfile => Some("public profile"),
            _ => None,
        }
    }

    /// Every key under which this module is stored in a matrix.
    pub fn storage_keys(&self) -> impl Iterator<Item = &'static str> + use<> {
        core::iter::once(self.as_str()).chain(self.legacy_alias())
    }

    /// Parse any spelling of a known module.
    pub fn parse(raw: &str) -> Option<Module> {
        let compact: String = raw
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_') && !c.is_whitespace())
            .flat_map(char::to_lowercase)
            .collect();

        Module::ALL
            .into_iter()
            .find(|m| m.as_str().replace('_', "") == compact)
    }
}

impl core::fmt::Display for Module {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An operation kind within a module.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    View,
    Create,
    Edit,
    Delete,
}

impl Action {
    pub const ALL: [Action; 4] = [Action::View, Action::Create, Action::Edit, Action::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::View => "view",
            Action::Create => "create",
            Action::Edit => "edit",
            Action::Delete => "delete",
        }
    }

    pub fn parse(raw: &str) -> Option<Action> {
        let raw = raw.trim();
        Action::ALL
            .into_iter()
            .find(|a| a.as_str().eq_ignore_ascii_case(raw))
    }
}

impl core::fmt::Display for Action {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of normalizing a raw module key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ModuleKey {
    Known(Module),
    /// Not part of the schema. Inert for capability checks.
    Unknown(String),
}

impl ModuleKey {
    pub fn as_str(&self) -> &str {
        match self {
            ModuleKey::Known(m) => m.as_str(),
            ModuleKey::Unknown(raw) => raw,
        }
    }

    pub fn module(&self) -> Option<Module> {
        match self {
            ModuleKey::Known(m) => Some(*m),
            ModuleKey::Unknown(_) => None,
        }
    }
}

/// Map any spelling of a module name to its canonical key.
///
/// Unknown input is returned trimmed and lowercased; it never fails.
pub fn normalize_module_key(raw: &str) -> ModuleKey {
    match Module::parse(raw) {
        Some(m) => ModuleKey::Known(m),
        None => ModuleKey::Unknown(raw.trim().to_lowercase()),
    }
}
