//! Permission matrix: per-module, per-action grants.
//!
//! A [`PermissionMatrix`] is always *complete*: every known module (and its
//! legacy alias key) carries every action, defaulting to `false`. Raw payloads
//! from the store are only ever turned into a matrix through
//! [`PermissionMatrix::normalize_and_merge`], which also keeps alias keys equal
//! to their canonical keys.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use tradedesk_core::ValueObject;

use crate::permissions::{normalize_module_key, Action, Module, ModuleKey};

/// Untyped matrix as stored: module key → { action → value }.
///
/// Keys may use legacy aliases, may be incomplete, and values may be any JSON.
pub type RawMatrix = Map<String, Value>;

/// Grants for a single module.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionSet {
    #[serde(default)]
    pub view: bool,
    #[serde(default)]
    pub create: bool,
    #[serde(default)]
    pub edit: bool,
    #[serde(default)]
    pub delete: bool,
}

impl ActionSet {
    pub fn get(&self, action: Action) -> bool {
        match action {
            Action::View => self.view,
            Action::Create => self.create,
            Action::Edit => self.edit,
            Action::Delete => self.delete,
        }
    }

    pub fn with(mut self, action: Action, granted: bool) -> Self {
        match action {
            Action::View => self.view = granted,
            Action::Create => self.create = granted,
            Action::Edit => self.edit = granted,
            Action::Delete => self.delete = granted,
        }
        self
    }

    fn to_raw(self) -> Value {
        let mut map = Map::new();
        for action in Action::ALL {
            map.insert(action.as_str().to_string(), Value::Bool(self.get(action)));
        }
        Value::Object(map)
    }
}

/// Complete, normalized permission matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PermissionMatrix {
    entries: BTreeMap<String, ActionSet>,
}

impl ValueObject for PermissionMatrix {}

impl Default for PermissionMatrix {
    fn default() -> Self {
        Self::empty()
    }
}

impl PermissionMatrix {
    /// Every module and alias key present, every action denied.
    pub fn empty() -> Self {
        let entries = Module::ALL
            .into_iter()
            .flat_map(|m| m.storage_keys())
            .map(|k| (k.to_string(), ActionSet::default()))
            .collect();
        Self { entries }
    }

    /// Normalize an untyped payload onto the default (all-denied) matrix.
    pub fn normalize_and_merge(partial: &RawMatrix) -> Self {
        Self::empty().merged_with(partial)
    }

    /// Return a new matrix with `partial` merged over `self`.
    ///
    /// Keys are normalized, values coerced to booleans, and every write lands on
    /// both the canonical key and its legacy alias. Action maps that are not
    /// objects and unknown action names are ignored.
    pub fn merged_with(&self, partial: &RawMatrix) -> Self {
        let mut next = self.clone();

        for (raw_key, actions) in partial {
            let Some(actions) = actions.as_object() else {
                continue;
            };

            let keys: Vec<String> = match normalize_module_key(raw_key) {
                ModuleKey::Known(m) => m.storage_keys().map(str::to_string).collect(),
                ModuleKey::Unknown(k) if k.is_empty() => continue,
                ModuleKey::Unknown(k) => vec![k],
            };

            let mut set = next.entries.get(&keys[0]).copied().unwrap_or_default();
            for (name, value) in actions {
                if let Some(action) = Action::parse(name) {
                    set = set.with(action, coerce_bool(value));
                }
            }

            for key in keys {
                next.entries.insert(key, set);
            }
        }

        next
    }

    /// Look up grants by any spelling of a module key.
    pub fn get(&self, raw_key: &str) -> Option<&ActionSet> {
        let key = normalize_module_key(raw_key);
        self.entries.get(key.as_str())
    }

    /// Grant lookup for a schema module. Missing entries deny.
    pub fn allows(&self, module: Module, action: Action) -> bool {
        self.entries
            .get(module.as_str())
            .is_some_and(|set| set.get(action))
    }

    /// All granted (module, action) pairs, canonical modules only.
    pub fn granted(&self) -> Vec<(Module, Action)> {
        Module::ALL
            .into_iter()
            .flat_map(|m| Action::ALL.into_iter().map(move |a| (m, a)))
            .filter(|(m, a)| self.allows(*m, *a))
            .collect()
    }

    /// Untyped form for persistence: canonical and alias keys both written.
    pub fn to_raw(&self) -> RawMatrix {
        self.entries
            .iter()
            .map(|(k, set)| (k.clone(), set.to_raw()))
            .collect()
    }
}

impl<'de> Deserialize<'de> for PermissionMatrix {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = RawMatrix::deserialize(deserializer)?;
        Ok(Self::normalize_and_merge(&raw))
    }
}

/// Strict boolean coercion: anything that isn't clearly a grant is a denial.
fn coerce_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"),
        _ => false,
    }
}
