use serde::{Deserialize, Serialize};

/// Classification of a resolved principal within its tenant.
///
/// Owner and staff are exclusive by construction; when both flags are present
/// on the source rows, owner wins.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    /// Tenant owner. Never restricted by the permission matrix.
    Owner,
    /// Staff member. Restricted to what their matrix grants.
    Staff,
}

impl AccountKind {
    /// Classify from the account-level flags.
    pub fn classify(owner_flag: bool, staff_flag: bool) -> Self {
        if owner_flag || !staff_flag {
            AccountKind::Owner
        } else {
            AccountKind::Staff
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountKind::Owner => "owner",
            AccountKind::Staff => "staff",
        }
    }
}

impl core::fmt::Display for AccountKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
