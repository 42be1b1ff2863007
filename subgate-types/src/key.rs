//! Entitlement identity.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one entitlement: a subscription lineage plus the family
/// member it was shared with.
///
/// The `original_transaction_id` is the platform-issued identifier that
/// stays stable across renewals. `account_token: None` denotes the
/// primary holder; family members carry their own token, so a revocation
/// scoped to one member never touches the siblings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntitlementKey {
    pub original_transaction_id: String,
    pub account_token: Option<String>,
}

impl EntitlementKey {
    /// Key for the primary subscription holder.
    #[must_use]
    pub fn primary(original_transaction_id: impl Into<String>) -> Self {
        Self {
            original_transaction_id: original_transaction_id.into(),
            account_token: None,
        }
    }

    /// Key for a family member identified by their account token.
    #[must_use]
    pub fn member(original_transaction_id: impl Into<String>, account_token: impl Into<String>) -> Self {
        Self {
            original_transaction_id: original_transaction_id.into(),
            account_token: Some(account_token.into()),
        }
    }
}

impl fmt::Display for EntitlementKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.account_token {
            Some(token) => write!(f, "{}:{}", self.original_transaction_id, token),
            None => f.write_str(&self.original_transaction_id),
        }
    }
}
