use serde::{Deserialize, Serialize};

/// Role assigned when a verified token carries no `role` claim.
///
/// This is a permissive default kept for compatibility with tokens minted by
/// the existing login flow. `SessionVerifier::require_role_claim` turns it off.
pub const DEFAULT_ROLE: &str = "superadmin";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
    pub role: String,
}

impl Identity {
    pub fn new<S: Into<String>>(username: S, role: S) -> Self {
        Self { username: username.into(), role: role.into() }
    }

    pub fn is_superadmin(&self) -> bool {
        self.role == DEFAULT_ROLE
    }
}
