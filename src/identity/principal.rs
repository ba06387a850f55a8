use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Role assigned to a principal. Authorization rules are keyed by role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Operator,
    ReadOnly,
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Operator => write!(f, "operator"),
            Role::ReadOnly => write!(f, "read_only"),
        }
    }
}

/// A stored principal record as read from the credential store.
/// Created by out-of-scope provisioning; read-only here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub username: String,
    /// PHC-format password hash (Argon2id).
    pub password_hash: String,
    pub role: Role,
    /// Workspace ids this principal may touch.
    #[serde(default)]
    pub workspaces: Vec<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool { true }
