use serde::{Deserialize, Serialize};

/// Authenticated user as reported by the auth provider. Read-only here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub created_at: String,
}
