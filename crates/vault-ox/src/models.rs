use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use vault_ox_common::Timestamp;

/// A file as listed by `myFiles` or `allFiles`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: String,
    pub filename: String,
    pub size_bytes: u64,
    #[serde(default)]
    pub mime_type: Option<String>,
    pub is_public: bool,
    pub created_at: Timestamp,
    /// Present iff a public link has been created for the file
    #[serde(default)]
    pub public_token: Option<String>,
    /// Only meaningful while `public_token` is set. Never mutated locally.
    #[serde(default)]
    pub download_count: u64,
}

impl FileRecord {
    #[must_use]
    pub fn has_public_link(&self) -> bool {
        self.public_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// Deduplication savings for the current user, computed server-side
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageStats {
    pub original_bytes: u64,
    pub deduped_bytes: u64,
    pub saved_bytes: u64,
    pub saved_percent: f64,
}

/// A user as listed by `allUsers`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub created_at: Timestamp,
}

/// User role. Unknown values coming from the server are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    User,
    Admin,
    Other(String),
}

impl Role {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
            Self::Other(s) => s,
        }
    }

    /// The role the "toggle admin" action switches to: admins become users,
    /// everyone else becomes an admin.
    #[must_use]
    pub fn toggled(&self) -> Self {
        match self {
            Self::Admin => Self::User,
            Self::User | Self::Other(_) => Self::Admin,
        }
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        match value.as_str() {
            "user" => Self::User,
            "admin" => Self::Admin,
            _ => Self::Other(value),
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        match role {
            Role::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl FromStr for Role {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s.to_string()))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
