use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Account status. Only `active` accounts may sign in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UserStatus {
    #[default]
    Active,
    Inactive,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }

    /// Parses a submitted status value. Anything other than `active` or
    /// `inactive` falls back to `active` instead of being rejected.
    pub fn parse_lenient(value: &str) -> Self {
        match value {
            "inactive" => Self::Inactive,
            _ => Self::Active,
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical form of an email address: trimmed and lower-cased. Accounts
/// are unique per canonical address.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Role lookup entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Role {
    pub id: i32,
    pub name: String,
}

/// User model
#[derive(Clone, Debug)]
pub struct User {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    /// Empty when the user has no middle name.
    pub middle_name: String,
    pub email: String,
    pub password_hash: String,
    pub role_id: i32,
    /// Name of the referenced role, joined in by the repository.
    pub role_name: String,
    pub status: UserStatus,
    /// Relative storage path, e.g. `uploads/avatars/user_7.png`.
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}
