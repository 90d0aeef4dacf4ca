//! Forum account as seen by the authenticator.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role of a forum user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Member,
    Moderator,
    Admin,
}

/// Lifecycle status of a forum user.
///
/// Only [`AccountStatus::Active`] accounts may authenticate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Banned,
    Suspended,
    Pending,
}

impl AccountStatus {
    pub fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }
}

/// The subset of a user record needed to build an [`crate::domain::entities::Identity`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: i64,
    pub role: Role,
    pub status: AccountStatus,
}

impl Account {
    pub fn new(id: i64, role: Role, status: AccountStatus) -> Self {
        Self { id, role, status }
    }
}

/// Error returned when a stored role or status string is not recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant(pub String);

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown value '{}'", self.0)
    }
}

impl std::error::Error for UnknownVariant {}

impl FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "member" | "user" => Ok(Self::Member),
            "moderator" => Ok(Self::Moderator),
            "admin" => Ok(Self::Admin),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

impl FromStr for AccountStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "banned" => Ok(Self::Banned),
            "suspended" => Ok(Self::Suspended),
            "pending" => Ok(Self::Pending),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Member => "member",
            Self::Moderator => "moderator",
            Self::Admin => "admin",
        };
        f.write_str(s)
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Active => "active",
            Self::Banned => "banned",
            Self::Suspended => "suspended",
            Self::Pending => "pending",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_active_status_is_active() {
        assert!(AccountStatus::Active.is_active());
        assert!(!AccountStatus::Banned.is_active());
        assert!(!AccountStatus::Suspended.is_active());
        assert!(!AccountStatus::Pending.is_active());
    }

    #[test]
    fn test_parse_stored_values() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("user".parse::<Role>().unwrap(), Role::Member);
        assert_eq!(
            "banned".parse::<AccountStatus>().unwrap(),
            AccountStatus::Banned
        );
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn test_display_matches_parse() {
        for status in [
            AccountStatus::Active,
            AccountStatus::Banned,
            AccountStatus::Suspended,
            AccountStatus::Pending,
        ] {
            assert_eq!(status.to_string().parse::<AccountStatus>().unwrap(), status);
        }
    }
}
