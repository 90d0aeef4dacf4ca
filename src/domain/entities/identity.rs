//! Per-request caller identity.

use serde::Serialize;

use super::account::{AccountStatus, Role};

/// The resolved caller of a request.
///
/// Produced fresh by the authenticator for every request and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Identity {
    Anonymous,
    User {
        id: i64,
        role: Role,
        status: AccountStatus,
    },
    Service {
        key_id: i64,
        owner_id: i64,
    },
}

impl Identity {
    pub fn is_service(&self) -> bool {
        matches!(self, Self::Service { .. })
    }

    pub fn user_id(&self) -> Option<i64> {
        match self {
            Self::User { id, .. } => Some(*id),
            _ => None,
        }
    }

    /// Short, non-sensitive label used in logs and audit records.
    pub fn summary(&self) -> String {
        match self {
            Self::Anonymous => "anonymous".to_string(),
            Self::User { id, .. } => format!("user:{id}"),
            Self::Service { key_id, .. } => format!("service:{key_id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary() {
        assert_eq!(Identity::Anonymous.summary(), "anonymous");
        assert_eq!(
            Identity::User {
                id: 7,
                role: Role::Member,
                status: AccountStatus::Active
            }
            .summary(),
            "user:7"
        );
        assert_eq!(
            Identity::Service {
                key_id: 3,
                owner_id: 7
            }
            .summary(),
            "service:3"
        );
    }

    #[test]
    fn test_serializes_with_kind_tag() {
        let json = serde_json::to_value(Identity::Service {
            key_id: 1,
            owner_id: 2,
        })
        .unwrap();

        assert_eq!(json["kind"], "service");
        assert_eq!(json["key_id"], 1);
    }
}
