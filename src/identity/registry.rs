use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::session::SubjectId;

/// Failures of the user registry, split so callers can tell a definitive
/// not-found from a transient backend fault.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no user record for subject {0}")]
    NotFound(SubjectId),

    #[error("user record for subject {0} already exists")]
    Conflict(SubjectId),

    #[error("user record failed validation: {0}")]
    Validation(#[from] serde_json::Error),

    #[error("registry backend error: {0}")]
    Backend(String),
}

/// The application's own profile row, keyed by subject id. Created at most
/// once per subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserRecord {
    pub id: SubjectId,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    /// Validate a loose backend payload into the explicit record shape.
    /// Missing or unknown fields are a validation error, not a silent
    /// pass-through.
    pub fn from_value(value: serde_json::Value) -> Result<Self, RegistryError> {
        Ok(serde_json::from_value(value)?)
    }
}

/// Keyed store of user profile records, addressable by subject id.
#[async_trait]
pub trait UserRegistry: Send + Sync {
    async fn get_by_id(&self, subject: &str) -> Result<UserRecord, RegistryError>;

    async fn create(&self, subject: &str, email: &str) -> Result<UserRecord, RegistryError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn valid_payload_round_trips() {
        let rec = UserRecord::from_value(json!({
            "id": "sub-1",
            "email": "dev@example.com",
            "display_name": "Dev",
            "created_at": "2026-01-05T10:00:00Z",
        }))
        .unwrap();
        assert_eq!(rec.id, "sub-1");
        assert_eq!(rec.display_name.as_deref(), Some("Dev"));
    }

    #[test]
    fn display_name_is_optional() {
        let rec = UserRecord::from_value(json!({
            "id": "sub-1",
            "email": "dev@example.com",
            "created_at": "2026-01-05T10:00:00Z",
        }))
        .unwrap();
        assert!(rec.display_name.is_none());
    }

    #[test]
    fn missing_email_is_rejected() {
        let err = UserRecord::from_value(json!({
            "id": "sub-1",
            "created_at": "2026-01-05T10:00:00Z",
        }))
        .unwrap_err();
        assert!(matches!(err, RegistryError::Validation(_)));
    }

    #[test]
    fn extra_fields_are_rejected() {
        let err = UserRecord::from_value(json!({
            "id": "sub-1",
            "email": "dev@example.com",
            "created_at": "2026-01-05T10:00:00Z",
            "plan": "free",
        }))
        .unwrap_err();
        assert!(matches!(err, RegistryError::Validation(_)));
    }
}
