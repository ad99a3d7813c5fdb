//! Unified error model for the session lifecycle core.
//! One enum covers every failure class the controller has to distinguish:
//! transient backend hiccups, definitive not-found, duplicate-create races,
//! best-effort provisioning failures and payload validation errors.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::identity::RegistryError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthError {
    /// Identity provider query or refresh failed (transient).
    Gateway { code: String, message: String },
    /// Transient failure talking to the user registry.
    Registry { code: String, message: String },
    /// The registry definitively reported no record for the subject.
    NotFound { code: String, message: String },
    /// A concurrent creator won the insert race.
    Conflict { code: String, message: String },
    /// Workspace provisioning failed (never fatal to the caller).
    Provision { code: String, message: String },
    /// A backend payload did not match the expected record shape.
    Validation { code: String, message: String },
    Internal { code: String, message: String },
}

impl AuthError {
    pub fn code_str(&self) -> &str {
        match self {
            AuthError::Gateway { code, .. }
            | AuthError::Registry { code, .. }
            | AuthError::NotFound { code, .. }
            | AuthError::Conflict { code, .. }
            | AuthError::Provision { code, .. }
            | AuthError::Validation { code, .. }
            | AuthError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AuthError::Gateway { message, .. }
            | AuthError::Registry { message, .. }
            | AuthError::NotFound { message, .. }
            | AuthError::Conflict { message, .. }
            | AuthError::Provision { message, .. }
            | AuthError::Validation { message, .. }
            | AuthError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn gateway<S: Into<String>>(code: S, msg: S) -> Self { AuthError::Gateway { code: code.into(), message: msg.into() } }
    pub fn registry<S: Into<String>>(code: S, msg: S) -> Self { AuthError::Registry { code: code.into(), message: msg.into() } }
    pub fn not_found<S: Into<String>>(code: S, msg: S) -> Self { AuthError::NotFound { code: code.into(), message: msg.into() } }
    pub fn conflict<S: Into<String>>(code: S, msg: S) -> Self { AuthError::Conflict { code: code.into(), message: msg.into() } }
    pub fn provision<S: Into<String>>(code: S, msg: S) -> Self { AuthError::Provision { code: code.into(), message: msg.into() } }
    pub fn validation<S: Into<String>>(code: S, msg: S) -> Self { AuthError::Validation { code: code.into(), message: msg.into() } }
    pub fn internal<S: Into<String>>(code: S, msg: S) -> Self { AuthError::Internal { code: code.into(), message: msg.into() } }

    /// Definitive "no such record" as opposed to a transient failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, AuthError::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, AuthError::Conflict { .. })
    }

    /// Whether the retry policy should spend another attempt on this error.
    /// Not-found and conflict are outcomes, not faults; validation errors
    /// will not heal on re-read of the same row but a retry may observe a
    /// repaired one, so they stay retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AuthError::Gateway { .. }
                | AuthError::Registry { .. }
                | AuthError::Validation { .. }
                | AuthError::Internal { .. }
        )
    }
}

impl Display for AuthError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AuthError {}

pub type AuthResult<T> = Result<T, AuthError>;

impl From<RegistryError> for AuthError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(subject) => {
                AuthError::not_found("no_user_record".into(), format!("no user record for subject {}", subject))
            }
            RegistryError::Conflict(subject) => {
                AuthError::conflict("user_record_exists".into(), format!("user record for subject {} already exists", subject))
            }
            RegistryError::Validation(e) => {
                AuthError::validation("bad_user_payload".into(), e.to_string())
            }
            RegistryError::Backend(msg) => AuthError::registry("registry_unavailable".into(), msg),
        }
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        // Default mapping: treat as Internal unless downcasted elsewhere
        AuthError::Internal { code: "internal".into(), message: err.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(AuthError::gateway("g", "down").is_retryable());
        assert!(AuthError::registry("r", "hiccup").is_retryable());
        assert!(AuthError::validation("v", "bad shape").is_retryable());
        assert!(AuthError::internal("i", "oops").is_retryable());
        assert!(!AuthError::not_found("nf", "missing").is_retryable());
        assert!(!AuthError::conflict("c", "dup").is_retryable());
        assert!(!AuthError::provision("p", "failed").is_retryable());
    }

    #[test]
    fn registry_error_mapping() {
        let e: AuthError = RegistryError::NotFound("sub-1".into()).into();
        assert!(e.is_not_found());
        assert_eq!(e.code_str(), "no_user_record");

        let e: AuthError = RegistryError::Conflict("sub-1".into()).into();
        assert!(e.is_conflict());

        let e: AuthError = RegistryError::Backend("503".into()).into();
        assert!(e.is_retryable());
        assert_eq!(e.code_str(), "registry_unavailable");
    }

    #[test]
    fn display_includes_code_and_message() {
        let e = AuthError::provision("workspace_seed_failed", "insert rejected");
        assert_eq!(e.to_string(), "workspace_seed_failed: insert rejected");
    }
}
