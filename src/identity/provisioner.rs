use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AuthResult;

use super::session::SubjectId;

/// Template for one starter workspace. Only name and description are part
/// of this layer; source payloads belong to the editor backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkspaceSpec {
    pub name: &'static str,
    pub description: &'static str,
}

/// The starter set every brand-new user receives exactly once.
pub const DEFAULT_WORKSPACES: &[WorkspaceSpec] = &[
    WorkspaceSpec {
        name: "Hello World",
        description: "A simple Hello World workspace to get started",
    },
    WorkspaceSpec {
        name: "Counter",
        description: "A basic counter workspace demonstrating contract state",
    },
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceRecord {
    pub id: Uuid,
    pub owner: SubjectId,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Creates the default workspace set for a brand-new user. Implementations
/// must be idempotent or safely best-effort: a user that already owns
/// workspaces is left untouched, and failures are non-fatal to callers.
#[async_trait]
pub trait WorkspaceProvisioner: Send + Sync {
    async fn provision_defaults(&self, owner: &str) -> AuthResult<()>;
}
