use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::AuthResult;

use super::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayEventKind {
    /// A sign-in completed, possibly in another surface of the provider.
    SessionEstablished,
    /// The session was ended (local or remote sign-out, expiry).
    SessionEnded,
    /// A background token refresh happened for the existing session.
    TokenRefreshed,
}

/// Asynchronous notification from the identity provider. May arrive at any
/// time after subscription, including duplicates for the same session.
#[derive(Debug, Clone)]
pub struct GatewayEvent {
    pub kind: GatewayEventKind,
    pub session: Option<Session>,
}

/// The identity provider seam: session issuance, refresh and asynchronous
/// change notifications.
#[async_trait]
pub trait IdentityGateway: Send + Sync {
    /// Look up the currently cached session, if any.
    async fn current_session(&self) -> AuthResult<Option<Session>>;

    /// Proactively refresh the session before it expires.
    async fn refresh_session(&self) -> AuthResult<Session>;

    async fn sign_out(&self) -> AuthResult<()>;

    /// Subscribe to session-change notifications. Each receiver observes
    /// events emitted after the call.
    fn subscribe(&self) -> broadcast::Receiver<GatewayEvent>;
}
