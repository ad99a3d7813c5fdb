use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable identifier of an authenticated identity, independent of the
/// application's own user record.
pub type SubjectId = String;

/// Proof of authentication issued by the identity provider.
///
/// The lifecycle controller only ever holds a transient, read-only view
/// obtained per query; issuance and refresh cadence are the provider's
/// concern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub subject_id: SubjectId,
    pub email: String,
    pub access_token: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
