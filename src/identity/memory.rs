//! In-memory reference implementations of the identity collaborators.
//! They back the demo binary and the lifecycle tests; failure injection
//! hooks let tests exercise every error class without a real backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use base64::Engine;
use chrono::Utc;
use parking_lot::RwLock;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};
use crate::identity::{
    GatewayEvent, GatewayEventKind, IdentityGateway, RegistryError, Session, SubjectId,
    UserRecord, UserRegistry, WorkspaceProvisioner, WorkspaceRecord, DEFAULT_WORKSPACES,
};

/// Random URL-safe token, base64url without padding.
fn gen_token() -> String {
    let mut buf = [0u8; 32];
    let _ = getrandom::getrandom(&mut buf);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf)
}

#[derive(Default)]
struct GatewayInner {
    session: Option<Session>,
    /// Stable subject per email so sign-out/sign-in cycles keep identity.
    subjects: HashMap<String, SubjectId>,
    fail_query: bool,
    fail_refresh: bool,
}

/// Identity gateway holding at most one live session, with broadcast
/// change notifications.
pub struct MemoryGateway {
    inner: RwLock<GatewayInner>,
    events: broadcast::Sender<GatewayEvent>,
    query_calls: AtomicU32,
    refresh_calls: AtomicU32,
}

impl MemoryGateway {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            inner: RwLock::new(GatewayInner::default()),
            events,
            query_calls: AtomicU32::new(0),
            refresh_calls: AtomicU32::new(0),
        }
    }

    /// Gateway that already holds a session at startup, as after a
    /// previous visit left a cached one behind.
    pub fn with_session(email: &str) -> Self {
        let gw = Self::new();
        {
            let mut inner = gw.inner.write();
            let session = mint(&mut inner, email);
            inner.session = Some(session);
        }
        gw
    }

    /// Complete a sign-in and notify subscribers, as the provider does
    /// when a magic link or OAuth redirect lands.
    pub fn establish(&self, email: &str) -> Session {
        let session = {
            let mut inner = self.inner.write();
            let session = mint(&mut inner, email);
            inner.session = Some(session.clone());
            session
        };
        let _ = self.events.send(GatewayEvent {
            kind: GatewayEventKind::SessionEstablished,
            session: Some(session.clone()),
        });
        session
    }

    /// End the session and notify subscribers.
    pub fn end_session(&self) {
        self.inner.write().session = None;
        let _ = self.events.send(GatewayEvent {
            kind: GatewayEventKind::SessionEnded,
            session: None,
        });
    }

    /// Drop the session without notifying subscribers, as when the
    /// provider's cache is invalidated out from under the tab.
    pub fn drop_session_silently(&self) {
        self.inner.write().session = None;
    }

    /// Re-deliver a `SessionEstablished` for the live session, duplicating
    /// what some providers do on token refresh.
    pub fn reannounce(&self) {
        let session = self.inner.read().session.clone();
        if session.is_some() {
            let _ = self.events.send(GatewayEvent {
                kind: GatewayEventKind::SessionEstablished,
                session,
            });
        }
    }

    pub fn set_fail_query(&self, fail: bool) {
        self.inner.write().fail_query = fail;
    }

    pub fn set_fail_refresh(&self, fail: bool) {
        self.inner.write().fail_refresh = fail;
    }

    pub fn query_count(&self) -> u32 {
        self.query_calls.load(Ordering::Relaxed)
    }

    pub fn refresh_count(&self) -> u32 {
        self.refresh_calls.load(Ordering::Relaxed)
    }
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

fn mint(inner: &mut GatewayInner, email: &str) -> Session {
    let subject = inner
        .subjects
        .entry(email.to_string())
        .or_insert_with(|| Uuid::new_v4().to_string())
        .clone();
    let now = Utc::now();
    Session {
        subject_id: subject,
        email: email.to_string(),
        access_token: gen_token(),
        issued_at: now,
        expires_at: now + chrono::Duration::hours(1),
    }
}

#[async_trait]
impl IdentityGateway for MemoryGateway {
    async fn current_session(&self) -> AuthResult<Option<Session>> {
        self.query_calls.fetch_add(1, Ordering::Relaxed);
        let inner = self.inner.read();
        if inner.fail_query {
            return Err(AuthError::gateway("session_query_failed", "identity backend unreachable"));
        }
        Ok(inner.session.clone())
    }

    async fn refresh_session(&self) -> AuthResult<Session> {
        self.refresh_calls.fetch_add(1, Ordering::Relaxed);
        let refreshed = {
            let mut inner = self.inner.write();
            if inner.fail_refresh {
                return Err(AuthError::gateway("refresh_failed", "token refresh rejected"));
            }
            let Some(current) = inner.session.clone() else {
                return Err(AuthError::gateway("no_active_session", "nothing to refresh"));
            };
            let now = Utc::now();
            let refreshed = Session {
                access_token: gen_token(),
                issued_at: now,
                expires_at: now + chrono::Duration::hours(1),
                ..current
            };
            inner.session = Some(refreshed.clone());
            refreshed
        };
        let _ = self.events.send(GatewayEvent {
            kind: GatewayEventKind::TokenRefreshed,
            session: Some(refreshed.clone()),
        });
        Ok(refreshed)
    }

    async fn sign_out(&self) -> AuthResult<()> {
        self.end_session();
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.events.subscribe()
    }
}

/// User registry over a plain map. Rows are stored as loose JSON and
/// validated on the way out, like the hosted backend they stand in for.
pub struct MemoryRegistry {
    rows: RwLock<HashMap<SubjectId, Value>>,
    fail_reads: AtomicU32,
    fail_creates: AtomicU32,
    race_creates: AtomicU32,
    read_calls: AtomicU32,
    create_calls: AtomicU32,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
            fail_reads: AtomicU32::new(0),
            fail_creates: AtomicU32::new(0),
            race_creates: AtomicU32::new(0),
            read_calls: AtomicU32::new(0),
            create_calls: AtomicU32::new(0),
        }
    }

    /// Pre-seed a validated record, as for a returning user.
    pub fn seed(&self, record: &UserRecord) {
        self.rows.write().insert(
            record.id.clone(),
            json!({
                "id": record.id,
                "email": record.email,
                "display_name": record.display_name,
                "created_at": record.created_at,
            }),
        );
    }

    /// Pre-seed a raw row, shape unchecked. Lets tests exercise the
    /// validation boundary with malformed backend payloads.
    pub fn seed_raw(&self, subject: &str, row: Value) {
        self.rows.write().insert(subject.to_string(), row);
    }

    /// The next `n` reads fail with a transient backend error.
    pub fn fail_next_reads(&self, n: u32) {
        self.fail_reads.store(n, Ordering::SeqCst);
    }

    /// The next `n` creates fail with a transient backend error.
    pub fn fail_next_creates(&self, n: u32) {
        self.fail_creates.store(n, Ordering::SeqCst);
    }

    /// The next `n` creates lose an insert race: a concurrent creator's
    /// row appears and the call reports a conflict.
    pub fn race_next_creates(&self, n: u32) {
        self.race_creates.store(n, Ordering::SeqCst);
    }

    pub fn read_count(&self) -> u32 {
        self.read_calls.load(Ordering::Relaxed)
    }

    pub fn create_count(&self) -> u32 {
        self.create_calls.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn take_injected_failure(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl UserRegistry for MemoryRegistry {
    async fn get_by_id(&self, subject: &str) -> Result<UserRecord, RegistryError> {
        self.read_calls.fetch_add(1, Ordering::Relaxed);
        if take_injected_failure(&self.fail_reads) {
            return Err(RegistryError::Backend("injected read failure".into()));
        }
        let row = self
            .rows
            .read()
            .get(subject)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(subject.to_string()))?;
        UserRecord::from_value(row)
    }

    async fn create(&self, subject: &str, email: &str) -> Result<UserRecord, RegistryError> {
        self.create_calls.fetch_add(1, Ordering::Relaxed);
        if take_injected_failure(&self.fail_creates) {
            return Err(RegistryError::Backend("injected create failure".into()));
        }
        let record = UserRecord {
            id: subject.to_string(),
            email: email.to_string(),
            display_name: None,
            created_at: Utc::now(),
        };
        let mut rows = self.rows.write();
        if take_injected_failure(&self.race_creates) {
            rows.entry(subject.to_string()).or_insert_with(|| {
                json!({
                    "id": subject,
                    "email": email,
                    "display_name": null,
                    "created_at": Utc::now(),
                })
            });
            return Err(RegistryError::Conflict(subject.to_string()));
        }
        if rows.contains_key(subject) {
            return Err(RegistryError::Conflict(subject.to_string()));
        }
        rows.insert(
            subject.to_string(),
            json!({
                "id": record.id,
                "email": record.email,
                "display_name": record.display_name,
                "created_at": record.created_at,
            }),
        );
        Ok(record)
    }
}

/// Workspace provisioner over a plain map; skips users that already own
/// workspaces so duplicate provisioning attempts are harmless.
pub struct MemoryProvisioner {
    workspaces: RwLock<HashMap<SubjectId, Vec<WorkspaceRecord>>>,
    fail_next: AtomicU32,
    calls: AtomicU32,
}

impl MemoryProvisioner {
    pub fn new() -> Self {
        Self {
            workspaces: RwLock::new(HashMap::new()),
            fail_next: AtomicU32::new(0),
            calls: AtomicU32::new(0),
        }
    }

    /// The next `n` provisioning calls fail.
    pub fn fail_next(&self, n: u32) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn workspaces_for(&self, owner: &str) -> Vec<WorkspaceRecord> {
        self.workspaces.read().get(owner).cloned().unwrap_or_default()
    }
}

impl Default for MemoryProvisioner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkspaceProvisioner for MemoryProvisioner {
    async fn provision_defaults(&self, owner: &str) -> AuthResult<()> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if take_injected_failure(&self.fail_next) {
            return Err(AuthError::provision("workspace_seed_failed", "injected provisioning failure"));
        }
        let mut map = self.workspaces.write();
        if map.get(owner).is_some_and(|w| !w.is_empty()) {
            tracing::debug!(owner, "user already has workspaces, skipping starter set");
            return Ok(());
        }
        let now = Utc::now();
        let records = DEFAULT_WORKSPACES
            .iter()
            .map(|spec| WorkspaceRecord {
                id: Uuid::new_v4(),
                owner: owner.to_string(),
                name: spec.name.to_string(),
                description: spec.description.to_string(),
                created_at: now,
            })
            .collect();
        map.insert(owner.to_string(), records);
        Ok(())
    }
}
