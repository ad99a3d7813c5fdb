use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::identity::{
    GatewayEvent, GatewayEventKind, IdentityGateway, RegistryError, Session, SubjectId,
    UserRecord, UserRegistry, WorkspaceProvisioner,
};
use crate::view::{routes, ViewRouter};

use super::sleeper::{Sleeper, TokioSleeper};
use super::state::{AuthPhase, AuthState, AuthStateCell};

/// Single writer of [`AuthState`] and the only component that talks to the
/// identity gateway, user registry and workspace provisioner for lifecycle
/// purposes.
///
/// One controller lives for the lifetime of a tab. [`SessionController::start`]
/// spawns the initial reconciliation, the loading-timeout safeguard and the
/// event/keep-alive loop; [`SessionController::shutdown`] tears them down and
/// suppresses any late state writes.
pub struct SessionController {
    gateway: Arc<dyn IdentityGateway>,
    registry: Arc<dyn UserRegistry>,
    provisioner: Arc<dyn WorkspaceProvisioner>,
    router: Arc<dyn ViewRouter>,
    config: SessionConfig,
    sleeper: Arc<dyn Sleeper>,
    state: AuthStateCell,
    /// Serializes profile resolutions; a trigger arriving mid-resolution is
    /// a no-op rather than an interleaved run.
    resolving: AtomicBool,
    /// Initial reconciliation reached a verdict (including by timeout).
    initialized: AtomicBool,
    started: AtomicBool,
    /// Subject the signed-in navigation already fired for.
    navigated_for: Mutex<Option<SubjectId>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SessionController {
    pub fn new(
        gateway: Arc<dyn IdentityGateway>,
        registry: Arc<dyn UserRegistry>,
        provisioner: Arc<dyn WorkspaceProvisioner>,
        router: Arc<dyn ViewRouter>,
        config: SessionConfig,
    ) -> Arc<Self> {
        Self::with_sleeper(gateway, registry, provisioner, router, config, Arc::new(TokioSleeper))
    }

    pub fn with_sleeper(
        gateway: Arc<dyn IdentityGateway>,
        registry: Arc<dyn UserRegistry>,
        provisioner: Arc<dyn WorkspaceProvisioner>,
        router: Arc<dyn ViewRouter>,
        config: SessionConfig,
        sleeper: Arc<dyn Sleeper>,
    ) -> Arc<Self> {
        Arc::new(Self {
            gateway,
            registry,
            provisioner,
            router,
            config,
            sleeper,
            state: AuthStateCell::new(),
            resolving: AtomicBool::new(false),
            initialized: AtomicBool::new(false),
            started: AtomicBool::new(false),
            navigated_for: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Observe the authoritative state. Readers never mutate; they may only
    /// trigger controller operations such as [`SessionController::refresh_user`].
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> AuthState {
        self.state.snapshot()
    }

    /// Spawn the lifecycle tasks. Idempotent; later calls are no-ops.
    pub fn start(self: &Arc<Self>) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        // Subscribe before anything else so no event emitted after start is
        // lost to the loop.
        let events = self.gateway.subscribe();

        let mut tasks = self.tasks.lock();
        let me = Arc::clone(self);
        tasks.push(tokio::spawn(async move { me.initial_reconcile().await }));
        let me = Arc::clone(self);
        tasks.push(tokio::spawn(async move { me.ready_timeout_guard().await }));
        let me = Arc::clone(self);
        tasks.push(tokio::spawn(async move { me.event_loop(events).await }));
    }

    /// Cancel the keep-alive and timeout tasks and unmount the state cell so
    /// a late-arriving backend response cannot write to torn-down state.
    pub fn shutdown(&self) {
        self.state.unmount();
        let mut tasks = self.tasks.lock();
        for task in tasks.drain(..) {
            task.abort();
        }
        debug!("session controller torn down");
    }

    /// Runs exactly once per tab: look for an existing session and, if one
    /// is present, resolve the profile behind it. The phase always reaches
    /// `Ready`, whatever the backends do.
    async fn initial_reconcile(self: Arc<Self>) {
        debug!("starting initial session check");
        match self.gateway.current_session().await {
            Ok(Some(session)) => {
                debug!(subject = %session.subject_id, "session found, resolving profile");
                self.state.publish(|s| {
                    s.authenticated = true;
                    s.phase = AuthPhase::Checking;
                });
                let user = self.resolve_profile(&session).await;
                self.state.publish(|s| {
                    if let Some(user) = user {
                        s.user = Some(user);
                    }
                    s.phase = AuthPhase::Ready;
                });
            }
            Ok(None) => {
                debug!("no session found");
                self.state.publish(|s| {
                    s.authenticated = false;
                    s.user = None;
                    s.phase = AuthPhase::Ready;
                });
            }
            Err(err) => {
                // Treated as "no session" for liveness, but it is not an
                // authoritative sign-out: no navigation happens here.
                warn!(error = %err, "session query failed, continuing signed out");
                self.state.publish(|s| s.phase = AuthPhase::Ready);
            }
        }
        self.initialized.store(true, Ordering::SeqCst);
    }

    /// Forces `Ready` if the initial check has not settled within the
    /// configured window, preserving whatever was determined so far.
    async fn ready_timeout_guard(self: Arc<Self>) {
        self.sleeper.sleep(self.config.ready_timeout()).await;
        if self.initialized.load(Ordering::SeqCst) {
            return;
        }
        if self.state.snapshot().is_ready() {
            return;
        }
        warn!("session check did not settle in time, forcing ready");
        self.initialized.store(true, Ordering::SeqCst);
        self.state.publish(|s| s.phase = AuthPhase::Ready);
    }

    /// Drives gateway notifications and the keep-alive timer until the
    /// controller is torn down or the gateway closes its event stream.
    async fn event_loop(self: Arc<Self>, mut events: broadcast::Receiver<GatewayEvent>) {
        let mut keep_alive = tokio::time::interval(self.config.keep_alive_interval());
        keep_alive.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // An interval's first tick completes immediately; consume it so the
        // first refresh happens one full period after start.
        keep_alive.tick().await;

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(event) => self.handle_event(event).await,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "session event stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("gateway event stream closed");
                        break;
                    }
                },
                _ = keep_alive.tick() => self.keep_alive_tick().await,
            }
        }
    }

    async fn handle_event(&self, event: GatewayEvent) {
        debug!(kind = ?event.kind, has_session = event.session.is_some(), "session event");
        match event.kind {
            GatewayEventKind::SessionEstablished => {
                if let Some(session) = event.session {
                    self.handle_established(session).await;
                }
            }
            GatewayEventKind::SessionEnded => self.handle_ended(),
            GatewayEventKind::TokenRefreshed => {
                // Bookkeeping only: the session is still the same identity.
                self.state.publish(|s| s.authenticated = event.session.is_some());
            }
        }
    }

    /// A sign-in observed after mount. Only the first observation for a
    /// subject runs resolution and navigation; repeats (token refreshes,
    /// duplicate deliveries) update session validity and nothing else.
    async fn handle_established(&self, session: Session) {
        self.state.publish(|s| s.authenticated = true);

        if !self.initialized.load(Ordering::SeqCst) {
            // The initial reconciliation owns this sign-in.
            return;
        }
        let adopted = self.state.snapshot().user.is_some();
        if adopted {
            return;
        }
        if self.resolving.load(Ordering::SeqCst) {
            // A resolution is already in flight; its outcome will cover
            // this event.
            return;
        }

        info!(subject = %session.subject_id, "sign-in observed, resolving profile");
        self.state.publish(|s| s.phase = AuthPhase::Checking);
        let user = self.resolve_profile(&session).await;
        self.state.publish(|s| {
            if let Some(user) = user {
                s.user = Some(user);
            }
            s.authenticated = true;
            s.phase = AuthPhase::Ready;
        });
        self.navigate_signed_in(&session.subject_id);
    }

    /// Sign-out: clear the profile and return to the public entry point,
    /// regardless of prior state.
    fn handle_ended(&self) {
        info!("session ended, signing out");
        self.state.publish(|s| {
            s.user = None;
            s.authenticated = false;
            s.phase = AuthPhase::Ready;
        });
        *self.navigated_for.lock() = None;
        self.router.navigate(routes::PUBLIC_ENTRY, true);
    }

    /// Navigate to the protected landing view after a sign-in, but only from
    /// the public entry point and at most once per subject.
    fn navigate_signed_in(&self, subject: &str) {
        let mut navigated = self.navigated_for.lock();
        if navigated.as_deref() == Some(subject) {
            return;
        }
        if self.router.current_path() == routes::PUBLIC_ENTRY {
            self.router.navigate(routes::PROTECTED_LANDING, true);
            *navigated = Some(subject.to_string());
        }
    }

    /// Proactive refresh; on failure fall back to a plain session query to
    /// resynchronize `authenticated`.
    async fn keep_alive_tick(&self) {
        match self.gateway.refresh_session().await {
            Ok(session) => {
                debug!(subject = %session.subject_id, "session refreshed");
                self.adopt_latest_profile(&session).await;
            }
            Err(err) => {
                warn!(error = %err, "session refresh failed, re-checking auth state");
                self.check_auth().await;
            }
        }
    }

    /// Re-query the gateway and resynchronize the `authenticated` flag.
    /// Exposed so readers can trigger a resync; they never write state
    /// themselves.
    pub async fn check_auth(&self) {
        match self.gateway.current_session().await {
            Ok(Some(session)) => {
                self.state.publish(|s| s.authenticated = true);
                self.adopt_latest_profile(&session).await;
            }
            Ok(None) => {
                self.state.publish(|s| {
                    s.authenticated = false;
                    s.user = None;
                });
            }
            Err(err) => {
                warn!(error = %err, "auth re-check failed");
                self.state.publish(|s| {
                    s.authenticated = false;
                    s.user = None;
                });
            }
        }
    }

    /// Cheap profile re-read for an already-provisioned user. Never creates
    /// records and never provisions.
    pub async fn refresh_user(&self) {
        match self.gateway.current_session().await {
            Ok(Some(session)) => self.adopt_latest_profile(&session).await,
            Ok(None) => {}
            Err(err) => warn!(error = %err, "profile refresh skipped, session query failed"),
        }
    }

    async fn adopt_latest_profile(&self, session: &Session) {
        match self.registry.get_by_id(&session.subject_id).await {
            Ok(user) => {
                self.state.publish(|s| {
                    s.user = Some(user);
                    s.authenticated = true;
                });
            }
            Err(RegistryError::NotFound(subject)) => {
                debug!(%subject, "no profile to re-adopt yet");
            }
            Err(err) => warn!(error = %err, "profile re-read failed"),
        }
    }

    /// Read-or-create with bounded retries. Returns the adopted record, or
    /// `None` once the attempts are exhausted; exhaustion degrades the
    /// experience but never blocks the tab from reaching `Ready`.
    async fn resolve_profile(&self, session: &Session) -> Option<UserRecord> {
        if self.resolving.swap(true, Ordering::SeqCst) {
            debug!("profile resolution already in flight, coalescing");
            return None;
        }
        let outcome = self.resolve_profile_inner(session).await;
        self.resolving.store(false, Ordering::SeqCst);
        outcome
    }

    async fn resolve_profile_inner(&self, session: &Session) -> Option<UserRecord> {
        let policy = self.config.retry.clone();
        let mut attempt = 1u32;
        loop {
            match self.registry.get_by_id(&session.subject_id).await {
                Ok(user) => {
                    debug!(subject = %session.subject_id, "profile adopted");
                    return Some(user);
                }
                Err(RegistryError::NotFound(_)) => {
                    match self.registry.create(&session.subject_id, &session.email).await {
                        Ok(user) => {
                            info!(subject = %session.subject_id, "first sign-in, user record created");
                            if let Err(err) =
                                self.provisioner.provision_defaults(&session.subject_id).await
                            {
                                // The account exists; a missing starter set
                                // must not keep the user out.
                                warn!(error = %err, "starter workspace provisioning failed");
                            }
                            return Some(user);
                        }
                        Err(RegistryError::Conflict(_)) => {
                            // A concurrent creator won the insert: adopt
                            // their record instead of erroring.
                            debug!(subject = %session.subject_id, "record created concurrently, re-reading");
                            match self.registry.get_by_id(&session.subject_id).await {
                                Ok(user) => return Some(user),
                                Err(err) => {
                                    warn!(attempt, error = %err, "re-read after create race failed");
                                }
                            }
                        }
                        Err(err) => {
                            warn!(attempt, error = %err, "user record create failed");
                        }
                    }
                }
                Err(err) => {
                    warn!(attempt, error = %err, "profile lookup failed");
                }
            }

            if attempt >= policy.max_attempts {
                warn!(
                    subject = %session.subject_id,
                    attempts = attempt,
                    "giving up on profile resolution"
                );
                return None;
            }
            self.sleeper.sleep(policy.delay_for_attempt(attempt)).await;
            attempt += 1;
        }
    }
}
