use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::identity::UserRecord;

/// Coarse lifecycle stage of the session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthPhase {
    /// Synchronous default at tab start; left immediately.
    Uninitialized,
    /// A reconciliation or profile resolution is in flight. At most one
    /// instance at a time.
    Checking,
    /// Terminal until a sign-out/sign-in cycle.
    Ready,
}

/// The core's exported truth. A session can exist before the profile
/// lookup completes, so `authenticated` is independent of `user`;
/// `authenticated` with no user after `Ready` means profile resolution
/// exhausted its retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthState {
    pub phase: AuthPhase,
    pub user: Option<UserRecord>,
    pub authenticated: bool,
}

impl Default for AuthState {
    fn default() -> Self {
        Self {
            phase: AuthPhase::Uninitialized,
            user: None,
            authenticated: false,
        }
    }
}

impl AuthState {
    pub fn is_ready(&self) -> bool {
        self.phase == AuthPhase::Ready
    }
}

/// Single-writer state cell. The controller holds the sender; every other
/// component observes through [`AuthStateCell::subscribe`] and never
/// mutates. Unmounting drops late writes after teardown.
pub struct AuthStateCell {
    tx: watch::Sender<AuthState>,
    mounted: AtomicBool,
}

impl AuthStateCell {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(AuthState::default());
        Self {
            tx,
            mounted: AtomicBool::new(true),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> AuthState {
        self.tx.borrow().clone()
    }

    /// Apply a mutation and notify watchers. Returns false (and leaves the
    /// state untouched) once the cell is unmounted.
    pub(crate) fn publish<F: FnOnce(&mut AuthState)>(&self, mutate: F) -> bool {
        if !self.mounted.load(Ordering::Acquire) {
            return false;
        }
        self.tx.send_modify(mutate);
        true
    }

    pub(crate) fn unmount(&self) {
        self.mounted.store(false, Ordering::Release);
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::Acquire)
    }
}

impl Default for AuthStateCell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_uninitialized_and_signed_out() {
        let cell = AuthStateCell::new();
        let state = cell.snapshot();
        assert_eq!(state.phase, AuthPhase::Uninitialized);
        assert!(state.user.is_none());
        assert!(!state.authenticated);
    }

    #[test]
    fn publish_notifies_watchers() {
        let cell = AuthStateCell::new();
        let rx = cell.subscribe();
        assert!(cell.publish(|s| s.phase = AuthPhase::Checking));
        assert_eq!(rx.borrow().phase, AuthPhase::Checking);
    }

    #[test]
    fn unmounted_cell_drops_writes() {
        let cell = AuthStateCell::new();
        cell.unmount();
        assert!(!cell.publish(|s| s.authenticated = true));
        assert!(!cell.snapshot().authenticated);
    }
}
