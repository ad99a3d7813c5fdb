use tokio::sync::watch;

use crate::lifecycle::AuthState;

use super::router::routes;

/// What the hosting application should do with a requested path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// The session check has not settled; render a neutral loading
    /// affordance and perform no redirects.
    Loading,
    Allow,
    Redirect { to: &'static str, replace: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    PublicEntry,
    /// Shared-view pages reachable without an account.
    PublicShared,
    Protected,
    Unknown,
}

pub fn classify(path: &str) -> RouteClass {
    if path == routes::PUBLIC_ENTRY {
        return RouteClass::PublicEntry;
    }
    if path.starts_with("/s/") || path.ends_with("/shared") {
        return RouteClass::PublicShared;
    }
    if path == routes::PROTECTED_LANDING
        || path.starts_with(&format!("{}/", routes::PROTECTED_LANDING))
    {
        return RouteClass::Protected;
    }
    RouteClass::Unknown
}

/// Gates views behind [`AuthState`]. This is the only place auth-based
/// redirects are decided; competing writers would loop.
pub struct ViewGate {
    state: watch::Receiver<AuthState>,
}

impl ViewGate {
    pub fn new(state: watch::Receiver<AuthState>) -> Self {
        Self { state }
    }

    pub fn decide(&self, path: &str) -> GateDecision {
        let state = self.state.borrow().clone();
        if !state.is_ready() {
            return GateDecision::Loading;
        }
        match classify(path) {
            RouteClass::Protected if !state.authenticated => GateDecision::Redirect {
                to: routes::PUBLIC_ENTRY,
                replace: true,
            },
            RouteClass::PublicEntry if state.authenticated => GateDecision::Redirect {
                to: routes::PROTECTED_LANDING,
                replace: true,
            },
            RouteClass::Unknown => GateDecision::Redirect {
                to: routes::PUBLIC_ENTRY,
                replace: true,
            },
            _ => GateDecision::Allow,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{AuthPhase, AuthStateCell};

    fn gate_with(phase: AuthPhase, authenticated: bool) -> ViewGate {
        let cell = AuthStateCell::new();
        let rx = cell.subscribe();
        cell.publish(|s| {
            s.phase = phase;
            s.authenticated = authenticated;
        });
        ViewGate::new(rx)
    }

    #[test]
    fn classifies_known_paths() {
        assert_eq!(classify("/"), RouteClass::PublicEntry);
        assert_eq!(classify("/projects"), RouteClass::Protected);
        assert_eq!(classify("/projects/abc123"), RouteClass::Protected);
        assert_eq!(classify("/projects/abc123/shared"), RouteClass::PublicShared);
        assert_eq!(classify("/s/tok"), RouteClass::PublicShared);
        assert_eq!(classify("/pricing"), RouteClass::Unknown);
    }

    #[test]
    fn loading_while_not_ready() {
        let gate = gate_with(AuthPhase::Checking, true);
        assert_eq!(gate.decide("/projects"), GateDecision::Loading);
        assert_eq!(gate.decide("/"), GateDecision::Loading);
    }

    #[test]
    fn signed_out_is_kept_off_protected_views() {
        let gate = gate_with(AuthPhase::Ready, false);
        assert_eq!(
            gate.decide("/projects"),
            GateDecision::Redirect { to: "/", replace: true }
        );
        assert_eq!(gate.decide("/"), GateDecision::Allow);
        assert_eq!(gate.decide("/s/tok"), GateDecision::Allow);
    }

    #[test]
    fn signed_in_skips_the_landing_page() {
        let gate = gate_with(AuthPhase::Ready, true);
        assert_eq!(
            gate.decide("/"),
            GateDecision::Redirect { to: "/projects", replace: true }
        );
        assert_eq!(gate.decide("/projects"), GateDecision::Allow);
        assert_eq!(gate.decide("/projects/abc123"), GateDecision::Allow);
    }

    #[test]
    fn unknown_paths_fall_back_to_the_entry_point() {
        let gate = gate_with(AuthPhase::Ready, true);
        assert_eq!(
            gate.decide("/nope"),
            GateDecision::Redirect { to: "/", replace: true }
        );
    }
}
