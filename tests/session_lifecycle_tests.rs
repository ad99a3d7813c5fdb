//! End-to-end lifecycle walks over the public API: cold start, sign-in,
//! keep-alive and sign-out, with the view gate consulted at each stage.

use std::sync::Arc;

use anyhow::Result;

use atelier_session::config::SessionConfig;
use atelier_session::identity::{
    IdentityGateway, MemoryGateway, MemoryProvisioner, MemoryRegistry, UserRecord,
    DEFAULT_WORKSPACES,
};
use atelier_session::lifecycle::SessionController;
use atelier_session::view::{routes, GateDecision, RecordingRouter, ViewGate};

struct World {
    gateway: Arc<MemoryGateway>,
    registry: Arc<MemoryRegistry>,
    provisioner: Arc<MemoryProvisioner>,
    router: Arc<RecordingRouter>,
    controller: Arc<SessionController>,
    gate: ViewGate,
}

fn world(gateway: MemoryGateway) -> World {
    let gateway = Arc::new(gateway);
    let registry = Arc::new(MemoryRegistry::new());
    let provisioner = Arc::new(MemoryProvisioner::new());
    let router = Arc::new(RecordingRouter::new());
    let controller = SessionController::new(
        gateway.clone(),
        registry.clone(),
        provisioner.clone(),
        router.clone(),
        SessionConfig::default(),
    );
    let gate = ViewGate::new(controller.subscribe());
    World { gateway, registry, provisioner, router, controller, gate }
}

#[tokio::test(start_paused = true)]
async fn first_visit_walkthrough() -> Result<()> {
    let w = world(MemoryGateway::new());

    // Nothing has run yet: everything renders a loading affordance.
    assert_eq!(w.gate.decide(routes::PROTECTED_LANDING), GateDecision::Loading);
    assert_eq!(w.gate.decide(routes::PUBLIC_ENTRY), GateDecision::Loading);

    w.controller.start();
    let mut state = w.controller.subscribe();
    state.wait_for(|s| s.is_ready()).await?;

    // Settled signed out: protected views bounce, the landing page shows.
    assert_eq!(
        w.gate.decide(routes::PROTECTED_LANDING),
        GateDecision::Redirect { to: routes::PUBLIC_ENTRY, replace: true }
    );
    assert_eq!(w.gate.decide(routes::PUBLIC_ENTRY), GateDecision::Allow);

    // The magic link lands.
    let session = w.gateway.establish("new@example.com");
    state.wait_for(|s| s.user.is_some()).await?;

    let snapshot = w.controller.state();
    assert!(snapshot.authenticated);
    assert_eq!(snapshot.user.as_ref().map(|u| u.email.as_str()), Some("new@example.com"));
    assert_eq!(
        w.provisioner.workspaces_for(&session.subject_id).len(),
        DEFAULT_WORKSPACES.len()
    );
    assert_eq!(
        w.router.navigations(),
        vec![(routes::PROTECTED_LANDING.to_string(), true)]
    );
    assert_eq!(w.gate.decide(routes::PROTECTED_LANDING), GateDecision::Allow);
    assert_eq!(
        w.gate.decide(routes::PUBLIC_ENTRY),
        GateDecision::Redirect { to: routes::PROTECTED_LANDING, replace: true }
    );

    // Sign out from anywhere returns to the landing page.
    w.gateway.end_session();
    state.wait_for(|s| !s.authenticated).await?;
    assert!(w.controller.state().user.is_none());
    assert_eq!(
        w.router.navigations().last(),
        Some(&(routes::PUBLIC_ENTRY.to_string(), true))
    );
    assert_eq!(
        w.gate.decide(routes::PROTECTED_LANDING),
        GateDecision::Redirect { to: routes::PUBLIC_ENTRY, replace: true }
    );

    w.controller.shutdown();
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn returning_user_warm_start() -> Result<()> {
    let gateway = MemoryGateway::with_session("dev@example.com");
    let session = gateway.current_session().await.unwrap().unwrap();
    let w = world(gateway);
    w.registry.seed(&UserRecord {
        id: session.subject_id.clone(),
        email: session.email.clone(),
        display_name: Some("Dev".into()),
        created_at: chrono::Utc::now(),
    });

    w.controller.start();
    let mut state = w.controller.subscribe();
    state.wait_for(|s| s.is_ready()).await?;

    let snapshot = w.controller.state();
    assert!(snapshot.authenticated);
    assert_eq!(snapshot.user.as_ref().and_then(|u| u.display_name.as_deref()), Some("Dev"));
    // Warm starts never create or provision anything.
    assert_eq!(w.registry.create_count(), 0);
    assert_eq!(w.provisioner.call_count(), 0);
    // And never navigate by themselves; the gate handles placement.
    assert!(w.router.navigations().is_empty());
    assert_eq!(w.gate.decide(routes::PROTECTED_LANDING), GateDecision::Allow);

    w.controller.shutdown();
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn shared_view_stays_reachable_signed_out() -> Result<()> {
    let w = world(MemoryGateway::new());
    w.controller.start();
    let mut state = w.controller.subscribe();
    state.wait_for(|s| s.is_ready()).await?;

    assert_eq!(w.gate.decide("/s/abcdef"), GateDecision::Allow);
    assert_eq!(w.gate.decide("/projects/xyz/shared"), GateDecision::Allow);

    w.controller.shutdown();
    Ok(())
}
