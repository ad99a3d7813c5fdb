use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use atelier_session::config::SessionConfig;
use atelier_session::identity::{MemoryGateway, MemoryProvisioner, MemoryRegistry};
use atelier_session::lifecycle::SessionController;
use atelier_session::view::{RecordingRouter, ViewGate};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    fmt().with_env_filter(filter).init();

    // Startup banner at info level so something always prints at default verbosity
    let config = SessionConfig::from_env();
    info!(
        target: "atelier",
        "session core demo starting: keep_alive_secs={}, ready_timeout_ms={}, retry_attempts={}",
        config.keep_alive_secs, config.ready_timeout_ms, config.retry.max_attempts
    );

    let gateway = Arc::new(MemoryGateway::new());
    let registry = Arc::new(MemoryRegistry::new());
    let provisioner = Arc::new(MemoryProvisioner::new());
    let router = Arc::new(RecordingRouter::new());

    let controller = SessionController::new(
        gateway.clone(),
        registry.clone(),
        provisioner.clone(),
        router.clone(),
        config,
    );
    let mut state = controller.subscribe();
    let gate = ViewGate::new(controller.subscribe());

    controller.start();
    state.wait_for(|s| s.is_ready()).await?;
    info!("cold start settled signed out: {:?}", controller.state());
    info!("gate for /projects: {:?}", gate.decide("/projects"));

    let session = gateway.establish("demo@atelier.dev");
    info!(subject = %session.subject_id, "magic link landed");
    state.wait_for(|s| s.user.is_some()).await?;
    info!(
        "signed in as {:?}, starter workspaces: {:?}",
        controller.state().user.map(|u| u.email),
        provisioner
            .workspaces_for(&session.subject_id)
            .iter()
            .map(|w| w.name.clone())
            .collect::<Vec<_>>()
    );
    info!("gate for / now: {:?}", gate.decide("/"));

    gateway.end_session();
    state.wait_for(|s| !s.authenticated).await?;
    info!("signed out, router history: {:?}", router.navigations());

    controller.shutdown();
    Ok(())
}
