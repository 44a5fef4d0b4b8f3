//! furrow-agent entry point.
//!
//! Boots the background agent: loads configuration, opens the
//! persistent store, builds the routing table, precaches the app shell,
//! and runs the event loop. A bridge task plays the page side of the
//! lifecycle protocol, so a newly installed version is adopted as soon
//! as it parks (the headless equivalent of silently arming the
//! reload). Logging goes to stderr as JSON.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;
use url::Url;

use furrow_core::store::StoreDb;
use furrow_core::AppConfig;
use furrow_engine::{Gateway, GatewayConfig, HttpGateway, Router, SyncQueue};

use furrow_agent::lifecycle::{self, ControllerAction, LifecycleController, OriginUpdateCheck};
use furrow_agent::precache::PrecacheManager;
use furrow_agent::{Agent, AgentEvent, AgentNotice, Manifest, ManifestEntry};

/// The app shell this build keeps warm.
fn shell_manifest(origin: &Url, version: &str) -> Manifest {
    let asset = |path: &str| ManifestEntry {
        url: origin.join(path).map(|u| u.to_string()).unwrap_or_else(|_| path.to_string()),
        revision: None,
    };

    Manifest {
        version: version.to_string(),
        entries: vec![
            asset("/offline"),
            asset("/static/app.js"),
            asset("/static/app.css"),
            asset("/icons/icon-192.png"),
            asset("/icons/badge-72.png"),
        ],
        fallback_url: origin.join("/offline").map(|u| u.to_string()).unwrap_or_else(|_| "/offline".into()),
    }
}

/// Consume agent notices the way a hosting page would: run the
/// lifecycle state machine, adopt the waiting version, log displayed
/// notifications.
async fn run_page_bridge(
    mut controller: LifecycleController, mut notices: mpsc::Receiver<AgentNotice>, events: mpsc::Sender<AgentEvent>,
) {
    while let Some(notice) = notices.recv().await {
        match notice {
            AgentNotice::Lifecycle(event) => match controller.on_event(&event).await {
                Ok(Some(ControllerAction::ShowPrompt { version })) => {
                    tracing::info!(%version, "update available, adopting");
                    match controller.adopt().await {
                        Ok(Some(message)) => {
                            let _ = events.send(AgentEvent::Page(message)).await;
                        }
                        Ok(None) => {}
                        Err(err) => tracing::warn!(%err, "adoption failed"),
                    }
                }
                Ok(Some(ControllerAction::ShowBadge { version })) => {
                    tracing::info!(%version, "update available, prompt suppressed");
                }
                Ok(Some(ControllerAction::Reload)) => {
                    tracing::info!("pages reloading under new version");
                }
                Ok(None) => {}
                Err(err) => tracing::warn!(%err, "lifecycle event handling failed"),
            },
            AgentNotice::ShowNotification(rendered) => {
                tracing::info!(title = %rendered.title, url = %rendered.url, "notification displayed");
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    let origin = Url::parse(&config.origin)?;
    let version = env!("CARGO_PKG_VERSION");

    tracing::info!(version, origin = %origin, store = %config.store_path.display(), "starting furrow agent");

    let db = StoreDb::open(&config.store_path).await?;

    let gateway: Arc<dyn Gateway> = Arc::new(HttpGateway::new(GatewayConfig {
        user_agent: config.user_agent.clone(),
        max_bytes: config.max_bytes,
        timeout: config.fetch_timeout(),
        ..Default::default()
    })?);

    let table = furrow_agent::rules::default_rule_table(&config)?;
    let queue = SyncQueue::new(db.clone(), config.queue_retention());
    let router = Router::new(db.clone(), Arc::clone(&gateway), queue, table);

    let manifest = shell_manifest(&origin, version);
    let precache = PrecacheManager::new(db.clone(), Arc::clone(&gateway), &manifest);

    let (event_tx, event_rx) = mpsc::channel(64);
    let (notice_tx, notice_rx) = mpsc::channel(64);

    let controller = LifecycleController::new(db.clone(), config.prompt_cooldown());
    tokio::spawn(run_page_bridge(controller, notice_rx, event_tx.clone()));

    // best-effort update polling, independent of per-request traffic
    let checker = OriginUpdateCheck::new(Arc::clone(&gateway), origin.join("/agent/version")?.to_string());
    let poll_interval = Duration::from_secs(config.update_poll_secs);
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(poll_interval);
        loop {
            tick.tick().await;
            lifecycle::poll_once(&checker).await;
        }
    });

    // the platform's event sources (pages, push, connectivity) feed
    // this sender; holding it keeps the agent loop alive
    let _events = event_tx;

    let agent = Agent::new(version, origin, db, router, precache, notice_tx);
    agent.run(&manifest, event_rx).await?;

    Ok(())
}
