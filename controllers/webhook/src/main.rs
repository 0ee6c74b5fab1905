//! HyperConverged admission webhook
//!
//! Serves the HyperConverged validating and mutating hooks and the
//! namespace-deletion guard over HTTPS.

use cluster_store::{KubeObjectStore, ObjectStore};
use hco_operator::assets::load_data_import_cron_templates;
use hco_operator::config::OperatorConfig;
use hco_webhook::{server, WebhookState};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if rustls::crypto::ring::default_provider().install_default().is_err() {
        warn!("A rustls crypto provider was already installed");
    }

    info!("Starting HyperConverged admission webhook");

    let cfg = OperatorConfig::from_env()?;
    info!("Configuration:");
    info!("  Namespace: {}", cfg.namespace);
    info!("  Port: {}", cfg.webhook_port);
    info!("  Certificates: {}", cfg.webhook_cert_dir.display());

    let common_dicts = load_data_import_cron_templates(&cfg.assets.data_import_cron_templates)?;

    let client = kube::Client::try_default().await?;
    let store: Arc<dyn ObjectStore> = Arc::new(KubeObjectStore::new(client));

    let cert_dir = cfg.webhook_cert_dir.clone();
    let port = cfg.webhook_port;
    let state = Arc::new(WebhookState::new(store, Arc::new(cfg), common_dicts));
    server::serve(state, &cert_dir, port).await?;

    Ok(())
}
