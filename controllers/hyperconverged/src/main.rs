//! HyperConverged Operator
//!
//! Renders the KubeVirt component stack from a single HyperConverged
//! resource and keeps it reconciled:
//! - KubeVirt, CDI, NetworkAddonsConfig, SSP and MigController
//! - the virtio-win ConfigMap and the console UI objects
//! - dashboards, quick starts and golden-image ImageStreams from manifests

use hco_operator::config::OperatorConfig;
use hco_operator::controller::Controller;
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

    info!("Starting HyperConverged Operator");

    let cfg = OperatorConfig::from_env()?;
    info!("Configuration:");
    info!("  Namespace: {}", cfg.namespace);
    info!("  Version: {}", cfg.operator_version);
    info!("  Console plugin: {}", cfg.console_plugin_enabled());
    info!("  Network policies: {}", cfg.deploy_network_policies);

    let controller = Controller::new(cfg).await?;
    controller.run().await?;

    Ok(())
}
