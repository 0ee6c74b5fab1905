//! Main controller implementation.
//!
//! Wires the object store, the operand pipeline and the reconciler together
//! and runs the HyperConverged watcher until it stops or the process is
//! interrupted.

use crate::assets;
use crate::config::OperatorConfig;
use crate::error::ControllerError;
use crate::events::{EventPublisher, KubeEventPublisher};
use crate::operand_handler::OperandHandler;
use crate::reconciler::Reconciler;
use crate::watcher::Watcher;
use cluster_store::{KubeObjectStore, ObjectStore};
use kube::Client;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// The running operator.
pub struct Controller {
    hc_watcher: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Builds the pipeline and starts the watcher.
    pub async fn new(cfg: OperatorConfig) -> Result<Self, ControllerError> {
        info!("Initializing HyperConverged controller");

        let client = Client::try_default().await?;
        let cfg = Arc::new(cfg);
        let store: Arc<dyn ObjectStore> = Arc::new(KubeObjectStore::new(client.clone()));
        let events: Arc<dyn EventPublisher> =
            Arc::new(KubeEventPublisher::new(client.clone(), OperatorConfig::OPERATOR_NAME));

        let common = assets::load_data_import_cron_templates(&cfg.assets.data_import_cron_templates)?;
        info!(templates = common.len(), "Loaded the common golden image templates");

        let handler = OperandHandler::with_default_operands(Arc::clone(&store), Arc::clone(&cfg), events, Arc::new(common))?;
        let reconciler = Arc::new(Reconciler::new(store, Arc::clone(&cfg), handler));
        let watcher = Arc::new(Watcher::new(reconciler, client, cfg.namespace.clone()));

        let hc_watcher = {
            let watcher = Arc::clone(&watcher);
            tokio::spawn(async move { watcher.watch_hyperconverged().await })
        };

        Ok(Self { hc_watcher })
    }

    /// Runs until the watcher stops or SIGINT arrives.
    pub async fn run(self) -> Result<(), ControllerError> {
        info!("HyperConverged controller running");
        let mut hc_watcher = self.hc_watcher;

        tokio::select! {
            result = &mut hc_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("HyperConverged watcher panicked: {e}")))?
                    .map_err(|e| ControllerError::Watch(format!("HyperConverged watcher error: {e}")))?;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received interrupt, shutting down");
                hc_watcher.abort();
            }
        }

        Ok(())
    }
}
