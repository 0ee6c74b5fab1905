//! Kubernetes resource watchers.
//!
//! The HyperConverged resource is the only primary. The component custom
//! resources are secondary watches: a change on any of them is mapped back
//! to the HyperConverged resource named in their `app` label, so drift is
//! undone without waiting for the periodic resync.

use crate::error::ControllerError;
use crate::labels::APP_LABEL;
use crate::reconciler::Reconciler;
use futures::StreamExt;
use hco_crds::{HyperConverged, KubeVirt, MigController, NetworkAddonsConfig, CDI, SSP};
use kube::{Api, Client, Resource, ResourceExt};
use kube_runtime::reflector::ObjectRef;
use kube_runtime::{
    controller::{Action, Config as ControllerConfig},
    watcher, Controller,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Maps a downstream object to the HyperConverged resource that produced it.
fn owner_of<K: Resource>(namespace: String) -> impl Fn(K) -> Option<ObjectRef<HyperConverged>> + Send + Sync + Clone {
    move |obj: K| {
        obj.labels()
            .get(APP_LABEL)
            .map(|name| ObjectRef::new(name).within(&namespace))
    }
}

fn key_of(hc: &HyperConverged) -> String {
    format!("{}/{}", hc.namespace().unwrap_or_default(), hc.name_any())
}

/// Watches the HyperConverged resource and its component custom resources.
pub struct Watcher {
    reconciler: Arc<Reconciler>,
    client: Client,
    namespace: String,
}

impl Watcher {
    pub fn new(reconciler: Arc<Reconciler>, client: Client, namespace: String) -> Self {
        Self {
            reconciler,
            client,
            namespace,
        }
    }

    /// Runs until the watch stream ends.
    pub async fn watch_hyperconverged(&self) -> Result<(), ControllerError> {
        info!(namespace = %self.namespace, "Starting HyperConverged watcher");
        let client = self.client.clone();
        let ns = self.namespace.as_str();
        let wc = watcher::Config::default;

        let error_policy = |hc: Arc<HyperConverged>, error: &ControllerError, ctx: Arc<Reconciler>| {
            let key = key_of(&hc);
            let delay = ctx.backoff().on_failure(&key);
            error!(key = %key, error = %error, retry_in = ?delay, "Reconciliation failed");
            Action::requeue(delay)
        };

        let reconcile = |hc: Arc<HyperConverged>, ctx: Arc<Reconciler>| async move {
            let key = key_of(&hc);
            debug!(key = %key, "Reconciling HyperConverged");
            let action = ctx.reconcile(&hc).await?;
            ctx.backoff().on_success(&key);
            Ok::<_, ControllerError>(action)
        };

        // one resource per cluster; debounce batches the bursts of status updates
        let controller_config = ControllerConfig::default()
            .debounce(Duration::from_secs(1))
            .concurrency(1);

        Controller::new(Api::<HyperConverged>::namespaced(client.clone(), ns), wc())
            .with_config(controller_config)
            .watches(Api::<KubeVirt>::namespaced(client.clone(), ns), wc(), owner_of(ns.to_string()))
            .watches(Api::<SSP>::namespaced(client.clone(), ns), wc(), owner_of(ns.to_string()))
            .watches(Api::<CDI>::all(client.clone()), wc(), owner_of(ns.to_string()))
            .watches(Api::<NetworkAddonsConfig>::all(client.clone()), wc(), owner_of(ns.to_string()))
            .watches(Api::<MigController>::all(client), wc(), owner_of(ns.to_string()))
            .run(reconcile, error_policy, Arc::clone(&self.reconciler))
            .for_each(|res| async move {
                match res {
                    Ok((obj, _)) => debug!(name = %obj.name, "Reconciled"),
                    Err(e) => error!(error = %e, "HyperConverged controller error"),
                }
            })
            .await;

        Ok(())
    }
}
