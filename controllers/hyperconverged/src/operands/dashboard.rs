//! Monitoring dashboards shipped as ConfigMap manifests.
//!
//! The manifests name their own namespace (usually
//! `openshift-config-managed`); labels from the manifest are kept and the
//! managed labels are layered on top.

use super::{aux_operand, hc_namespace, Operand};
use crate::assets;
use crate::config::OperatorConfig;
use crate::error::ControllerError;
use crate::labels::{managed_labels, AppComponent};
use cluster_store::ObjectStore;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::ResourceExt;
use std::sync::Arc;

/// One operand per dashboard ConfigMap manifest.
pub fn operands(
    store: &Arc<dyn ObjectStore>,
    cfg: &Arc<OperatorConfig>,
) -> Result<Vec<Box<dyn Operand>>, ControllerError> {
    let dashboards = assets::load_objects::<ConfigMap>(cfg.assets.dashboards.as_deref())?;
    Ok(dashboards
        .into_iter()
        .map(|dashboard| {
            let cfg = Arc::clone(cfg);
            aux_operand(store, false, move |hc| {
                let mut cm = dashboard.clone();
                if cm.metadata.namespace.is_none() {
                    cm.metadata.namespace = Some(hc_namespace(hc, &cfg).to_string());
                }
                cm.labels_mut().extend(managed_labels(
                    &hc.name_any(),
                    &cfg.operator_version,
                    AppComponent::Compute,
                ));
                Ok(cm)
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::HcoRequest;
    use cluster_store::{typed, MockObjectStore};
    use hco_crds::HyperConverged;

    const DASHBOARD: &str = r#"
apiVersion: v1
kind: ConfigMap
metadata:
  name: grafana-dashboard-kubevirt-top-consumers
  namespace: openshift-config-managed
  labels:
    console.openshift.io/dashboard: "true"
data:
  kubevirt-top-consumers.json: "{}"
"#;

    fn setup() -> (Arc<MockObjectStore>, Box<dyn Operand>) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("top-consumers.yaml"), DASHBOARD).unwrap();
        std::fs::write(dir.path().join("broken.yaml"), "kind: ConfigMap\nmetadata: [").unwrap();

        let mut cfg = OperatorConfig::for_namespace("kubevirt-hyperconverged", "1.2.3");
        cfg.assets.dashboards = Some(dir.path().to_path_buf());
        let mock = Arc::new(MockObjectStore::new());
        let store: Arc<dyn ObjectStore> = mock.clone();
        let mut ops = operands(&store, &Arc::new(cfg)).unwrap();
        assert_eq!(ops.len(), 1);
        (mock, ops.remove(0))
    }

    fn hc() -> HyperConverged {
        let mut hc = HyperConverged::new("kubevirt-hyperconverged", Default::default());
        hc.metadata.namespace = Some("kubevirt-hyperconverged".to_string());
        hc
    }

    #[tokio::test]
    async fn test_dashboard_created_with_merged_labels() {
        let (store, operand) = setup();
        let mut req = HcoRequest::new(hc());
        let res = operand.ensure(&mut req).await;
        assert!(res.created, "{:?}", res.err);

        let cm: ConfigMap = typed::get(
            store.as_ref(),
            Some("openshift-config-managed"),
            "grafana-dashboard-kubevirt-top-consumers",
        )
        .await
        .unwrap();
        assert_eq!(cm.labels()["console.openshift.io/dashboard"], "true");
        assert_eq!(cm.labels()["app.kubernetes.io/component"], "compute");
    }

    #[tokio::test]
    async fn test_dashboard_data_restored() {
        let (store, operand) = setup();
        let mut req = HcoRequest::new(hc());
        operand.ensure(&mut req).await;

        let mut cm: ConfigMap = typed::get(
            store.as_ref(),
            Some("openshift-config-managed"),
            "grafana-dashboard-kubevirt-top-consumers",
        )
        .await
        .unwrap();
        cm.data = None;
        typed::update(store.as_ref(), &cm, false).await.unwrap();

        operand.reset();
        let mut req = HcoRequest::new(hc()).with_hco_triggered(false);
        let res = operand.ensure(&mut req).await;
        assert!(res.updated && res.overwritten);
    }
}
