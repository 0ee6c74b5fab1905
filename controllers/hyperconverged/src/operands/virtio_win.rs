//! virtio-win driver image.
//!
//! A ConfigMap publishes the image reference; every authenticated user may
//! read it through a dedicated Role and RoleBinding.

use super::rbac::{authenticated_role_binding, named_reader_role};
use super::{aux_operand, hc_namespace, Operand};
use crate::config::OperatorConfig;
use crate::error::ControllerError;
use crate::labels::{managed_labels, AppComponent};
use cluster_store::ObjectStore;
use hco_crds::HyperConverged;
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::api::rbac::v1::{Role, RoleBinding};
use kube::api::ObjectMeta;
use kube::ResourceExt;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const VIRTIO_WIN_NAME: &str = "virtio-win";
pub const VIRTIO_WIN_IMAGE_KEY: &str = "virtio-win-image";

pub fn new_virtio_win_config_map(hc: &HyperConverged, cfg: &OperatorConfig) -> Result<ConfigMap, ControllerError> {
    let image = cfg
        .virtiowin_image
        .as_deref()
        .ok_or_else(|| ControllerError::Build("kv-virtiowin-image-name was not specified".to_string()))?;

    Ok(ConfigMap {
        metadata: ObjectMeta {
            name: Some(VIRTIO_WIN_NAME.to_string()),
            namespace: Some(hc_namespace(hc, cfg).to_string()),
            labels: Some(managed_labels(&hc.name_any(), &cfg.operator_version, AppComponent::Deployment)),
            ..Default::default()
        },
        data: Some(BTreeMap::from([(VIRTIO_WIN_IMAGE_KEY.to_string(), image.to_string())])),
        ..Default::default()
    })
}

pub fn new_virtio_win_reader_role(hc: &HyperConverged, cfg: &OperatorConfig) -> Role {
    named_reader_role(
        VIRTIO_WIN_NAME,
        hc_namespace(hc, cfg),
        managed_labels(&hc.name_any(), &cfg.operator_version, AppComponent::Deployment),
        "configmaps",
        &[VIRTIO_WIN_NAME],
    )
}

pub fn new_virtio_win_reader_role_binding(hc: &HyperConverged, cfg: &OperatorConfig) -> RoleBinding {
    authenticated_role_binding(
        VIRTIO_WIN_NAME,
        hc_namespace(hc, cfg),
        managed_labels(&hc.name_any(), &cfg.operator_version, AppComponent::Storage),
    )
}

/// The ConfigMap, Role and RoleBinding operands.
pub fn operands(store: &Arc<dyn ObjectStore>, cfg: &Arc<OperatorConfig>) -> Vec<Box<dyn Operand>> {
    let cm_cfg = Arc::clone(cfg);
    let role_cfg = Arc::clone(cfg);
    let binding_cfg = Arc::clone(cfg);
    vec![
        aux_operand(store, false, move |hc| new_virtio_win_config_map(hc, &cm_cfg)),
        aux_operand(store, true, move |hc| Ok(new_virtio_win_reader_role(hc, &role_cfg))),
        aux_operand(store, true, move |hc| Ok(new_virtio_win_reader_role_binding(hc, &binding_cfg))),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hc() -> HyperConverged {
        let mut hc = HyperConverged::new("kubevirt-hyperconverged", Default::default());
        hc.metadata.namespace = Some("kubevirt-hyperconverged".to_string());
        hc
    }

    #[test]
    fn test_config_map() {
        let mut cfg = OperatorConfig::for_namespace("kubevirt-hyperconverged", "1.2.3");
        assert_eq!(
            new_virtio_win_config_map(&hc(), &cfg).unwrap_err().to_string(),
            "kv-virtiowin-image-name was not specified"
        );

        cfg.virtiowin_image = Some("quay.io/kubevirt/virtio-container-disk:v1".to_string());
        let cm = new_virtio_win_config_map(&hc(), &cfg).unwrap();
        assert_eq!(cm.name_any(), "virtio-win");
        assert_eq!(cm.namespace().as_deref(), Some("kubevirt-hyperconverged"));
        assert_eq!(
            cm.data.unwrap()[VIRTIO_WIN_IMAGE_KEY],
            "quay.io/kubevirt/virtio-container-disk:v1"
        );
    }

    #[test]
    fn test_reader_rbac() {
        let cfg = OperatorConfig::for_namespace("kubevirt-hyperconverged", "1.2.3");
        let role = new_virtio_win_reader_role(&hc(), &cfg);
        let rule = &role.rules.unwrap()[0];
        assert_eq!(rule.resource_names.as_deref(), Some(&["virtio-win".to_string()][..]));
        assert_eq!(rule.verbs, vec!["get"]);

        let binding = new_virtio_win_reader_role_binding(&hc(), &cfg);
        assert_eq!(binding.role_ref.kind, "Role");
        assert_eq!(binding.labels()["app.kubernetes.io/component"], "storage");
    }
}
