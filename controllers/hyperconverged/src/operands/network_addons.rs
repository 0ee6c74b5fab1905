//! Network addons operand.
//!
//! The network-addons operator only honours a cluster scoped config named
//! `cluster`. OVS is opt-in through the `deployOVS` annotation on the
//! HyperConverged resource; an upgrade from a release without the annotation
//! records whether OVS was deployed so the upgrade does not remove it.

use super::{check_component_version, log_drift, GenericOperand, ObjectIdentity, OperandHooks, SpecCache};
use crate::config::OperatorConfig;
use crate::error::ControllerError;
use crate::labels::{managed_labels, managed_labels_match, merge_managed_labels, AppComponent};
use crate::patch::apply_annotation_patch;
use crate::placement;
use crate::request::HcoRequest;
use crate::tls;
use async_trait::async_trait;
use cluster_store::{typed, ObjectStore};
use hco_crds::{
    Condition, HyperConverged, KubeMacPool, KubeSecondaryDns, KubevirtIpamController, LinuxBridge, Multus,
    NetworkAddonsConfig, NetworkAddonsConfigSpec, Ovs, PlacementConfiguration, SelfSignConfiguration,
    DEPLOY_OVS_ANNOTATION, JSON_PATCH_CNAO_ANNOTATION, NETWORK_ADDONS_CONFIG_NAME,
};
use kube::ResourceExt;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing::info;

/// Renders the required NetworkAddonsConfig.
pub fn new_network_addons(hc: &HyperConverged, cfg: &OperatorConfig) -> Result<NetworkAddonsConfig, ControllerError> {
    let name_server_ip = secondary_dns_name_server_ip(hc)?;
    let (ca_duration, ca_renew, server_duration, server_renew) = hc.spec.cert_config.effective();

    let infra = placement::infra(hc).cloned();
    let workloads = placement::workloads(hc).cloned();

    let spec = NetworkAddonsConfigSpec {
        multus: Some(Multus {}),
        linux_bridge: Some(LinuxBridge {}),
        kube_mac_pool: Some(KubeMacPool {}),
        ovs: (hc.annotations().get(DEPLOY_OVS_ANNOTATION).map(String::as_str) == Some("true")).then_some(Ovs {}),
        kubevirt_ipam_controller: Some(KubevirtIpamController::default()),
        kube_secondary_dns: (hc.spec.feature_gates.deploy_kube_secondary_dns == Some(true)).then(|| KubeSecondaryDns {
            domain: String::new(),
            name_server_ip,
        }),
        placement_configuration: (infra.is_some() || workloads.is_some())
            .then_some(PlacementConfiguration { infra, workloads }),
        self_sign_configuration: Some(SelfSignConfiguration {
            ca_rotate_interval: ca_duration,
            ca_overlap_interval: ca_renew,
            cert_rotate_interval: server_duration,
            cert_overlap_interval: server_renew,
        }),
        tls_security_profile: Some(tls::effective_profile(hc)),
    };

    let mut cna = NetworkAddonsConfig::new(NETWORK_ADDONS_CONFIG_NAME, spec);
    cna.metadata.labels = Some(managed_labels(&hc.name_any(), &cfg.operator_version, AppComponent::Network));

    apply_annotation_patch(cna, hc, JSON_PATCH_CNAO_ANNOTATION)
}

fn secondary_dns_name_server_ip(hc: &HyperConverged) -> Result<String, ControllerError> {
    let ip = hc.spec.kube_secondary_dns_name_server_ip.clone().unwrap_or_default();
    if !ip.is_empty() && ip.parse::<Ipv4Addr>().is_err() {
        return Err(ControllerError::Build(
            "kubeSecondaryDNSNameServerIP isn't a valid IPv4".to_string(),
        ));
    }
    Ok(ip)
}

/// Records the OVS state of an upgraded cluster on the HyperConverged resource.
fn set_deploy_ovs_annotation(req: &mut HcoRequest, found: &NetworkAddonsConfig) {
    if !req.upgrade_mode || req.instance.annotations().contains_key(DEPLOY_OVS_ANNOTATION) {
        return;
    }
    let value = if found.spec.ovs.is_some() { "true" } else { "false" };
    req.instance
        .annotations_mut()
        .insert(DEPLOY_OVS_ANNOTATION.to_string(), value.to_string());
    info!("deployOVS annotation is set to {value}.");
    req.dirty = true;
}

/// Hooks for the NetworkAddonsConfig.
pub struct NetworkAddonsHooks {
    cfg: Arc<OperatorConfig>,
    cache: SpecCache<NetworkAddonsConfig>,
}

impl NetworkAddonsHooks {
    pub fn new(cfg: Arc<OperatorConfig>) -> Self {
        Self {
            cfg,
            cache: SpecCache::new(),
        }
    }
}

#[async_trait]
impl OperandHooks for NetworkAddonsHooks {
    type Cr = NetworkAddonsConfig;

    fn full_cr(&self, hc: &HyperConverged) -> Result<Arc<NetworkAddonsConfig>, ControllerError> {
        self.cache.get_or_try_build(|| new_network_addons(hc, &self.cfg))
    }

    async fn update_cr(
        &self,
        req: &mut HcoRequest,
        store: &dyn ObjectStore,
        found: &mut NetworkAddonsConfig,
        required: &NetworkAddonsConfig,
    ) -> Result<(bool, bool), ControllerError> {
        set_deploy_ovs_annotation(req, found);

        let mut changed = false;
        // the spec is left alone until the upgrade settled the OVS question
        if found.spec != required.spec && !req.upgrade_mode {
            found.spec = required.spec.clone();
            changed = true;
        }
        if !managed_labels_match(&found.metadata, &required.metadata) {
            merge_managed_labels(&mut found.metadata, &required.metadata);
            changed = true;
        }
        if !changed {
            return Ok((false, false));
        }

        let overwritten = log_drift(req, "NetworkAddonsConfig");
        typed::update(store, found, false).await?;
        Ok((true, overwritten))
    }

    fn conditions(&self, found: &NetworkAddonsConfig) -> Option<Vec<Condition>> {
        Some(found.status.as_ref().map(|s| s.conditions.clone()).unwrap_or_default())
    }

    fn check_component_version(&self, found: &NetworkAddonsConfig) -> bool {
        let observed = found.status.as_ref().and_then(|s| s.observed_version.as_deref());
        check_component_version(&self.cfg.versions.network_addons, observed)
    }

    fn reset(&self) {
        self.cache.reset();
    }

    fn identity(&self, _hc: &HyperConverged) -> Option<ObjectIdentity> {
        Some(ObjectIdentity::named::<NetworkAddonsConfig>(None, NETWORK_ADDONS_CONFIG_NAME))
    }
}

/// The NetworkAddonsConfig operand.
pub type NetworkAddonsOperand = GenericOperand<NetworkAddonsHooks>;

pub fn new_operand(store: Arc<dyn ObjectStore>, cfg: Arc<OperatorConfig>) -> NetworkAddonsOperand {
    GenericOperand::new(store, NetworkAddonsHooks::new(cfg))
}
