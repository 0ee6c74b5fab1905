//! NetworkAddonsConfig CR (networkaddonsoperator.network.kubevirt.io/v1, cluster scoped)

use crate::common::{NodePlacement, TlsSecurityProfile};
use crate::conditions::Condition;
use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// The network-addons operator only honours a config with this name.
pub const NETWORK_ADDONS_CONFIG_NAME: &str = "cluster";

#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[kube(
    group = "networkaddonsoperator.network.kubevirt.io",
    version = "v1",
    kind = "NetworkAddonsConfig",
    status = "NetworkAddonsConfigStatus",
    schema = "disabled",
    derive = "PartialEq",
    derive = "Default"
)]
#[serde(rename_all = "camelCase")]
pub struct NetworkAddonsConfigSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multus: Option<Multus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linux_bridge: Option<LinuxBridge>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kube_mac_pool: Option<KubeMacPool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ovs: Option<Ovs>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubevirt_ipam_controller: Option<KubevirtIpamController>,

    #[serde(rename = "kubeSecondaryDNS", default, skip_serializing_if = "Option::is_none")]
    pub kube_secondary_dns: Option<KubeSecondaryDns>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placement_configuration: Option<PlacementConfiguration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_sign_configuration: Option<SelfSignConfiguration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_security_profile: Option<TlsSecurityProfile>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Multus {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinuxBridge {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KubeMacPool {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ovs {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KubevirtIpamController {
    #[serde(rename = "defaultNetworkNADNamespace", default, skip_serializing_if = "Option::is_none")]
    pub default_network_nad_namespace: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KubeSecondaryDns {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub domain: String,

    #[serde(rename = "nameServerIP", default, skip_serializing_if = "String::is_empty")]
    pub name_server_ip: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlacementConfiguration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infra: Option<NodePlacement>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workloads: Option<NodePlacement>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelfSignConfiguration {
    pub ca_rotate_interval: String,
    pub ca_overlap_interval: String,
    pub cert_rotate_interval: String,
    pub cert_overlap_interval: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkAddonsConfigStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_version: Option<String>,
}
