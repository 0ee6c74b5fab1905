//! KubeVirt CR (kubevirt.io/v1)
//!
//! Only the fields the operator renders are modelled; the CRD itself is owned
//! by the virtualization operator.

use crate::common::NodePlacement;
use crate::conditions::Condition;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[kube(
    group = "kubevirt.io",
    version = "v1",
    kind = "KubeVirt",
    namespaced,
    status = "KubeVirtStatus",
    schema = "disabled",
    derive = "PartialEq",
    derive = "Default"
)]
#[serde(rename_all = "camelCase")]
pub struct KubeVirtSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uninstall_strategy: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infra: Option<ComponentConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workloads: Option<ComponentConfig>,

    #[serde(default)]
    pub configuration: KubeVirtConfiguration,

    #[serde(default)]
    pub certificate_rotate_strategy: KubeVirtCertificateRotateStrategy,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_component: Option<String>,
}

/// Placement plus replica override for KubeVirt control-plane pods.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_placement: Option<NodePlacement>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KubeVirtConfiguration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub developer_configuration: Option<DeveloperConfiguration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<NetworkConfiguration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migrations: Option<MigrationConfiguration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smbios: Option<SmbiosConfiguration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture_configuration: Option<ArchConfiguration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_configuration: Option<KubeVirtTlsConfiguration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_configuration: Option<ReloadableComponentConfiguration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_configuration: Option<ReloadableComponentConfiguration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller_configuration: Option<ReloadableComponentConfiguration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handler_configuration: Option<ReloadableComponentConfiguration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eviction_strategy: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selinux_launcher_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_runtime_class: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeveloperConfiguration {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub feature_gates: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_emulation: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_verbosity: Option<KubeVirtLogVerbosity>,

    #[serde(rename = "cpuAllocationRatio", default, skip_serializing_if = "Option::is_none")]
    pub cpu_allocation_ratio: Option<i32>,
}

/// Per-binary log verbosity of the virtualization stack.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct KubeVirtLogVerbosity {
    #[serde(rename = "virtAPI", default, skip_serializing_if = "Option::is_none")]
    pub virt_api: Option<u32>,

    #[serde(rename = "virtController", default, skip_serializing_if = "Option::is_none")]
    pub virt_controller: Option<u32>,

    #[serde(rename = "virtHandler", default, skip_serializing_if = "Option::is_none")]
    pub virt_handler: Option<u32>,

    #[serde(rename = "virtLauncher", default, skip_serializing_if = "Option::is_none")]
    pub virt_launcher: Option<u32>,

    #[serde(rename = "virtOperator", default, skip_serializing_if = "Option::is_none")]
    pub virt_operator: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfiguration {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub network_interface: String,
}

/// Live migration settings shared by the HyperConverged spec and KubeVirt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LiveMigrationConfigurations {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel_migrations_per_cluster: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel_outbound_migrations_per_node: Option<u32>,

    /// Quantity string, e.g. `64Mi`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bandwidth_per_migration: Option<String>,

    #[serde(rename = "completionTimeoutPerGiB", default, skip_serializing_if = "Option::is_none")]
    pub completion_timeout_per_gib: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_timeout: Option<i64>,

    /// Dedicated migration network
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_auto_converge: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_post_copy: Option<bool>,
}

/// KubeVirt's migration block has the same shape.
pub type MigrationConfiguration = LiveMigrationConfigurations;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmbiosConfiguration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchConfiguration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amd64: Option<ArchSpecificConfiguration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arm64: Option<ArchSpecificConfiguration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s390x: Option<ArchSpecificConfiguration>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchSpecificConfiguration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_type: Option<String>,

    #[serde(rename = "ovmfPath", default, skip_serializing_if = "Option::is_none")]
    pub ovmf_path: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub emulated_machines: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KubeVirtTlsConfiguration {
    #[serde(rename = "minTLSVersion", default, skip_serializing_if = "String::is_empty")]
    pub min_tls_version: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ciphers: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReloadableComponentConfiguration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rest_client: Option<RestClientConfiguration>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestClientConfiguration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limiter: Option<RateLimiter>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimiter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_bucket_rate_limiter: Option<TokenBucketRateLimiter>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenBucketRateLimiter {
    pub qps: f32,
    pub burst: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KubeVirtCertificateRotateStrategy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_signed: Option<KubeVirtSelfSignConfiguration>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KubeVirtSelfSignConfiguration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca: Option<crate::common::CertRotateConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<crate::common::CertRotateConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KubeVirtStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_kube_virt_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
}
