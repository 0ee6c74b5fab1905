//! HyperConverged CRD
//!
//! The single user-facing resource. Everything else the operator produces is
//! derived from its spec and annotations.

use crate::cdi::FilesystemOverhead;
use crate::common::{CertRotateConfig, NodePlacement, TlsSecurityProfile};
use crate::conditions::Condition;
use crate::kubevirt::{KubeVirtLogVerbosity, LiveMigrationConfigurations};
use k8s_openapi::api::core::v1::{ObjectReference, ResourceRequirements};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Canonical name of the HyperConverged resource.
pub const HYPERCONVERGED_NAME: &str = "kubevirt-hyperconverged";

/// JSON-Patch override for the KubeVirt spec.
pub const JSON_PATCH_KUBEVIRT_ANNOTATION: &str = "kubevirt.kubevirt.io/jsonpatch";
/// JSON-Patch override for the CDI spec.
pub const JSON_PATCH_CDI_ANNOTATION: &str = "containerizeddataimporter.kubevirt.io/jsonpatch";
/// JSON-Patch override for the NetworkAddonsConfig spec.
pub const JSON_PATCH_CNAO_ANNOTATION: &str = "networkaddonsconfigs.kubevirt.io/jsonpatch";
/// JSON-Patch override for the SSP spec.
pub const JSON_PATCH_SSP_ANNOTATION: &str = "ssp.kubevirt.io/jsonpatch";
/// Rate-limiter values consumed by the `annotation` tuning policy.
pub const TUNING_POLICY_ANNOTATION: &str = "hco.kubevirt.io/tuningPolicy";
/// OVS deployment flag for network addons.
pub const DEPLOY_OVS_ANNOTATION: &str = "deployOVS";

/// Condition types written to the HyperConverged status.
pub mod condition_types {
    /// All components are serving
    pub const AVAILABLE: &str = "Available";
    /// A component is rolling out
    pub const PROGRESSING: &str = "Progressing";
    /// A component is impaired
    pub const DEGRADED: &str = "Degraded";
    /// The stack may be upgraded
    pub const UPGRADEABLE: &str = "Upgradeable";
    /// The last reconcile finished without error
    pub const RECONCILE_COMPLETE: &str = "ReconcileComplete";
    /// A JSON-Patch override annotation is present
    pub const TAINTED_CONFIGURATION: &str = "TaintedConfiguration";
    /// The operator version is being rolled out
    pub const UPGRADE_HAPPENING: &str = "UpgradeHappening";
}

#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "hco.kubevirt.io",
    version = "v1beta1",
    kind = "HyperConverged",
    plural = "hyperconvergeds",
    shortname = "hco",
    namespaced,
    status = "HyperConvergedStatus",
    derive = "PartialEq",
    derive = "Default"
)]
#[serde(rename_all = "camelCase")]
pub struct HyperConvergedSpec {
    /// Placement of infrastructure components
    #[serde(default)]
    pub infra: HyperConvergedConfig,

    /// Placement of workload-facing components
    #[serde(default)]
    pub workloads: HyperConvergedConfig,

    /// Optional features
    #[serde(default)]
    pub feature_gates: HyperConvergedFeatureGates,

    /// Live migration tuning
    #[serde(default)]
    pub live_migration_config: LiveMigrationConfigurations,

    /// Certificate rotation settings
    #[serde(default)]
    pub cert_config: HyperConvergedCertConfig,

    /// Resource requirements for storage workloads and VMI CPU allocation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_requirements: Option<OperandResourceRequirements>,

    /// Storage class for scratch space
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scratch_space_storage_class: Option<String>,

    /// Import settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_import: Option<StorageImportConfig>,

    /// Filesystem overhead reserved on volumes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filesystem_overhead: Option<FilesystemOverhead>,

    /// Per-component log verbosity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_verbosity_config: Option<LogVerbosityConfiguration>,

    /// TLS profile propagated to every component
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_security_profile: Option<TlsSecurityProfile>,

    /// Behaviour on removal while workloads still exist
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uninstall_strategy: Option<UninstallStrategy>,

    /// Namespace for the common VM templates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub common_templates_namespace: Option<String>,

    /// Name server IP for the secondary DNS
    #[serde(
        rename = "kubeSecondaryDNSNameServerIP",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub kube_secondary_dns_name_server_ip: Option<String>,

    /// Namespace for the golden images
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub common_boot_image_namespace: Option<String>,

    /// Import the common golden images
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_common_boot_image_import: Option<bool>,

    /// Deploy the VM console proxy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deploy_vm_console_proxy: Option<bool>,

    /// Custom golden-image import schedules
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data_import_cron_templates: Vec<DataImportCronTemplate>,

    /// Default VMI eviction strategy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eviction_strategy: Option<String>,

    /// Rate-limiter tuning profile: `annotation` or `highBurst`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tuning_policy: Option<TuningPolicy>,

    /// Cluster-wide default CPU model
    #[serde(rename = "defaultCPUModel", default, skip_serializing_if = "Option::is_none")]
    pub default_cpu_model: Option<String>,

    /// Cluster-wide default runtime class
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_runtime_class: Option<String>,
}

/// Placement wrapper used for `infra` and `workloads`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HyperConvergedConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_placement: Option<NodePlacement>,
}

/// Optional features. Every gate is tri-state: unset behaves as the documented default.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HyperConvergedFeatureGates {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hotplug_volumes: Option<bool>,

    #[serde(rename = "withHostPassthroughCPU", default, skip_serializing_if = "Option::is_none")]
    pub with_host_passthrough_cpu: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downward_metrics: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent_reservation: Option<bool>,

    #[serde(rename = "alignCPUs", default, skip_serializing_if = "Option::is_none")]
    pub align_cpus: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_resource_limits: Option<bool>,

    #[serde(rename = "disableMDevConfiguration", default, skip_serializing_if = "Option::is_none")]
    pub disable_mdev_configuration: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub non_root: Option<bool>,

    #[serde(rename = "deployKubeSecondaryDNS", default, skip_serializing_if = "Option::is_none")]
    pub deploy_kube_secondary_dns: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_multi_arch_boot_image_import: Option<bool>,

    /// Deprecated, ignored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deploy_tekton_task_resources: Option<bool>,

    /// Deprecated, ignored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_managed_tenant_quota: Option<bool>,
}

/// Certificate rotation for the CA and the serving certificates.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HyperConvergedCertConfig {
    #[serde(default)]
    pub ca: CertRotateConfig,

    #[serde(default)]
    pub server: CertRotateConfig,
}

impl HyperConvergedCertConfig {
    /// Default CA lifetime.
    pub const DEFAULT_CA_DURATION: &'static str = "48h0m0s";
    /// Default CA renew-before window.
    pub const DEFAULT_CA_RENEW_BEFORE: &'static str = "24h0m0s";
    /// Default serving-certificate lifetime.
    pub const DEFAULT_SERVER_DURATION: &'static str = "24h0m0s";
    /// Default serving-certificate renew-before window.
    pub const DEFAULT_SERVER_RENEW_BEFORE: &'static str = "12h0m0s";

    /// Effective `(ca duration, ca renew-before, server duration, server renew-before)`.
    pub fn effective(&self) -> (String, String, String, String) {
        (
            self.ca.duration.clone().unwrap_or_else(|| Self::DEFAULT_CA_DURATION.to_string()),
            self.ca
                .renew_before
                .clone()
                .unwrap_or_else(|| Self::DEFAULT_CA_RENEW_BEFORE.to_string()),
            self.server
                .duration
                .clone()
                .unwrap_or_else(|| Self::DEFAULT_SERVER_DURATION.to_string()),
            self.server
                .renew_before
                .clone()
                .unwrap_or_else(|| Self::DEFAULT_SERVER_RENEW_BEFORE.to_string()),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OperandResourceRequirements {
    /// Requests and limits for storage workload pods
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "crate::schema::preserve_unknown_fields")]
    pub storage_workloads: Option<ResourceRequirements>,

    /// vCPU to pCPU overcommit ratio
    #[serde(rename = "vmiCPUAllocationRatio", default, skip_serializing_if = "Option::is_none")]
    pub vmi_cpu_allocation_ratio: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StorageImportConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub insecure_registries: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LogVerbosityConfiguration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubevirt: Option<KubeVirtLogVerbosity>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cdi: Option<i32>,
}

/// Uninstall behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub enum UninstallStrategy {
    /// Refuse removal while VMs or data volumes exist
    #[default]
    BlockUninstallIfWorkloadsExist,
    /// Remove workloads together with the stack
    RemoveWorkloads,
}

impl UninstallStrategy {
    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BlockUninstallIfWorkloadsExist => "BlockUninstallIfWorkloadsExist",
            Self::RemoveWorkloads => "RemoveWorkloads",
        }
    }
}

/// Rate-limiter tuning profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum TuningPolicy {
    /// Values come from the tuning-policy annotation
    Annotation,
    /// Fixed high-burst values
    HighBurst,
}

/// Metadata of a golden-image import schedule.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DataImportCronTemplateMeta {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

/// Golden-image import schedule handed to the templates operator.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DataImportCronTemplate {
    pub metadata: DataImportCronTemplateMeta,

    /// Opaque DataImportCron spec
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "crate::schema::preserve_unknown_fields")]
    pub spec: Option<serde_json::Value>,
}

/// Origin flags of a reported golden-image template.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DataImportCronStatus {
    /// Comes from the shipped common templates
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub common_template: bool,

    /// A common template the user customised
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub modified: bool,
}

/// Golden-image template as reported in the HyperConverged status.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DataImportCronTemplateStatus {
    #[serde(flatten)]
    pub template: DataImportCronTemplate,

    #[serde(default)]
    pub status: DataImportCronStatus,
}

/// A component version pair.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct Version {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HyperConvergedStatus {
    /// Aggregated conditions, map-like by type
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    /// Every object the operator manages on behalf of this resource
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[schemars(schema_with = "crate::schema::preserve_unknown_fields_list")]
    pub related_objects: Vec<ObjectReference>,

    /// Deployed versions, map-like by name
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub versions: Vec<Version>,

    /// Effective golden-image templates
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data_import_cron_templates: Vec<DataImportCronTemplateStatus>,

    /// Generation handled by the last reconcile
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// `healthy`, `warning` or `error`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_health_status: Option<String>,
}

impl HyperConvergedStatus {
    /// Version recorded for `name`.
    pub fn version(&self, name: &str) -> Option<&str> {
        self.versions.iter().find(|v| v.name == name).map(|v| v.version.as_str())
    }

    /// Records a version, replacing an existing entry for the same name.
    pub fn set_version(&mut self, name: &str, version: &str) {
        match self.versions.iter_mut().find(|v| v.name == name) {
            Some(v) => version.clone_into(&mut v.version),
            None => self.versions.push(Version {
                name: name.to_string(),
                version: version.to_string(),
            }),
        }
    }
}
