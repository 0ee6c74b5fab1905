//! KubeVirt operand.
//!
//! Renders the virtualization engine CR `kubevirt-<hc>` in the HyperConverged
//! namespace. The CR is owned by the HyperConverged resource.

use super::{
    check_component_version, hc_namespace, log_drift, GenericOperand, ObjectIdentity, OperandHooks, SpecCache,
};
use crate::config::OperatorConfig;
use crate::error::ControllerError;
use crate::labels::{managed_labels, managed_labels_match, merge_managed_labels, AppComponent};
use crate::patch::apply_annotation_patch;
use crate::request::HcoRequest;
use crate::tls;
use async_trait::async_trait;
use cluster_store::{typed, ObjectStore};
use hco_crds::{
    ArchConfiguration, ArchSpecificConfiguration, ComponentConfig, Condition, DeveloperConfiguration,
    HyperConverged, HyperConvergedConfig, HyperConvergedFeatureGates, KubeVirt, KubeVirtCertificateRotateStrategy,
    KubeVirtConfiguration, KubeVirtSelfSignConfiguration, KubeVirtSpec, KubeVirtTlsConfiguration,
    LiveMigrationConfigurations, NetworkConfiguration, RateLimiter, ReloadableComponentConfiguration,
    RestClientConfiguration, SmbiosConfiguration, TlsProtocolVersion, TokenBucketRateLimiter, TuningPolicy,
    CertRotateConfig, JSON_PATCH_KUBEVIRT_ANNOTATION, TUNING_POLICY_ANNOTATION,
};
use kube::ResourceExt;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Feature gates every KubeVirt CR carries.
pub const MANDATORY_FEATURE_GATES: [&str; 7] = [
    "DataVolumes",
    "SRIOV",
    "LiveMigration",
    "CPUManager",
    "CPUNodeDiscovery",
    "Sidecar",
    "Snapshot",
];

/// Set while the align-CPUs gate is on; KubeVirt reads it from metadata.
pub const EMULATOR_THREAD_EVEN_PARITY_ANNOTATION: &str = "kubevirt.io/emulator-thread-complete-to-even-parity";

const DEFAULT_AMD64_OVMF_PATH: &str = "/usr/share/OVMF";
const DEFAULT_AMD64_EMULATED_MACHINES: [&str; 2] = ["q35*", "pc-q35*"];
const HIGH_BURST_QPS: f32 = 200.0;
const HIGH_BURST_BURST: i32 = 400;
const PRODUCT_NAME: &str = "HyperConvergedCluster";
const MASQUERADE_INTERFACE: &str = "masquerade";

/// Name of the KubeVirt CR for `hc`.
pub fn kubevirt_name(hc: &HyperConverged) -> String {
    format!("kubevirt-{}", hc.name_any())
}

/// Renders the required KubeVirt CR.
pub fn new_kubevirt(hc: &HyperConverged, cfg: &OperatorConfig) -> Result<KubeVirt, ControllerError> {
    let (ca_duration, ca_renew, server_duration, server_renew) = hc.spec.cert_config.effective();

    let spec = KubeVirtSpec {
        uninstall_strategy: Some(hc.spec.uninstall_strategy.unwrap_or_default().as_str().to_string()),
        infra: component_config(&hc.spec.infra, cfg.infrastructure_highly_available),
        // virt-handler runs on every workload node anyway
        workloads: component_config(&hc.spec.workloads, true),
        configuration: configuration(hc, cfg)?,
        certificate_rotate_strategy: KubeVirtCertificateRotateStrategy {
            self_signed: Some(KubeVirtSelfSignConfiguration {
                ca: Some(CertRotateConfig {
                    duration: Some(ca_duration),
                    renew_before: Some(ca_renew),
                }),
                server: Some(CertRotateConfig {
                    duration: Some(server_duration),
                    renew_before: Some(server_renew),
                }),
            }),
        },
        product_name: Some(PRODUCT_NAME.to_string()),
        product_version: Some(cfg.operator_version.clone()),
        product_component: Some(AppComponent::Compute.as_str().to_string()),
    };

    let mut kv = KubeVirt::new(&kubevirt_name(hc), spec);
    kv.metadata.namespace = Some(hc_namespace(hc, cfg).to_string());
    kv.metadata.labels = Some(managed_labels(&hc.name_any(), &cfg.operator_version, AppComponent::Compute));
    if hc.spec.feature_gates.align_cpus == Some(true) {
        kv.metadata.annotations = Some(BTreeMap::from([(
            EMULATOR_THREAD_EVEN_PARITY_ANNOTATION.to_string(),
            String::new(),
        )]));
    }

    apply_annotation_patch(kv, hc, JSON_PATCH_KUBEVIRT_ANNOTATION)
}

fn configuration(hc: &HyperConverged, cfg: &OperatorConfig) -> Result<KubeVirtConfiguration, ControllerError> {
    let rate_limiter = tuning_to_rate_limiter(hc)?;
    let profile = tls::effective_profile(hc);
    let min = tls::min_version(&profile);

    let mut config = KubeVirtConfiguration {
        developer_configuration: Some(developer_configuration(hc, cfg)),
        network: Some(NetworkConfiguration {
            network_interface: MASQUERADE_INTERFACE.to_string(),
        }),
        migrations: Some(live_migration(&hc.spec.live_migration_config)?),
        smbios: smbios(cfg)?,
        tls_configuration: Some(KubeVirtTlsConfiguration {
            min_tls_version: tls::version_name(min).to_string(),
            // TLS 1.3 suites are not configurable
            ciphers: if min == TlsProtocolVersion::VersionTLS13 {
                Vec::new()
            } else {
                tls::iana_cipher_suites(&tls::ciphers(&profile))
            },
        }),
        api_configuration: rate_limiter.clone(),
        webhook_configuration: rate_limiter.clone(),
        controller_configuration: rate_limiter.clone(),
        handler_configuration: rate_limiter,
        eviction_strategy: hc.spec.eviction_strategy.clone(),
        selinux_launcher_type: Some(cfg.platform.selinux_launcher_type.clone()).filter(|s| !s.is_empty()),
        cpu_model: hc.spec.default_cpu_model.clone(),
        default_runtime_class: hc.spec.default_runtime_class.clone(),
        ..KubeVirtConfiguration::default()
    };

    if let Some(machine_type) = &cfg.platform.machine_type {
        config.machine_type = Some(machine_type.clone());
        config.architecture_configuration = Some(ArchConfiguration {
            amd64: Some(amd64_arch(machine_type)),
            ..ArchConfiguration::default()
        });
    }

    let per_arch = [
        &cfg.platform.amd64_machine_type,
        &cfg.platform.arm64_machine_type,
        &cfg.platform.s390x_machine_type,
    ];
    if per_arch.iter().any(|m| m.is_some()) {
        let arch = config.architecture_configuration.get_or_insert_with(ArchConfiguration::default);
        if let Some(machine_type) = &cfg.platform.amd64_machine_type {
            arch.amd64 = Some(amd64_arch(machine_type));
        }
        if let Some(machine_type) = &cfg.platform.arm64_machine_type {
            arch.arm64 = Some(ArchSpecificConfiguration {
                machine_type: Some(machine_type.clone()),
                ..ArchSpecificConfiguration::default()
            });
        }
        if let Some(machine_type) = &cfg.platform.s390x_machine_type {
            arch.s390x = Some(ArchSpecificConfiguration {
                machine_type: Some(machine_type.clone()),
                ..ArchSpecificConfiguration::default()
            });
        }
    }

    Ok(config)
}

fn amd64_arch(machine_type: &str) -> ArchSpecificConfiguration {
    ArchSpecificConfiguration {
        machine_type: Some(machine_type.to_string()),
        ovmf_path: Some(DEFAULT_AMD64_OVMF_PATH.to_string()),
        emulated_machines: DEFAULT_AMD64_EMULATED_MACHINES.iter().map(|m| (*m).to_string()).collect(),
    }
}

fn developer_configuration(hc: &HyperConverged, cfg: &OperatorConfig) -> DeveloperConfiguration {
    DeveloperConfiguration {
        feature_gates: feature_gates(&hc.spec.feature_gates),
        use_emulation: cfg.platform.kvm_emulation.then_some(true),
        log_verbosity: hc.spec.log_verbosity_config.as_ref().and_then(|l| l.kubevirt.clone()),
        cpu_allocation_ratio: hc
            .spec
            .resource_requirements
            .as_ref()
            .and_then(|r| r.vmi_cpu_allocation_ratio),
    }
}

/// Mandatory gates followed by the optional ones switched on in `fgs`.
pub fn feature_gates(fgs: &HyperConvergedFeatureGates) -> Vec<String> {
    let on = |gate: Option<bool>| gate == Some(true);
    let optional = [
        (on(fgs.hotplug_volumes), "HotplugVolumes"),
        (on(fgs.downward_metrics), "DownwardMetrics"),
        (on(fgs.with_host_passthrough_cpu), "WithHostPassthroughCPU"),
        // running as root is the exception, so the gate is inverted
        (fgs.non_root == Some(false), "Root"),
        (on(fgs.disable_mdev_configuration), "DisableMDEVConfiguration"),
        (on(fgs.persistent_reservation), "PersistentReservation"),
        (on(fgs.auto_resource_limits), "AutoResourceLimitsGate"),
        (on(fgs.align_cpus), "AlignCPUs"),
    ];

    MANDATORY_FEATURE_GATES
        .iter()
        .copied()
        .chain(optional.iter().filter(|(enabled, _)| *enabled).map(|(_, gate)| *gate))
        .map(str::to_string)
        .collect()
}

/// `None` when the component may keep its own defaults: no placement and an
/// HA control plane. A non-HA control plane is pinned to one replica.
fn component_config(config: &HyperConvergedConfig, highly_available: bool) -> Option<ComponentConfig> {
    let node_placement = config.node_placement.as_ref().filter(|p| !p.is_empty()).cloned();
    if node_placement.is_none() && highly_available {
        return None;
    }
    Some(ComponentConfig {
        node_placement,
        replicas: (!highly_available).then_some(1),
    })
}

fn live_migration(lm: &LiveMigrationConfigurations) -> Result<LiveMigrationConfigurations, ControllerError> {
    if let Some(bandwidth) = &lm.bandwidth_per_migration {
        if !is_quantity(bandwidth) {
            return Err(ControllerError::Build(format!(
                "failed to parse the LiveMigrationConfig.bandwidthPerMigration field; quantities must match the \
                 regular expression '^([+-]?[0-9.]+)([eEinumkKMGTP]*[-+]?[0-9]*)$': {bandwidth:?}"
            )));
        }
    }
    Ok(lm.clone())
}

/// Loose check of the Kubernetes quantity syntax.
fn is_quantity(raw: &str) -> bool {
    let digits_end = raw
        .char_indices()
        .find(|(i, c)| !(c.is_ascii_digit() || *c == '.' || (*i == 0 && (*c == '+' || *c == '-'))))
        .map_or(raw.len(), |(i, _)| i);
    let (number, suffix) = raw.split_at(digits_end);
    if number.trim_start_matches(['+', '-']).is_empty() || number.matches('.').count() > 1 {
        return false;
    }
    const SUFFIXES: [&str; 15] = [
        "", "Ki", "Mi", "Gi", "Ti", "Pi", "Ei", "n", "u", "m", "k", "M", "G", "T", "P",
    ];
    SUFFIXES.contains(&suffix)
        || suffix
            .strip_prefix(['e', 'E'])
            .is_some_and(|exp| exp.trim_start_matches(['+', '-']).parse::<u32>().is_ok())
}

fn smbios(cfg: &OperatorConfig) -> Result<Option<SmbiosConfiguration>, ControllerError> {
    cfg.platform
        .smbios
        .as_deref()
        .map(|raw| {
            serde_yaml::from_str(raw).map_err(|e| ControllerError::Build(format!("failed to parse SMBIOS: {e}")))
        })
        .transpose()
}

#[derive(Debug, Deserialize)]
struct RateLimits {
    #[serde(default)]
    qps: f32,
    #[serde(default)]
    burst: i32,
}

fn rest_client(qps: f32, burst: i32) -> ReloadableComponentConfiguration {
    ReloadableComponentConfiguration {
        rest_client: Some(RestClientConfiguration {
            rate_limiter: Some(RateLimiter {
                token_bucket_rate_limiter: Some(TokenBucketRateLimiter { qps, burst }),
            }),
        }),
    }
}

/// REST-client rate limiter selected by the tuning policy.
pub fn tuning_to_rate_limiter(hc: &HyperConverged) -> Result<Option<ReloadableComponentConfiguration>, ControllerError> {
    let annotation = hc.annotations().get(TUNING_POLICY_ANNOTATION);
    match hc.spec.tuning_policy {
        None => Ok(None),
        Some(TuningPolicy::Annotation) => {
            let Some(raw) = annotation else {
                return Err(ControllerError::Build(
                    "tuning policy set but annotation not present or wrong".to_string(),
                ));
            };
            let rates: RateLimits = serde_json::from_str(raw)?;
            if rates.qps <= 0.0 {
                return Err(ControllerError::Build("qps parameter not found in annotation".to_string()));
            }
            if rates.burst <= 0 {
                return Err(ControllerError::Build("burst parameter not found in annotation".to_string()));
            }
            Ok(Some(rest_client(rates.qps, rates.burst)))
        }
        Some(TuningPolicy::HighBurst) => {
            if annotation.is_some() {
                return Err(ControllerError::Build(format!(
                    "highBurst profile is enabled and the annotation {TUNING_POLICY_ANNOTATION} is present"
                )));
            }
            Ok(Some(rest_client(HIGH_BURST_QPS, HIGH_BURST_BURST)))
        }
    }
}

/// Hooks for the KubeVirt CR.
pub struct KubeVirtHooks {
    cfg: Arc<OperatorConfig>,
    cache: SpecCache<KubeVirt>,
}

impl KubeVirtHooks {
    pub fn new(cfg: Arc<OperatorConfig>) -> Self {
        Self {
            cfg,
            cache: SpecCache::new(),
        }
    }
}

fn has_parity_annotation(kv: &KubeVirt) -> bool {
    kv.annotations().contains_key(EMULATOR_THREAD_EVEN_PARITY_ANNOTATION)
}

#[async_trait]
impl OperandHooks for KubeVirtHooks {
    type Cr = KubeVirt;

    fn full_cr(&self, hc: &HyperConverged) -> Result<Arc<KubeVirt>, ControllerError> {
        self.cache.get_or_try_build(|| new_kubevirt(hc, &self.cfg))
    }

    fn set_controller_reference(&self) -> bool {
        true
    }

    async fn update_cr(
        &self,
        req: &mut HcoRequest,
        store: &dyn ObjectStore,
        found: &mut KubeVirt,
        required: &KubeVirt,
    ) -> Result<(bool, bool), ControllerError> {
        let parity_wanted = has_parity_annotation(required);
        if found.spec == required.spec
            && managed_labels_match(&found.metadata, &required.metadata)
            && has_parity_annotation(found) == parity_wanted
        {
            return Ok((false, false));
        }

        let overwritten = log_drift(req, "KubeVirt");
        merge_managed_labels(&mut found.metadata, &required.metadata);
        if parity_wanted {
            found
                .annotations_mut()
                .insert(EMULATOR_THREAD_EVEN_PARITY_ANNOTATION.to_string(), String::new());
        } else {
            found.annotations_mut().remove(EMULATOR_THREAD_EVEN_PARITY_ANNOTATION);
        }
        found.spec = required.spec.clone();
        typed::update(store, found, false).await?;
        Ok((true, overwritten))
    }

    fn conditions(&self, found: &KubeVirt) -> Option<Vec<Condition>> {
        Some(found.status.as_ref().map(|s| s.conditions.clone()).unwrap_or_default())
    }

    fn check_component_version(&self, found: &KubeVirt) -> bool {
        let observed = found.status.as_ref().and_then(|s| s.observed_kube_virt_version.as_deref());
        check_component_version(&self.cfg.versions.kubevirt, observed)
    }

    fn reset(&self) {
        self.cache.reset();
    }

    fn identity(&self, hc: &HyperConverged) -> Option<ObjectIdentity> {
        Some(ObjectIdentity::named::<KubeVirt>(
            Some(hc_namespace(hc, &self.cfg)),
            &kubevirt_name(hc),
        ))
    }
}

/// The KubeVirt operand.
pub type KubeVirtOperand = GenericOperand<KubeVirtHooks>;

pub fn new_operand(store: Arc<dyn ObjectStore>, cfg: Arc<OperatorConfig>) -> KubeVirtOperand {
    GenericOperand::new(store, KubeVirtHooks::new(cfg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hco_crds::{NodePlacement, TlsProfileType, TlsSecurityProfile, UninstallStrategy};

    fn hc() -> HyperConverged {
        let mut hc = HyperConverged::new("kubevirt-hyperconverged", Default::default());
        hc.metadata.namespace = Some("kubevirt-hyperconverged".to_string());
        hc
    }

    fn cfg() -> OperatorConfig {
        OperatorConfig::for_namespace("kubevirt-hyperconverged", "1.2.3")
    }

    #[test]
    fn test_defaults() {
        let kv = new_kubevirt(&hc(), &cfg()).unwrap();
        assert_eq!(kv.metadata.name.as_deref(), Some("kubevirt-kubevirt-hyperconverged"));
        assert_eq!(kv.metadata.namespace.as_deref(), Some("kubevirt-hyperconverged"));
        assert_eq!(kv.labels()["app.kubernetes.io/component"], "compute");
        assert_eq!(kv.spec.uninstall_strategy.as_deref(), Some("BlockUninstallIfWorkloadsExist"));
        assert_eq!(kv.spec.product_name.as_deref(), Some("HyperConvergedCluster"));
        assert_eq!(kv.spec.product_version.as_deref(), Some("1.2.3"));

        let dev = kv.spec.configuration.developer_configuration.as_ref().unwrap();
        assert_eq!(dev.feature_gates, MANDATORY_FEATURE_GATES.to_vec());
        assert!(dev.use_emulation.is_none());

        let tls = kv.spec.configuration.tls_configuration.as_ref().unwrap();
        assert_eq!(tls.min_tls_version, "VersionTLS12");
        assert!(tls.ciphers.contains(&"TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256".to_string()));
        assert!(!tls.ciphers.contains(&"ECDHE-ECDSA-AES128-GCM-SHA256".to_string()));

        assert_eq!(
            kv.spec.configuration.network.as_ref().unwrap().network_interface,
            "masquerade"
        );
        // not HA: one replica, no placement
        let infra = kv.spec.infra.as_ref().unwrap();
        assert_eq!(infra.replicas, Some(1));
        assert!(infra.node_placement.is_none());
        assert!(kv.spec.workloads.is_none());
        assert!(kv.spec.configuration.api_configuration.is_none());

        let self_signed = kv.spec.certificate_rotate_strategy.self_signed.as_ref().unwrap();
        assert_eq!(self_signed.ca.as_ref().unwrap().duration.as_deref(), Some("48h0m0s"));
        assert_eq!(self_signed.server.as_ref().unwrap().renew_before.as_deref(), Some("12h0m0s"));
    }

    #[test]
    fn test_feature_gates() {
        let fgs = HyperConvergedFeatureGates {
            hotplug_volumes: Some(true),
            downward_metrics: Some(false),
            non_root: Some(false),
            align_cpus: Some(true),
            ..Default::default()
        };
        let gates = feature_gates(&fgs);
        assert_eq!(gates.len(), 10);
        assert_eq!(&gates[7..], ["HotplugVolumes", "Root", "AlignCPUs"]);

        let gates = feature_gates(&HyperConvergedFeatureGates {
            non_root: Some(true),
            ..Default::default()
        });
        assert!(!gates.contains(&"Root".to_string()));
    }

    #[test]
    fn test_platform_environment() {
        let mut cfg = cfg();
        cfg.platform.machine_type = Some("new-machinetype-value-that-we-have-to-set".to_string());
        cfg.platform.arm64_machine_type = Some("virt".to_string());
        cfg.platform.selinux_launcher_type = "SELinuxLauncherType".to_string();
        cfg.platform.kvm_emulation = true;
        cfg.platform.smbios = Some("family: smbios family\nproduct: smbios product\n".to_string());

        let kv = new_kubevirt(&hc(), &cfg).unwrap();
        let config = &kv.spec.configuration;
        assert_eq!(config.machine_type.as_deref(), Some("new-machinetype-value-that-we-have-to-set"));
        assert_eq!(config.selinux_launcher_type.as_deref(), Some("SELinuxLauncherType"));
        let arch = config.architecture_configuration.as_ref().unwrap();
        let amd64 = arch.amd64.as_ref().unwrap();
        assert_eq!(amd64.ovmf_path.as_deref(), Some("/usr/share/OVMF"));
        assert_eq!(amd64.emulated_machines, vec!["q35*", "pc-q35*"]);
        assert_eq!(arch.arm64.as_ref().unwrap().machine_type.as_deref(), Some("virt"));
        assert_eq!(config.smbios.as_ref().unwrap().family.as_deref(), Some("smbios family"));
        assert_eq!(config.developer_configuration.as_ref().unwrap().use_emulation, Some(true));
    }

    #[test]
    fn test_bad_smbios_is_an_error() {
        let mut cfg = cfg();
        cfg.platform.smbios = Some("family: [unterminated".to_string());
        assert!(new_kubevirt(&hc(), &cfg).is_err());
    }

    #[test]
    fn test_placement_and_ha() {
        let mut hc = hc();
        hc.spec.infra.node_placement = Some(NodePlacement {
            node_selector: Some(BTreeMap::from([("infra".to_string(), "true".to_string())])),
            ..Default::default()
        });
        let mut cfg = cfg();
        cfg.infrastructure_highly_available = true;

        let kv = new_kubevirt(&hc, &cfg).unwrap();
        let infra = kv.spec.infra.unwrap();
        assert!(infra.replicas.is_none());
        assert_eq!(infra.node_placement.unwrap().node_selector.unwrap()["infra"], "true");
        assert!(kv.spec.workloads.is_none());
    }

    #[test]
    fn test_tuning_policy() {
        let mut hc = hc();
        hc.spec.tuning_policy = Some(TuningPolicy::HighBurst);
        let kv = new_kubevirt(&hc, &cfg()).unwrap();
        let limiter = kv.spec.configuration.handler_configuration.unwrap();
        let bucket = limiter.rest_client.unwrap().rate_limiter.unwrap().token_bucket_rate_limiter.unwrap();
        assert_eq!(bucket.burst, 400);

        hc.annotations_mut()
            .insert(TUNING_POLICY_ANNOTATION.to_string(), r#"{"qps": 100, "burst": 200}"#.to_string());
        assert!(new_kubevirt(&hc, &cfg()).unwrap_err().to_string().contains("highBurst"));

        hc.spec.tuning_policy = Some(TuningPolicy::Annotation);
        let kv = new_kubevirt(&hc, &cfg()).unwrap();
        let limiter = kv.spec.configuration.api_configuration.unwrap();
        let bucket = limiter.rest_client.unwrap().rate_limiter.unwrap().token_bucket_rate_limiter.unwrap();
        assert_eq!(bucket.qps, 100.0);
        assert_eq!(bucket.burst, 200);

        hc.annotations_mut()
            .insert(TUNING_POLICY_ANNOTATION.to_string(), r#"{"burst": 200}"#.to_string());
        assert_eq!(
            new_kubevirt(&hc, &cfg()).unwrap_err().to_string(),
            "qps parameter not found in annotation"
        );

        hc.annotations_mut().remove(TUNING_POLICY_ANNOTATION);
        assert_eq!(
            new_kubevirt(&hc, &cfg()).unwrap_err().to_string(),
            "tuning policy set but annotation not present or wrong"
        );
    }

    #[test]
    fn test_modern_tls_has_no_ciphers() {
        let mut hc = hc();
        hc.spec.tls_security_profile = Some(TlsSecurityProfile::of_type(TlsProfileType::Modern));
        let kv = new_kubevirt(&hc, &cfg()).unwrap();
        let tls = kv.spec.configuration.tls_configuration.unwrap();
        assert_eq!(tls.min_tls_version, "VersionTLS13");
        assert!(tls.ciphers.is_empty());
    }

    #[test]
    fn test_uninstall_strategy_and_align_cpus() {
        let mut hc = hc();
        hc.spec.uninstall_strategy = Some(UninstallStrategy::RemoveWorkloads);
        hc.spec.feature_gates.align_cpus = Some(true);
        let kv = new_kubevirt(&hc, &cfg()).unwrap();
        assert_eq!(kv.spec.uninstall_strategy.as_deref(), Some("RemoveWorkloads"));
        assert!(has_parity_annotation(&kv));
    }

    #[test]
    fn test_bandwidth_quantity() {
        assert!(is_quantity("64Mi"));
        assert!(is_quantity("1.5G"));
        assert!(is_quantity("1e3"));
        assert!(!is_quantity("fast"));
        assert!(!is_quantity("64MiB"));

        let mut hc = hc();
        hc.spec.live_migration_config.bandwidth_per_migration = Some("a lot".to_string());
        let err = new_kubevirt(&hc, &cfg()).unwrap_err();
        assert!(err.to_string().starts_with("failed to parse the LiveMigrationConfig.bandwidthPerMigration"));
    }

    #[test]
    fn test_json_patch() {
        let mut hc = hc();
        hc.annotations_mut().insert(
            JSON_PATCH_KUBEVIRT_ANNOTATION.to_string(),
            r#"[{"op":"add","path":"/spec/configuration/cpuModel","value":"Haswell"}]"#.to_string(),
        );
        let kv = new_kubevirt(&hc, &cfg()).unwrap();
        assert_eq!(kv.spec.configuration.cpu_model.as_deref(), Some("Haswell"));
    }

    #[test]
    fn test_version_check() {
        let mut cfg = cfg();
        cfg.versions.kubevirt = "v1.0.0".to_string();
        let hooks = KubeVirtHooks::new(Arc::new(cfg));
        let mut kv = new_kubevirt(&hc(), &OperatorConfig::for_namespace("ns", "1")).unwrap();
        assert!(!hooks.check_component_version(&kv));
        kv.status = Some(hco_crds::KubeVirtStatus {
            observed_kube_virt_version: Some("v1.0.0".to_string()),
            ..Default::default()
        });
        assert!(hooks.check_component_version(&kv));
    }
}
