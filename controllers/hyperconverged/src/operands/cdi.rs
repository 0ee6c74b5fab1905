//! CDI operand.
//!
//! The data importer CR is cluster scoped, so it carries no owner reference.
//! Older operator releases did set one; the first observation strips it.

use super::{check_component_version, update_spec_and_labels, GenericOperand, ObjectIdentity, OperandHooks, SpecCache};
use crate::config::OperatorConfig;
use crate::error::ControllerError;
use crate::labels::{managed_labels, AppComponent};
use crate::patch::apply_annotation_patch;
use crate::placement;
use crate::request::HcoRequest;
use crate::tls;
use async_trait::async_trait;
use cluster_store::{typed, ObjectStore};
use hco_crds::{
    CdiCertConfig, CdiConfigSpec, CdiSpec, CertRotateConfig, Condition, HyperConverged, CDI,
    JSON_PATCH_CDI_ANNOTATION,
};
use kube::ResourceExt;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// Feature gates the operator always enables on CDI.
pub const DEFAULT_FEATURE_GATES: [&str; 3] = [
    "HonorWaitForFirstConsumer",
    "DataVolumeClaimAdoption",
    "WebhookPvcRendering",
];

/// Tells CDI that the CR, not its own config map, is the source of truth.
pub const CONFIG_AUTHORITY_ANNOTATION: &str = "cdi.kubevirt.io/configAuthority";

/// Name of the CDI CR for `hc`.
pub fn cdi_name(hc: &HyperConverged) -> String {
    format!("cdi-{}", hc.name_any())
}

/// Renders the required CDI CR.
pub fn new_cdi(hc: &HyperConverged, cfg: &OperatorConfig) -> Result<CDI, ControllerError> {
    let (ca_duration, ca_renew, server_duration, server_renew) = hc.spec.cert_config.effective();

    let config = CdiConfigSpec {
        feature_gates: DEFAULT_FEATURE_GATES.iter().map(|g| (*g).to_string()).collect(),
        filesystem_overhead: hc.spec.filesystem_overhead.clone(),
        scratch_space_storage_class: hc.spec.scratch_space_storage_class.clone(),
        insecure_registries: hc
            .spec
            .storage_import
            .as_ref()
            .map(|s| s.insecure_registries.clone())
            .unwrap_or_default(),
        pod_resource_requirements: hc
            .spec
            .resource_requirements
            .as_ref()
            .and_then(|r| r.storage_workloads.clone()),
        tls_security_profile: Some(tls::effective_profile(hc)),
        log_verbosity: hc.spec.log_verbosity_config.as_ref().and_then(|l| l.cdi),
    };

    let spec = CdiSpec {
        uninstall_strategy: Some(hc.spec.uninstall_strategy.unwrap_or_default().as_str().to_string()),
        infra: placement::infra(hc).cloned(),
        workloads: placement::workloads(hc).cloned(),
        config: Some(config),
        cert_config: Some(CdiCertConfig {
            ca: Some(CertRotateConfig {
                duration: Some(ca_duration),
                renew_before: Some(ca_renew),
            }),
            server: Some(CertRotateConfig {
                duration: Some(server_duration),
                renew_before: Some(server_renew),
            }),
        }),
    };

    let mut cdi = CDI::new(&cdi_name(hc), spec);
    cdi.metadata.labels = Some(managed_labels(&hc.name_any(), &cfg.operator_version, AppComponent::Storage));
    cdi.metadata.annotations = Some(BTreeMap::from([(CONFIG_AUTHORITY_ANNOTATION.to_string(), String::new())]));

    apply_annotation_patch(cdi, hc, JSON_PATCH_CDI_ANNOTATION)
}

/// Hooks for the CDI CR.
pub struct CdiHooks {
    cfg: Arc<OperatorConfig>,
    cache: SpecCache<CDI>,
    owner_refs_removed: AtomicBool,
}

impl CdiHooks {
    pub fn new(cfg: Arc<OperatorConfig>) -> Self {
        Self {
            cfg,
            cache: SpecCache::new(),
            owner_refs_removed: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl OperandHooks for CdiHooks {
    type Cr = CDI;

    fn full_cr(&self, hc: &HyperConverged) -> Result<Arc<CDI>, ControllerError> {
        self.cache.get_or_try_build(|| new_cdi(hc, &self.cfg))
    }

    async fn post_found(
        &self,
        _req: &mut HcoRequest,
        store: &dyn ObjectStore,
        mut found: CDI,
    ) -> Result<CDI, ControllerError> {
        if self.owner_refs_removed.load(Ordering::Acquire) {
            return Ok(found);
        }
        if found.owner_references().is_empty() {
            self.owner_refs_removed.store(true, Ordering::Release);
            return Ok(found);
        }

        info!(name = %found.name_any(), "Removing owner references from the cluster scoped CDI CR");
        found.metadata.owner_references = None;
        let updated = typed::update(store, &found, false).await?;
        self.owner_refs_removed.store(true, Ordering::Release);
        Ok(updated)
    }

    async fn update_cr(
        &self,
        req: &mut HcoRequest,
        store: &dyn ObjectStore,
        found: &mut CDI,
        required: &CDI,
    ) -> Result<(bool, bool), ControllerError> {
        update_spec_and_labels(req, store, found, required).await
    }

    fn conditions(&self, found: &CDI) -> Option<Vec<Condition>> {
        Some(found.status.as_ref().map(|s| s.conditions.clone()).unwrap_or_default())
    }

    fn check_component_version(&self, found: &CDI) -> bool {
        let observed = found.status.as_ref().and_then(|s| s.observed_version.as_deref());
        check_component_version(&self.cfg.versions.cdi, observed)
    }

    fn reset(&self) {
        self.cache.reset();
    }

    fn identity(&self, hc: &HyperConverged) -> Option<ObjectIdentity> {
        Some(ObjectIdentity::named::<CDI>(None, &cdi_name(hc)))
    }
}

/// The CDI operand.
pub type CdiOperand = GenericOperand<CdiHooks>;

pub fn new_operand(store: Arc<dyn ObjectStore>, cfg: Arc<OperatorConfig>) -> CdiOperand {
    GenericOperand::new(store, CdiHooks::new(cfg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hco_crds::{
        FilesystemOverhead, HyperConvergedCertConfig, LogVerbosityConfiguration, StorageImportConfig,
        TlsProfileType, UninstallStrategy,
    };

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
        let cdi = new_cdi(&hc(), &cfg()).unwrap();
        assert_eq!(cdi.name_any(), "cdi-kubevirt-hyperconverged");
        assert!(cdi.metadata.namespace.is_none());
        assert_eq!(cdi.annotations()[CONFIG_AUTHORITY_ANNOTATION], "");
        assert_eq!(cdi.labels()["app.kubernetes.io/component"], "storage");
        assert_eq!(cdi.spec.uninstall_strategy.as_deref(), Some("BlockUninstallIfWorkloadsExist"));
        assert!(cdi.spec.infra.is_none());

        let config = cdi.spec.config.as_ref().unwrap();
        assert_eq!(config.feature_gates, DEFAULT_FEATURE_GATES.to_vec());
        assert_eq!(
            config.tls_security_profile.as_ref().unwrap().type_,
            Some(TlsProfileType::Intermediate)
        );

        let cert = cdi.spec.cert_config.as_ref().unwrap();
        assert_eq!(
            cert.ca.as_ref().unwrap().duration.as_deref(),
            Some(HyperConvergedCertConfig::DEFAULT_CA_DURATION)
        );
        assert_eq!(
            cert.server.as_ref().unwrap().renew_before.as_deref(),
            Some(HyperConvergedCertConfig::DEFAULT_SERVER_RENEW_BEFORE)
        );
    }

    #[test]
    fn test_hc_fields() {
        let mut hc = hc();
        hc.spec.uninstall_strategy = Some(UninstallStrategy::RemoveWorkloads);
        hc.spec.scratch_space_storage_class = Some("scratch".to_string());
        hc.spec.storage_import = Some(StorageImportConfig {
            insecure_registries: vec!["registry.local:5000".to_string()],
        });
        hc.spec.filesystem_overhead = Some(FilesystemOverhead {
            global: Some("0.1".to_string()),
            storage_class: None,
        });
        hc.spec.log_verbosity_config = Some(LogVerbosityConfiguration {
            kubevirt: None,
            cdi: Some(4),
        });

        let cdi = new_cdi(&hc, &cfg()).unwrap();
        assert_eq!(cdi.spec.uninstall_strategy.as_deref(), Some("RemoveWorkloads"));
        let config = cdi.spec.config.unwrap();
        assert_eq!(config.scratch_space_storage_class.as_deref(), Some("scratch"));
        assert_eq!(config.insecure_registries, vec!["registry.local:5000"]);
        assert_eq!(config.filesystem_overhead.unwrap().global.as_deref(), Some("0.1"));
        assert_eq!(config.log_verbosity, Some(4));
    }

    #[test]
    fn test_json_patch_override() {
        let mut hc = hc();
        hc.annotations_mut().insert(
            JSON_PATCH_CDI_ANNOTATION.to_string(),
            r#"[{"op":"add","path":"/spec/config/featureGates/-","value":"fg1"},{"op":"add","path":"/spec/config/filesystemOverhead","value":{"global":"50","storageClass":{"AAA":"75","BBB":"25"}}}]"#
                .to_string(),
        );

        let cdi = new_cdi(&hc, &cfg()).unwrap();
        let config = cdi.spec.config.unwrap();
        assert_eq!(config.feature_gates.len(), 4);
        assert!(config.feature_gates.contains(&"fg1".to_string()));
        let overhead = config.filesystem_overhead.unwrap();
        assert_eq!(overhead.global.as_deref(), Some("50"));
        let per_class = overhead.storage_class.unwrap();
        assert_eq!(per_class["AAA"], "75");
        assert_eq!(per_class["BBB"], "25");
    }

    #[test]
    fn test_bad_json_patch() {
        let mut hc = hc();
        hc.annotations_mut().insert(
            JSON_PATCH_CDI_ANNOTATION.to_string(),
            r#"[{"op":"add","path":"/metadata/labels/x","value":"y"}]"#.to_string(),
        );
        assert!(matches!(
            new_cdi(&hc, &cfg()),
            Err(ControllerError::JsonPatch { .. })
        ));
    }
}
