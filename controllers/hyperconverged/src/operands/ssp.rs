//! SSP operand.
//!
//! Besides the template validator and the common templates namespace, the
//! SSP CR carries the golden-image import schedules. The effective list is
//! the shipped common templates (unless the import is switched off), possibly
//! customised by same-named entries of the HyperConverged spec, plus the
//! user's own templates. The list is also reported in the HyperConverged
//! status.

use super::{
    check_component_version, hc_namespace, update_spec_and_labels, GenericOperand, ObjectIdentity, OperandHooks,
    SpecCache,
};
use crate::config::OperatorConfig;
use crate::error::ControllerError;
use crate::labels::{managed_labels, AppComponent};
use crate::patch::apply_annotation_patch;
use crate::placement;
use crate::request::HcoRequest;
use crate::tls;
use async_trait::async_trait;
use cluster_store::ObjectStore;
use hco_crds::{
    CommonTemplates, Condition, DataImportCronStatus, DataImportCronTemplate, DataImportCronTemplateStatus,
    HyperConverged, SspSpec, TemplateValidator, TokenGenerationService, JSON_PATCH_SSP_ANNOTATION, SSP,
};
use kube::ResourceExt;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Replicas of the template validator.
pub const DEFAULT_TEMPLATE_VALIDATOR_REPLICAS: i32 = 2;
/// Namespace of the common templates unless the user picks another.
pub const DEFAULT_COMMON_TEMPLATES_NAMESPACE: &str = "openshift";
/// Asks CDI to bind the import PVC without waiting for a consumer.
pub const CDI_IMMEDIATE_BIND_ANNOTATION: &str = "cdi.kubevirt.io/storage.bind.immediate.requested";
/// Architectures a template can be imported for.
pub const MULTI_ARCH_DICT_ANNOTATION: &str = "ssp.kubevirt.io/dict.architectures";
/// `false` disables a template.
pub const DICT_ENABLED_ANNOTATION: &str = "dataimportcrontemplate.kubevirt.io/enable";

/// Shipped golden-image templates, keyed by name.
pub type CommonDicts = BTreeMap<String, DataImportCronTemplate>;

/// Name of the SSP CR for `hc`.
pub fn ssp_name(hc: &HyperConverged) -> String {
    format!("ssp-{}", hc.name_any())
}

fn is_enabled(dict: &DataImportCronTemplate) -> bool {
    dict.metadata
        .annotations
        .get(DICT_ENABLED_ANNOTATION)
        .is_none_or(|v| v.eq_ignore_ascii_case("true"))
}

fn schedule_is_missing(spec: Option<&Value>) -> bool {
    spec.and_then(|s| s.get("schedule"))
        .and_then(Value::as_str)
        .is_none_or(str::is_empty)
}

/// Applies a same-named HyperConverged entry to a common template.
/// Returns `None` when the user disabled the template.
fn customize_common(
    mut target: DataImportCronTemplateStatus,
    custom: &DataImportCronTemplate,
) -> Option<DataImportCronTemplateStatus> {
    if !is_enabled(custom) {
        return None;
    }

    let mut spec = custom.spec.clone();
    if schedule_is_missing(spec.as_ref()) {
        let common_schedule = target.template.spec.as_ref().and_then(|s| s.get("schedule")).cloned();
        if let (Some(Value::Object(map)), Some(schedule)) = (spec.as_mut(), common_schedule) {
            map.insert("schedule".to_string(), schedule);
        }
    }

    target
        .template
        .metadata
        .annotations
        .extend(custom.metadata.annotations.clone());
    target.template.spec = spec;
    target.template.metadata.namespace.clone_from(&custom.metadata.namespace);
    target.status.modified = true;
    Some(target)
}

/// The effective golden-image templates for `hc`, sorted by name.
pub fn data_import_cron_templates(
    hc: &HyperConverged,
    common: &CommonDicts,
) -> Result<Vec<DataImportCronTemplateStatus>, ControllerError> {
    let mut custom: BTreeMap<&str, &DataImportCronTemplate> = BTreeMap::new();
    for dict in &hc.spec.data_import_cron_templates {
        if custom.insert(dict.metadata.name.as_str(), dict).is_some() {
            return Err(ControllerError::Build(format!(
                "{} DataImportCronTable is already defined",
                dict.metadata.name
            )));
        }
    }

    let mut list = Vec::new();
    if hc.spec.enable_common_boot_image_import != Some(false) {
        let boot_image_namespace = hc.spec.common_boot_image_namespace.as_deref().filter(|ns| !ns.is_empty());
        for (name, dict) in common {
            let mut target = DataImportCronTemplateStatus {
                template: dict.clone(),
                status: DataImportCronStatus {
                    common_template: true,
                    modified: false,
                },
            };
            match custom.get(name.as_str()) {
                Some(custom_dict) => match customize_common(target, custom_dict) {
                    Some(customized) => list.push(customized),
                    None => continue,
                },
                None => {
                    if let Some(ns) = boot_image_namespace {
                        target.template.metadata.namespace = Some(ns.to_string());
                    }
                    list.push(target);
                }
            }
        }
    }

    for (name, dict) in &custom {
        if is_enabled(dict) && !common.contains_key(*name) {
            list.push(DataImportCronTemplateStatus {
                template: (*dict).clone(),
                status: DataImportCronStatus::default(),
            });
        }
    }

    list.sort_by(|a, b| a.template.metadata.name.cmp(&b.template.metadata.name));
    Ok(list)
}

fn to_ssp_dict(status: &DataImportCronTemplateStatus, multi_arch: bool) -> DataImportCronTemplate {
    let mut dict = status.template.clone();
    dict.metadata
        .annotations
        .entry(CDI_IMMEDIATE_BIND_ANNOTATION.to_string())
        .or_insert_with(|| "true".to_string());
    if !multi_arch {
        dict.metadata.annotations.remove(MULTI_ARCH_DICT_ANNOTATION);
    }
    dict
}

/// A rendered SSP together with the template statuses it was built from.
#[derive(Debug)]
pub struct RenderedSsp {
    pub ssp: Arc<SSP>,
    pub dict_statuses: Vec<DataImportCronTemplateStatus>,
}

/// Renders the required SSP CR and the golden-image statuses.
pub fn new_ssp(hc: &HyperConverged, cfg: &OperatorConfig, common: &CommonDicts) -> Result<RenderedSsp, ControllerError> {
    let dict_statuses = data_import_cron_templates(hc, common)?;
    let multi_arch = hc.spec.feature_gates.enable_multi_arch_boot_image_import == Some(true);

    let spec = SspSpec {
        template_validator: Some(TemplateValidator {
            replicas: Some(DEFAULT_TEMPLATE_VALIDATOR_REPLICAS),
            placement: placement::infra(hc).cloned(),
        }),
        common_templates: CommonTemplates {
            namespace: hc
                .spec
                .common_templates_namespace
                .clone()
                .unwrap_or_else(|| DEFAULT_COMMON_TEMPLATES_NAMESPACE.to_string()),
            data_import_cron_templates: dict_statuses.iter().map(|s| to_ssp_dict(s, multi_arch)).collect(),
        },
        enable_multiple_architectures: hc.spec.feature_gates.enable_multi_arch_boot_image_import,
        tls_security_profile: Some(tls::effective_profile(hc)),
        token_generation_service: hc
            .spec
            .deploy_vm_console_proxy
            .map(|enabled| TokenGenerationService { enabled }),
    };

    let mut ssp = SSP::new(&ssp_name(hc), spec);
    ssp.metadata.namespace = Some(hc_namespace(hc, cfg).to_string());
    ssp.metadata.labels = Some(managed_labels(&hc.name_any(), &cfg.operator_version, AppComponent::Schedule));

    let ssp = apply_annotation_patch(ssp, hc, JSON_PATCH_SSP_ANNOTATION)?;
    Ok(RenderedSsp {
        ssp: Arc::new(ssp),
        dict_statuses,
    })
}

/// Hooks for the SSP CR.
pub struct SspHooks {
    cfg: Arc<OperatorConfig>,
    common: Arc<CommonDicts>,
    cache: SpecCache<RenderedSsp>,
}

impl SspHooks {
    pub fn new(cfg: Arc<OperatorConfig>, common: Arc<CommonDicts>) -> Self {
        Self {
            cfg,
            common,
            cache: SpecCache::new(),
        }
    }
}

#[async_trait]
impl OperandHooks for SspHooks {
    type Cr = SSP;

    fn full_cr(&self, hc: &HyperConverged) -> Result<Arc<SSP>, ControllerError> {
        let rendered = self.cache.get_or_try_build(|| new_ssp(hc, &self.cfg, &self.common))?;
        Ok(Arc::clone(&rendered.ssp))
    }

    async fn update_cr(
        &self,
        req: &mut HcoRequest,
        store: &dyn ObjectStore,
        found: &mut SSP,
        required: &SSP,
    ) -> Result<(bool, bool), ControllerError> {
        update_spec_and_labels(req, store, found, required).await
    }

    fn conditions(&self, found: &SSP) -> Option<Vec<Condition>> {
        Some(found.status.as_ref().map(|s| s.conditions.clone()).unwrap_or_default())
    }

    fn check_component_version(&self, found: &SSP) -> bool {
        let observed = found.status.as_ref().and_then(|s| s.observed_version.as_deref());
        check_component_version(&self.cfg.versions.ssp, observed)
    }

    fn just_before_complete(&self, req: &mut HcoRequest) {
        let Some(rendered) = self.cache.peek() else {
            return;
        };
        let status = req.instance.status.get_or_insert_with(Default::default);
        if status.data_import_cron_templates != rendered.dict_statuses {
            status.data_import_cron_templates.clone_from(&rendered.dict_statuses);
            req.status_dirty = true;
        }
    }

    fn reset(&self) {
        self.cache.reset();
    }

    fn identity(&self, hc: &HyperConverged) -> Option<ObjectIdentity> {
        Some(ObjectIdentity::named::<SSP>(Some(hc_namespace(hc, &self.cfg)), &ssp_name(hc)))
    }
}

/// The SSP operand.
pub type SspOperand = GenericOperand<SspHooks>;

pub fn new_operand(store: Arc<dyn ObjectStore>, cfg: Arc<OperatorConfig>, common: Arc<CommonDicts>) -> SspOperand {
    GenericOperand::new(store, SspHooks::new(cfg, common))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hco_crds::DataImportCronTemplateMeta;
    use serde_json::json;

    fn dict(name: &str, spec: Value) -> DataImportCronTemplate {
        DataImportCronTemplate {
            metadata: DataImportCronTemplateMeta {
                name: name.to_string(),
                ..Default::default()
            },
            spec: Some(spec),
        }
    }

    fn common() -> CommonDicts {
        BTreeMap::from([
            (
                "fedora-image-cron".to_string(),
                dict("fedora-image-cron", json!({"schedule": "0 */12 * * *", "managedDataSource": "fedora"})),
            ),
            (
                "centos-stream9-image-cron".to_string(),
                dict("centos-stream9-image-cron", json!({"schedule": "0 */12 * * *"})),
            ),
        ])
    }

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
        let rendered = new_ssp(&hc(), &cfg(), &common()).unwrap();
        let ssp = rendered.ssp;
        assert_eq!(ssp.name_any(), "ssp-kubevirt-hyperconverged");
        assert_eq!(ssp.metadata.namespace.as_deref(), Some("kubevirt-hyperconverged"));
        assert_eq!(ssp.labels()["app.kubernetes.io/component"], "schedule");
        assert_eq!(ssp.spec.template_validator.as_ref().unwrap().replicas, Some(2));
        assert_eq!(ssp.spec.common_templates.namespace, "openshift");
        assert!(ssp.spec.token_generation_service.is_none());

        // common templates are on by default, sorted by name
        let dicts = &ssp.spec.common_templates.data_import_cron_templates;
        assert_eq!(dicts.len(), 2);
        assert_eq!(dicts[0].metadata.name, "centos-stream9-image-cron");
        assert_eq!(dicts[0].metadata.annotations[CDI_IMMEDIATE_BIND_ANNOTATION], "true");
        assert!(rendered.dict_statuses.iter().all(|s| s.status.common_template));
    }

    #[test]
    fn test_common_import_disabled() {
        let mut hc = hc();
        hc.spec.enable_common_boot_image_import = Some(false);
        hc.spec.data_import_cron_templates = vec![dict("custom", json!({"schedule": "1 1 * * *"}))];
        let statuses = data_import_cron_templates(&hc, &common()).unwrap();
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].template.metadata.name, "custom");
        assert!(!statuses[0].status.common_template);
    }

    #[test]
    fn test_customized_common_template() {
        let mut hc = hc();
        let mut custom = dict("fedora-image-cron", json!({"managedDataSource": "my-fedora"}));
        custom.metadata.namespace = Some("golden".to_string());
        custom
            .metadata
            .annotations
            .insert("user".to_string(), "annotation".to_string());
        hc.spec.data_import_cron_templates = vec![custom];

        let statuses = data_import_cron_templates(&hc, &common()).unwrap();
        let fedora = statuses
            .iter()
            .find(|s| s.template.metadata.name == "fedora-image-cron")
            .unwrap();
        assert!(fedora.status.common_template);
        assert!(fedora.status.modified);
        assert_eq!(fedora.template.metadata.namespace.as_deref(), Some("golden"));
        let spec = fedora.template.spec.as_ref().unwrap();
        assert_eq!(spec["managedDataSource"], "my-fedora");
        // schedule copied from the common template
        assert_eq!(spec["schedule"], "0 */12 * * *");
        assert_eq!(fedora.template.metadata.annotations["user"], "annotation");
    }

    #[test]
    fn test_disabled_templates_are_dropped() {
        let mut hc = hc();
        let mut disabled_common = dict("fedora-image-cron", json!({}));
        disabled_common
            .metadata
            .annotations
            .insert(DICT_ENABLED_ANNOTATION.to_string(), "false".to_string());
        let mut disabled_custom = dict("custom", json!({}));
        disabled_custom
            .metadata
            .annotations
            .insert(DICT_ENABLED_ANNOTATION.to_string(), "False".to_string());
        hc.spec.data_import_cron_templates = vec![disabled_common, disabled_custom];

        let statuses = data_import_cron_templates(&hc, &common()).unwrap();
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].template.metadata.name, "centos-stream9-image-cron");
    }

    #[test]
    fn test_boot_image_namespace() {
        let mut hc = hc();
        hc.spec.common_boot_image_namespace = Some("images".to_string());
        let statuses = data_import_cron_templates(&hc, &common()).unwrap();
        assert!(statuses
            .iter()
            .all(|s| s.template.metadata.namespace.as_deref() == Some("images")));
    }

    #[test]
    fn test_duplicate_custom_templates() {
        let mut hc = hc();
        hc.spec.data_import_cron_templates = vec![dict("dup", json!({})), dict("dup", json!({}))];
        assert_eq!(
            data_import_cron_templates(&hc, &common()).unwrap_err().to_string(),
            "dup DataImportCronTable is already defined"
        );
    }

    #[test]
    fn test_multi_arch_annotation() {
        let mut common = common();
        common
            .get_mut("fedora-image-cron")
            .unwrap()
            .metadata
            .annotations
            .insert(MULTI_ARCH_DICT_ANNOTATION.to_string(), "amd64,arm64".to_string());

        let mut hc = hc();
        let ssp = new_ssp(&hc, &cfg(), &common).unwrap().ssp;
        let fedora = &ssp.spec.common_templates.data_import_cron_templates[1];
        assert!(!fedora.metadata.annotations.contains_key(MULTI_ARCH_DICT_ANNOTATION));

        hc.spec.feature_gates.enable_multi_arch_boot_image_import = Some(true);
        let ssp = new_ssp(&hc, &cfg(), &common).unwrap().ssp;
        let fedora = &ssp.spec.common_templates.data_import_cron_templates[1];
        assert_eq!(fedora.metadata.annotations[MULTI_ARCH_DICT_ANNOTATION], "amd64,arm64");
        assert_eq!(ssp.spec.enable_multiple_architectures, Some(true));
    }

    #[test]
    fn test_status_written_before_complete() {
        let hooks = SspHooks::new(Arc::new(cfg()), Arc::new(common()));
        let mut req = HcoRequest::new(hc());
        hooks.full_cr(&req.instance.clone()).unwrap();

        hooks.just_before_complete(&mut req);
        assert!(req.status_dirty);
        assert_eq!(req.instance.status.as_ref().unwrap().data_import_cron_templates.len(), 2);

        req.status_dirty = false;
        hooks.just_before_complete(&mut req);
        assert!(!req.status_dirty);
    }
}
