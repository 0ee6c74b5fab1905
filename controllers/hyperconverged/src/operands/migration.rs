//! Migration controller operand.

use super::{check_component_version, update_spec_and_labels, GenericOperand, ObjectIdentity, OperandHooks, SpecCache};
use crate::config::OperatorConfig;
use crate::error::ControllerError;
use crate::labels::{managed_labels, AppComponent};
use crate::placement;
use crate::request::HcoRequest;
use async_trait::async_trait;
use cluster_store::ObjectStore;
use hco_crds::{Condition, HyperConverged, MigController, MigControllerSpec};
use kube::ResourceExt;
use std::sync::Arc;

pub const DEFAULT_IMAGE_PULL_POLICY: &str = "IfNotPresent";

pub fn mig_controller_name(hc: &HyperConverged) -> String {
    format!("migcontroller-{}", hc.name_any())
}

/// Renders the required MigController CR.
pub fn new_mig_controller(hc: &HyperConverged, cfg: &OperatorConfig) -> MigController {
    let spec = MigControllerSpec {
        image_pull_policy: Some(DEFAULT_IMAGE_PULL_POLICY.to_string()),
        infra: placement::infra(hc).cloned().unwrap_or_default(),
    };

    let mut mig = MigController::new(&mig_controller_name(hc), spec);
    mig.metadata.labels = Some(managed_labels(&hc.name_any(), &cfg.operator_version, AppComponent::Migration));
    mig
}

pub struct MigrationHooks {
    cfg: Arc<OperatorConfig>,
    cache: SpecCache<MigController>,
}

impl MigrationHooks {
    pub fn new(cfg: Arc<OperatorConfig>) -> Self {
        Self {
            cfg,
            cache: SpecCache::new(),
        }
    }
}

#[async_trait]
impl OperandHooks for MigrationHooks {
    type Cr = MigController;

    fn full_cr(&self, hc: &HyperConverged) -> Result<Arc<MigController>, ControllerError> {
        self.cache.get_or_try_build(|| Ok(new_mig_controller(hc, &self.cfg)))
    }

    async fn update_cr(
        &self,
        req: &mut HcoRequest,
        store: &dyn ObjectStore,
        found: &mut MigController,
        required: &MigController,
    ) -> Result<(bool, bool), ControllerError> {
        update_spec_and_labels(req, store, found, required).await
    }

    fn conditions(&self, found: &MigController) -> Option<Vec<Condition>> {
        Some(found.status.as_ref().map(|s| s.conditions.clone()).unwrap_or_default())
    }

    fn check_component_version(&self, found: &MigController) -> bool {
        let observed = found.status.as_ref().and_then(|s| s.observed_version.as_deref());
        check_component_version(&self.cfg.versions.migration, observed)
    }

    fn reset(&self) {
        self.cache.reset();
    }

    fn identity(&self, hc: &HyperConverged) -> Option<ObjectIdentity> {
        Some(ObjectIdentity::named::<MigController>(None, &mig_controller_name(hc)))
    }
}

pub type MigrationOperand = GenericOperand<MigrationHooks>;

pub fn new_operand(store: Arc<dyn ObjectStore>, cfg: Arc<OperatorConfig>) -> MigrationOperand {
    GenericOperand::new(store, MigrationHooks::new(cfg))
}
