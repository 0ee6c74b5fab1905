//! Console quick-start guides shipped as manifests.

use super::{aux_operand, AuxObject, Operand};
use crate::assets;
use crate::config::OperatorConfig;
use crate::error::ControllerError;
use crate::labels::{managed_labels, managed_labels_match, merge_managed_labels, AppComponent};
use cluster_store::ObjectStore;
use hco_crds::ConsoleQuickStart;
use kube::ResourceExt;
use std::sync::Arc;

impl AuxObject for ConsoleQuickStart {
    fn reconcile_fields(found: &mut Self, required: &Self) -> bool {
        if found.spec == required.spec && managed_labels_match(&found.metadata, &required.metadata) {
            return false;
        }
        merge_managed_labels(&mut found.metadata, &required.metadata);
        found.spec.clone_from(&required.spec);
        true
    }
}

/// One operand per ConsoleQuickStart manifest in the configured directory.
pub fn operands(
    store: &Arc<dyn ObjectStore>,
    cfg: &Arc<OperatorConfig>,
) -> Result<Vec<Box<dyn Operand>>, ControllerError> {
    let guides = assets::load_objects::<ConsoleQuickStart>(cfg.assets.quick_starts.as_deref())?;
    Ok(guides
        .into_iter()
        .map(|guide| {
            let version = cfg.operator_version.clone();
            aux_operand(store, false, move |hc| {
                let mut qs = guide.clone();
                qs.metadata.labels = Some(managed_labels(&hc.name_any(), &version, AppComponent::Compute));
                Ok(qs)
            })
        })
        .collect())
}
