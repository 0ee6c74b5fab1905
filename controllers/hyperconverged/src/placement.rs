//! Node placement propagation.

use hco_crds::{HyperConverged, HyperConvergedConfig, NodePlacement};
use k8s_openapi::api::core::v1::PodSpec;

fn non_empty(config: &HyperConvergedConfig) -> Option<&NodePlacement> {
    config.node_placement.as_ref().filter(|p| !p.is_empty())
}

/// Placement for infrastructure pods, if the user set any constraint.
pub fn infra(hc: &HyperConverged) -> Option<&NodePlacement> {
    non_empty(&hc.spec.infra)
}

/// Placement for workload-facing pods, if the user set any constraint.
pub fn workloads(hc: &HyperConverged) -> Option<&NodePlacement> {
    non_empty(&hc.spec.workloads)
}

/// Copies `placement` into a pod template spec.
pub fn apply_to_pod_spec(spec: &mut PodSpec, placement: Option<&NodePlacement>) {
    let Some(placement) = placement else {
        return;
    };
    spec.node_selector.clone_from(&placement.node_selector);
    spec.affinity.clone_from(&placement.affinity);
    if !placement.tolerations.is_empty() {
        spec.tolerations = Some(placement.tolerations.clone());
    }
}
