//! Deployments.
//!
//! Only the scheduling and container fields the operator renders are
//! compared; the selector is immutable, so a change there recreates the
//! deployment.

use super::AuxObject;
use crate::labels::merge_managed_labels;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::PodSpec;

fn pod_spec(spec: Option<&DeploymentSpec>) -> Option<&PodSpec> {
    spec.and_then(|s| s.template.spec.as_ref())
}

fn pod_fields_match(found: Option<&PodSpec>, required: Option<&PodSpec>) -> bool {
    match (found, required) {
        (None, None) => true,
        (Some(f), Some(r)) => {
            f.containers == r.containers
                && f.service_account_name == r.service_account_name
                && f.priority_class_name == r.priority_class_name
                && f.affinity == r.affinity
                && f.node_selector == r.node_selector
                && f.tolerations == r.tolerations
        }
        _ => false,
    }
}

fn has_correct_fields(found: &Deployment, required: &Deployment) -> bool {
    let f = found.spec.as_ref();
    let r = required.spec.as_ref();
    f.map(|s| &s.selector) == r.map(|s| &s.selector)
        && f.and_then(|s| s.replicas) == r.and_then(|s| s.replicas)
        && pod_fields_match(pod_spec(f), pod_spec(r))
}

impl AuxObject for Deployment {
    fn reconcile_fields(found: &mut Self, required: &Self) -> bool {
        let labels_changed = merge_managed_labels(&mut found.metadata, &required.metadata);
        if has_correct_fields(found, required) {
            return labels_changed;
        }
        found.spec.clone_from(&required.spec);
        true
    }

    fn must_recreate(found: &Self, required: &Self) -> bool {
        found.spec.as_ref().map(|s| &s.selector) != required.spec.as_ref().map(|s| &s.selector)
    }
}
