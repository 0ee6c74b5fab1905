//! Services.
//!
//! `clusterIP` and friends are assigned by the API server, so only the
//! fields the operator sets are compared.

use super::AuxObject;
use crate::labels::merge_managed_labels;
use k8s_openapi::api::core::v1::{Service, ServiceSpec};

fn managed_spec_matches(found: Option<&ServiceSpec>, required: Option<&ServiceSpec>) -> bool {
    match (found, required) {
        (_, None) => true,
        (None, Some(_)) => false,
        (Some(f), Some(r)) => {
            f.ports == r.ports && f.selector == r.selector && (r.type_.is_none() || f.type_ == r.type_)
        }
    }
}

impl AuxObject for Service {
    fn reconcile_fields(found: &mut Self, required: &Self) -> bool {
        let mut changed = merge_managed_labels(&mut found.metadata, &required.metadata);

        if let Some(annotations) = required.metadata.annotations.as_ref() {
            let found_annotations = found.metadata.annotations.get_or_insert_with(Default::default);
            for (key, value) in annotations {
                if found_annotations.get(key) != Some(value) {
                    found_annotations.insert(key.clone(), value.clone());
                    changed = true;
                }
            }
        }

        if !managed_spec_matches(found.spec.as_ref(), required.spec.as_ref()) {
            if let Some(required_spec) = required.spec.as_ref() {
                let spec = found.spec.get_or_insert_with(Default::default);
                spec.ports.clone_from(&required_spec.ports);
                spec.selector.clone_from(&required_spec.selector);
                if required_spec.type_.is_some() {
                    spec.type_.clone_from(&required_spec.type_);
                }
            }
            changed = true;
        }
        changed
    }
}
