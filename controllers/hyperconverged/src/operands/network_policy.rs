//! NetworkPolicies.

use super::AuxObject;
use crate::labels::merge_managed_labels;
use k8s_openapi::api::networking::v1::NetworkPolicy;

impl AuxObject for NetworkPolicy {
    fn reconcile_fields(found: &mut Self, required: &Self) -> bool {
        let mut changed = merge_managed_labels(&mut found.metadata, &required.metadata);
        if found.spec != required.spec {
            found.spec.clone_from(&required.spec);
            changed = true;
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::networking::v1::NetworkPolicySpec;

    #[test]
    fn test_spec_restored() {
        let required = NetworkPolicy {
            spec: Some(NetworkPolicySpec {
                policy_types: Some(vec!["Ingress".to_string()]),
                ..Default::default()
            }),
            ..Default::default()
        };
        let mut found = NetworkPolicy::default();
        assert!(NetworkPolicy::reconcile_fields(&mut found, &required));
        assert_eq!(found.spec, required.spec);
    }
}
