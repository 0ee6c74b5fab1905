//! ServiceAccounts: only the managed labels are enforced.

use super::AuxObject;
use crate::labels::merge_managed_labels;
use k8s_openapi::api::core::v1::ServiceAccount;
use kube::api::ObjectMeta;
use std::collections::BTreeMap;

impl AuxObject for ServiceAccount {
    fn reconcile_fields(found: &mut Self, required: &Self) -> bool {
        merge_managed_labels(&mut found.metadata, &required.metadata)
    }
}

pub fn new_service_account(name: &str, namespace: &str, labels: BTreeMap<String, String>) -> ServiceAccount {
    ServiceAccount {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(labels),
            ..Default::default()
        },
        ..Default::default()
    }
}
