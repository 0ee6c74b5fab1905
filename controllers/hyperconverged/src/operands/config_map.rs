//! ConfigMap drift rules.
//!
//! Data is owned by the operator, except for the UI configuration maps whose
//! contents belong to the users; there only the managed labels are enforced.

use super::AuxObject;
use crate::labels::{merge_managed_labels, AppComponent, APP_LABEL_COMPONENT};
use k8s_openapi::api::core::v1::ConfigMap;

fn is_user_owned(cm: &ConfigMap) -> bool {
    cm.metadata
        .labels
        .as_ref()
        .and_then(|l| l.get(APP_LABEL_COMPONENT))
        .is_some_and(|c| c == AppComponent::UiConfig.as_str())
}

impl AuxObject for ConfigMap {
    fn reconcile_fields(found: &mut Self, required: &Self) -> bool {
        let mut changed = merge_managed_labels(&mut found.metadata, &required.metadata);
        if is_user_owned(found) {
            return changed;
        }
        if found.data != required.data {
            found.data.clone_from(&required.data);
            changed = true;
        }
        if found.binary_data != required.binary_data {
            found.binary_data.clone_from(&required.binary_data);
            changed = true;
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::managed_labels;
    use std::collections::BTreeMap;

    fn cm(component: AppComponent, data: &[(&str, &str)]) -> ConfigMap {
        let mut cm = ConfigMap::default();
        cm.metadata.name = Some("cm".to_string());
        cm.metadata.labels = Some(managed_labels("kubevirt-hyperconverged", "1.2.3", component));
        cm.data = Some(data.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect());
        cm
    }

    #[test]
    fn test_data_is_restored() {
        let required = cm(AppComponent::Deployment, &[("key", "value")]);
        let mut found = cm(AppComponent::Deployment, &[("key", "edited")]);
        found
            .metadata
            .labels
            .get_or_insert_with(BTreeMap::new)
            .insert("user".to_string(), "label".to_string());

        assert!(ConfigMap::reconcile_fields(&mut found, &required));
        assert_eq!(found.data, required.data);
        assert_eq!(found.metadata.labels.as_ref().unwrap()["user"], "label");
        assert!(!ConfigMap::reconcile_fields(&mut found, &required));
    }

    #[test]
    fn test_user_settings_are_kept() {
        let required = cm(AppComponent::UiConfig, &[]);
        let mut found = cm(AppComponent::UiConfig, &[("theme", "dark")]);
        assert!(!ConfigMap::reconcile_fields(&mut found, &required));
        assert_eq!(found.data.as_ref().unwrap()["theme"], "dark");

        found.metadata.labels.as_mut().unwrap().remove("app.kubernetes.io/version");
        assert!(ConfigMap::reconcile_fields(&mut found, &required));
        assert_eq!(found.data.as_ref().unwrap()["theme"], "dark");
    }
}
