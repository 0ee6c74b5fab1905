//! Managed labels.
//!
//! Every object the operator produces carries five well-known labels. Other
//! labels on an observed object belong to the user and survive reconciles.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;

pub const APP_LABEL: &str = "app";
pub const APP_LABEL_MANAGED_BY: &str = "app.kubernetes.io/managed-by";
pub const APP_LABEL_PART_OF: &str = "app.kubernetes.io/part-of";
pub const APP_LABEL_VERSION: &str = "app.kubernetes.io/version";
pub const APP_LABEL_COMPONENT: &str = "app.kubernetes.io/component";

/// Value of the managed-by label.
pub const MANAGED_BY: &str = "hco-operator";
/// Value of the part-of label.
pub const PART_OF: &str = "hyperconverged-cluster";

/// Keys owned by the operator.
pub const MANAGED_LABEL_KEYS: [&str; 5] = [
    APP_LABEL,
    APP_LABEL_MANAGED_BY,
    APP_LABEL_PART_OF,
    APP_LABEL_VERSION,
    APP_LABEL_COMPONENT,
];

/// Component label values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppComponent {
    Compute,
    Storage,
    Network,
    Schedule,
    Migration,
    Deployment,
    UiPlugin,
    UiProxy,
    UiConfig,
}

impl AppComponent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Compute => "compute",
            Self::Storage => "storage",
            Self::Network => "network",
            Self::Schedule => "schedule",
            Self::Migration => "migration",
            Self::Deployment => "deployment",
            Self::UiPlugin => "kubevirt-console-plugin",
            Self::UiProxy => "kubevirt-apiserver-proxy",
            Self::UiConfig => "kubevirt-ui-config",
        }
    }
}

/// The managed label set for an object of `component`.
pub fn managed_labels(hc_name: &str, version: &str, component: AppComponent) -> BTreeMap<String, String> {
    let hc_name = if hc_name.is_empty() {
        hco_crds::HYPERCONVERGED_NAME
    } else {
        hc_name
    };
    BTreeMap::from([
        (APP_LABEL.to_string(), hc_name.to_string()),
        (APP_LABEL_MANAGED_BY.to_string(), MANAGED_BY.to_string()),
        (APP_LABEL_PART_OF.to_string(), PART_OF.to_string()),
        (APP_LABEL_VERSION.to_string(), version.to_string()),
        (APP_LABEL_COMPONENT.to_string(), component.as_str().to_string()),
    ])
}

/// True when every managed key present in `required` has the same value in `observed`.
pub fn managed_labels_match(observed: &ObjectMeta, required: &ObjectMeta) -> bool {
    let empty = BTreeMap::new();
    let observed = observed.labels.as_ref().unwrap_or(&empty);
    let required = required.labels.as_ref().unwrap_or(&empty);
    MANAGED_LABEL_KEYS
        .iter()
        .filter_map(|k| required.get(*k).map(|v| (*k, v)))
        .all(|(k, v)| observed.get(k) == Some(v))
}

/// Copies the managed labels of `required` onto `observed`, leaving every
/// other label alone. Returns true when `observed` changed.
pub fn merge_managed_labels(observed: &mut ObjectMeta, required: &ObjectMeta) -> bool {
    let Some(required) = required.labels.as_ref() else {
        return false;
    };
    let labels = observed.labels.get_or_insert_with(BTreeMap::new);
    let mut changed = false;
    for key in MANAGED_LABEL_KEYS {
        if let Some(value) = required.get(key) {
            if labels.get(key) != Some(value) {
                labels.insert(key.to_string(), value.clone());
                changed = true;
            }
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(labels: &[(&str, &str)]) -> ObjectMeta {
        ObjectMeta {
            labels: Some(labels.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()),
            ..Default::default()
        }
    }

    #[test]
    fn test_managed_labels() {
        let labels = managed_labels("kubevirt-hyperconverged", "1.2.3", AppComponent::Storage);
        assert_eq!(labels.len(), 5);
        assert_eq!(labels[APP_LABEL], "kubevirt-hyperconverged");
        assert_eq!(labels[APP_LABEL_MANAGED_BY], "hco-operator");
        assert_eq!(labels[APP_LABEL_VERSION], "1.2.3");
        assert_eq!(labels[APP_LABEL_COMPONENT], "storage");

        let labels = managed_labels("", "1", AppComponent::Compute);
        assert_eq!(labels[APP_LABEL], hco_crds::HYPERCONVERGED_NAME);
    }

    #[test]
    fn test_user_labels_are_preserved() {
        let required = ObjectMeta {
            labels: Some(managed_labels("hc", "2", AppComponent::Compute)),
            ..Default::default()
        };
        let mut observed = meta(&[("user", "label"), (APP_LABEL_VERSION, "1"), (APP_LABEL, "hc")]);

        assert!(!managed_labels_match(&observed, &required));
        assert!(merge_managed_labels(&mut observed, &required));

        let labels = observed.labels.as_ref().unwrap();
        assert_eq!(labels["user"], "label");
        assert_eq!(labels[APP_LABEL_VERSION], "2");
        assert_eq!(labels.len(), 6);
        assert!(managed_labels_match(&observed, &required));
        assert!(!merge_managed_labels(&mut observed, &required));
    }

    #[test]
    fn test_user_only_difference_is_not_drift() {
        let required = ObjectMeta {
            labels: Some(managed_labels("hc", "2", AppComponent::Compute)),
            ..Default::default()
        };
        let mut observed = required.clone();
        observed
            .labels
            .as_mut()
            .unwrap()
            .insert("extra".to_string(), "x".to_string());
        assert!(managed_labels_match(&observed, &required));
    }

    #[test]
    fn test_missing_observed_labels() {
        let required = ObjectMeta {
            labels: Some(managed_labels("hc", "2", AppComponent::Network)),
            ..Default::default()
        };
        let mut observed = ObjectMeta::default();
        assert!(merge_managed_labels(&mut observed, &required));
        assert_eq!(observed.labels.unwrap().len(), 5);
    }
}
