//! Roles and RoleBindings.

use super::AuxObject;
use crate::labels::merge_managed_labels;
use k8s_openapi::api::rbac::v1::{PolicyRule, Role, RoleBinding, RoleRef, Subject};
use kube::api::ObjectMeta;
use std::collections::BTreeMap;

pub const RBAC_API_GROUP: &str = "rbac.authorization.k8s.io";
pub const AUTHENTICATED_GROUP: &str = "system:authenticated";

impl AuxObject for Role {
    fn reconcile_fields(found: &mut Self, required: &Self) -> bool {
        let mut changed = merge_managed_labels(&mut found.metadata, &required.metadata);
        if found.rules != required.rules {
            found.rules.clone_from(&required.rules);
            changed = true;
        }
        changed
    }
}

impl AuxObject for RoleBinding {
    fn reconcile_fields(found: &mut Self, required: &Self) -> bool {
        let mut changed = merge_managed_labels(&mut found.metadata, &required.metadata);
        if found.subjects != required.subjects {
            found.subjects.clone_from(&required.subjects);
            changed = true;
        }
        if found.role_ref != required.role_ref {
            found.role_ref = required.role_ref.clone();
            changed = true;
        }
        changed
    }

    // roleRef cannot be changed in place
    fn must_recreate(found: &Self, required: &Self) -> bool {
        found.role_ref != required.role_ref
    }
}

/// A role granting `get` on exactly one object.
pub fn named_reader_role(
    name: &str,
    namespace: &str,
    labels: BTreeMap<String, String>,
    resource: &str,
    resource_names: &[&str],
) -> Role {
    Role {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(labels),
            ..Default::default()
        },
        rules: Some(vec![PolicyRule {
            api_groups: Some(vec![String::new()]),
            resources: Some(vec![resource.to_string()]),
            resource_names: Some(resource_names.iter().map(|n| (*n).to_string()).collect()),
            verbs: vec!["get".to_string()],
            ..Default::default()
        }]),
    }
}

/// Binds the role `name` to every authenticated user.
pub fn authenticated_role_binding(name: &str, namespace: &str, labels: BTreeMap<String, String>) -> RoleBinding {
    RoleBinding {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(labels),
            ..Default::default()
        },
        role_ref: RoleRef {
            api_group: RBAC_API_GROUP.to_string(),
            kind: "Role".to_string(),
            name: name.to_string(),
        },
        subjects: Some(vec![Subject {
            api_group: Some(RBAC_API_GROUP.to_string()),
            kind: "Group".to_string(),
            name: AUTHENTICATED_GROUP.to_string(),
            namespace: None,
        }]),
    }
}
