//! Related-objects bookkeeping.
//!
//! `status.relatedObjects` of the HyperConverged resource is the ownership
//! ledger for everything the operator produces, including the cluster-scoped
//! objects an owner reference cannot cover. It holds at most one entry per
//! `(apiVersion, kind, namespace, name)`.

use k8s_openapi::api::core::v1::ObjectReference;
use kube::Resource;

/// Reference to a stored object, including uid and resource version.
pub fn object_reference<K: Resource<DynamicType = ()>>(obj: &K) -> ObjectReference {
    ObjectReference {
        resource_version: obj.meta().resource_version.clone(),
        ..obj.object_ref(&())
    }
}

fn same_identity(a: &ObjectReference, b: &ObjectReference) -> bool {
    a.api_version == b.api_version && a.kind == b.kind && a.namespace == b.namespace && a.name == b.name
}

/// Adds `reference`, or refreshes the entry with the same identity.
/// Returns true when the list changed.
pub fn add_related_object(list: &mut Vec<ObjectReference>, reference: ObjectReference) -> bool {
    match list.iter_mut().find(|r| same_identity(r, &reference)) {
        Some(existing) if *existing == reference => false,
        Some(existing) => {
            *existing = reference;
            true
        }
        None => {
            list.push(reference);
            true
        }
    }
}

/// Removes the entry with the identity of `reference`. Returns true when one was removed.
pub fn remove_related_object(list: &mut Vec<ObjectReference>, reference: &ObjectReference) -> bool {
    let before = list.len();
    list.retain(|r| !same_identity(r, reference));
    before != list.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(kind: &str, name: &str, rv: &str) -> ObjectReference {
        ObjectReference {
            api_version: Some("v1".to_string()),
            kind: Some(kind.to_string()),
            name: Some(name.to_string()),
            namespace: Some("ns".to_string()),
            resource_version: Some(rv.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_add_is_set_like() {
        let mut list = Vec::new();
        assert!(add_related_object(&mut list, reference("ConfigMap", "a", "1")));
        assert!(!add_related_object(&mut list, reference("ConfigMap", "a", "1")));
        assert!(add_related_object(&mut list, reference("ConfigMap", "b", "1")));
        assert!(add_related_object(&mut list, reference("Service", "a", "1")));
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn test_resource_version_refresh_replaces_in_place() {
        let mut list = vec![reference("ConfigMap", "a", "1"), reference("ConfigMap", "b", "1")];
        assert!(add_related_object(&mut list, reference("ConfigMap", "a", "7")));
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].resource_version.as_deref(), Some("7"));
        assert_eq!(list[1].name.as_deref(), Some("b"));
    }

    #[test]
    fn test_reference_carries_uid_and_resource_version() {
        use k8s_openapi::api::core::v1::ConfigMap;
        use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

        let cm = ConfigMap {
            metadata: ObjectMeta {
                name: Some("kubevirt-storage-class-defaults".to_string()),
                namespace: Some("ns".to_string()),
                uid: Some("1234".to_string()),
                resource_version: Some("42".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        let reference = object_reference(&cm);
        assert_eq!(reference.kind.as_deref(), Some("ConfigMap"));
        assert_eq!(reference.api_version.as_deref(), Some("v1"));
        assert_eq!(reference.uid.as_deref(), Some("1234"));
        assert_eq!(reference.resource_version.as_deref(), Some("42"));
    }

    #[test]
    fn test_remove() {
        let mut list = vec![reference("ConfigMap", "a", "1")];
        assert!(!remove_related_object(&mut list, &reference("ConfigMap", "b", "1")));
        assert!(remove_related_object(&mut list, &reference("ConfigMap", "a", "9")));
        assert!(list.is_empty());
    }
}
