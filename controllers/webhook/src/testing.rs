//! Admission fixtures shared by the handler tests.

use crate::WebhookState;
use cluster_store::{typed, MockObjectStore, ObjectStore};
use hco_crds::{HyperConverged, HYPERCONVERGED_NAME};
use hco_operator::operands::ssp::CommonDicts;
use hco_operator::OperatorConfig;
use kube::api::DynamicObject;
use kube::core::admission::{AdmissionRequest, AdmissionReview};
use serde_json::{json, Value};
use std::sync::Arc;

pub const NAMESPACE: &str = "kubevirt-hyperconverged";

pub fn config() -> OperatorConfig {
    OperatorConfig::for_namespace(NAMESPACE, "1.2.3")
}

pub fn state_with(mock: &MockObjectStore, cfg: OperatorConfig) -> WebhookState {
    let store: Arc<dyn ObjectStore> = Arc::new(mock.clone());
    WebhookState::new(store, Arc::new(cfg), CommonDicts::new())
}

pub fn state(mock: &MockObjectStore) -> WebhookState {
    state_with(mock, config())
}

pub fn hc() -> HyperConverged {
    let mut hc = HyperConverged::new(HYPERCONVERGED_NAME, Default::default());
    hc.metadata.namespace = Some(NAMESPACE.to_string());
    hc
}

pub fn review_json(
    operation: &str,
    (group, version, kind, plural): (&str, &str, &str, &str),
    name: &str,
    namespace: Option<&str>,
    object: Option<Value>,
    old_object: Option<Value>,
) -> Value {
    let mut request = json!({
        "uid": "705ab4f5-6393-11e8-b7cc-42010a800002",
        "kind": {"group": group, "version": version, "kind": kind},
        "resource": {"group": group, "version": version, "resource": plural},
        "operation": operation,
        "userInfo": {"username": "admin"},
        "name": name,
        "dryRun": false,
    });
    if let Some(ns) = namespace {
        request["namespace"] = json!(ns);
    }
    if let Some(object) = object {
        request["object"] = object;
    }
    if let Some(old_object) = old_object {
        request["oldObject"] = old_object;
    }
    json!({
        "apiVersion": "admission.k8s.io/v1",
        "kind": "AdmissionReview",
        "request": request,
    })
}

pub fn hc_review(operation: &str, object: Option<&HyperConverged>, old_object: Option<&HyperConverged>) -> Value {
    let to_json = |hc: &HyperConverged| serde_json::to_value(typed::to_dynamic(hc).unwrap()).unwrap();
    review_json(
        operation,
        ("hco.kubevirt.io", "v1beta1", "HyperConverged", "hyperconvergeds"),
        HYPERCONVERGED_NAME,
        Some(NAMESPACE),
        object.map(to_json),
        old_object.map(to_json),
    )
}

pub fn request(review: Value) -> AdmissionRequest<DynamicObject> {
    let review: AdmissionReview<DynamicObject> = serde_json::from_value(review).unwrap();
    review.try_into().unwrap()
}

pub fn hc_request(
    operation: &str,
    object: Option<&HyperConverged>,
    old_object: Option<&HyperConverged>,
) -> AdmissionRequest<DynamicObject> {
    request(hc_review(operation, object, old_object))
}
