//! Mutating hook for the HyperConverged resource.
//!
//! Fills defaults on create and update so the stored object is canonical.
//! The patch is computed on the raw object: a field that is absent and a
//! field that is empty need different JSON pointers.

use crate::{admission_request, decode_hyperconverged, WebhookError, WebhookState};
use axum::{extract::State, Json};
use hco_crds::UninstallStrategy;
use hco_operator::operands::ssp::CDI_IMMEDIATE_BIND_ANNOTATION;
use hco_operator::OperatorConfig;
use json_patch::{AddOperation, PatchOperation};
use jsonptr::PointerBuf;
use kube::api::DynamicObject;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error, info};

pub const EVICTION_STRATEGY_LIVE_MIGRATE: &str = "LiveMigrate";
pub const EVICTION_STRATEGY_NONE: &str = "None";

/// Handle mutating admission review for HyperConverged (both API versions)
pub async fn mutate_handler(
    State(state): State<Arc<WebhookState>>,
    Json(body): Json<AdmissionReview<DynamicObject>>,
) -> Result<Json<AdmissionReview<DynamicObject>>, WebhookError> {
    let req = admission_request(body)?;
    Ok(Json(mutate(&state, &req).into_review()))
}

/// Mutates one request.
pub fn mutate(state: &WebhookState, req: &AdmissionRequest<DynamicObject>) -> AdmissionResponse {
    let response = AdmissionResponse::from(req);
    if !matches!(req.operation, Operation::Create | Operation::Update) {
        return response;
    }

    // refuse to default anything that is not a HyperConverged
    if let Err(e) = decode_hyperconverged(req.object.as_ref()) {
        error!(uid = %req.uid, error = %e, "Failed to parse the HyperConverged");
        return response.deny(e.to_string());
    }
    let Some(obj) = req.object.as_ref() else {
        return response;
    };

    let ops = default_patches(obj, &state.cfg);
    if ops.is_empty() {
        debug!(uid = %req.uid, "HyperConverged already canonical");
        return response;
    }

    info!(uid = %req.uid, patch_ops = ops.len(), "Applying defaults to HyperConverged");
    match AdmissionResponse::from(req).with_patch(json_patch::Patch(ops)) {
        Ok(response) => response,
        Err(e) => {
            error!(uid = %req.uid, error = %e, "Failed to serialize patch");
            response.deny(format!("patch serialization error: {e}"))
        }
    }
}

fn add<'t>(tokens: impl IntoIterator<Item = &'t str>, value: Value) -> PatchOperation {
    PatchOperation::Add(AddOperation {
        path: PointerBuf::from_tokens(tokens),
        value,
    })
}

fn is_unset(value: Option<&Value>) -> bool {
    value.is_none_or(Value::is_null)
}

/// Patch operations that bring `obj` to its canonical form.
pub fn default_patches(obj: &DynamicObject, cfg: &OperatorConfig) -> Vec<PatchOperation> {
    let mut ops = Vec::new();
    let spec = obj.data.get("spec");
    if is_unset(spec) {
        ops.push(add(["spec"], json!({})));
    }

    let templates = spec
        .and_then(|s| s.get("dataImportCronTemplates"))
        .and_then(Value::as_array);
    for (i, template) in templates.into_iter().flatten().enumerate() {
        let index = i.to_string();
        let base = ["spec", "dataImportCronTemplates", index.as_str()];
        let metadata = template.get("metadata");
        let annotations = metadata.and_then(|m| m.get("annotations")).and_then(Value::as_object);
        match (metadata, annotations) {
            (None, _) => ops.push(add(
                base.into_iter().chain(["metadata"]),
                json!({"annotations": {CDI_IMMEDIATE_BIND_ANNOTATION: "true"}}),
            )),
            (Some(_), None) => ops.push(add(
                base.into_iter().chain(["metadata", "annotations"]),
                json!({CDI_IMMEDIATE_BIND_ANNOTATION: "true"}),
            )),
            (Some(_), Some(a)) if !a.contains_key(CDI_IMMEDIATE_BIND_ANNOTATION) => ops.push(add(
                base.into_iter().chain(["metadata", "annotations", CDI_IMMEDIATE_BIND_ANNOTATION]),
                json!("true"),
            )),
            _ => {}
        }
    }

    if is_unset(spec.and_then(|s| s.get("evictionStrategy"))) {
        let strategy = if cfg.infrastructure_highly_available {
            EVICTION_STRATEGY_LIVE_MIGRATE
        } else {
            EVICTION_STRATEGY_NONE
        };
        ops.push(add(["spec", "evictionStrategy"], json!(strategy)));
    }

    if is_unset(spec.and_then(|s| s.get("uninstallStrategy"))) {
        ops.push(add(["spec", "uninstallStrategy"], json!(UninstallStrategy::default().as_str())));
    }

    ops
}
