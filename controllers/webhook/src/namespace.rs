//! Namespace deletion guard.
//!
//! Deleting the operator namespace while a HyperConverged resource lives in
//! it would strand the component stack, so the request is refused until the
//! HyperConverged resource is removed first.

use crate::{admission_request, WebhookError, WebhookState};
use axum::{extract::State, Json};
use cluster_store::typed;
use hco_crds::HyperConverged;
use kube::api::DynamicObject;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
use kube::ResourceExt;
use std::sync::Arc;
use tracing::{error, info};

/// Handle mutating admission review for Namespaces
pub async fn mutate_namespace_handler(
    State(state): State<Arc<WebhookState>>,
    Json(body): Json<AdmissionReview<DynamicObject>>,
) -> Result<Json<AdmissionReview<DynamicObject>>, WebhookError> {
    let req = admission_request(body)?;
    Ok(Json(check_namespace_delete(&state, &req).await.into_review()))
}

/// Allows every request except deleting the operator namespace while it
/// still holds a HyperConverged resource. Dry-run deletes are judged the same way.
pub async fn check_namespace_delete(state: &WebhookState, req: &AdmissionRequest<DynamicObject>) -> AdmissionResponse {
    let response = AdmissionResponse::from(req);
    if !matches!(req.operation, Operation::Delete) {
        return response;
    }

    let name = match req.old_object.as_ref() {
        Some(ns) => ns.name_any(),
        None => req.name.clone(),
    };
    if name != state.cfg.namespace {
        return response;
    }

    info!(namespace = %name, dry_run = req.dry_run, "Validating namespace deletion");
    match typed::list::<HyperConverged>(state.store.as_ref(), Some(&name), None).await {
        Ok(found) if found.is_empty() => {
            info!(namespace = %name, "No HyperConverged resource left, allowing namespace deletion");
            response
        }
        Ok(found) => {
            let hc = found.first().map(|h| h.name_any()).unwrap_or_default();
            info!(namespace = %name, hyperconverged = %hc, "HyperConverged still exists, refusing namespace deletion");
            response.deny(format!(
                "HyperConverged {hc} still exists in namespace {name}; delete it before deleting the namespace"
            ))
        }
        Err(e) => {
            error!(namespace = %name, error = %e, "Failed listing HyperConverged resources");
            response.deny(e.to_string())
        }
    }
}
