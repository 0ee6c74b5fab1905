//! Validating hook for the HyperConverged resource.
//!
//! Create checks the fixed identity and that every primary downstream spec
//! renders. Update renders the downstream objects from the requested spec
//! and dry-run updates the live copies, so the component operators' own
//! validation rejects the HyperConverged change. Delete dry-runs the removal
//! of the KubeVirt and CDI resources.

use crate::{admission_request, decode_hyperconverged, WebhookError, WebhookState};
use axum::{extract::State, Json};
use cluster_store::{typed, ObjectStore};
use futures::future::{try_join_all, BoxFuture};
use futures::FutureExt;
use hco_crds::{HyperConverged, KubeVirt, CDI, HYPERCONVERGED_NAME};
use hco_operator::operands::cdi::new_cdi;
use hco_operator::operands::kubevirt::new_kubevirt;
use hco_operator::operands::network_addons::new_network_addons;
use hco_operator::operands::ssp::new_ssp;
use kube::api::DynamicObject;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
use kube::{Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Shared deadline of the dry-run updates.
pub const UPDATE_DRY_RUN_TIMEOUT: Duration = Duration::from_secs(3);

fn deprecation_warning(gate: &str) -> String {
    format!("spec.featureGates.{gate} is deprecated and ignored. It will be removed in a future version;")
}

/// Warnings for feature gates the operator no longer reads.
pub fn deprecated_feature_gates(hc: &HyperConverged) -> Vec<String> {
    let gates = &hc.spec.feature_gates;
    [
        ("deployTektonTaskResources", gates.deploy_tekton_task_resources),
        ("enableManagedTenantQuota", gates.enable_managed_tenant_quota),
    ]
    .into_iter()
    .filter(|(_, value)| value.is_some())
    .map(|(gate, _)| deprecation_warning(gate))
    .collect()
}

/// Handle validating admission review for HyperConverged
pub async fn validate_handler(
    State(state): State<Arc<WebhookState>>,
    Json(body): Json<AdmissionReview<DynamicObject>>,
) -> Result<Json<AdmissionReview<DynamicObject>>, WebhookError> {
    let req = admission_request(body)?;
    Ok(Json(validate(&state, &req).await.into_review()))
}

/// Validates one request. Rejections carry the error text; deprecation
/// warnings ride on an allowed response.
pub async fn validate(state: &WebhookState, req: &AdmissionRequest<DynamicObject>) -> AdmissionResponse {
    let mut response = AdmissionResponse::from(req);
    match run(state, req).await {
        Ok(warnings) => {
            if !warnings.is_empty() {
                debug!(uid = %req.uid, count = warnings.len(), "Allowing with warnings");
                response.warnings = Some(warnings);
            }
            response
        }
        Err(e) => {
            warn!(uid = %req.uid, operation = ?req.operation, error = %e, "Rejecting HyperConverged request");
            response.deny(e.to_string())
        }
    }
}

async fn run(state: &WebhookState, req: &AdmissionRequest<DynamicObject>) -> Result<Vec<String>, WebhookError> {
    match req.operation {
        Operation::Create => {
            let hc = decode_hyperconverged(req.object.as_ref())?;
            let namespace = hc.namespace().or_else(|| req.namespace.clone()).unwrap_or_default();
            validate_create(state, &hc, &namespace)?;
            Ok(deprecated_feature_gates(&hc))
        }
        Operation::Update => {
            let requested = decode_hyperconverged(req.object.as_ref())?;
            let existing = decode_hyperconverged(req.old_object.as_ref())?;
            validate_update(state, &requested, &existing, UPDATE_DRY_RUN_TIMEOUT).await?;
            Ok(deprecated_feature_gates(&requested))
        }
        Operation::Delete => {
            // the object being deleted travels in oldObject
            let hc = decode_hyperconverged(req.old_object.as_ref())?;
            validate_delete(state, &hc).await?;
            Ok(Vec::new())
        }
        Operation::Connect => Ok(Vec::new()),
    }
}

fn validate_create(state: &WebhookState, hc: &HyperConverged, namespace: &str) -> Result<(), WebhookError> {
    info!(name = %hc.name_any(), namespace = %namespace, "Validating create");
    let cfg = state.cfg.as_ref();

    if namespace != cfg.namespace {
        return Err(WebhookError::Denied(format!(
            "invalid namespace for v1beta1.HyperConverged - please use the {} namespace",
            cfg.namespace
        )));
    }
    if hc.name_any() != HYPERCONVERGED_NAME {
        return Err(WebhookError::Denied(format!(
            "invalid name for v1beta1.HyperConverged - please use {HYPERCONVERGED_NAME}"
        )));
    }

    new_kubevirt(hc, cfg)?;
    new_cdi(hc, cfg)?;
    new_network_addons(hc, cfg)?;
    Ok(())
}

async fn validate_update(
    state: &WebhookState,
    requested: &HyperConverged,
    existing: &HyperConverged,
    deadline: Duration,
) -> Result<(), WebhookError> {
    if requested.spec == existing.spec && requested.annotations() == existing.annotations() {
        debug!(name = %requested.name_any(), "Spec and annotations unchanged, nothing to dry-run");
        return Ok(());
    }
    info!(name = %requested.name_any(), "Validating update");

    let cfg = state.cfg.as_ref();
    let kv = new_kubevirt(requested, cfg)?;
    let cdi = new_cdi(requested, cfg)?;
    let cna = new_network_addons(requested, cfg)?;
    let ssp = Arc::unwrap_or_clone(new_ssp(requested, cfg, &state.common_dicts)?.ssp);

    let store = state.store.as_ref();
    let dry_runs: Vec<BoxFuture<'_, Result<(), WebhookError>>> = vec![
        dry_run_update(store, kv, |found, required| found.spec = required.spec).boxed(),
        dry_run_update(store, cdi, |found, required| found.spec = required.spec).boxed(),
        dry_run_update(store, cna, |found, required| found.spec = required.spec).boxed(),
        dry_run_update(store, ssp, |found, required| found.spec = required.spec).boxed(),
    ];

    match tokio::time::timeout(deadline, try_join_all(dry_runs)).await {
        Ok(result) => result.map(|_| ()),
        Err(_) => Err(WebhookError::DeadlineExceeded(deadline)),
    }
}

/// Copies the required spec into the live object and dry-run updates it.
/// A component that does not exist yet has nothing to validate against.
async fn dry_run_update<K, F>(store: &dyn ObjectStore, required: K, copy_spec: F) -> Result<(), WebhookError>
where
    K: Resource<DynamicType = ()> + Serialize + DeserializeOwned + Send + Sync,
    F: FnOnce(&mut K, K) + Send,
{
    let name = required.name_any();
    let namespace = required.namespace();
    let kind = K::kind(&());

    let Some(mut found) = typed::get_opt::<K>(store, namespace.as_deref(), &name).await? else {
        debug!(kind = %kind, name = %name, "Object not found, skipping dry-run");
        return Ok(());
    };
    copy_spec(&mut found, required);

    if let Err(e) = typed::update(store, &found, true).await {
        warn!(kind = %kind, name = %name, error = %e, "Dry-run update failed");
        return Err(e.into());
    }
    debug!(kind = %kind, name = %name, "Dry-run update passed");
    Ok(())
}

async fn validate_delete(state: &WebhookState, hc: &HyperConverged) -> Result<(), WebhookError> {
    info!(name = %hc.name_any(), namespace = ?hc.namespace(), "Validating delete");
    let cfg = state.cfg.as_ref();
    let store = state.store.as_ref();

    let kv = new_kubevirt(hc, cfg)?;
    let cdi = new_cdi(hc, cfg)?;
    typed::delete::<KubeVirt>(store, kv.namespace().as_deref(), &kv.name_any(), true).await?;
    typed::delete::<CDI>(store, cdi.namespace().as_deref(), &cdi.name_any(), true).await?;
    Ok(())
}

#[cfg(test)]
#[path = "validator_test.rs"]
mod validator_test;
