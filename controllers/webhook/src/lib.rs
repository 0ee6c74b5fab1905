//! HyperConverged admission webhook
//!
//! Serves the validating and mutating hooks for the HyperConverged resource
//! and the namespace-deletion guard:
//! - create/update/delete validation through dry-run calls against the
//!   downstream custom resources
//! - defaulting of the stored HyperConverged object
//! - refusal to delete the operator namespace while the stack exists

pub mod error;
pub mod mutator;
pub mod namespace;
pub mod server;
pub mod validator;

use cluster_store::{typed, ObjectStore};
use hco_crds::HyperConverged;
use hco_operator::operands::ssp::CommonDicts;
use hco_operator::OperatorConfig;
use kube::api::DynamicObject;
use kube::core::admission::{AdmissionRequest, AdmissionReview, ConvertAdmissionReviewError};
use std::sync::Arc;

pub use error::WebhookError;

/// Shared state of every handler.
pub struct WebhookState {
    pub store: Arc<dyn ObjectStore>,
    pub cfg: Arc<OperatorConfig>,
    /// Golden-image templates shipped with the operator; needed to render the SSP
    pub common_dicts: Arc<CommonDicts>,
}

impl WebhookState {
    pub fn new(store: Arc<dyn ObjectStore>, cfg: Arc<OperatorConfig>, common_dicts: CommonDicts) -> Self {
        Self {
            store,
            cfg,
            common_dicts: Arc::new(common_dicts),
        }
    }
}

/// Unwraps the request out of a review.
pub(crate) fn admission_request(
    body: AdmissionReview<DynamicObject>,
) -> Result<AdmissionRequest<DynamicObject>, WebhookError> {
    body.try_into()
        .map_err(|e: ConvertAdmissionReviewError| WebhookError::InvalidReview(e.to_string()))
}

pub(crate) fn decode_hyperconverged(obj: Option<&DynamicObject>) -> Result<HyperConverged, WebhookError> {
    let obj = obj.ok_or_else(|| WebhookError::InvalidReview("request carries no object".to_string()))?;
    typed::from_dynamic(obj.clone())
        .map_err(|e| WebhookError::InvalidReview(format!("failed to parse the HyperConverged: {e}")))
}

#[cfg(test)]
pub(crate) mod testing;
