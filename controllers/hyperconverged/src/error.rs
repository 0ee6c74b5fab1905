//! Controller-specific error types.
//!
//! This module defines the error type shared by the spec builders, the
//! operand handlers and the reconcile loop.

use cluster_store::StoreError;
use kube::Error as KubeError;
use thiserror::Error;

/// Errors that can occur in the HyperConverged operator.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Object store error
    #[error("{0}")]
    Store(#[from] StoreError),

    /// Kubernetes client error outside the object store
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A JSON patch annotation could not be parsed or applied
    #[error("invalid jsonPatch in the {annotation} annotation: {message}")]
    JsonPatch { annotation: String, message: String },

    /// The HyperConverged spec cannot be rendered into a downstream object
    #[error("{0}")]
    Build(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An embedded config template failed to render
    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    /// Asset directory or file could not be read
    #[error("Asset error: {0}")]
    Assets(String),

    /// Teardown of a downstream object did not finish in time
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),
}

impl ControllerError {
    /// True when the underlying store reported a missing object.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_not_found())
    }
}
