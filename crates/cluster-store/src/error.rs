//! Object store errors

use thiserror::Error;

/// Errors returned by an [`ObjectStore`](crate::ObjectStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// The object does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// An object with the same identity already exists
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// The API server, or an admission webhook behind it, refused the request
    #[error("{message}")]
    Rejected {
        /// HTTP status code
        code: u16,
        /// Server-provided reason
        message: String,
    },

    /// Transport or client error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// True for [`StoreError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Maps API status codes onto the store's vocabulary.
    pub fn from_kube(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(ae) if ae.code == 404 => Self::NotFound(ae.message.clone()),
            kube::Error::Api(ae) if ae.code == 409 && ae.reason == "AlreadyExists" => {
                Self::AlreadyExists(ae.message.clone())
            }
            kube::Error::Api(ae) => Self::Rejected {
                code: ae.code,
                message: ae.message.clone(),
            },
            other => Self::Kube(other),
        }
    }
}
