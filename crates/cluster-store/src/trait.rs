//! ObjectStore trait for mocking
//!
//! The operator talks to the cluster only through this trait. The concrete
//! [`KubeObjectStore`](crate::KubeObjectStore) implements it against the API
//! server and tests use the in-memory mock.

use crate::error::StoreError;
use kube::api::{ApiResource, DynamicObject};

/// Object-store operations.
///
/// `namespace` is `None` for cluster-scoped kinds. All async methods must be
/// `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch one object.
    async fn get(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<DynamicObject, StoreError>;

    /// List objects, optionally filtered by a label selector.
    async fn list(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<Vec<DynamicObject>, StoreError>;

    /// Create an object.
    async fn create(&self, resource: &ApiResource, obj: &DynamicObject) -> Result<DynamicObject, StoreError>;

    /// Replace an object. The status subresource is left untouched.
    async fn update(
        &self,
        resource: &ApiResource,
        obj: &DynamicObject,
        dry_run: bool,
    ) -> Result<DynamicObject, StoreError>;

    /// Write the status subresource.
    async fn update_status(&self, resource: &ApiResource, obj: &DynamicObject) -> Result<DynamicObject, StoreError>;

    /// Delete an object. Returns `false` when it did not exist.
    async fn delete(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
        dry_run: bool,
    ) -> Result<bool, StoreError>;
}
