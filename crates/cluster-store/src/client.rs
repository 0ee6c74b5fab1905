//! Kubernetes-backed object store.

use crate::error::StoreError;
use crate::store_trait::ObjectStore;
use kube::api::{Api, ApiResource, DeleteParams, DynamicObject, ListParams, Patch, PatchParams, PostParams};
use kube::Client;
use tracing::debug;

/// [`ObjectStore`] over a live API server.
#[derive(Clone)]
pub struct KubeObjectStore {
    client: Client,
}

impl std::fmt::Debug for KubeObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeObjectStore").finish_non_exhaustive()
    }
}

impl KubeObjectStore {
    /// Wraps an existing client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// The underlying client.
    pub fn client(&self) -> &Client {
        &self.client
    }

    fn api(&self, resource: &ApiResource, namespace: Option<&str>) -> Api<DynamicObject> {
        match namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, resource),
            None => Api::all_with(self.client.clone(), resource),
        }
    }
}

fn object_name(obj: &DynamicObject) -> Result<&str, StoreError> {
    obj.metadata.name.as_deref().ok_or_else(|| StoreError::Rejected {
        code: 422,
        message: "metadata.name is required".to_string(),
    })
}

#[async_trait::async_trait]
impl ObjectStore for KubeObjectStore {
    async fn get(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<DynamicObject, StoreError> {
        self.api(resource, namespace)
            .get(name)
            .await
            .map_err(StoreError::from_kube)
    }

    async fn list(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<Vec<DynamicObject>, StoreError> {
        let mut params = ListParams::default();
        if let Some(selector) = label_selector {
            params = params.labels(selector);
        }
        let list = self
            .api(resource, namespace)
            .list(&params)
            .await
            .map_err(StoreError::from_kube)?;
        Ok(list.items)
    }

    async fn create(&self, resource: &ApiResource, obj: &DynamicObject) -> Result<DynamicObject, StoreError> {
        debug!(kind = %resource.kind, name = ?obj.metadata.name, "creating object");
        self.api(resource, obj.metadata.namespace.as_deref())
            .create(&PostParams::default(), obj)
            .await
            .map_err(StoreError::from_kube)
    }

    async fn update(
        &self,
        resource: &ApiResource,
        obj: &DynamicObject,
        dry_run: bool,
    ) -> Result<DynamicObject, StoreError> {
        let name = object_name(obj)?;
        debug!(kind = %resource.kind, name, dry_run, "replacing object");
        let params = PostParams {
            dry_run,
            field_manager: None,
        };
        self.api(resource, obj.metadata.namespace.as_deref())
            .replace(name, &params, obj)
            .await
            .map_err(StoreError::from_kube)
    }

    async fn update_status(&self, resource: &ApiResource, obj: &DynamicObject) -> Result<DynamicObject, StoreError> {
        let name = object_name(obj)?;
        let status = obj.data.get("status").cloned().unwrap_or(serde_json::Value::Null);
        let patch = serde_json::json!({ "status": status });
        self.api(resource, obj.metadata.namespace.as_deref())
            .patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(StoreError::from_kube)
    }

    async fn delete(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
        dry_run: bool,
    ) -> Result<bool, StoreError> {
        let params = DeleteParams {
            dry_run,
            ..DeleteParams::default()
        };
        match self.api(resource, namespace).delete(name, &params).await {
            Ok(_) => Ok(true),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(false),
            Err(e) => Err(StoreError::from_kube(e)),
        }
    }
}
