//! Typed helpers over [`ObjectStore`].
//!
//! Concrete resource types round-trip through `serde_json` into
//! `DynamicObject`, so the store itself stays object safe.

use crate::error::StoreError;
use crate::store_trait::ObjectStore;
use kube::api::{ApiResource, DynamicObject};
use kube::Resource;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// `ApiResource` of a statically known kind.
pub fn api_resource<K: Resource<DynamicType = ()>>() -> ApiResource {
    ApiResource::erase::<K>(&())
}

/// Converts a typed object into its dynamic form.
pub fn to_dynamic<K: Serialize>(obj: &K) -> Result<DynamicObject, StoreError> {
    Ok(serde_json::from_value(serde_json::to_value(obj)?)?)
}

/// Converts a dynamic object into a typed one.
pub fn from_dynamic<K: DeserializeOwned>(obj: DynamicObject) -> Result<K, StoreError> {
    Ok(serde_json::from_value(serde_json::to_value(obj)?)?)
}

/// Fetch one object.
pub async fn get<K>(store: &dyn ObjectStore, namespace: Option<&str>, name: &str) -> Result<K, StoreError>
where
    K: Resource<DynamicType = ()> + DeserializeOwned,
{
    from_dynamic(store.get(&api_resource::<K>(), namespace, name).await?)
}

/// Fetch one object, mapping not-found to `None`.
pub async fn get_opt<K>(store: &dyn ObjectStore, namespace: Option<&str>, name: &str) -> Result<Option<K>, StoreError>
where
    K: Resource<DynamicType = ()> + DeserializeOwned,
{
    match get(store, namespace, name).await {
        Ok(obj) => Ok(Some(obj)),
        Err(StoreError::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

/// List objects of a kind.
pub async fn list<K>(
    store: &dyn ObjectStore,
    namespace: Option<&str>,
    label_selector: Option<&str>,
) -> Result<Vec<K>, StoreError>
where
    K: Resource<DynamicType = ()> + DeserializeOwned,
{
    store
        .list(&api_resource::<K>(), namespace, label_selector)
        .await?
        .into_iter()
        .map(from_dynamic)
        .collect()
}

/// Create an object and return the stored copy.
pub async fn create<K>(store: &dyn ObjectStore, obj: &K) -> Result<K, StoreError>
where
    K: Resource<DynamicType = ()> + Serialize + DeserializeOwned,
{
    from_dynamic(store.create(&api_resource::<K>(), &to_dynamic(obj)?).await?)
}

/// Replace an object and return the stored (or, for dry-run, validated) copy.
pub async fn update<K>(store: &dyn ObjectStore, obj: &K, dry_run: bool) -> Result<K, StoreError>
where
    K: Resource<DynamicType = ()> + Serialize + DeserializeOwned,
{
    from_dynamic(store.update(&api_resource::<K>(), &to_dynamic(obj)?, dry_run).await?)
}

/// Write the status subresource.
pub async fn update_status<K>(store: &dyn ObjectStore, obj: &K) -> Result<K, StoreError>
where
    K: Resource<DynamicType = ()> + Serialize + DeserializeOwned,
{
    from_dynamic(store.update_status(&api_resource::<K>(), &to_dynamic(obj)?).await?)
}

/// Delete an object. Returns `false` when it did not exist.
pub async fn delete<K>(store: &dyn ObjectStore, namespace: Option<&str>, name: &str, dry_run: bool) -> Result<bool, StoreError>
where
    K: Resource<DynamicType = ()>,
{
    store.delete(&api_resource::<K>(), namespace, name, dry_run).await
}
