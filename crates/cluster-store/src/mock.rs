//! Mock ObjectStore for unit testing
//!
//! This module provides an in-memory implementation of [`ObjectStore`] that
//! behaves enough like an API server for reconciler and webhook tests:
//! identities, resource versions, generations, finalizers, dry-run and
//! scripted rejections.

use crate::error::StoreError;
use crate::store_trait::ObjectStore;
use chrono::{SecondsFormat, Utc};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::api::{ApiResource, DynamicObject, TypeMeta};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Store operation, as recorded in the call log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    List,
    Create,
    Update,
    UpdateStatus,
    Delete,
}

/// One recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreCall {
    pub verb: Verb,
    pub kind: String,
    pub namespace: Option<String>,
    pub name: Option<String>,
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct ObjectKey {
    group: String,
    kind: String,
    namespace: Option<String>,
    name: String,
}

impl ObjectKey {
    fn new(resource: &ApiResource, namespace: Option<&str>, name: &str) -> Self {
        Self {
            group: resource.group.clone(),
            kind: resource.kind.clone(),
            namespace: namespace.map(str::to_string),
            name: name.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct Rejection {
    verb: Verb,
    kind: String,
    name: Option<String>,
    code: u16,
    message: String,
}

/// In-memory object store.
///
/// Clones share state, so a test can keep a handle while the code under
/// test owns another.
#[derive(Clone, Default)]
pub struct MockObjectStore {
    objects: Arc<Mutex<BTreeMap<ObjectKey, DynamicObject>>>,
    rejections: Arc<Mutex<Vec<Rejection>>>,
    latency: Arc<Mutex<Option<Duration>>>,
    calls: Arc<Mutex<Vec<StoreCall>>>,
    next_version: Arc<Mutex<u64>>,
}

impl std::fmt::Debug for MockObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockObjectStore")
            .field("objects", &lock(&self.objects).len())
            .finish_non_exhaustive()
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockObjectStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object without recording a call (for test setup).
    pub fn insert(&self, resource: &ApiResource, mut obj: DynamicObject) {
        let name = obj.metadata.name.clone().unwrap_or_default();
        let key = ObjectKey::new(resource, obj.metadata.namespace.as_deref(), &name);
        self.stamp_new(resource, &mut obj);
        lock(&self.objects).insert(key, obj);
    }

    /// Current copy of an object, without recording a call.
    pub fn peek(&self, resource: &ApiResource, namespace: Option<&str>, name: &str) -> Option<DynamicObject> {
        lock(&self.objects)
            .get(&ObjectKey::new(resource, namespace, name))
            .cloned()
    }

    /// Number of stored objects of a kind.
    pub fn count(&self, resource: &ApiResource) -> usize {
        lock(&self.objects)
            .keys()
            .filter(|k| k.group == resource.group && k.kind == resource.kind)
            .count()
    }

    /// Make every matching call fail with `code`/`message` until cleared.
    /// `name: None` matches every object of the kind.
    pub fn reject(&self, verb: Verb, kind: &str, name: Option<&str>, code: u16, message: &str) {
        lock(&self.rejections).push(Rejection {
            verb,
            kind: kind.to_string(),
            name: name.map(str::to_string),
            code,
            message: message.to_string(),
        });
    }

    /// Drop all scripted rejections.
    pub fn clear_rejections(&self) {
        lock(&self.rejections).clear();
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *lock(&self.latency) = latency;
    }

    /// Recorded calls, oldest first.
    pub fn calls(&self) -> Vec<StoreCall> {
        lock(&self.calls).clone()
    }

    /// Recorded calls of one verb.
    pub fn calls_of(&self, verb: Verb) -> Vec<StoreCall> {
        lock(&self.calls).iter().filter(|c| c.verb == verb).cloned().collect()
    }

    /// Forget the call log.
    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    async fn enter(
        &self,
        verb: Verb,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: Option<&str>,
        dry_run: bool,
    ) -> Result<(), StoreError> {
        let latency = *lock(&self.latency);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        lock(&self.calls).push(StoreCall {
            verb,
            kind: resource.kind.clone(),
            namespace: namespace.map(str::to_string),
            name: name.map(str::to_string),
            dry_run,
        });

        let rejections = lock(&self.rejections);
        let hit = rejections.iter().find(|r| {
            r.verb == verb && r.kind == resource.kind && (r.name.is_none() || r.name.as_deref() == name)
        });
        match hit {
            Some(r) => Err(StoreError::Rejected {
                code: r.code,
                message: r.message.clone(),
            }),
            None => Ok(()),
        }
    }

    fn next_resource_version(&self) -> String {
        let mut next = lock(&self.next_version);
        *next += 1;
        next.to_string()
    }

    fn stamp_new(&self, resource: &ApiResource, obj: &mut DynamicObject) {
        obj.types = Some(TypeMeta {
            api_version: resource.api_version.clone(),
            kind: resource.kind.clone(),
        });
        if obj.metadata.uid.is_none() {
            obj.metadata.uid = Some(uuid::Uuid::new_v4().to_string());
        }
        if obj.metadata.creation_timestamp.is_none() {
            obj.metadata.creation_timestamp = now();
        }
        obj.metadata.generation = Some(obj.metadata.generation.unwrap_or(1));
        obj.metadata.resource_version = Some(self.next_resource_version());
    }
}

fn now() -> Option<Time> {
    serde_json::from_value(Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true))).ok()
}

fn not_found(resource: &ApiResource, name: &str) -> StoreError {
    StoreError::NotFound(format!("{} \"{}\" not found", resource.plural, name))
}

fn required_name(obj: &DynamicObject) -> Result<String, StoreError> {
    obj.metadata.name.clone().ok_or_else(|| StoreError::Rejected {
        code: 422,
        message: "metadata.name is required".to_string(),
    })
}

fn matches_selector(obj: &DynamicObject, selector: &str) -> bool {
    let labels = obj.metadata.labels.clone().unwrap_or_default();
    selector
        .split(',')
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .all(|term| match term.split_once("!=") {
            Some((k, v)) => labels.get(k.trim()).map(String::as_str) != Some(v.trim()),
            None => match term.split_once('=') {
                Some((k, v)) => {
                    labels.get(k.trim()).map(String::as_str) == Some(v.trim_start_matches('=').trim())
                }
                None => labels.contains_key(term),
            },
        })
}

#[async_trait::async_trait]
impl ObjectStore for MockObjectStore {
    async fn get(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<DynamicObject, StoreError> {
        self.enter(Verb::Get, resource, namespace, Some(name), false).await?;
        self.peek(resource, namespace, name)
            .ok_or_else(|| not_found(resource, name))
    }

    async fn list(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<Vec<DynamicObject>, StoreError> {
        self.enter(Verb::List, resource, namespace, None, false).await?;
        Ok(lock(&self.objects)
            .iter()
            .filter(|(k, _)| k.group == resource.group && k.kind == resource.kind)
            .filter(|(k, _)| namespace.is_none() || k.namespace.as_deref() == namespace)
            .filter(|(_, o)| label_selector.is_none_or(|s| matches_selector(o, s)))
            .map(|(_, o)| o.clone())
            .collect())
    }

    async fn create(&self, resource: &ApiResource, obj: &DynamicObject) -> Result<DynamicObject, StoreError> {
        let name = required_name(obj)?;
        let namespace = obj.metadata.namespace.clone();
        self.enter(Verb::Create, resource, namespace.as_deref(), Some(&name), false)
            .await?;

        let key = ObjectKey::new(resource, namespace.as_deref(), &name);
        let mut objects = lock(&self.objects);
        if objects.contains_key(&key) {
            return Err(StoreError::AlreadyExists(format!(
                "{} \"{}\" already exists",
                resource.plural, name
            )));
        }
        let mut stored = obj.clone();
        stored.metadata.uid = None;
        stored.metadata.generation = None;
        self.stamp_new(resource, &mut stored);
        objects.insert(key, stored.clone());
        Ok(stored)
    }

    async fn update(
        &self,
        resource: &ApiResource,
        obj: &DynamicObject,
        dry_run: bool,
    ) -> Result<DynamicObject, StoreError> {
        let name = required_name(obj)?;
        let namespace = obj.metadata.namespace.clone();
        self.enter(Verb::Update, resource, namespace.as_deref(), Some(&name), dry_run)
            .await?;

        let key = ObjectKey::new(resource, namespace.as_deref(), &name);
        let mut objects = lock(&self.objects);
        let existing = objects.get(&key).ok_or_else(|| not_found(resource, &name))?;

        let mut stored = obj.clone();
        stored.types = existing.types.clone();
        stored.metadata.uid.clone_from(&existing.metadata.uid);
        stored.metadata.creation_timestamp.clone_from(&existing.metadata.creation_timestamp);
        stored.metadata.deletion_timestamp.clone_from(&existing.metadata.deletion_timestamp);

        let mut generation = existing.metadata.generation.unwrap_or(1);
        if existing.data.get("spec") != obj.data.get("spec") {
            generation += 1;
        }
        stored.metadata.generation = Some(generation);

        if let Value::Object(data) = &mut stored.data {
            match existing.data.get("status") {
                Some(status) => {
                    data.insert("status".to_string(), status.clone());
                }
                None => {
                    data.remove("status");
                }
            }
        }

        if dry_run {
            return Ok(stored);
        }

        stored.metadata.resource_version = Some(self.next_resource_version());
        let finalized = stored.metadata.deletion_timestamp.is_some()
            && stored.metadata.finalizers.as_ref().is_none_or(Vec::is_empty);
        if finalized {
            objects.remove(&key);
        } else {
            objects.insert(key, stored.clone());
        }
        Ok(stored)
    }

    async fn update_status(&self, resource: &ApiResource, obj: &DynamicObject) -> Result<DynamicObject, StoreError> {
        let name = required_name(obj)?;
        let namespace = obj.metadata.namespace.clone();
        self.enter(Verb::UpdateStatus, resource, namespace.as_deref(), Some(&name), false)
            .await?;

        let key = ObjectKey::new(resource, namespace.as_deref(), &name);
        let mut objects = lock(&self.objects);
        let existing = objects.get_mut(&key).ok_or_else(|| not_found(resource, &name))?;

        if let Value::Object(data) = &mut existing.data {
            match obj.data.get("status") {
                Some(status) => {
                    data.insert("status".to_string(), status.clone());
                }
                None => {
                    data.remove("status");
                }
            }
        }
        existing.metadata.resource_version = Some(self.next_resource_version());
        Ok(existing.clone())
    }

    async fn delete(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
        dry_run: bool,
    ) -> Result<bool, StoreError> {
        self.enter(Verb::Delete, resource, namespace, Some(name), dry_run)
            .await?;

        let key = ObjectKey::new(resource, namespace, name);
        let mut objects = lock(&self.objects);
        let Some(existing) = objects.get_mut(&key) else {
            return Ok(false);
        };
        if dry_run {
            return Ok(true);
        }

        let has_finalizers = existing.metadata.finalizers.as_ref().is_some_and(|f| !f.is_empty());
        if has_finalizers {
            if existing.metadata.deletion_timestamp.is_none() {
                existing.metadata.deletion_timestamp = now();
                existing.metadata.resource_version = Some(self.next_resource_version());
            }
        } else {
            objects.remove(&key);
        }
        Ok(true)
    }
}
