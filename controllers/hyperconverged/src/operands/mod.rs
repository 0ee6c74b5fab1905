//! Operands.
//!
//! An operand owns one downstream object. [`GenericOperand`] implements the
//! create-or-reconcile skeleton once; each kind plugs in through
//! [`OperandHooks`]. Plain Kubernetes kinds share [`AuxHooks`], which only
//! needs a builder closure and the [`AuxObject`] drift rules of the kind.

pub mod cdi;
pub mod config_map;
pub mod console;
pub mod dashboard;
pub mod deployment;
pub mod image_stream;
pub mod kubevirt;
pub mod migration;
pub mod network_addons;
pub mod network_policy;
pub mod quick_start;
pub mod rbac;
pub mod service;
pub mod service_account;
pub mod ssp;
pub mod virtio_win;


use crate::conditions::handle_component_conditions;
use crate::config::OperatorConfig;
use crate::error::ControllerError;
use crate::labels::{managed_labels_match, merge_managed_labels};
use crate::related::{add_related_object, object_reference};
use crate::request::HcoRequest;
use async_trait::async_trait;
use cluster_store::{typed, ObjectStore, StoreError};
use hco_crds::{Condition, HyperConverged};
use kube::api::ApiResource;
use kube::core::object::HasSpec;
use kube::{Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

/// Outcome of one [`Operand::ensure`] call.
#[derive(Debug, Default)]
pub struct EnsureResult {
    pub created: bool,
    pub updated: bool,
    pub overwritten: bool,
    pub deleted: bool,
    pub upgrade_done: bool,
    pub err: Option<ControllerError>,
    /// Downstream kind
    pub type_: String,
    pub name: String,
}

impl EnsureResult {
    pub fn new(type_: impl Into<String>) -> Self {
        Self {
            type_: type_.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn error(mut self, err: ControllerError) -> Self {
        self.err = Some(err);
        self
    }

    #[must_use]
    pub fn set_created(mut self) -> Self {
        self.created = true;
        self
    }

    #[must_use]
    pub fn set_updated(mut self) -> Self {
        self.updated = true;
        self
    }

    #[must_use]
    pub fn set_overwritten(mut self, overwritten: bool) -> Self {
        self.overwritten = overwritten;
        self
    }

    #[must_use]
    pub fn set_deleted(mut self) -> Self {
        self.deleted = true;
        self
    }

    #[must_use]
    pub fn set_upgrade_done(mut self, upgrade_done: bool) -> Self {
        self.upgrade_done = upgrade_done;
        self
    }

    #[must_use]
    pub fn set_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Identity of a stored object, enough to fetch or delete it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectIdentity {
    pub resource: ApiResource,
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectIdentity {
    /// Identity of `obj`.
    pub fn of<K: Resource<DynamicType = ()>>(obj: &K) -> Self {
        Self {
            resource: typed::api_resource::<K>(),
            namespace: obj.meta().namespace.clone(),
            name: obj.name_any(),
        }
    }

    /// Identity of a `K` named `name`.
    pub fn named<K: Resource<DynamicType = ()>>(namespace: Option<&str>, name: &str) -> Self {
        Self {
            resource: typed::api_resource::<K>(),
            namespace: namespace.map(str::to_string),
            name: name.to_string(),
        }
    }
}

/// One handler in the reconcile pipeline.
#[async_trait]
pub trait Operand: Send + Sync {
    /// Creates or reconciles the downstream object.
    async fn ensure(&self, req: &mut HcoRequest) -> EnsureResult;

    /// Drops any cached rendering.
    fn reset(&self) {}

    /// Objects this operand produces for `hc`, used by teardown.
    fn objects(&self, hc: &HyperConverged) -> Vec<ObjectIdentity>;
}

/// Per-kind capabilities plugged into [`GenericOperand`].
#[async_trait]
pub trait OperandHooks: Send + Sync {
    type Cr: Resource<DynamicType = ()> + Clone + Serialize + DeserializeOwned + Send + Sync + Debug + 'static;

    /// The required object, fully rendered from `hc`. May be served from a cache.
    fn full_cr(&self, hc: &HyperConverged) -> Result<Arc<Self::Cr>, ControllerError>;

    /// Checks run before anything is written.
    fn validate(&self, _required: &Self::Cr) -> Result<(), ControllerError> {
        Ok(())
    }

    /// Whether the HyperConverged resource becomes the controller owner.
    fn set_controller_reference(&self) -> bool {
        false
    }

    /// Called with the observed object right after it was fetched.
    async fn post_found(
        &self,
        _req: &mut HcoRequest,
        _store: &dyn ObjectStore,
        found: Self::Cr,
    ) -> Result<Self::Cr, ControllerError> {
        Ok(found)
    }

    /// Reconciles `found` towards `required`. Returns `(updated, overwritten)`.
    async fn update_cr(
        &self,
        req: &mut HcoRequest,
        store: &dyn ObjectStore,
        found: &mut Self::Cr,
        required: &Self::Cr,
    ) -> Result<(bool, bool), ControllerError>;

    /// Normalised conditions of a component operand; `None` for plain objects.
    fn conditions(&self, _found: &Self::Cr) -> Option<Vec<Condition>> {
        None
    }

    /// True when the observed component runs the expected version.
    fn check_component_version(&self, _found: &Self::Cr) -> bool {
        true
    }

    /// Called once the object is in its final state for this reconcile.
    fn just_before_complete(&self, _req: &mut HcoRequest) {}

    fn reset(&self) {}

    /// Identity of the object for `hc`, without necessarily rendering it in full.
    fn identity(&self, hc: &HyperConverged) -> Option<ObjectIdentity> {
        self.full_cr(hc).ok().map(|cr| ObjectIdentity::of(cr.as_ref()))
    }
}

/// The shared create-or-reconcile algorithm.
pub struct GenericOperand<H> {
    store: Arc<dyn ObjectStore>,
    hooks: H,
}

impl<H: OperandHooks> GenericOperand<H> {
    pub fn new(store: Arc<dyn ObjectStore>, hooks: H) -> Self {
        Self { store, hooks }
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    fn kind() -> String {
        H::Cr::kind(&()).into_owned()
    }

    fn add_related(req: &mut HcoRequest, obj: &H::Cr) {
        let status = req.instance.status.get_or_insert_with(Default::default);
        if add_related_object(&mut status.related_objects, object_reference(obj)) {
            req.status_dirty = true;
        }
    }

    async fn try_ensure(&self, req: &mut HcoRequest) -> Result<EnsureResult, ControllerError> {
        let kind = Self::kind();
        let cached = self.hooks.full_cr(&req.instance)?;
        self.hooks.validate(&cached)?;

        let mut required = (*cached).clone();
        if self.hooks.set_controller_reference() {
            if let Some(owner) = req.instance.controller_owner_ref(&()) {
                required.meta_mut().owner_references = Some(vec![owner]);
            }
        }

        let name = required.name_any();
        let namespace = required.meta().namespace.clone();
        let res = EnsureResult::new(&kind).set_name(&name);
        let store = self.store.as_ref();

        let found = match typed::get_opt::<H::Cr>(store, namespace.as_deref(), &name).await? {
            Some(found) => found,
            None => {
                info!(kind = %kind, name = %name, "Creating {kind}");
                required.meta_mut().resource_version = None;
                match typed::create(store, &required).await {
                    Ok(created) => {
                        Self::add_related(req, &created);
                        return Ok(res.set_created());
                    }
                    // lost a race with another writer; reconcile what is there
                    Err(StoreError::AlreadyExists(_)) => typed::get(store, namespace.as_deref(), &name).await?,
                    Err(e) => return Err(e.into()),
                }
            }
        };

        debug!(kind = %kind, name = %name, namespace = ?namespace, "{kind} already exists");
        let mut found = self.hooks.post_found(req, store, found).await?;

        let (updated, overwritten) = self.hooks.update_cr(req, store, &mut found, &required).await?;
        if updated {
            let refreshed = typed::get::<H::Cr>(store, namespace.as_deref(), &name).await?;
            Self::add_related(req, &refreshed);
            req.status_dirty = true;
            return Ok(res.set_updated().set_overwritten(overwritten));
        }

        Self::add_related(req, &found);

        let upgrade_done = match self.hooks.conditions(&found) {
            Some(conditions) => {
                let generation = req.generation();
                let is_ready = handle_component_conditions(&mut req.conditions, &kind, &conditions, generation);
                let version_ok = self.hooks.check_component_version(&found);
                if is_ready && !version_ok {
                    info!(
                        kind = %kind,
                        "could not complete the upgrade process. {kind} is not with the expected version. \
                         Check {kind} observed version in the status field of its CR"
                    );
                }
                req.upgrade_mode && is_ready && version_ok
            }
            // plain objects have no version of their own
            None => req.component_upgrade_in_progress,
        };
        Ok(res.set_upgrade_done(upgrade_done))
    }
}

#[async_trait]
impl<H: OperandHooks> Operand for GenericOperand<H> {
    async fn ensure(&self, req: &mut HcoRequest) -> EnsureResult {
        match self.try_ensure(req).await {
            Ok(res) => {
                self.hooks.just_before_complete(req);
                res
            }
            Err(e) => EnsureResult::new(Self::kind()).error(e),
        }
    }

    fn reset(&self) {
        self.hooks.reset();
    }

    fn objects(&self, hc: &HyperConverged) -> Vec<ObjectIdentity> {
        self.hooks.identity(hc).into_iter().collect()
    }
}

/// Single-slot cache for a rendered object.
///
/// Within one reconcile every caller gets the same `Arc`; [`SpecCache::reset`]
/// ends the reconcile.
#[derive(Debug)]
pub struct SpecCache<K> {
    slot: Mutex<Option<Arc<K>>>,
}

impl<K> Default for SpecCache<K> {
    fn default() -> Self {
        Self { slot: Mutex::new(None) }
    }
}

impl<K> SpecCache<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached value, or the result of `build` which is then cached.
    pub fn get_or_try_build<F>(&self, build: F) -> Result<Arc<K>, ControllerError>
    where
        F: FnOnce() -> Result<K, ControllerError>,
    {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(cached) = slot.as_ref() {
            return Ok(Arc::clone(cached));
        }
        let built = Arc::new(build()?);
        *slot = Some(Arc::clone(&built));
        Ok(built)
    }

    /// Cached value, if any.
    pub fn peek(&self) -> Option<Arc<K>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn reset(&self) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// An unset expected version never matches.
pub fn check_component_version(expected: &str, observed: Option<&str>) -> bool {
    !expected.is_empty() && observed == Some(expected)
}

/// Namespace for objects co-located with `hc`.
pub fn hc_namespace<'a>(hc: &'a HyperConverged, cfg: &'a OperatorConfig) -> &'a str {
    hc.metadata.namespace.as_deref().unwrap_or(&cfg.namespace)
}

/// Logs a drift reconciliation and returns the `overwritten` bit.
pub fn log_drift(req: &HcoRequest, kind: &str) -> bool {
    if req.hco_triggered {
        info!(kind, "Updating existing {kind} to new opinionated values");
    } else {
        info!(kind, "Reconciling an externally updated {kind} to its opinionated values");
    }
    !req.hco_triggered
}

/// Drift rule shared by the component custom resources: the spec must be
/// equal and the managed labels must match.
pub async fn update_spec_and_labels<K>(
    req: &HcoRequest,
    store: &dyn ObjectStore,
    found: &mut K,
    required: &K,
) -> Result<(bool, bool), ControllerError>
where
    K: Resource<DynamicType = ()> + HasSpec + Serialize + DeserializeOwned + Send + Sync,
    K::Spec: PartialEq + Clone,
{
    let spec_changed = found.spec() != required.spec();
    if !spec_changed && managed_labels_match(found.meta(), required.meta()) {
        return Ok((false, false));
    }

    let overwritten = log_drift(req, &K::kind(&()));
    if spec_changed {
        *found.spec_mut() = required.spec().clone();
    }
    merge_managed_labels(found.meta_mut(), required.meta());
    typed::update(store, found, false).await?;
    Ok((true, overwritten))
}

/// Builder closure for a plain object.
pub type BuildFn<K> = Box<dyn Fn(&HyperConverged) -> Result<K, ControllerError> + Send + Sync>;

/// Drift rules of a plain Kubernetes kind.
pub trait AuxObject:
    Resource<DynamicType = ()> + Clone + Serialize + DeserializeOwned + Send + Sync + Debug + 'static
{
    /// Brings the managed fields of `found` in line with `required`.
    /// Returns true when `found` changed.
    fn reconcile_fields(found: &mut Self, required: &Self) -> bool;

    /// True when `found` differs from `required` in an immutable field and
    /// has to be deleted and created again.
    fn must_recreate(_found: &Self, _required: &Self) -> bool {
        false
    }
}

/// Hooks for a plain object rendered by a closure.
pub struct AuxHooks<K> {
    build: BuildFn<K>,
    cache: SpecCache<K>,
    owned: bool,
    _kind: PhantomData<fn() -> K>,
}

impl<K: AuxObject> AuxHooks<K> {
    /// `owned` makes the HyperConverged resource the controller owner; only
    /// valid for objects in its namespace.
    pub fn new<F>(owned: bool, build: F) -> Self
    where
        F: Fn(&HyperConverged) -> Result<K, ControllerError> + Send + Sync + 'static,
    {
        Self {
            build: Box::new(build),
            cache: SpecCache::new(),
            owned,
            _kind: PhantomData,
        }
    }
}

#[async_trait]
impl<K: AuxObject> OperandHooks for AuxHooks<K> {
    type Cr = K;

    fn full_cr(&self, hc: &HyperConverged) -> Result<Arc<K>, ControllerError> {
        self.cache.get_or_try_build(|| (self.build)(hc))
    }

    fn set_controller_reference(&self) -> bool {
        self.owned
    }

    async fn update_cr(
        &self,
        req: &mut HcoRequest,
        store: &dyn ObjectStore,
        found: &mut K,
        required: &K,
    ) -> Result<(bool, bool), ControllerError> {
        let kind = K::kind(&());
        if K::must_recreate(found, required) {
            let overwritten = log_drift(req, &kind);
            info!(kind = %kind, name = %found.name_any(), "Immutable field changed, recreating");
            typed::delete::<K>(store, found.meta().namespace.as_deref(), &found.name_any(), false).await?;
            typed::create(store, required).await?;
            return Ok((true, overwritten));
        }

        if !K::reconcile_fields(found, required) {
            return Ok((false, false));
        }
        let overwritten = log_drift(req, &kind);
        typed::update(store, found, false).await?;
        Ok((true, overwritten))
    }

    fn reset(&self) {
        self.cache.reset();
    }
}

/// A boxed operand for a plain object.
pub fn aux_operand<K, F>(store: &Arc<dyn ObjectStore>, owned: bool, build: F) -> Box<dyn Operand>
where
    K: AuxObject,
    F: Fn(&HyperConverged) -> Result<K, ControllerError> + Send + Sync + 'static,
{
    Box::new(GenericOperand::new(Arc::clone(store), AuxHooks::new(owned, build)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_spec_cache_identity() {
        let cache: SpecCache<String> = SpecCache::new();
        let builds = AtomicUsize::new(0);
        let build = || {
            builds.fetch_add(1, Ordering::SeqCst);
            Ok("spec".to_string())
        };

        let a = cache.get_or_try_build(build).unwrap();
        let b = cache.get_or_try_build(build).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(builds.load(Ordering::SeqCst), 1);

        cache.reset();
        let c = cache.get_or_try_build(build).unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(*a, *c);
        assert_eq!(builds.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_spec_cache_does_not_keep_errors() {
        let cache: SpecCache<String> = SpecCache::new();
        assert!(cache
            .get_or_try_build(|| Err(ControllerError::Build("boom".to_string())))
            .is_err());
        assert_eq!(*cache.get_or_try_build(|| Ok("ok".to_string())).unwrap(), "ok");
    }

    #[test]
    fn test_ensure_result_builder() {
        let res = EnsureResult::new("KubeVirt")
            .set_name("kubevirt-kubevirt-hyperconverged")
            .set_updated()
            .set_overwritten(true);
        assert!(res.updated && res.overwritten && !res.created);
        assert_eq!(res.type_, "KubeVirt");
        assert!(res.err.is_none());
    }
}
