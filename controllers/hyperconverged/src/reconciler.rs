//! HyperConverged reconcile logic.
//!
//! One pass: fetch the resource, run the operand pipeline, fold the
//! collected conditions into the status and write back what changed.
//! Deletion is held back by a finalizer until every produced object is gone.

use crate::backoff::BackoffTracker;
use crate::conditions::ConditionSet;
use crate::config::OperatorConfig;
use crate::error::ControllerError;
use crate::operand_handler::OperandHandler;
use crate::request::HcoRequest;
use cluster_store::{typed, ObjectStore};
use hco_crds::condition_types::{AVAILABLE, DEGRADED, PROGRESSING, RECONCILE_COMPLETE, TAINTED_CONFIGURATION, UPGRADEABLE};
use hco_crds::{
    find_status_condition, remove_status_condition, set_status_condition, Condition, ConditionStatus, HyperConverged,
    JSON_PATCH_CDI_ANNOTATION, JSON_PATCH_CNAO_ANNOTATION, JSON_PATCH_KUBEVIRT_ANNOTATION, JSON_PATCH_SSP_ANNOTATION,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, info_span, warn, Instrument};

/// Finalizer holding the HyperConverged resource until teardown finished.
pub const FINALIZER_NAME: &str = "kubevirt.io/hyperconverged";

/// Key of the operator entry in `status.versions`.
pub const OPERATOR_VERSION_KEY: &str = "operator";

pub const RECONCILE_COMPLETED: &str = "ReconcileCompleted";
pub const RECONCILE_INIT: &str = "Init";
const RECONCILE_INIT_MESSAGE: &str = "Initializing HyperConverged cluster";
const UPGRADING_REASON: &str = "HCOUpgrading";
const TAINTED_REASON: &str = "UnsupportedFeatureAnnotation";
const TAINTED_MESSAGE: &str = "Unsupported feature was activated via an HCO annotation";

pub const SYSTEM_HEALTH_HEALTHY: &str = "healthy";
pub const SYSTEM_HEALTH_WARNING: &str = "warning";
pub const SYSTEM_HEALTH_ERROR: &str = "error";

/// Periodic resync when everything is healthy.
pub const RESYNC_INTERVAL: Duration = Duration::from_secs(300);
/// Requeue delay while components are still converging.
pub const NOT_READY_REQUEUE: Duration = Duration::from_secs(10);
/// Requeue delay between the teardown steps.
pub const DELETION_REQUEUE: Duration = Duration::from_secs(1);

const JSON_PATCH_ANNOTATIONS: [&str; 4] = [
    JSON_PATCH_KUBEVIRT_ANNOTATION,
    JSON_PATCH_CDI_ANNOTATION,
    JSON_PATCH_CNAO_ANNOTATION,
    JSON_PATCH_SSP_ANNOTATION,
];

fn has_finalizer(meta: &ObjectMeta) -> bool {
    meta.finalizers.as_ref().is_some_and(|f| f.iter().any(|s| s == FINALIZER_NAME))
}

/// Adds the finalizer. Returns true when it was missing.
fn add_finalizer(meta: &mut ObjectMeta) -> bool {
    if has_finalizer(meta) {
        return false;
    }
    meta.finalizers.get_or_insert_with(Vec::new).push(FINALIZER_NAME.to_string());
    true
}

fn remove_finalizer(meta: &mut ObjectMeta) {
    if let Some(finalizers) = meta.finalizers.as_mut() {
        finalizers.retain(|f| f != FINALIZER_NAME);
    }
}

/// Health summary of a condition list.
pub fn system_health(conditions: &[Condition]) -> &'static str {
    let is = |type_: &str, status: ConditionStatus| {
        find_status_condition(conditions, type_).is_some_and(|c| c.status == status)
    };
    if is(DEGRADED, ConditionStatus::True) {
        SYSTEM_HEALTH_ERROR
    } else if is(AVAILABLE, ConditionStatus::False) || is(PROGRESSING, ConditionStatus::True) {
        SYSTEM_HEALTH_WARNING
    } else {
        SYSTEM_HEALTH_HEALTHY
    }
}

/// Completes the aggregated set: every type no component complained about
/// gets its healthy value.
fn with_defaults(mut set: ConditionSet, generation: Option<i64>) -> ConditionSet {
    let defaults = [
        (AVAILABLE, ConditionStatus::True),
        (PROGRESSING, ConditionStatus::False),
        (DEGRADED, ConditionStatus::False),
        (UPGRADEABLE, ConditionStatus::True),
    ];
    for (type_, status) in defaults {
        set.set_status_condition_if_unset(
            Condition::new(type_, status, RECONCILE_COMPLETED, "Reconcile completed successfully")
                .with_generation(generation),
        );
    }
    set.set_status_condition(
        Condition::new(
            RECONCILE_COMPLETE,
            ConditionStatus::True,
            RECONCILE_COMPLETED,
            "Reconcile completed successfully",
        )
        .with_generation(generation),
    );
    set
}

/// Conditions of a HyperConverged resource that has never been reconciled.
fn initial_conditions(generation: Option<i64>) -> ConditionSet {
    let mut set = ConditionSet::new();
    for (type_, status) in [
        (RECONCILE_COMPLETE, ConditionStatus::Unknown),
        (AVAILABLE, ConditionStatus::False),
        (PROGRESSING, ConditionStatus::True),
        (DEGRADED, ConditionStatus::False),
        (UPGRADEABLE, ConditionStatus::Unknown),
    ] {
        set.set_status_condition(
            Condition::new(type_, status, RECONCILE_INIT, RECONCILE_INIT_MESSAGE).with_generation(generation),
        );
    }
    set
}

/// Drives the HyperConverged resource.
pub struct Reconciler {
    store: Arc<dyn ObjectStore>,
    cfg: Arc<OperatorConfig>,
    handler: OperandHandler,
    backoff: BackoffTracker,
}

impl Reconciler {
    pub fn new(store: Arc<dyn ObjectStore>, cfg: Arc<OperatorConfig>, handler: OperandHandler) -> Self {
        Self {
            store,
            cfg,
            handler,
            backoff: BackoffTracker::new(),
        }
    }

    pub fn backoff(&self) -> &BackoffTracker {
        &self.backoff
    }

    /// Reconciles the resource `hc` points at.
    pub async fn reconcile(&self, hc: &HyperConverged) -> Result<Action, ControllerError> {
        let name = hc.name_any();
        let namespace = hc.namespace().unwrap_or_default();
        let span = info_span!("reconcile", name = %name, namespace = %namespace);
        self.reconcile_named(&namespace, &name).instrument(span).await
    }

    async fn reconcile_named(&self, namespace: &str, name: &str) -> Result<Action, ControllerError> {
        let store = self.store.as_ref();
        let Some(instance) = typed::get_opt::<HyperConverged>(store, Some(namespace), name).await? else {
            debug!("HyperConverged resource is gone");
            return Ok(Action::await_change());
        };
        if namespace != self.cfg.namespace {
            warn!(expected = %self.cfg.namespace, "Ignoring HyperConverged resource outside the operator namespace");
            return Ok(Action::await_change());
        }

        self.handler.reset();
        // an unchanged generation means the pass was queued by drift downstream
        let hco_triggered = instance.status.as_ref().and_then(|s| s.observed_generation) != instance.metadata.generation;
        let init = instance.status.as_ref().is_none_or(|s| s.conditions.is_empty());
        let mut req = HcoRequest::new(instance).with_hco_triggered(hco_triggered);

        if req.instance.metadata.deletion_timestamp.is_some() {
            return self.reconcile_deletion(req).await;
        }

        if add_finalizer(&mut req.instance.metadata) {
            req.dirty = true;
        }

        let known_version = req
            .instance
            .status
            .as_ref()
            .and_then(|s| s.version(OPERATOR_VERSION_KEY))
            .map(str::to_string);
        let upgrading = known_version.as_ref().is_some_and(|v| *v != self.cfg.operator_version);
        if upgrading {
            info!(
                from = known_version.as_deref().unwrap_or_default(),
                to = %self.cfg.operator_version,
                "Upgrade detected"
            );
        }
        // a fresh install completes like an upgrade from nothing
        req.set_upgrade_mode(known_version.is_none() || upgrading);

        if let Err(e) = self.handler.ensure(&mut req).await {
            let mut conditions = if init {
                initial_conditions(req.generation())
            } else {
                ConditionSet::new()
            };
            for condition in req.conditions.iter() {
                conditions.set_status_condition(condition.clone());
            }
            self.write_conditions(&mut req, conditions, false);
            self.write_back(&mut req).await?;
            return Err(e);
        }

        if init {
            // the components were just created and report nothing yet
            info!("HyperConverged resource initialized");
            let generation = req.generation();
            self.write_conditions(&mut req, initial_conditions(generation), true);
            self.write_back(&mut req).await?;
            return Ok(Action::requeue(NOT_READY_REQUEUE));
        }

        let mut conditions = req.conditions.clone();
        if req.upgrade_mode && req.component_upgrade_in_progress {
            info!(version = %self.cfg.operator_version, "Upgrade completed");
            req.instance
                .status
                .get_or_insert_with(Default::default)
                .set_version(OPERATOR_VERSION_KEY, &self.cfg.operator_version);
            req.status_dirty = true;
        } else if upgrading {
            let message = format!("HCO is now upgrading to version {}", self.cfg.operator_version);
            let generation = req.generation();
            conditions.set_status_condition(
                Condition::new(PROGRESSING, ConditionStatus::True, UPGRADING_REASON, message.clone())
                    .with_generation(generation),
            );
            conditions.set_status_condition(
                Condition::new(UPGRADEABLE, ConditionStatus::False, UPGRADING_REASON, message)
                    .with_generation(generation),
            );
        }

        let generation = req.generation();
        self.write_conditions(&mut req, with_defaults(conditions, generation), true);
        self.write_back(&mut req).await?;

        let status = req.instance.status.as_ref();
        let healthy = status.is_some_and(|s| s.system_health_status.as_deref() == Some(SYSTEM_HEALTH_HEALTHY));
        Ok(if healthy && !req.upgrade_mode {
            Action::requeue(RESYNC_INTERVAL)
        } else {
            Action::requeue(NOT_READY_REQUEUE)
        })
    }

    async fn reconcile_deletion(&self, mut req: HcoRequest) -> Result<Action, ControllerError> {
        if !has_finalizer(&req.instance.metadata) {
            return Ok(Action::await_change());
        }

        info!("HyperConverged resource is being deleted");
        let requeue = self.handler.cleanup_before_deletion(&mut req).await?;
        if requeue {
            self.write_back(&mut req).await?;
            return Ok(Action::requeue(DELETION_REQUEUE));
        }

        self.handler.ensure_deleted(&req).await?;

        remove_finalizer(&mut req.instance.metadata);
        typed::update(self.store.as_ref(), &req.instance, false).await?;
        info!("Teardown completed, finalizer removed");
        Ok(Action::await_change())
    }

    /// Moves the aggregated conditions into the status. Only a successful
    /// pass records the generation as observed.
    fn write_conditions(&self, req: &mut HcoRequest, set: ConditionSet, succeeded: bool) {
        let generation = req.generation();
        let tainted = JSON_PATCH_ANNOTATIONS
            .iter()
            .any(|a| req.instance.annotations().contains_key(*a));

        let status = req.instance.status.get_or_insert_with(Default::default);
        let mut changed = false;
        for condition in set.iter() {
            changed |= set_status_condition(&mut status.conditions, condition.clone());
        }
        if tainted {
            changed |= set_status_condition(
                &mut status.conditions,
                Condition::new(TAINTED_CONFIGURATION, ConditionStatus::True, TAINTED_REASON, TAINTED_MESSAGE)
                    .with_generation(generation),
            );
        } else {
            changed |= remove_status_condition(&mut status.conditions, TAINTED_CONFIGURATION);
        }

        let health = system_health(&status.conditions);
        if status.system_health_status.as_deref() != Some(health) {
            status.system_health_status = Some(health.to_string());
            changed = true;
        }
        if succeeded && status.observed_generation != generation {
            status.observed_generation = generation;
            changed = true;
        }
        req.status_dirty |= changed;
    }

    /// Writes metadata/spec first, then the status.
    async fn write_back(&self, req: &mut HcoRequest) -> Result<(), ControllerError> {
        let store = self.store.as_ref();
        if req.dirty {
            let status = req.instance.status.clone();
            let mut updated = typed::update(store, &req.instance, false).await?;
            updated.status = status;
            req.instance = updated;
            req.dirty = false;
        }
        if req.status_dirty {
            req.instance = typed::update_status(store, &req.instance).await?;
            req.status_dirty = false;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "reconciler_test.rs"]
mod reconciler_test;
