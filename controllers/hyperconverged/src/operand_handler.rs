//! Operand orchestration.
//!
//! [`OperandHandler`] owns the ordered operand list, runs it once per
//! reconcile, turns the results into Events and tears everything down again
//! when the HyperConverged resource is deleted.

use crate::config::OperatorConfig;
use crate::error::ControllerError;
use crate::events::{actions, reasons, EventPublisher};
use crate::operands::ssp::{ssp_name, CommonDicts};
use crate::operands::{
    cdi, console, dashboard, hc_namespace, image_stream, kubevirt, migration, network_addons, quick_start, ssp,
    virtio_win, EnsureResult, ObjectIdentity, Operand,
};
use crate::related::object_reference;
use crate::request::HcoRequest;
use cluster_store::{typed, ObjectStore};
use futures::future::join_all;
use hco_crds::condition_types::RECONCILE_COMPLETE;
use hco_crds::{Condition, ConditionStatus, SSP};
use kube::runtime::events::EventType;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Upper bound for the whole teardown.
pub const DELETE_TIMEOUT: Duration = Duration::from_secs(30);

pub const RECONCILE_FAILED: &str = "ReconcileFailed";

const UNINSTALL_CDI_ERROR_MSG: &str = "The uninstall request failed on CDI component: ";
const UNINSTALL_VIRT_ERROR_MSG: &str = "The uninstall request failed on virt component: ";
const UNINSTALL_HCO_ERROR_MSG: &str = "The uninstall request failed on dependent components, please check their logs.";

/// When an operand's objects are removed during teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownPhase {
    /// Together with everything else, in parallel
    First,
    /// After the first phase; the virtualization engine
    Virt,
    /// Last; the data importer the engine depends on
    Cdi,
}

struct Registered {
    operand: Box<dyn Operand>,
    phase: TeardownPhase,
}

/// The reconcile pipeline.
pub struct OperandHandler {
    store: Arc<dyn ObjectStore>,
    cfg: Arc<OperatorConfig>,
    events: Arc<dyn EventPublisher>,
    operands: Vec<Registered>,
}

impl OperandHandler {
    /// An empty pipeline; see [`OperandHandler::with_default_operands`].
    pub fn new(store: Arc<dyn ObjectStore>, cfg: Arc<OperatorConfig>, events: Arc<dyn EventPublisher>) -> Self {
        Self {
            store,
            cfg,
            events,
            operands: Vec::new(),
        }
    }

    /// The full pipeline: the component operands first, then the
    /// manifest-driven and plain-kind operands.
    pub fn with_default_operands(
        store: Arc<dyn ObjectStore>,
        cfg: Arc<OperatorConfig>,
        events: Arc<dyn EventPublisher>,
        common: Arc<CommonDicts>,
    ) -> Result<Self, ControllerError> {
        let mut h = Self::new(Arc::clone(&store), Arc::clone(&cfg), events);

        h.register(
            Box::new(kubevirt::new_operand(Arc::clone(&store), Arc::clone(&cfg))),
            TeardownPhase::Virt,
        );
        h.register(
            Box::new(cdi::new_operand(Arc::clone(&store), Arc::clone(&cfg))),
            TeardownPhase::Cdi,
        );
        h.add(Box::new(network_addons::new_operand(Arc::clone(&store), Arc::clone(&cfg))));
        h.add(Box::new(ssp::new_operand(Arc::clone(&store), Arc::clone(&cfg), common)));
        h.add(Box::new(migration::new_operand(Arc::clone(&store), Arc::clone(&cfg))));

        h.extend(quick_start::operands(&store, &cfg)?);
        h.extend(dashboard::operands(&store, &cfg)?);
        h.extend(image_stream::operands(&store, &cfg)?);

        if cfg.virtiowin_image.is_some() {
            h.extend(virtio_win::operands(&store, &cfg));
        } else {
            info!("VIRTIOWIN_CONTAINER is not set, skipping the virtio-win ConfigMap");
        }

        if cfg.console_plugin_enabled() {
            h.extend(console::operands(&store, &cfg));
            if cfg.deploy_network_policies {
                h.extend(console::network_policy_operands(&store, &cfg));
            }
        }

        info!(operands = h.len(), "Operand handler initialised");
        Ok(h)
    }

    /// Appends an operand torn down in the first phase.
    pub fn add(&mut self, operand: Box<dyn Operand>) {
        self.register(operand, TeardownPhase::First);
    }

    pub fn register(&mut self, operand: Box<dyn Operand>, phase: TeardownPhase) {
        self.operands.push(Registered { operand, phase });
    }

    fn extend(&mut self, operands: Vec<Box<dyn Operand>>) {
        for operand in operands {
            self.add(operand);
        }
    }

    pub fn len(&self) -> usize {
        self.operands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operands.is_empty()
    }

    async fn emit(&self, req: &HcoRequest, type_: EventType, reason: &str, action: &str, note: String) {
        self.events
            .publish(&object_reference(&req.instance), type_, reason, action, Some(note))
            .await;
    }

    async fn report(&self, req: &HcoRequest, res: &EnsureResult) {
        let (type_, reason, verb) = if res.created {
            (EventType::Normal, reasons::CREATED, "Created")
        } else if res.updated && res.overwritten {
            (EventType::Warning, reasons::OVERWRITTEN, "Overwritten")
        } else if res.updated {
            (EventType::Normal, reasons::UPDATED, "Updated")
        } else if res.deleted {
            (EventType::Normal, reasons::KILLING, "Removed")
        } else {
            return;
        };
        let note = format!("{verb} {} {}", res.type_, res.name);
        self.emit(req, type_, reason, actions::RECONCILE, note).await;
    }

    /// Runs every operand in order. Stops at the first failure, which is
    /// recorded as `ReconcileComplete=False`.
    pub async fn ensure(&self, req: &mut HcoRequest) -> Result<(), ControllerError> {
        for registered in &self.operands {
            let mut res = registered.operand.ensure(req).await;
            if let Some(err) = res.err.take() {
                error!(kind = %res.type_, name = %res.name, error = %err, "failed to Ensure an operand");
                req.component_upgrade_in_progress = false;
                let condition = Condition::new(
                    RECONCILE_COMPLETE,
                    ConditionStatus::False,
                    RECONCILE_FAILED,
                    format!("Error while reconciling: {err}"),
                )
                .with_generation(req.generation());
                req.conditions.set_status_condition(condition);
                return Err(err);
            }

            self.report(req, &res).await;
            req.component_upgrade_in_progress = req.component_upgrade_in_progress && res.upgrade_done;
        }
        Ok(())
    }

    /// Deletes `id`, emitting `Killing` on success and `reason` on failure.
    async fn delete_one(
        &self,
        req: &HcoRequest,
        id: &ObjectIdentity,
        reason: &str,
        message: impl FnOnce(&ControllerError) -> String,
    ) -> Result<(), ControllerError> {
        match self
            .store
            .delete(&id.resource, id.namespace.as_deref(), &id.name, false)
            .await
        {
            Ok(true) => {
                let note = format!("Removed {} {}", id.resource.kind, id.name);
                self.emit(req, EventType::Normal, reasons::KILLING, actions::DELETE, note).await;
                Ok(())
            }
            Ok(false) => Ok(()),
            Err(e) => {
                let err = ControllerError::from(e);
                error!(kind = %id.resource.kind, name = %id.name, error = %err, "Failed to manually delete objects");
                self.emit(req, EventType::Warning, reason, actions::DELETE, message(&err)).await;
                Err(err)
            }
        }
    }

    fn objects_of(&self, req: &HcoRequest, phase: TeardownPhase) -> Vec<ObjectIdentity> {
        self.operands
            .iter()
            .filter(|r| r.phase == phase)
            .flat_map(|r| r.operand.objects(&req.instance))
            .collect()
    }

    async fn teardown(&self, req: &HcoRequest) -> Result<(), ControllerError> {
        let first = self.objects_of(req, TeardownPhase::First);
        let results = join_all(first.iter().map(|id| {
            self.delete_one(req, id, reasons::ERR_HCO_UNINSTALL, |_| UNINSTALL_HCO_ERROR_MSG.to_string())
        }))
        .await;
        results.into_iter().collect::<Result<Vec<_>, _>>()?;

        for id in self.objects_of(req, TeardownPhase::Virt) {
            self.delete_one(req, &id, reasons::ERR_VIRT_UNINSTALL, |e| format!("{UNINSTALL_VIRT_ERROR_MSG}{e}"))
                .await?;
        }
        for id in self.objects_of(req, TeardownPhase::Cdi) {
            self.delete_one(req, &id, reasons::ERR_CDI_UNINSTALL, |e| format!("{UNINSTALL_CDI_ERROR_MSG}{e}"))
                .await?;
        }
        Ok(())
    }

    /// Removes every produced object: dependents first, then the
    /// virtualization engine, then the data importer.
    pub async fn ensure_deleted(&self, req: &HcoRequest) -> Result<(), ControllerError> {
        tokio::time::timeout(DELETE_TIMEOUT, self.teardown(req))
            .await
            .map_err(|_| ControllerError::Timeout(format!("removing the components of {}", req.name())))?
    }

    /// Runs before teardown. Returns true when the reconcile must be requeued.
    ///
    /// With the common boot image import on, the golden-image templates are
    /// first removed from the SSP CR; once the list is empty the import flag
    /// of the HyperConverged resource is switched off.
    pub async fn cleanup_before_deletion(&self, req: &mut HcoRequest) -> Result<bool, ControllerError> {
        if req.instance.spec.enable_common_boot_image_import == Some(false) {
            return Ok(false);
        }

        let namespace = hc_namespace(&req.instance, &self.cfg).to_string();
        let name = ssp_name(&req.instance);
        let Some(mut found) = typed::get_opt::<SSP>(self.store.as_ref(), Some(&namespace), &name).await? else {
            return Ok(false);
        };

        let templates = &mut found.spec.common_templates.data_import_cron_templates;
        if !templates.is_empty() {
            info!(name = %name, "Removing the golden image templates before deletion");
            templates.clear();
            typed::update(self.store.as_ref(), &found, false).await?;
            return Ok(true);
        }

        req.instance.spec.enable_common_boot_image_import = Some(false);
        req.dirty = true;
        Ok(true)
    }

    /// Drops every cached rendering; called at the start of each reconcile.
    pub fn reset(&self) {
        for registered in &self.operands {
            registered.operand.reset();
        }
    }
}

#[cfg(test)]
#[path = "operand_handler_test.rs"]
mod operand_handler_test;
