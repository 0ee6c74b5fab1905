//! Per-reconcile request context.

use crate::conditions::ConditionSet;
use hco_crds::HyperConverged;
use tracing::Span;

/// Mutable state threaded through every operand of one reconcile.
#[derive(Debug, Clone)]
pub struct HcoRequest {
    /// Working copy of the HyperConverged resource; status edits land here first
    pub instance: HyperConverged,
    /// Conditions aggregated from the downstream objects during this pass
    pub conditions: ConditionSet,
    /// Spec or metadata of `instance` changed and must be written back
    pub dirty: bool,
    /// Status of `instance` changed and must be written back
    pub status_dirty: bool,
    pub upgrade_mode: bool,
    /// Cleared by the first operand that is not yet upgraded
    pub component_upgrade_in_progress: bool,
    /// The reconcile was queued by a change to the HyperConverged resource
    /// itself rather than by drift on a downstream object
    pub hco_triggered: bool,
    /// Span carrying the resource identity
    pub span: Span,
}

impl HcoRequest {
    pub fn new(instance: HyperConverged) -> Self {
        Self {
            instance,
            conditions: ConditionSet::new(),
            dirty: false,
            status_dirty: false,
            upgrade_mode: false,
            component_upgrade_in_progress: false,
            hco_triggered: true,
            span: Span::current(),
        }
    }

    /// Sets both the upgrade mode and the in-progress flag.
    pub fn set_upgrade_mode(&mut self, upgrade_mode: bool) {
        self.upgrade_mode = upgrade_mode;
        self.component_upgrade_in_progress = upgrade_mode;
    }

    /// Builder variant of [`HcoRequest::set_upgrade_mode`].
    #[must_use]
    pub fn with_upgrade_mode(mut self, upgrade_mode: bool) -> Self {
        self.set_upgrade_mode(upgrade_mode);
        self
    }

    #[must_use]
    pub fn with_hco_triggered(mut self, hco_triggered: bool) -> Self {
        self.hco_triggered = hco_triggered;
        self
    }

    /// Name of the HyperConverged resource.
    pub fn name(&self) -> &str {
        self.instance.metadata.name.as_deref().unwrap_or_default()
    }

    /// Namespace of the HyperConverged resource.
    pub fn namespace(&self) -> &str {
        self.instance.metadata.namespace.as_deref().unwrap_or_default()
    }

    pub fn generation(&self) -> Option<i64> {
        self.instance.metadata.generation
    }
}
