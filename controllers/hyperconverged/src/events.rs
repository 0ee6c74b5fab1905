//! Kubernetes Event recording.
//!
//! Events are fire-and-forget: a failed publish is logged and never breaks
//! the reconcile that emitted it.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::Client;
use std::sync::{Mutex, PoisonError};
use tracing::warn;

/// Event reasons emitted by the operator.
pub mod reasons {
    pub const CREATED: &str = "Created";
    pub const UPDATED: &str = "Updated";
    pub const OVERWRITTEN: &str = "Overwritten";
    pub const KILLING: &str = "Killing";
    pub const ERR_VIRT_UNINSTALL: &str = "ErrVirtUninstall";
    pub const ERR_CDI_UNINSTALL: &str = "ErrCDIUninstall";
    pub const ERR_HCO_UNINSTALL: &str = "ErrHCOUninstall";
}

/// Event actions emitted by the operator.
pub mod actions {
    pub const RECONCILE: &str = "Reconcile";
    pub const DELETE: &str = "Delete";
}

/// Publishes Kubernetes Events about the HyperConverged resource.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish one event on `resource_ref`.
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    );
}

/// `Recorder`-backed publisher.
pub struct KubeEventPublisher {
    recorder: Recorder,
}

impl KubeEventPublisher {
    /// Publisher reporting as `controller_name`.
    pub fn new(client: Client, controller_name: &str) -> Self {
        let reporter = Reporter {
            controller: controller_name.to_string(),
            instance: None,
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventPublisher for KubeEventPublisher {
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        let event = Event {
            type_,
            reason: reason.to_string(),
            note,
            action: action.to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&event, resource_ref).await {
            warn!(reason, action, error = %e, "Failed to publish Kubernetes event");
        }
    }
}

/// An event captured by [`RecordingEventPublisher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    pub warning: bool,
    pub reason: String,
    pub action: String,
    pub note: String,
}

/// Keeps every event in memory; used by tests.
#[derive(Debug, Default)]
pub struct RecordingEventPublisher {
    events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events published so far, oldest first.
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Events with the given reason.
    pub fn with_reason(&self, reason: &str) -> Vec<RecordedEvent> {
        self.events().into_iter().filter(|e| e.reason == reason).collect()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

#[async_trait]
impl EventPublisher for RecordingEventPublisher {
    async fn publish(
        &self,
        _resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedEvent {
                warning: matches!(type_, EventType::Warning),
                reason: reason.to_string(),
                action: action.to_string(),
                note: note.unwrap_or_default(),
            });
    }
}
