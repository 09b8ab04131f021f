//! User-facing Kubernetes events.
//!
//! The actuator is the only layer that emits events; everything below it
//! just returns errors. The [`EventSink`] trait keeps event publication
//! mockable in actuator tests.

use crds::Machine;
use kube::runtime::events::{Event, EventType, Recorder};
use kube::runtime::reflector::ObjectRef;
use tracing::warn;

/// Severity of a published event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSeverity {
    /// Routine progress
    Normal,
    /// Something the user should look at
    Warning,
}

/// Publishes events about a machine.
#[async_trait::async_trait]
pub trait EventSink: Send + Sync {
    /// Publish one event. Failures to publish must not fail the
    /// reconciliation; implementations log and move on.
    async fn publish(
        &self,
        machine: &Machine,
        severity: EventSeverity,
        reason: &str,
        action: &str,
        note: String,
    );
}

/// [`EventSink`] backed by the Kubernetes event recorder.
pub struct KubeEventSink {
    recorder: Recorder,
}

impl KubeEventSink {
    /// Wrap an event recorder.
    pub fn new(recorder: Recorder) -> Self {
        Self { recorder }
    }
}

#[async_trait::async_trait]
impl EventSink for KubeEventSink {
    async fn publish(
        &self,
        machine: &Machine,
        severity: EventSeverity,
        reason: &str,
        action: &str,
        note: String,
    ) {
        let type_ = match severity {
            EventSeverity::Normal => EventType::Normal,
            EventSeverity::Warning => EventType::Warning,
        };
        let reference: k8s_openapi::api::core::v1::ObjectReference =
            ObjectRef::from_obj(machine).into();
        let event = Event {
            type_,
            reason: reason.to_string(),
            note: Some(note),
            action: action.to_string(),
            secondary: None,
        };
        if let Err(err) = self.recorder.publish(&event, &reference).await {
            warn!("failed to publish event for machine: {}", err);
        }
    }
}
