//! User-facing Kubernetes events for MachineSets.

use crds::MachineSet;
use kube::runtime::events::{Event, EventType, Recorder};
use kube::runtime::reflector::ObjectRef;
use tracing::warn;

/// Publishes events about a machineset.
#[async_trait::async_trait]
pub trait EventSink: Send + Sync {
    /// Publish one warning event; publish failures are logged, not
    /// propagated.
    async fn warn(&self, machine_set: &MachineSet, reason: &str, note: String);
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
    async fn warn(&self, machine_set: &MachineSet, reason: &str, note: String) {
        let reference: k8s_openapi::api::core::v1::ObjectReference =
            ObjectRef::from_obj(machine_set).into();
        let event = Event {
            type_: EventType::Warning,
            reason: reason.to_string(),
            note: Some(note),
            action: "Reconcile".to_string(),
            secondary: None,
        };
        if let Err(err) = self.recorder.publish(&event, &reference).await {
            warn!("failed to publish event for machineset: {}", err);
        }
    }
}
