//! Actuator: the per-event adapter between the controller loop and the
//! reconciler.
//!
//! For every machine change the actuator builds a fresh scope, runs the
//! matching reconciler operation, emits the user-facing event, and closes
//! the scope regardless of how the operation went: partial progress such
//! as a failure condition must land in the status even when the operation
//! itself errored. Requeue outcomes are successes and never produce
//! warning events.

use crate::credentials::SecretSource;
use crate::error::ControllerError;
use crate::events::{EventSeverity, EventSink};
use crate::reconciler::{ReconcileStatus, Reconciler};
use crate::scope::{MachineScope, MachineScopeParams, MachineStore};
use crds::Machine;
use std::sync::Arc;
use tracing::warn;
use vpc_client::VpcClientBuilder;

/// Dependencies for building an [`Actuator`].
pub struct ActuatorParams {
    /// Machine write access
    pub machines: Arc<dyn MachineStore>,
    /// Secret read access
    pub secrets: Arc<dyn SecretSource>,
    /// Event publication
    pub events: Arc<dyn EventSink>,
    /// Cloud client factory
    pub builder: Arc<dyn VpcClientBuilder>,
}

/// Per-event adapter invoked by the controller loop.
pub struct Actuator {
    machines: Arc<dyn MachineStore>,
    secrets: Arc<dyn SecretSource>,
    events: Arc<dyn EventSink>,
    builder: Arc<dyn VpcClientBuilder>,
}

impl Actuator {
    /// Build an actuator from its dependencies.
    pub fn new(params: ActuatorParams) -> Self {
        Self {
            machines: params.machines,
            secrets: params.secrets,
            events: params.events,
            builder: params.builder,
        }
    }

    /// Create the instance backing a machine.
    pub async fn create(&self, machine: &Machine) -> Result<ReconcileStatus, ControllerError> {
        self.run(machine, Operation::Create).await
    }

    /// Refresh a machine from live cloud state.
    pub async fn update(&self, machine: &Machine) -> Result<ReconcileStatus, ControllerError> {
        self.run(machine, Operation::Update).await
    }

    /// Delete the instance backing a machine.
    pub async fn delete(&self, machine: &Machine) -> Result<ReconcileStatus, ControllerError> {
        self.run(machine, Operation::Delete).await
    }

    /// Whether the instance backing a machine exists. Read-only: no scope
    /// close, no events.
    pub async fn machine_exists(&self, machine: &Machine) -> Result<bool, ControllerError> {
        let mut scope = self.scope_for(machine).await?;
        Reconciler::new(&mut scope).exists().await
    }

    async fn run(
        &self,
        machine: &Machine,
        operation: Operation,
    ) -> Result<ReconcileStatus, ControllerError> {
        let name = machine.metadata.name.as_deref().unwrap_or("<unknown>");

        let mut scope = match self.scope_for(machine).await {
            Ok(scope) => scope,
            Err(err) => {
                self.events
                    .publish(
                        machine,
                        EventSeverity::Warning,
                        operation.failure_reason(),
                        operation.action(),
                        format!("{name}: failed to create scope for machine: {err}"),
                    )
                    .await;
                return Err(err);
            }
        };

        let result = {
            let mut reconciler = Reconciler::new(&mut scope);
            match operation {
                Operation::Create => reconciler.create().await,
                Operation::Update => reconciler.update().await,
                Operation::Delete => reconciler.delete().await,
            }
        };

        // Close unconditionally so partial progress (a failure condition,
        // refreshed status fields) is persisted even when the operation
        // errored. The operation error wins over a close error.
        let close_result = scope.close().await;

        match result {
            Ok(status) => {
                self.events
                    .publish(
                        machine,
                        EventSeverity::Normal,
                        operation.success_reason(),
                        operation.action(),
                        format!("{} machine {name}", operation.success_reason()),
                    )
                    .await;
                close_result?;
                Ok(status)
            }
            Err(err) => {
                if let Err(close_err) = close_result {
                    warn!("{}: failed to close machine scope: {}", name, close_err);
                }
                self.events
                    .publish(
                        machine,
                        EventSeverity::Warning,
                        operation.failure_reason(),
                        operation.action(),
                        format!(
                            "{name}: reconciler failed to {} machine: {err}",
                            operation.action()
                        ),
                    )
                    .await;
                Err(err)
            }
        }
    }

    async fn scope_for(&self, machine: &Machine) -> Result<MachineScope, ControllerError> {
        MachineScope::new(MachineScopeParams {
            machine,
            machines: self.machines.clone(),
            secrets: self.secrets.clone(),
            builder: self.builder.as_ref(),
        })
        .await
    }
}

#[derive(Debug, Clone, Copy)]
enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    fn action(self) -> &'static str {
        match self {
            Operation::Create => "Create",
            Operation::Update => "Update",
            Operation::Delete => "Delete",
        }
    }

    fn success_reason(self) -> &'static str {
        match self {
            Operation::Create => "Created",
            Operation::Update => "Updated",
            Operation::Delete => "Deleted",
        }
    }

    fn failure_reason(self) -> &'static str {
        match self {
            Operation::Create => "FailedCreate",
            Operation::Update => "FailedUpdate",
            Operation::Delete => "FailedDelete",
        }
    }
}
