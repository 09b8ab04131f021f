//! Machine controller loop.
//!
//! Drives the actuator from a `kube_runtime::Controller`: deletion
//! timestamps route to delete (with finalizer removal once the instance
//! is confirmed gone), everything else branches on instance existence.
//! Reconcile outcomes map onto controller actions; configuration errors
//! wait for a spec edit instead of burning retries.

use crate::actuator::Actuator;
use crate::error::ControllerError;
use crate::reconciler::ReconcileStatus;
use crds::Machine;
use futures::StreamExt;
use kube::api::{Api, Patch, PatchParams};
use kube_runtime::{controller::Action, watcher, Controller};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Finalizer guarding machines until their instance is confirmed deleted.
pub const MACHINE_FINALIZER: &str = "machine.vpcoperator.io/finalizer";

/// Shared state handed to every reconcile invocation.
pub struct Context {
    /// The actuator performing the actual work
    pub actuator: Actuator,
    /// API handle used for finalizer patches
    pub machine_api: Api<Machine>,
}

fn has_finalizer(machine: &Machine) -> bool {
    machine
        .metadata
        .finalizers
        .as_ref()
        .map(|finalizers| finalizers.iter().any(|f| f == MACHINE_FINALIZER))
        .unwrap_or(false)
}

async fn set_finalizers(
    api: &Api<Machine>,
    machine: &Machine,
    finalizers: Vec<String>,
) -> Result<(), ControllerError> {
    let name = machine
        .metadata
        .name
        .as_deref()
        .ok_or_else(|| ControllerError::Watch("machine has no name".to_string()))?;
    let patch = serde_json::json!({ "metadata": { "finalizers": finalizers } });
    api.patch(name, &PatchParams::default(), &Patch::Merge(&patch))
        .await?;
    Ok(())
}

async fn reconcile(machine: Arc<Machine>, ctx: Arc<Context>) -> Result<Action, ControllerError> {
    let name = machine.metadata.name.as_deref().unwrap_or("<unknown>");
    debug!("reconciling machine {}", name);

    if machine.metadata.deletion_timestamp.is_some() {
        if !has_finalizer(&machine) {
            return Ok(Action::await_change());
        }
        return match ctx.actuator.delete(&machine).await {
            Ok(ReconcileStatus::Done) => {
                // Instance confirmed absent; release the machine object.
                let remaining: Vec<String> = machine
                    .metadata
                    .finalizers
                    .clone()
                    .unwrap_or_default()
                    .into_iter()
                    .filter(|f| f != MACHINE_FINALIZER)
                    .collect();
                set_finalizers(&ctx.machine_api, &machine, remaining).await?;
                info!("{}: machine released", name);
                Ok(Action::await_change())
            }
            Ok(ReconcileStatus::RequeueAfter(delay)) => Ok(Action::requeue(delay)),
            Err(err) if err.is_invalid_configuration() => {
                error!("{}: {}", name, err);
                Ok(Action::await_change())
            }
            Err(err) => Err(err),
        };
    }

    if !has_finalizer(&machine) {
        let mut finalizers = machine.metadata.finalizers.clone().unwrap_or_default();
        finalizers.push(MACHINE_FINALIZER.to_string());
        set_finalizers(&ctx.machine_api, &machine, finalizers).await?;
    }

    let result = match ctx.actuator.machine_exists(&machine).await {
        Ok(true) => ctx.actuator.update(&machine).await,
        Ok(false) => ctx.actuator.create(&machine).await,
        Err(err) => Err(err),
    };

    match result {
        Ok(ReconcileStatus::Done) => Ok(Action::await_change()),
        Ok(ReconcileStatus::RequeueAfter(delay)) => Ok(Action::requeue(delay)),
        Err(err) if err.is_invalid_configuration() => {
            // Requeuing cannot fix a bad spec; wait for the user to edit it
            error!("{}: {}", name, err);
            Ok(Action::await_change())
        }
        Err(err) => Err(err),
    }
}

/// Error policy: requeue with a flat backoff on errors.
fn error_policy(machine: Arc<Machine>, error: &ControllerError, _ctx: Arc<Context>) -> Action {
    error!(
        "reconciliation error for machine {:?}: {}",
        machine.metadata.name, error
    );
    Action::requeue(Duration::from_secs(60))
}

/// Run the controller until its watch stream ends.
pub async fn run_machine_controller(
    api: Api<Machine>,
    ctx: Arc<Context>,
) -> Result<(), ControllerError> {
    info!("Starting machine watcher");

    Controller::new(api, watcher::Config::default())
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            if let Err(err) = result {
                error!("Controller error: {}", err);
            }
        })
        .await;

    Ok(())
}
