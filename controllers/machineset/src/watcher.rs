//! MachineSet controller loop.
//!
//! Runs the capacity-annotation reconciler from a
//! `kube_runtime::Controller` and merge-patches the computed annotations
//! onto the machineset. The patch carries only the annotation keys this
//! controller owns, so unrelated concurrent changes are untouched.

use crate::error::ControllerError;
use crate::reconciler::Reconciler;
use crds::MachineSet;
use futures::StreamExt;
use kube::api::{Api, Patch, PatchParams};
use kube_runtime::{controller::Action, watcher, Controller};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Shared state handed to every reconcile invocation.
pub struct Context {
    /// The annotation reconciler
    pub reconciler: Reconciler,
    /// API handle used for annotation patches
    pub machine_set_api: Api<MachineSet>,
}

async fn reconcile(
    machine_set: Arc<MachineSet>,
    ctx: Arc<Context>,
) -> Result<Action, ControllerError> {
    let name = machine_set.metadata.name.as_deref().unwrap_or("<unknown>");
    debug!("reconciling machineset {}", name);

    // Ignore machinesets being deleted; there is nothing to clean up for
    // an annotation.
    if machine_set.metadata.deletion_timestamp.is_some() {
        return Ok(Action::await_change());
    }

    let result = ctx.reconciler.reconcile(&machine_set).await;

    match result {
        Ok(Some(annotations)) => {
            let patch = serde_json::json!({ "metadata": { "annotations": annotations } });
            ctx.machine_set_api
                .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
                .await?;
            Ok(Action::await_change())
        }
        Ok(None) => Ok(Action::await_change()),
        Err(err) if err.is_invalid_configuration() => {
            // Requeuing cannot fix a bad template; wait for the user to
            // edit it
            error!("{}: {}", name, err);
            Ok(Action::await_change())
        }
        Err(err) => Err(err),
    }
}

/// Error policy: requeue with a flat backoff on errors.
fn error_policy(
    machine_set: Arc<MachineSet>,
    error: &ControllerError,
    _ctx: Arc<Context>,
) -> Action {
    error!(
        "reconciliation error for machineset {:?}: {}",
        machine_set.metadata.name, error
    );
    Action::requeue(Duration::from_secs(60))
}

/// Run the controller until its watch stream ends.
pub async fn run_machine_set_controller(
    api: Api<MachineSet>,
    ctx: Arc<Context>,
) -> Result<(), ControllerError> {
    info!("Starting machineset watcher");

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
