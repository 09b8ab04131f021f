//! Main controller implementation.

use crate::credentials::KubeSecretSource;
use crate::error::ControllerError;
use crate::events::KubeEventSink;
use crate::reconciler::Reconciler;
use crate::watcher::{run_machine_set_controller, Context};
use crds::MachineSet;
use kube::runtime::events::Recorder;
use kube::{Api, Client};
use std::sync::Arc;
use tracing::info;
use vpc_client::DefaultVpcClientBuilder;

/// Main controller for machineset capacity annotations.
pub struct Controller {
    ctx: Arc<Context>,
    machine_set_api: Api<MachineSet>,
}

impl Controller {
    /// Creates a new controller instance.
    pub async fn new(
        service_url: Option<String>,
        namespace: Option<String>,
    ) -> Result<Self, ControllerError> {
        info!("Initializing MachineSet Controller");

        let client = Client::try_default().await?;

        let machine_set_api: Api<MachineSet> = match namespace.as_deref() {
            Some(namespace) => Api::namespaced(client.clone(), namespace),
            None => Api::all(client.clone()),
        };

        let recorder = Recorder::new(client.clone(), "machineset-controller".into());

        let reconciler = Reconciler::new(
            Arc::new(KubeSecretSource::new(client.clone())),
            Arc::new(DefaultVpcClientBuilder { service_url }),
            Arc::new(KubeEventSink::new(recorder)),
        );

        Ok(Self {
            ctx: Arc::new(Context {
                reconciler,
                machine_set_api: machine_set_api.clone(),
            }),
            machine_set_api,
        })
    }

    /// Runs the controller until shutdown.
    pub async fn run(self) -> Result<(), ControllerError> {
        info!("MachineSet Controller running");
        run_machine_set_controller(self.machine_set_api, self.ctx).await
    }
}
