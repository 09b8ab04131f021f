//! Main controller implementation.
//!
//! Wires the Kubernetes client, event recorder, cloud client builder and
//! actuator together and runs the machine watcher.

use crate::actuator::{Actuator, ActuatorParams};
use crate::credentials::KubeSecretSource;
use crate::error::ControllerError;
use crate::events::KubeEventSink;
use crate::scope::KubeMachineStore;
use crate::watcher::{run_machine_controller, Context};
use crds::Machine;
use kube::runtime::events::Recorder;
use kube::{Api, Client};
use std::sync::Arc;
use tracing::info;
use vpc_client::DefaultVpcClientBuilder;

/// Main controller for machine reconciliation.
pub struct Controller {
    ctx: Arc<Context>,
    machine_api: Api<Machine>,
}

impl Controller {
    /// Creates a new controller instance.
    ///
    /// `service_url` overrides the region-derived cloud endpoint;
    /// `namespace` restricts the watch, defaulting to all namespaces.
    pub async fn new(
        service_url: Option<String>,
        namespace: Option<String>,
    ) -> Result<Self, ControllerError> {
        info!("Initializing Machine Controller");

        let client = Client::try_default().await?;

        let machine_api: Api<Machine> = match namespace.as_deref() {
            Some(namespace) => Api::namespaced(client.clone(), namespace),
            None => Api::all(client.clone()),
        };

        let recorder = Recorder::new(client.clone(), "machine-controller".into());

        let actuator = Actuator::new(ActuatorParams {
            machines: Arc::new(KubeMachineStore::new(client.clone())),
            secrets: Arc::new(KubeSecretSource::new(client.clone())),
            events: Arc::new(KubeEventSink::new(recorder)),
            builder: Arc::new(DefaultVpcClientBuilder { service_url }),
        });

        Ok(Self {
            ctx: Arc::new(Context {
                actuator,
                machine_api: machine_api.clone(),
            }),
            machine_api,
        })
    }

    /// Runs the controller until shutdown.
    pub async fn run(self) -> Result<(), ControllerError> {
        info!("Machine Controller running");
        run_machine_controller(self.machine_api, self.ctx).await
    }
}
