//! MachineSet Controller
//!
//! Stamps instance-profile capacity annotations (profile, vCPU, memory)
//! onto MachineSet resources so autoscale-from-zero tooling can predict
//! the capacity a scale-up would add.

mod controller;
mod credentials;
mod error;
mod events;
mod reconciler;
mod watcher;

#[cfg(test)]
mod test_utils;

use crate::controller::Controller;
use crate::error::ControllerError;
use std::env;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt::init();

    info!("Starting MachineSet Controller");

    // Load configuration from environment variables
    let service_url = env::var("VPC_SERVICE_URL").ok();
    let namespace = env::var("WATCH_NAMESPACE").ok();

    info!("Configuration:");
    info!(
        "  VPC service URL: {}",
        service_url.as_deref().unwrap_or("derived from machine region")
    );
    info!(
        "  Namespace: {}",
        namespace.as_deref().unwrap_or("all namespaces")
    );

    // Initialize and run controller
    let controller = Controller::new(service_url, namespace).await?;
    controller.run().await?;

    Ok(())
}
