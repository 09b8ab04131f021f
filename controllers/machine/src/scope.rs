//! Machine scope: the per-reconciliation aggregate.
//!
//! A scope is built at the start of each actuator operation and owns a
//! mutable copy of the machine, the decoded provider config/status, and a
//! cloud client bound to the machine's credentials. Snapshots of the
//! machine and provider status taken at construction drive the diff at
//! `close()`, so unchanged status never burns a resource version and
//! merge patches only carry fields this controller owns.
//!
//! A scope is never shared across reconciliations; it is dropped after
//! `close()`.

use crate::credentials::{get_credentials_secret, SecretSource};
use crate::error::ControllerError;
use chrono::Utc;
use crds::{
    provider_spec_from_value, provider_spec_to_value, provider_status_from_value,
    provider_status_to_value, Machine, MachineStatus, VpcMachineProviderSpec,
    VpcMachineProviderStatus,
};
use kube::api::{Api, Patch, PatchParams};
use kube::Client;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};
use vpc_client::{VpcClient, VpcClientBuilder};

/// Write access to Machine objects, narrowed to the two patch calls the
/// scope needs so tests can capture patches in memory.
#[async_trait::async_trait]
pub trait MachineStore: Send + Sync {
    /// Merge-patch the machine's metadata and spec.
    async fn patch(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<(), kube::Error>;

    /// Merge-patch the machine's status subresource.
    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<(), kube::Error>;
}

/// [`MachineStore`] backed by the Kubernetes API.
pub struct KubeMachineStore {
    client: Client,
}

impl KubeMachineStore {
    /// Create a store writing through the given client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<Machine> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait::async_trait]
impl MachineStore for KubeMachineStore {
    async fn patch(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<(), kube::Error> {
        self.api(namespace)
            .patch(name, &PatchParams::default(), &Patch::Merge(patch))
            .await?;
        Ok(())
    }

    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<(), kube::Error> {
        self.api(namespace)
            .patch_status(name, &PatchParams::default(), &Patch::Merge(patch))
            .await?;
        Ok(())
    }
}

/// Input for building a [`MachineScope`].
pub struct MachineScopeParams<'a> {
    /// The machine as delivered by the controller event
    pub machine: &'a Machine,
    /// Machine write access
    pub machines: Arc<dyn MachineStore>,
    /// Secret read access
    pub secrets: Arc<dyn SecretSource>,
    /// Cloud client factory
    pub builder: &'a dyn VpcClientBuilder,
}

/// Per-reconciliation aggregate around one machine.
pub struct MachineScope {
    /// Mutable working copy; the reconciler writes status, labels and
    /// annotations into it
    pub machine: Machine,
    /// Decoded provider configuration
    pub provider_spec: VpcMachineProviderSpec,
    /// Decoded provider status, folded into `machine` at close
    pub provider_status: VpcMachineProviderStatus,
    /// Cloud client bound to this machine's credentials
    pub vpc: Arc<dyn VpcClient>,
    /// Secret read access for user-data resolution
    pub secrets: Arc<dyn SecretSource>,

    machines: Arc<dyn MachineStore>,
    orig_machine: Machine,
    orig_provider_status: VpcMachineProviderStatus,
}

impl std::fmt::Debug for MachineScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MachineScope")
            .field("machine", &self.machine)
            .field("provider_spec", &self.provider_spec)
            .field("provider_status", &self.provider_status)
            .field("orig_machine", &self.orig_machine)
            .field("orig_provider_status", &self.orig_provider_status)
            .finish_non_exhaustive()
    }
}

impl MachineScope {
    /// Build a scope for one actuator operation.
    ///
    /// Decode failures of the provider payload and unresolvable
    /// credentials are configuration errors; the machine cannot be
    /// reconciled until its spec changes.
    pub async fn new(params: MachineScopeParams<'_>) -> Result<Self, ControllerError> {
        let machine = params.machine.clone();

        let spec_value = machine.spec.provider_spec.as_ref().ok_or_else(|| {
            ControllerError::InvalidConfiguration(
                "machine does not carry a providerSpec payload".to_string(),
            )
        })?;
        let provider_spec = provider_spec_from_value(spec_value).map_err(|err| {
            ControllerError::InvalidConfiguration(format!("failed to get machine config: {err}"))
        })?;

        let provider_status = provider_status_from_value(
            machine
                .status
                .as_ref()
                .and_then(|status| status.provider_status.as_ref()),
        )
        .map_err(|err| {
            ControllerError::InvalidConfiguration(format!(
                "failed to get machine provider status: {err}"
            ))
        })?;

        let api_key =
            get_credentials_secret(params.secrets.as_ref(), &machine_namespace(&machine), &provider_spec)
                .await?;

        let vpc = params.builder.build(&api_key, &provider_spec).map_err(|err| {
            ControllerError::InvalidConfiguration(format!("error creating vpc client: {err}"))
        })?;

        Ok(Self {
            orig_machine: machine.clone(),
            orig_provider_status: provider_status.clone(),
            machine,
            provider_spec,
            provider_status,
            vpc,
            secrets: params.secrets,
            machines: params.machines,
        })
    }

    /// The machine's name.
    pub fn name(&self) -> String {
        self.machine.metadata.name.clone().unwrap_or_default()
    }

    /// The machine's namespace.
    pub fn namespace(&self) -> String {
        machine_namespace(&self.machine)
    }

    /// Persist the reconciled machine: fold the provider status back in
    /// (skipped when nothing changed), re-embed the provider spec, and
    /// merge-patch metadata, spec and status against the snapshots taken
    /// at construction.
    pub async fn close(&mut self) -> Result<(), ControllerError> {
        let name = self.name();
        let namespace = self.namespace();

        self.set_machine_status().map_err(|err| {
            ControllerError::ProviderPayload(format!(
                "failed to set provider status for machine {name:?} in namespace {namespace:?}: {err}"
            ))
        })?;

        self.set_machine_spec().map_err(|err| {
            ControllerError::ProviderPayload(format!(
                "failed to set machine spec {name:?} in namespace {namespace:?}: {err}"
            ))
        })?;

        self.patch_machine().await
    }

    /// Fold the decoded provider status back into the machine status,
    /// unless neither it nor the address list changed.
    fn set_machine_status(&mut self) -> Result<(), crds::ProviderConfigError> {
        let orig_addresses = self
            .orig_machine
            .status
            .as_ref()
            .map(|status| status.addresses.as_slice())
            .unwrap_or_default();
        let addresses = self
            .machine
            .status
            .as_ref()
            .map(|status| status.addresses.as_slice())
            .unwrap_or_default();

        if self.provider_status == self.orig_provider_status && addresses == orig_addresses {
            info!("{}: status unchanged", self.name());
            return Ok(());
        }

        let payload = provider_status_to_value(&self.provider_status)?;
        let status = self.machine.status.get_or_insert_with(MachineStatus::default);
        status.provider_status = Some(payload);
        status.last_updated = Some(Utc::now());
        Ok(())
    }

    /// Always re-embed the provider spec so field normalization done
    /// during reconciliation is captured.
    fn set_machine_spec(&mut self) -> Result<(), crds::ProviderConfigError> {
        debug!(
            "storing machine spec for {:?}, resourceVersion: {:?}",
            self.name(),
            self.machine.metadata.resource_version
        );
        self.machine.spec.provider_spec = Some(provider_spec_to_value(&self.provider_spec)?);
        Ok(())
    }

    /// Merge-patch the machine, sending only the sections that differ
    /// from the pre-reconciliation snapshot. Conflicting concurrent
    /// writes surface as API errors and are retried by the controller.
    async fn patch_machine(&self) -> Result<(), ControllerError> {
        let name = self.name();
        let namespace = self.namespace();

        let mut root = serde_json::Map::new();

        let mut metadata = serde_json::Map::new();
        if self.machine.metadata.labels != self.orig_machine.metadata.labels {
            metadata.insert("labels".to_string(), json!(self.machine.metadata.labels));
        }
        if self.machine.metadata.annotations != self.orig_machine.metadata.annotations {
            metadata.insert(
                "annotations".to_string(),
                json!(self.machine.metadata.annotations),
            );
        }
        if !metadata.is_empty() {
            root.insert("metadata".to_string(), metadata.into());
        }

        if self.machine.spec != self.orig_machine.spec {
            root.insert(
                "spec".to_string(),
                serde_json::to_value(&self.machine.spec)
                    .map_err(|err| ControllerError::ProviderPayload(err.to_string()))?,
            );
        }

        if !root.is_empty() {
            debug!("{}: patching machine", name);
            self.machines
                .patch(&namespace, &name, &root.into())
                .await?;
        }

        if self.machine.status != self.orig_machine.status {
            debug!("{}: patching machine status", name);
            let patch = json!({
                "status": self.machine.status,
            });
            self.machines.patch_status(&namespace, &name, &patch).await?;
        }

        Ok(())
    }
}

fn machine_namespace(machine: &Machine) -> String {
    machine
        .metadata
        .namespace
        .clone()
        .unwrap_or_else(|| "default".to_string())
}
