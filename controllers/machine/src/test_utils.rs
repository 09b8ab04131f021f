//! Test utilities for unit testing the machine controller.
//!
//! Provides in-memory stand-ins for the Kubernetes access seams plus
//! builders for machines, provider specs and cloud instances.

use crate::actuator::{Actuator, ActuatorParams};
use crate::credentials::SecretSource;
use crate::error::ControllerError;
use crate::events::{EventSeverity, EventSink};
use crate::scope::{MachineScope, MachineScopeParams, MachineStore};
use crds::{
    provider_spec_to_value, Machine, MachineSpec, NetworkInterfaceSpec, VpcMachineProviderSpec,
    MACHINE_CLUSTER_ID_LABEL, PROVIDER_CONFIG_VERSION,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use vpc_client::{
    Instance, InstanceNetworkInterface, MockVpcClient, ResourceReference, VpcClient,
    VpcClientBuilder, VpcError,
};

/// Provider spec used by most tests; matches the inventory installed by
/// [`TestHarness::with_inventory`].
pub fn test_provider_spec() -> VpcMachineProviderSpec {
    VpcMachineProviderSpec {
        api_version: PROVIDER_CONFIG_VERSION.to_string(),
        region: "us-south".to_string(),
        zone: "us-south-1".to_string(),
        vpc: "test-vpc".to_string(),
        profile: "bx2-2x8".to_string(),
        image: "test-image".to_string(),
        resource_group: "test-rg".to_string(),
        primary_network_interface: NetworkInterfaceSpec {
            subnet: "test-subnet".to_string(),
            security_groups: vec!["sg-a".to_string()],
        },
        user_data_secret: None,
        credentials_secret: None,
    }
}

/// Build a machine in namespace `test-ns`; `cluster_id` of `None` leaves
/// the cluster label off entirely.
pub fn test_machine(name: &str, cluster_id: Option<&str>) -> Machine {
    let mut labels = BTreeMap::new();
    if let Some(cluster_id) = cluster_id {
        labels.insert(MACHINE_CLUSTER_ID_LABEL.to_string(), cluster_id.to_string());
    }
    Machine {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("test-ns".to_string()),
            labels: Some(labels),
            ..Default::default()
        },
        spec: MachineSpec {
            provider_spec: Some(
                provider_spec_to_value(&test_provider_spec())
                    .expect("test provider spec encodes"),
            ),
            provider_id: None,
        },
        status: None,
    }
}

/// Build a cloud instance as the mock would report it.
pub fn test_instance(id: &str, name: &str, status: &str, ip: Option<&str>) -> Instance {
    Instance {
        id: id.to_string(),
        name: name.to_string(),
        status: status.to_string(),
        primary_network_interface: Some(InstanceNetworkInterface {
            primary_ipv4_address: ip.map(str::to_string),
            subnet: None,
        }),
        profile: None,
        vpc: Some(ResourceReference {
            id: Some("vpc-1".to_string()),
            name: Some("test-vpc".to_string()),
        }),
        zone: Some(ResourceReference {
            id: None,
            name: Some("us-south-1".to_string()),
        }),
    }
}

/// [`SecretSource`] over an in-memory map.
#[derive(Default)]
pub struct InMemorySecretSource {
    secrets: Mutex<HashMap<(String, String), BTreeMap<String, Vec<u8>>>>,
}

impl InMemorySecretSource {
    /// Insert one secret field.
    pub fn add_secret(&self, namespace: &str, name: &str, key: &str, value: &[u8]) {
        self.secrets
            .lock()
            .unwrap()
            .entry((namespace.to_string(), name.to_string()))
            .or_default()
            .insert(key.to_string(), value.to_vec());
    }
}

#[async_trait::async_trait]
impl SecretSource for InMemorySecretSource {
    async fn get(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<BTreeMap<String, Vec<u8>>>, kube::Error> {
        Ok(self
            .secrets
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }
}

/// [`MachineStore`] that records patches instead of applying them.
#[derive(Default)]
pub struct InMemoryMachineStore {
    patches: Mutex<Vec<(String, serde_json::Value)>>,
    status_patches: Mutex<Vec<(String, serde_json::Value)>>,
}

impl InMemoryMachineStore {
    /// Recorded metadata/spec patches as (name, patch) pairs.
    pub fn patches(&self) -> Vec<(String, serde_json::Value)> {
        self.patches.lock().unwrap().clone()
    }

    /// Recorded status patches as (name, patch) pairs.
    pub fn status_patches(&self) -> Vec<(String, serde_json::Value)> {
        self.status_patches.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl MachineStore for InMemoryMachineStore {
    async fn patch(
        &self,
        _namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<(), kube::Error> {
        self.patches
            .lock()
            .unwrap()
            .push((name.to_string(), patch.clone()));
        Ok(())
    }

    async fn patch_status(
        &self,
        _namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<(), kube::Error> {
        self.status_patches
            .lock()
            .unwrap()
            .push((name.to_string(), patch.clone()));
        Ok(())
    }
}

/// One event captured by [`RecordingEventSink`].
#[derive(Debug, Clone)]
pub struct RecordedEvent {
    /// Event severity
    pub severity: EventSeverity,
    /// Event reason
    pub reason: String,
    /// Event note text
    pub note: String,
}

/// [`EventSink`] that records events for assertions.
#[derive(Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingEventSink {
    /// All events recorded so far.
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl EventSink for RecordingEventSink {
    async fn publish(
        &self,
        _machine: &Machine,
        severity: EventSeverity,
        reason: &str,
        _action: &str,
        note: String,
    ) {
        self.events.lock().unwrap().push(RecordedEvent {
            severity,
            reason: reason.to_string(),
            note,
        });
    }
}

/// [`VpcClientBuilder`] that hands out clones of one mock client.
pub struct StaticVpcClientBuilder {
    /// The client every build returns
    pub client: MockVpcClient,
}

impl VpcClientBuilder for StaticVpcClientBuilder {
    fn build(
        &self,
        _api_key: &str,
        _spec: &VpcMachineProviderSpec,
    ) -> Result<Arc<dyn VpcClient>, VpcError> {
        Ok(Arc::new(self.client.clone()))
    }
}

/// Bundles the in-memory seams for one test.
pub struct TestHarness {
    /// Shared mock cloud client
    pub vpc: MockVpcClient,
    /// Patch-recording machine store
    pub machines: Arc<InMemoryMachineStore>,
    /// In-memory secret source
    pub secrets: Arc<InMemorySecretSource>,
    /// Event-recording sink
    pub events: Arc<RecordingEventSink>,
}

impl TestHarness {
    /// Fresh harness with empty cloud inventory.
    pub fn new() -> Self {
        Self {
            vpc: MockVpcClient::new(),
            machines: Arc::new(InMemoryMachineStore::default()),
            secrets: Arc::new(InMemorySecretSource::default()),
            events: Arc::new(RecordingEventSink::default()),
        }
    }

    /// Install the inventory matching [`test_provider_spec`] so instance
    /// creation resolves.
    pub fn with_inventory(self) -> Self {
        self.vpc.add_resource_group("rg-1", "test-rg");
        self.vpc.add_image("img-1", "test-image");
        self.vpc.add_vpc("vpc-1", "test-vpc");
        self.vpc.add_subnet("sub-1", "test-subnet");
        self.vpc.add_security_group("sg-id-a", "sg-a");
        self
    }

    /// Build a scope over the harness seams.
    pub async fn scope(&self, machine: &Machine) -> Result<MachineScope, ControllerError> {
        MachineScope::new(MachineScopeParams {
            machine,
            machines: self.machines.clone(),
            secrets: self.secrets.clone(),
            builder: &StaticVpcClientBuilder {
                client: self.vpc.clone(),
            },
        })
        .await
    }

    /// Build an actuator over the harness seams.
    pub fn actuator(&self) -> Actuator {
        Actuator::new(ActuatorParams {
            machines: self.machines.clone(),
            secrets: self.secrets.clone(),
            events: self.events.clone(),
            builder: Arc::new(StaticVpcClientBuilder {
                client: self.vpc.clone(),
            }),
        })
    }
}
