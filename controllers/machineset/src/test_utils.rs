//! Test utilities for unit testing the machineset controller.

use crate::credentials::SecretSource;
use crate::events::EventSink;
use crate::reconciler::Reconciler;
use crds::{
    provider_spec_to_value, MachineSet, MachineSetSpec, MachineSpec, MachineTemplate,
    NetworkInterfaceSpec, VpcMachineProviderSpec, PROVIDER_CONFIG_VERSION,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use vpc_client::{MockVpcClient, VpcClient, VpcClientBuilder, VpcError};

/// Provider spec with the `bx2-2x8` profile.
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
            security_groups: vec![],
        },
        user_data_secret: None,
        credentials_secret: None,
    }
}

/// Build a machineset in namespace `test-ns`.
pub fn test_machine_set(name: &str) -> MachineSet {
    MachineSet {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("test-ns".to_string()),
            ..Default::default()
        },
        spec: MachineSetSpec {
            replicas: Some(0),
            template: MachineTemplate {
                spec: MachineSpec {
                    provider_spec: Some(
                        provider_spec_to_value(&test_provider_spec())
                            .expect("test provider spec encodes"),
                    ),
                    provider_id: None,
                },
            },
        },
        status: None,
    }
}

/// [`SecretSource`] over an in-memory map.
#[derive(Default)]
pub struct InMemorySecretSource {
    secrets: Mutex<std::collections::HashMap<(String, String), BTreeMap<String, Vec<u8>>>>,
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

/// [`EventSink`] that records warnings for assertions.
#[derive(Default)]
pub struct RecordingEventSink {
    warnings: Mutex<Vec<(String, String)>>,
}

impl RecordingEventSink {
    /// Recorded (reason, note) pairs.
    pub fn warnings(&self) -> Vec<(String, String)> {
        self.warnings.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl EventSink for RecordingEventSink {
    async fn warn(&self, _machine_set: &MachineSet, reason: &str, note: String) {
        self.warnings
            .lock()
            .unwrap()
            .push((reason.to_string(), note));
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
    /// Event-recording sink
    pub events: Arc<RecordingEventSink>,
    secrets: Arc<InMemorySecretSource>,
}

impl TestHarness {
    /// Fresh harness with empty cloud inventory.
    pub fn new() -> Self {
        Self {
            vpc: MockVpcClient::new(),
            events: Arc::new(RecordingEventSink::default()),
            secrets: Arc::new(InMemorySecretSource::default()),
        }
    }

    /// Build a reconciler over the harness seams.
    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(
            self.secrets.clone(),
            Arc::new(StaticVpcClientBuilder {
                client: self.vpc.clone(),
            }),
            self.events.clone(),
        )
    }
}
