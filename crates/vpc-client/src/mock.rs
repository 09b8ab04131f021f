//! Mock VpcClient for unit testing
//!
//! An in-memory implementation of [`VpcClient`] so controller tests run
//! without a cloud account. Stores cloud inventory per resource kind,
//! counts every call by method name, and supports failure injection for
//! the instance lifecycle operations.

use crate::client::resolve_security_group_ids;
use crate::error::{ResourceKind, VpcError};
use crate::models::*;
use crate::vpc_trait::VpcClient;
use crds::VpcMachineProviderSpec;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct MockState {
    instances: Vec<Instance>,
    vpcs: Vec<Vpc>,
    subnets: Vec<Subnet>,
    images: Vec<Image>,
    security_groups: Vec<SecurityGroup>,
    resource_groups: Vec<ResourceGroup>,
    profiles: Vec<String>,
    calls: BTreeMap<&'static str, usize>,
    next_id: u64,
    created_instance_status: Option<String>,
    created_instance_ip: Option<String>,
    fail_instance_create: Option<String>,
    fail_instance_delete: Option<String>,
    fail_instance_get: Option<String>,
}

/// Mock VPC client for testing
///
/// Cloned handles share state, so a test can keep one handle for setup and
/// assertions while the code under test owns another.
#[derive(Clone, Default)]
pub struct MockVpcClient {
    state: Arc<Mutex<MockState>>,
}

impl MockVpcClient {
    /// Create an empty mock with no inventory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an instance to the mock inventory (for test setup)
    pub fn add_instance(&self, instance: Instance) {
        self.state.lock().unwrap().instances.push(instance);
    }

    /// Add a VPC to the mock inventory (for test setup)
    pub fn add_vpc(&self, id: &str, name: &str) {
        self.state.lock().unwrap().vpcs.push(Vpc {
            id: id.to_string(),
            name: name.to_string(),
        });
    }

    /// Add a subnet to the mock inventory (for test setup)
    pub fn add_subnet(&self, id: &str, name: &str) {
        self.state.lock().unwrap().subnets.push(Subnet {
            id: id.to_string(),
            name: name.to_string(),
        });
    }

    /// Add an image to the mock inventory (for test setup)
    pub fn add_image(&self, id: &str, name: &str) {
        self.state.lock().unwrap().images.push(Image {
            id: id.to_string(),
            name: name.to_string(),
        });
    }

    /// Add a security group to the mock inventory (for test setup)
    pub fn add_security_group(&self, id: &str, name: &str) {
        self.state.lock().unwrap().security_groups.push(SecurityGroup {
            id: id.to_string(),
            name: name.to_string(),
        });
    }

    /// Add a resource group to the mock inventory (for test setup)
    pub fn add_resource_group(&self, id: &str, name: &str) {
        self.state.lock().unwrap().resource_groups.push(ResourceGroup {
            id: id.to_string(),
            name: name.to_string(),
        });
    }

    /// Add an instance profile name to the mock inventory (for test setup)
    pub fn add_profile(&self, name: &str) {
        self.state.lock().unwrap().profiles.push(name.to_string());
    }

    /// Lifecycle state given to instances created through the mock
    /// (defaults to `"running"`)
    pub fn set_created_instance_status(&self, status: &str) {
        self.state.lock().unwrap().created_instance_status = Some(status.to_string());
    }

    /// Primary IPv4 address given to instances created through the mock
    /// (defaults to `"10.0.0.1"`)
    pub fn set_created_instance_ip(&self, ip: &str) {
        self.state.lock().unwrap().created_instance_ip = Some(ip.to_string());
    }

    /// Make `create_instance` fail with the given message
    pub fn fail_instance_create(&self, message: &str) {
        self.state.lock().unwrap().fail_instance_create = Some(message.to_string());
    }

    /// Make `delete_instance_by_name` fail with the given message
    pub fn fail_instance_delete(&self, message: &str) {
        self.state.lock().unwrap().fail_instance_delete = Some(message.to_string());
    }

    /// Make instance lookups fail with the given message
    pub fn fail_instance_get(&self, message: &str) {
        self.state.lock().unwrap().fail_instance_get = Some(message.to_string());
    }

    /// How many times the named trait method was invoked
    pub fn call_count(&self, method: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .get(method)
            .copied()
            .unwrap_or(0)
    }

    /// Total invocations across all trait methods
    pub fn total_calls(&self) -> usize {
        self.state.lock().unwrap().calls.values().sum()
    }

    /// Snapshot of the current instance inventory
    pub fn instances(&self) -> Vec<Instance> {
        self.state.lock().unwrap().instances.clone()
    }

    fn record(&self, method: &'static str) {
        *self.state.lock().unwrap().calls.entry(method).or_insert(0) += 1;
    }
}

#[async_trait::async_trait]
impl VpcClient for MockVpcClient {
    async fn create_instance(
        &self,
        name: &str,
        spec: &VpcMachineProviderSpec,
        _user_data: &str,
    ) -> Result<Instance, VpcError> {
        self.record("create_instance");

        let mut state = self.state.lock().unwrap();
        if let Some(message) = &state.fail_instance_create {
            return Err(VpcError::Api(message.clone()));
        }

        // Same resolution order as the HTTP client, against the in-memory
        // inventory, so resolution failures reproduce in tests.
        state
            .resource_groups
            .iter()
            .find(|group| group.name == spec.resource_group)
            .ok_or_else(|| VpcError::ResourceNotFound {
                kind: ResourceKind::ResourceGroup,
                name: spec.resource_group.clone(),
            })?;
        state
            .images
            .iter()
            .find(|image| image.name == spec.image)
            .ok_or_else(|| VpcError::ResourceNotFound {
                kind: ResourceKind::Image,
                name: spec.image.clone(),
            })?;
        let vpc = state
            .vpcs
            .iter()
            .find(|vpc| vpc.name == spec.vpc)
            .ok_or_else(|| VpcError::ResourceNotFound {
                kind: ResourceKind::Vpc,
                name: spec.vpc.clone(),
            })?
            .clone();
        let subnet = state
            .subnets
            .iter()
            .find(|subnet| subnet.name == spec.primary_network_interface.subnet)
            .ok_or_else(|| VpcError::ResourceNotFound {
                kind: ResourceKind::Subnet,
                name: spec.primary_network_interface.subnet.clone(),
            })?
            .clone();
        resolve_security_group_ids(
            &state.security_groups,
            &spec.primary_network_interface.security_groups,
        )?;

        state.next_id += 1;
        let instance = Instance {
            id: format!("i-{}", state.next_id),
            name: name.to_string(),
            status: state
                .created_instance_status
                .clone()
                .unwrap_or_else(|| "running".to_string()),
            primary_network_interface: Some(InstanceNetworkInterface {
                primary_ipv4_address: Some(
                    state
                        .created_instance_ip
                        .clone()
                        .unwrap_or_else(|| "10.0.0.1".to_string()),
                ),
                subnet: Some(ResourceReference {
                    id: Some(subnet.id),
                    name: Some(subnet.name),
                }),
            }),
            profile: Some(ResourceReference {
                id: None,
                name: Some(spec.profile.clone()),
            }),
            vpc: Some(ResourceReference {
                id: Some(vpc.id),
                name: Some(vpc.name),
            }),
            zone: Some(ResourceReference {
                id: None,
                name: Some(spec.zone.clone()),
            }),
        };
        state.instances.push(instance.clone());
        Ok(instance)
    }

    async fn get_instance_by_name(
        &self,
        name: &str,
        spec: &VpcMachineProviderSpec,
    ) -> Result<Instance, VpcError> {
        self.record("get_instance_by_name");

        let state = self.state.lock().unwrap();
        if let Some(message) = &state.fail_instance_get {
            return Err(VpcError::Api(message.clone()));
        }

        state
            .instances
            .iter()
            .find(|instance| {
                let vpc_matches = instance
                    .vpc
                    .as_ref()
                    .and_then(|vpc| vpc.name.as_deref())
                    .map(|vpc_name| vpc_name == spec.vpc)
                    .unwrap_or(true);
                instance.name == name && vpc_matches
            })
            .cloned()
            .ok_or(VpcError::InstanceNotFound)
    }

    async fn get_instance_by_id(&self, id: &str) -> Result<Instance, VpcError> {
        self.record("get_instance_by_id");

        let state = self.state.lock().unwrap();
        state
            .instances
            .iter()
            .find(|instance| instance.id == id)
            .cloned()
            .ok_or(VpcError::InstanceNotFound)
    }

    async fn delete_instance_by_name(
        &self,
        name: &str,
        spec: &VpcMachineProviderSpec,
    ) -> Result<(), VpcError> {
        self.record("delete_instance_by_name");

        let mut state = self.state.lock().unwrap();
        if let Some(message) = &state.fail_instance_delete {
            return Err(VpcError::Api(message.clone()));
        }

        let position = state
            .instances
            .iter()
            .position(|instance| {
                let vpc_matches = instance
                    .vpc
                    .as_ref()
                    .and_then(|vpc| vpc.name.as_deref())
                    .map(|vpc_name| vpc_name == spec.vpc)
                    .unwrap_or(true);
                instance.name == name && vpc_matches
            })
            .ok_or(VpcError::InstanceNotFound)?;
        state.instances.remove(position);
        Ok(())
    }

    async fn get_instance_profile(&self, name: &str) -> Result<bool, VpcError> {
        self.record("get_instance_profile");

        if name.is_empty() {
            return Err(VpcError::InvalidRequest("instance profile not set".to_string()));
        }

        let state = self.state.lock().unwrap();
        if state.profiles.iter().any(|profile| profile == name) {
            Ok(true)
        } else {
            Err(VpcError::ResourceNotFound {
                kind: ResourceKind::InstanceProfile,
                name: name.to_string(),
            })
        }
    }

    async fn get_vpc_id_by_name(
        &self,
        name: &str,
        _resource_group_id: &str,
    ) -> Result<String, VpcError> {
        self.record("get_vpc_id_by_name");

        let state = self.state.lock().unwrap();
        state
            .vpcs
            .iter()
            .find(|vpc| vpc.name == name)
            .map(|vpc| vpc.id.clone())
            .ok_or_else(|| VpcError::ResourceNotFound {
                kind: ResourceKind::Vpc,
                name: name.to_string(),
            })
    }

    async fn get_subnet_id_by_name(
        &self,
        name: &str,
        _resource_group_id: &str,
    ) -> Result<String, VpcError> {
        self.record("get_subnet_id_by_name");

        let state = self.state.lock().unwrap();
        state
            .subnets
            .iter()
            .find(|subnet| subnet.name == name)
            .map(|subnet| subnet.id.clone())
            .ok_or_else(|| VpcError::ResourceNotFound {
                kind: ResourceKind::Subnet,
                name: name.to_string(),
            })
    }

    async fn get_security_group_ids_by_name(
        &self,
        names: &[String],
        _resource_group_id: &str,
        _vpc_id: &str,
    ) -> Result<Vec<String>, VpcError> {
        self.record("get_security_group_ids_by_name");

        let state = self.state.lock().unwrap();
        resolve_security_group_ids(&state.security_groups, names)
    }

    async fn get_resource_group_id_by_name(&self, name: &str) -> Result<String, VpcError> {
        self.record("get_resource_group_id_by_name");

        let state = self.state.lock().unwrap();
        state
            .resource_groups
            .iter()
            .find(|group| group.name == name)
            .map(|group| group.id.clone())
            .ok_or_else(|| VpcError::ResourceNotFound {
                kind: ResourceKind::ResourceGroup,
                name: name.to_string(),
            })
    }

    async fn get_image_id_by_name(
        &self,
        name: &str,
        _resource_group_id: &str,
    ) -> Result<String, VpcError> {
        self.record("get_image_id_by_name");

        let state = self.state.lock().unwrap();
        state
            .images
            .iter()
            .find(|image| image.name == name)
            .map(|image| image.id.clone())
            .ok_or_else(|| VpcError::ResourceNotFound {
                kind: ResourceKind::Image,
                name: name.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crds::{NetworkInterfaceSpec, PROVIDER_CONFIG_VERSION};

    fn test_spec() -> VpcMachineProviderSpec {
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

    fn populated_mock() -> MockVpcClient {
        let mock = MockVpcClient::new();
        mock.add_resource_group("rg-1", "test-rg");
        mock.add_image("img-1", "test-image");
        mock.add_vpc("vpc-1", "test-vpc");
        mock.add_subnet("sub-1", "test-subnet");
        mock.add_security_group("sg-id-a", "sg-a");
        mock
    }

    #[tokio::test]
    async fn exists_collapses_not_found() {
        let mock = MockVpcClient::new();
        let exists = mock
            .instance_exists_by_name("worker-0", &test_spec())
            .await
            .unwrap();
        assert!(!exists);
        assert_eq!(mock.call_count("get_instance_by_name"), 1);
    }

    #[tokio::test]
    async fn create_then_lookup_round_trips() {
        let mock = populated_mock();
        let spec = test_spec();

        let created = mock.create_instance("worker-0", &spec, "").await.unwrap();
        assert_eq!(created.status, "running");

        let fetched = mock.get_instance_by_name("worker-0", &spec).await.unwrap();
        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.primary_ipv4_address(), Some("10.0.0.1"));
    }

    #[tokio::test]
    async fn create_fails_on_unresolvable_image() {
        let mock = populated_mock();
        let mut spec = test_spec();
        spec.image = "missing-image".to_string();

        let err = mock.create_instance("worker-0", &spec, "").await.unwrap_err();
        assert!(matches!(
            err,
            VpcError::ResourceNotFound {
                kind: ResourceKind::Image,
                ..
            }
        ));
        assert!(mock.instances().is_empty());
    }

    #[tokio::test]
    async fn delete_requires_existing_instance() {
        let mock = populated_mock();
        let spec = test_spec();

        let err = mock
            .delete_instance_by_name("worker-0", &spec)
            .await
            .unwrap_err();
        assert!(err.is_instance_not_found());

        mock.create_instance("worker-0", &spec, "").await.unwrap();
        mock.delete_instance_by_name("worker-0", &spec).await.unwrap();
        assert!(mock.instances().is_empty());
    }

    #[tokio::test]
    async fn profile_lookup_rejects_empty_name() {
        let mock = MockVpcClient::new();
        let err = mock.get_instance_profile("").await.unwrap_err();
        assert!(matches!(err, VpcError::InvalidRequest(_)));
    }
}
