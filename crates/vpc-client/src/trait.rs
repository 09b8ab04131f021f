//! VpcClient trait for mocking
//!
//! Abstracts the cloud API so controller tests can substitute an in-memory
//! implementation. The concrete HTTP client implements this trait; so does
//! the mock behind the `test-util` feature.

use crate::error::VpcError;
use crate::models::Instance;
use crds::VpcMachineProviderSpec;
use std::sync::Arc;

/// Cloud compute API operations consumed by the machine controllers.
///
/// None of these are idempotent at the transport layer; convergence
/// guarantees come from the reconciler, not from here. All async methods
/// must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait VpcClient: Send + Sync {
    /// Create an instance, resolving every name reference in `spec`
    /// (resource group, image, VPC, subnet, security groups) to an ID
    /// first. Fails with a kind-specific error on any unresolvable name.
    async fn create_instance(
        &self,
        name: &str,
        spec: &VpcMachineProviderSpec,
        user_data: &str,
    ) -> Result<Instance, VpcError>;

    /// Look up an instance by name within the spec's VPC.
    /// Returns [`VpcError::InstanceNotFound`] when zero instances match.
    async fn get_instance_by_name(
        &self,
        name: &str,
        spec: &VpcMachineProviderSpec,
    ) -> Result<Instance, VpcError>;

    /// Look up an instance by its cloud-assigned ID.
    async fn get_instance_by_id(&self, id: &str) -> Result<Instance, VpcError>;

    /// Whether an instance with this name exists in the spec's VPC.
    ///
    /// Collapses [`VpcError::InstanceNotFound`] into `Ok(false)`; every
    /// other error propagates.
    async fn instance_exists_by_name(
        &self,
        name: &str,
        spec: &VpcMachineProviderSpec,
    ) -> Result<bool, VpcError> {
        match self.get_instance_by_name(name, spec).await {
            Ok(_) => Ok(true),
            Err(err) if err.is_instance_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Delete an instance by name: resolves the instance via
    /// [`get_instance_by_name`](Self::get_instance_by_name) and issues the
    /// delete by ID. A lookup miss propagates as an error; the delete only
    /// proceeds when the instance was found.
    async fn delete_instance_by_name(
        &self,
        name: &str,
        spec: &VpcMachineProviderSpec,
    ) -> Result<(), VpcError>;

    /// Whether the named instance profile exists.
    /// Fails on an empty name without making a network call.
    async fn get_instance_profile(&self, name: &str) -> Result<bool, VpcError>;

    /// Resolve a VPC name to its ID within a resource group.
    async fn get_vpc_id_by_name(
        &self,
        name: &str,
        resource_group_id: &str,
    ) -> Result<String, VpcError>;

    /// Resolve a subnet name to its ID within a resource group.
    async fn get_subnet_id_by_name(
        &self,
        name: &str,
        resource_group_id: &str,
    ) -> Result<String, VpcError>;

    /// Resolve security group names to IDs within a resource group and VPC.
    ///
    /// All requested names must resolve; otherwise the call fails naming
    /// the unresolved ones and returns no partial list.
    async fn get_security_group_ids_by_name(
        &self,
        names: &[String],
        resource_group_id: &str,
        vpc_id: &str,
    ) -> Result<Vec<String>, VpcError>;

    /// Resolve a resource group name to its ID.
    async fn get_resource_group_id_by_name(&self, name: &str) -> Result<String, VpcError>;

    /// Resolve a private image name to its ID within a resource group.
    async fn get_image_id_by_name(
        &self,
        name: &str,
        resource_group_id: &str,
    ) -> Result<String, VpcError>;
}

/// Builds a [`VpcClient`] bound to one machine's credentials.
///
/// Injected into scope construction so tests can substitute a mock client;
/// there is no global client registry.
pub trait VpcClientBuilder: Send + Sync {
    /// Build a client from an API key and the machine's provider spec.
    fn build(
        &self,
        api_key: &str,
        spec: &VpcMachineProviderSpec,
    ) -> Result<Arc<dyn VpcClient>, VpcError>;
}
