//! VPC API data models
//!
//! Wire types for the compute API. Field names follow the API's snake_case
//! JSON convention, so no serde renames are needed.

use serde::{Deserialize, Serialize};

/// Reference to another cloud resource, carried inline in API responses.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ResourceReference {
    /// Cloud-internal ID
    #[serde(default)]
    pub id: Option<String>,
    /// Human-readable name
    #[serde(default)]
    pub name: Option<String>,
}

/// A compute instance as reported by the cloud.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Instance {
    /// Cloud-assigned instance ID
    pub id: String,
    /// Instance name, unique within its VPC
    pub name: String,
    /// Lifecycle state, `"running"` once fully provisioned
    pub status: String,
    /// Primary network attachment
    #[serde(default)]
    pub primary_network_interface: Option<InstanceNetworkInterface>,
    /// Profile the instance was created with
    #[serde(default)]
    pub profile: Option<ResourceReference>,
    /// VPC the instance lives in
    #[serde(default)]
    pub vpc: Option<ResourceReference>,
    /// Zone the instance was placed in
    #[serde(default)]
    pub zone: Option<ResourceReference>,
}

impl Instance {
    /// The primary IPv4 address, if one has been assigned yet.
    pub fn primary_ipv4_address(&self) -> Option<&str> {
        self.primary_network_interface
            .as_ref()
            .and_then(|nic| nic.primary_ipv4_address.as_deref())
            .filter(|addr| !addr.is_empty())
    }
}

/// Primary network interface details of an instance.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct InstanceNetworkInterface {
    /// Primary IPv4 address, absent until the cloud assigns one
    #[serde(default)]
    pub primary_ipv4_address: Option<String>,
    /// Subnet the interface is attached to
    #[serde(default)]
    pub subnet: Option<ResourceReference>,
}

/// A virtual private cloud.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Vpc {
    /// Cloud-internal ID
    pub id: String,
    /// VPC name
    pub name: String,
}

/// A subnet within a VPC.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Subnet {
    /// Cloud-internal ID
    pub id: String,
    /// Subnet name
    pub name: String,
}

/// A boot image.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Image {
    /// Cloud-internal ID
    pub id: String,
    /// Image name
    pub name: String,
}

/// A security group within a VPC.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SecurityGroup {
    /// Cloud-internal ID
    pub id: String,
    /// Security group name
    pub name: String,
}

/// A resource group.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ResourceGroup {
    /// Cloud-internal ID
    pub id: String,
    /// Resource group name
    pub name: String,
}

/// An instance profile (machine type).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct InstanceProfile {
    /// Profile name, e.g. `bx2-2x8`
    pub name: String,
}

/// Identity-by-ID fragment used in create requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityById {
    /// Cloud-internal ID
    pub id: String,
}

/// Identity-by-name fragment used in create requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityByName {
    /// Resource name
    pub name: String,
}

/// Everything needed to provision an instance, with all references
/// already resolved to IDs where the API demands IDs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstancePrototype {
    /// Instance name
    pub name: String,
    /// Boot image
    pub image: IdentityById,
    /// Instance profile
    pub profile: IdentityByName,
    /// Placement zone
    pub zone: IdentityByName,
    /// Owning resource group
    pub resource_group: IdentityById,
    /// Primary network attachment
    pub primary_network_interface: NetworkInterfacePrototype,
    /// VPC to create in
    pub vpc: IdentityById,
    /// User data handed to the instance at boot
    pub user_data: String,
}

/// Network interface fragment of an instance prototype.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkInterfacePrototype {
    /// Subnet to attach to
    pub subnet: IdentityById,
    /// Security groups applied to the interface
    pub security_groups: Vec<IdentityById>,
}

/// Paginated instance listing.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct InstanceCollection {
    /// Instances on this page
    #[serde(default)]
    pub instances: Vec<Instance>,
}

/// Paginated VPC listing.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VpcCollection {
    /// VPCs on this page
    #[serde(default)]
    pub vpcs: Vec<Vpc>,
}

/// Paginated subnet listing.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SubnetCollection {
    /// Subnets on this page
    #[serde(default)]
    pub subnets: Vec<Subnet>,
}

/// Paginated image listing.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ImageCollection {
    /// Images on this page
    #[serde(default)]
    pub images: Vec<Image>,
}

/// Paginated security group listing.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SecurityGroupCollection {
    /// Security groups on this page
    #[serde(default)]
    pub security_groups: Vec<SecurityGroup>,
}

/// Paginated resource group listing.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ResourceGroupCollection {
    /// Resource groups on this page
    #[serde(default)]
    pub resources: Vec<ResourceGroup>,
}
