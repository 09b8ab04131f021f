//! VPC client errors

use thiserror::Error;

/// Cloud resource kinds resolved by name during instance creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// Virtual private cloud
    Vpc,
    /// Subnet within a VPC
    Subnet,
    /// Boot image
    Image,
    /// Resource group owning cloud resources
    ResourceGroup,
    /// Instance profile (machine type)
    InstanceProfile,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ResourceKind::Vpc => "vpc",
            ResourceKind::Subnet => "subnet",
            ResourceKind::Image => "image",
            ResourceKind::ResourceGroup => "resource group",
            ResourceKind::InstanceProfile => "instance profile",
        };
        f.write_str(name)
    }
}

/// Errors that can occur when interacting with the VPC cloud API
#[derive(Debug, Error)]
pub enum VpcError {
    /// HTTP request/response error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The cloud API returned an error response
    #[error("VPC API error: {0}")]
    Api(String),

    /// JSON serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No instance with the requested name exists in the VPC
    ///
    /// Kept distinct from transport errors so callers can collapse it into
    /// a plain "does not exist" answer.
    #[error("instance not found")]
    InstanceNotFound,

    /// A resource referenced by name could not be resolved to an ID
    #[error("could not retrieve {kind} id of name: {name}")]
    ResourceNotFound {
        /// What kind of resource failed to resolve
        kind: ResourceKind,
        /// The name that failed to resolve
        name: String,
    },

    /// One or more requested security groups could not be resolved;
    /// partial resolution is never returned as success
    #[error("could not retrieve security group ids of names: {0:?}")]
    SecurityGroupsNotResolved(Vec<String>),

    /// The request was rejected before reaching the network
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl VpcError {
    /// True when the error means "the instance does not exist", as opposed
    /// to "the lookup could not be performed".
    pub fn is_instance_not_found(&self) -> bool {
        matches!(self, VpcError::InstanceNotFound)
    }
}
