//! Machine CRD
//!
//! A Machine identifies a single VPC compute instance to create and keep
//! converged. The provider payload travels as opaque JSON in the spec and
//! status; see [`crate::provider`] for the typed form.

use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Label every Machine must carry; scopes the machine to its cluster and
/// feeds into the provider ID.
pub const MACHINE_CLUSTER_ID_LABEL: &str = "machine.vpcoperator.io/cluster-api-cluster";

/// Label stamped with the provider spec's region on successful reconciliation.
pub const MACHINE_REGION_LABEL: &str = "machine.vpcoperator.io/region";

/// Label stamped with the provider spec's zone on successful reconciliation.
pub const MACHINE_ZONE_LABEL: &str = "machine.vpcoperator.io/zone";

/// Label stamped with the instance profile on successful reconciliation.
pub const MACHINE_INSTANCE_TYPE_LABEL: &str = "machine.vpcoperator.io/instance-type";

/// Annotation mirroring the cloud-reported instance lifecycle state.
pub const MACHINE_INSTANCE_STATE_ANNOTATION: &str = "machine.vpcoperator.io/instance-state";

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[kube(
    group = "machine.vpcoperator.io",
    version = "v1beta1",
    kind = "Machine",
    namespaced,
    status = "MachineStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct MachineSpec {
    /// Opaque provider configuration payload
    ///
    /// Decoded into `VpcMachineProviderSpec` at reconciliation time; kept
    /// opaque here so provider config revisions do not churn the CRD schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_spec: Option<serde_json::Value>,

    /// Cloud provider ID in the form `vpc://<clusterID>/<zone>/<name>`,
    /// set once the instance is observed in the cloud
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MachineStatus {
    /// Network addresses of the backing instance
    #[serde(default)]
    pub addresses: Vec<NodeAddress>,

    /// Opaque provider status payload, decoded into
    /// `VpcMachineProviderStatus` at reconciliation time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_status: Option<serde_json::Value>,

    /// When the status was last written by the controller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

/// One address of the backing instance.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NodeAddress {
    /// Address class
    #[serde(rename = "type")]
    pub address_type: NodeAddressType,

    /// The address value
    pub address: String,
}

/// Address classes mirroring core Kubernetes node address types.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum NodeAddressType {
    /// Resolvable hostname inside the cluster network
    InternalDNS,
    /// IP reachable inside the cluster network
    InternalIP,
    /// Resolvable hostname outside the cluster network
    ExternalDNS,
    /// IP reachable outside the cluster network
    ExternalIP,
    /// Bare hostname
    Hostname,
}

impl Machine {
    /// The cluster-ID label value, empty string when absent.
    pub fn cluster_id(&self) -> &str {
        self.metadata
            .labels
            .as_ref()
            .and_then(|labels| labels.get(MACHINE_CLUSTER_ID_LABEL))
            .map(String::as_str)
            .unwrap_or("")
    }
}
