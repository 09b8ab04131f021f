//! Provider-specific machine configuration and status
//!
//! The Machine CRD carries the provider payload as an opaque JSON value so
//! the outer schema stays stable across provider config revisions. This
//! module defines the typed form of that payload and the versioned
//! decode/encode functions that validate it at the boundary.

use crate::references::SecretReference;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Version tag every provider spec payload must carry.
///
/// Payloads with a missing or unrecognized `apiVersion` are rejected at
/// decode time instead of being interpreted under wrong assumptions.
pub const PROVIDER_CONFIG_VERSION: &str = "machine.vpcoperator.io/v1beta1";

/// Errors decoding or encoding the provider payload.
#[derive(Debug, Error)]
pub enum ProviderConfigError {
    /// Payload did not match the typed schema
    #[error("error unmarshalling provider payload: {0}")]
    Decode(#[from] serde_json::Error),

    /// Payload carried an unknown version tag
    #[error("unsupported provider config version: {0:?}")]
    UnsupportedVersion(String),
}

/// Declarative configuration for one VPC compute instance.
///
/// All cloud resources are referenced by their human-readable names; the
/// cloud client resolves them to cloud-internal IDs at create time.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct VpcMachineProviderSpec {
    /// Version tag, must equal [`PROVIDER_CONFIG_VERSION`]
    #[serde(default)]
    pub api_version: String,

    /// Cloud region hosting the instance
    pub region: String,

    /// Availability zone within the region
    pub zone: String,

    /// Name of the VPC the instance lives in
    pub vpc: String,

    /// Instance profile (machine type) name
    pub profile: String,

    /// Name of the custom boot image
    pub image: String,

    /// Name of the resource group owning the instance and its lookups
    pub resource_group: String,

    /// Primary network attachment
    pub primary_network_interface: NetworkInterfaceSpec,

    /// Secret holding ignition/user data passed to the instance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_data_secret: Option<SecretReference>,

    /// Secret holding the cloud API key used for all cloud calls
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_secret: Option<SecretReference>,
}

/// Primary network interface configuration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterfaceSpec {
    /// Name of the subnet to attach to
    pub subnet: String,

    /// Names of the security groups applied to the interface
    #[serde(default)]
    pub security_groups: Vec<String>,
}

/// Observed provider-side state of one machine.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct VpcMachineProviderStatus {
    /// Cloud-assigned instance ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,

    /// Last observed instance lifecycle state as reported by the cloud
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_state: Option<String>,

    /// Provider condition history, at most one entry per condition type
    #[serde(default)]
    pub conditions: Vec<ProviderCondition>,
}

/// Condition types tracked in the provider status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum ProviderConditionType {
    /// Whether the cloud instance backing the machine has been created
    MachineCreated,
}

/// Condition truth value, mirroring core Kubernetes condition semantics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum ConditionStatus {
    /// The condition holds
    True,
    /// The condition does not hold
    False,
    /// The condition could not be evaluated
    Unknown,
}

/// One typed, timestamped status entry.
///
/// `last_transition_time` only moves when `status` flips;
/// `last_probe_time` moves on every effective update.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCondition {
    /// Condition type; unique within a status condition list
    #[serde(rename = "type")]
    pub condition_type: ProviderConditionType,

    /// Current truth value
    pub status: ConditionStatus,

    /// Machine-readable reason for the last update
    pub reason: String,

    /// Human-readable message for the last update
    pub message: String,

    /// When `status` last changed
    pub last_transition_time: DateTime<Utc>,

    /// When the condition was last evaluated
    pub last_probe_time: DateTime<Utc>,
}

/// Decode and validate a provider spec payload.
pub fn provider_spec_from_value(
    value: &serde_json::Value,
) -> Result<VpcMachineProviderSpec, ProviderConfigError> {
    let spec: VpcMachineProviderSpec = serde_json::from_value(value.clone())?;
    if spec.api_version != PROVIDER_CONFIG_VERSION {
        return Err(ProviderConfigError::UnsupportedVersion(spec.api_version));
    }
    Ok(spec)
}

/// Encode a provider spec back into its opaque payload form.
pub fn provider_spec_to_value(
    spec: &VpcMachineProviderSpec,
) -> Result<serde_json::Value, ProviderConfigError> {
    Ok(serde_json::to_value(spec)?)
}

/// Decode a provider status payload; an absent payload decodes to the
/// default (a machine that has never been reconciled).
pub fn provider_status_from_value(
    value: Option<&serde_json::Value>,
) -> Result<VpcMachineProviderStatus, ProviderConfigError> {
    match value {
        Some(value) => Ok(serde_json::from_value(value.clone())?),
        None => Ok(VpcMachineProviderStatus::default()),
    }
}

/// Encode a provider status back into its opaque payload form.
pub fn provider_status_to_value(
    status: &VpcMachineProviderStatus,
) -> Result<serde_json::Value, ProviderConfigError> {
    Ok(serde_json::to_value(status)?)
}
