//! MachineSet CRD
//!
//! A MachineSet holds a machine template; the machineset controller only
//! reads the template's provider payload and stamps capacity annotations,
//! replica management is out of its hands.

use crate::machine::MachineSpec;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Annotation carrying the instance profile name for autoscale-from-zero.
pub const MACHINE_SET_PROFILE_ANNOTATION: &str = "machine.vpcoperator.io/profile";

/// Annotation carrying the profile's vCPU count.
pub const MACHINE_SET_VCPU_ANNOTATION: &str = "machine.vpcoperator.io/vCPU";

/// Annotation carrying the profile's memory in MiB.
pub const MACHINE_SET_MEMORY_ANNOTATION: &str = "machine.vpcoperator.io/memoryMb";

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "machine.vpcoperator.io",
    version = "v1beta1",
    kind = "MachineSet",
    namespaced,
    status = "MachineSetStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct MachineSetSpec {
    /// Desired machine count; managed by tooling outside this operator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    /// Template stamped onto machines created from this set
    pub template: MachineTemplate,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct MachineTemplate {
    /// Machine spec carried by the template, including the opaque
    /// provider payload
    pub spec: MachineSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct MachineSetStatus {
    /// Observed machine count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
}
