//! Kubernetes object references used by the machine CRDs
//!
//! Follows the Kubernetes `LocalObjectReference` pattern: a name-only
//! reference resolved in the namespace of the referencing resource.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Reference to a Secret in the same namespace as the referencing resource.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SecretReference {
    /// Name of the referenced Secret
    pub name: String,
}

impl SecretReference {
    /// Create a new reference by name
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}
