//! Controller-specific error types.
//!
//! Splits errors along the retry boundary: configuration errors are
//! terminal until the user edits the machine, everything else is fair
//! game for the controller's backoff.

use thiserror::Error;
use vpc_client::VpcError;

/// Errors that can occur in the machine controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// VPC cloud API error
    #[error("VPC API error: {0}")]
    Cloud(#[from] VpcError),

    /// The machine's configuration cannot produce an instance; retrying
    /// without a spec change will not help
    #[error("invalid machine configuration: {0}")]
    InvalidConfiguration(String),

    /// Instance creation failed at the cloud API
    #[error("failed to create instance via vpc client: {0}")]
    InstanceCreateFailed(String),

    /// Instance deletion failed at the cloud API
    #[error("failed to delete instance via vpc client: {0}")]
    InstanceDeleteFailed(String),

    /// Instance state could not be observed
    #[error("get instance failed with an error: {0}")]
    InstanceLookupFailed(String),

    /// Provider payload could not be re-encoded at persist time
    #[error("provider payload error: {0}")]
    ProviderPayload(String),

    /// Resource watch failed
    #[error("resource watch failed: {0}")]
    Watch(String),
}

impl ControllerError {
    /// Whether this error is terminal from the state machine's view;
    /// the controller loop skips busy-retry for these.
    pub fn is_invalid_configuration(&self) -> bool {
        matches!(self, ControllerError::InvalidConfiguration(_))
    }
}
