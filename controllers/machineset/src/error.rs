//! Controller-specific error types.

use thiserror::Error;
use vpc_client::VpcError;

/// Errors that can occur in the machineset controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// VPC cloud API error
    #[error("VPC API error: {0}")]
    Cloud(#[from] VpcError),

    /// The template's provider payload cannot be decoded; retrying
    /// without a spec change will not help
    #[error("invalid machineset configuration: {0}")]
    InvalidConfiguration(String),

    /// Resource watch failed
    #[error("resource watch failed: {0}")]
    Watch(String),
}

impl ControllerError {
    /// Whether this error is terminal until the user edits the spec.
    pub fn is_invalid_configuration(&self) -> bool {
        matches!(self, ControllerError::InvalidConfiguration(_))
    }
}
