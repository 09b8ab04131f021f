//! Machine API CRD Definitions
//!
//! Kubernetes Custom Resource Definitions for the VPC machine operator,
//! plus the provider-specific configuration embedded in them.

pub mod machine;
pub mod machine_set;
pub mod provider;
pub mod references;

pub use machine::*;
pub use machine_set::*;
pub use provider::*;
pub use references::*;
