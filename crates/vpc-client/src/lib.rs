//! VPC Cloud REST API Client
//!
//! A Rust client library for the VPC cloud compute API consumed by the
//! machine controllers. Covers instance lifecycle plus the name-to-ID
//! resolution lookups (VPCs, subnets, security groups, images, resource
//! groups) needed to turn a declarative machine spec into a create request.
//!
//! # Example
//!
//! ```no_run
//! use vpc_client::{VpcApiClient, VpcClient};
//! use crds::VpcMachineProviderSpec;
//!
//! # async fn example(spec: VpcMachineProviderSpec) -> Result<(), Box<dyn std::error::Error>> {
//! let client = VpcApiClient::new(
//!     "https://us-south.iaas.cloud-vpc.io/v1".to_string(),
//!     "your-api-key".to_string(),
//! )?;
//!
//! // Check whether the instance backing a machine exists
//! let exists = client.instance_exists_by_name("worker-0", &spec).await?;
//!
//! // Create it if not
//! if !exists {
//!     let instance = client.create_instance("worker-0", &spec, "").await?;
//!     println!("created {}", instance.id);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod vpc_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::{DefaultVpcClientBuilder, VpcApiClient};
pub use error::{ResourceKind, VpcError};
pub use models::*;
pub use vpc_trait::{VpcClient, VpcClientBuilder};
#[cfg(feature = "test-util")]
pub use mock::MockVpcClient;
