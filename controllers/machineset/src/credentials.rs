//! Credentials resolution for building the cloud client.
//!
//! Same secret contract as the machine controller: the provider spec
//! references a secret whose `vpc_api_key` field holds the API key.

use crate::error::ControllerError;
use crds::VpcMachineProviderSpec;
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};
use std::collections::BTreeMap;

/// Key inside the credentials secret holding the cloud API key.
pub const CREDENTIALS_SECRET_KEY: &str = "vpc_api_key";

/// Read access to Secret data by namespace and name.
#[async_trait::async_trait]
pub trait SecretSource: Send + Sync {
    /// Fetch a secret's data map, `None` when the secret does not exist.
    async fn get(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<BTreeMap<String, Vec<u8>>>, kube::Error>;
}

/// [`SecretSource`] backed by the Kubernetes API.
pub struct KubeSecretSource {
    client: Client,
}

impl KubeSecretSource {
    /// Create a source reading through the given client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl SecretSource for KubeSecretSource {
    async fn get(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<BTreeMap<String, Vec<u8>>>, kube::Error> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let secret = api.get_opt(name).await?;
        Ok(secret.and_then(|secret| secret.data).map(|data| {
            data.into_iter()
                .map(|(key, value)| (key, value.0))
                .collect()
        }))
    }
}

/// Resolve the cloud API key referenced by the template's provider spec;
/// no reference yields an empty key.
pub async fn get_credentials_secret(
    secrets: &dyn SecretSource,
    namespace: &str,
    spec: &VpcMachineProviderSpec,
) -> Result<String, ControllerError> {
    let Some(reference) = &spec.credentials_secret else {
        return Ok(String::new());
    };

    let data = secrets
        .get(namespace, &reference.name)
        .await?
        .ok_or_else(|| {
            ControllerError::InvalidConfiguration(format!(
                "secret {namespace:?}/{:?} not found",
                reference.name
            ))
        })?;

    let value = data.get(CREDENTIALS_SECRET_KEY).ok_or_else(|| {
        ControllerError::InvalidConfiguration(format!(
            "secret {namespace}/{} does not have {CREDENTIALS_SECRET_KEY:?} field set",
            reference.name
        ))
    })?;

    String::from_utf8(value.clone()).map_err(|_| {
        ControllerError::InvalidConfiguration(format!(
            "secret {namespace}/{} field {CREDENTIALS_SECRET_KEY:?} is not valid utf-8",
            reference.name
        ))
    })
}
