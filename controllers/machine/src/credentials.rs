//! Secret resolution for cloud credentials and instance user data.
//!
//! Access to Kubernetes Secrets is funneled through the [`SecretSource`]
//! trait so reconciler tests can run against an in-memory map instead of
//! an API server.

use crate::error::ControllerError;
use crds::VpcMachineProviderSpec;
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};
use std::collections::BTreeMap;

/// Key inside the credentials secret holding the cloud API key.
///
/// This is the single stable contract; older payload layouts are not
/// accepted.
pub const CREDENTIALS_SECRET_KEY: &str = "vpc_api_key";

/// Key inside the user-data secret holding the ignition config.
pub const USER_DATA_SECRET_KEY: &str = "userData";

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

/// Resolve the cloud API key referenced by the provider spec.
///
/// No referenced secret yields an empty key; a referenced but missing
/// secret, or one without the expected field, is a configuration error.
pub async fn get_credentials_secret(
    secrets: &dyn SecretSource,
    namespace: &str,
    spec: &VpcMachineProviderSpec,
) -> Result<String, ControllerError> {
    let Some(reference) = &spec.credentials_secret else {
        return Ok(String::new());
    };
    lookup_secret_field(secrets, namespace, &reference.name, CREDENTIALS_SECRET_KEY).await
}

/// Resolve the user data referenced by the provider spec.
///
/// No referenced secret yields an empty string; a referenced but missing
/// secret, or one without the expected field, is a configuration error.
pub async fn get_user_data(
    secrets: &dyn SecretSource,
    namespace: &str,
    spec: &VpcMachineProviderSpec,
) -> Result<String, ControllerError> {
    let Some(reference) = &spec.user_data_secret else {
        return Ok(String::new());
    };
    lookup_secret_field(secrets, namespace, &reference.name, USER_DATA_SECRET_KEY).await
}

async fn lookup_secret_field(
    secrets: &dyn SecretSource,
    namespace: &str,
    name: &str,
    key: &str,
) -> Result<String, ControllerError> {
    let data = secrets
        .get(namespace, name)
        .await?
        .ok_or_else(|| {
            ControllerError::InvalidConfiguration(format!(
                "secret {namespace:?}/{name:?} not found"
            ))
        })?;

    let value = data.get(key).ok_or_else(|| {
        ControllerError::InvalidConfiguration(format!(
            "secret {namespace}/{name} does not have {key:?} field set"
        ))
    })?;

    String::from_utf8(value.clone()).map_err(|_| {
        ControllerError::InvalidConfiguration(format!(
            "secret {namespace}/{name} field {key:?} is not valid utf-8"
        ))
    })
}
