//! VPC API client
//!
//! Implements the compute REST API used to provision machine instances:
//! `/instances` for lifecycle, plus the listing endpoints backing name
//! resolution (`/vpcs`, `/subnets`, `/security_groups`, `/images`,
//! `/resource_groups`, `/instance/profiles`).

use crate::error::{ResourceKind, VpcError};
use crate::models::*;
use crate::vpc_trait::{VpcClient, VpcClientBuilder};
use crds::VpcMachineProviderSpec;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Compute API endpoint for a region, used when no explicit service URL is
/// configured.
fn region_service_url(region: &str) -> String {
    format!("https://{region}.iaas.cloud-vpc.io/v1")
}

/// VPC compute API client
pub struct VpcApiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl VpcApiClient {
    /// Create a new client against a service URL.
    ///
    /// # Arguments
    /// * `base_url` - Regional compute endpoint (e.g. `https://us-south.iaas.cloud-vpc.io/v1`)
    /// * `api_key` - API key used as a bearer token
    pub fn new(base_url: String, api_key: String) -> Result<Self, VpcError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(VpcError::Http)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET a collection endpoint with query parameters and deserialize the
    /// response body.
    async fn get_json<T: for<'de> serde::Deserialize<'de>>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, VpcError> {
        let mut url = format!("{}{}", self.base_url, path);
        if !query.is_empty() {
            let params: Vec<String> = query
                .iter()
                .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
                .collect();
            url = format!("{}?{}", url, params.join("&"));
        }
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VpcError::Api(format!("GET {path} failed: {status} - {body}")));
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            VpcError::Api(format!(
                "error decoding response body: {} - Response (first 500 chars): {}",
                e,
                body.chars().take(500).collect::<String>()
            ))
        })
    }
}

/// Match the listed security groups against the requested names.
///
/// Every requested name must be present in `groups`; a partial match fails
/// naming the unresolved names instead of returning a shorter list.
pub(crate) fn resolve_security_group_ids(
    groups: &[SecurityGroup],
    names: &[String],
) -> Result<Vec<String>, VpcError> {
    let mut unresolved: Vec<String> = names.to_vec();
    let mut ids = Vec::with_capacity(names.len());

    for group in groups {
        if let Some(pos) = unresolved.iter().position(|name| *name == group.name) {
            unresolved.remove(pos);
            ids.push(group.id.clone());
        }
    }

    if unresolved.is_empty() {
        Ok(ids)
    } else {
        Err(VpcError::SecurityGroupsNotResolved(unresolved))
    }
}

#[async_trait::async_trait]
impl VpcClient for VpcApiClient {
    async fn create_instance(
        &self,
        name: &str,
        spec: &VpcMachineProviderSpec,
        user_data: &str,
    ) -> Result<Instance, VpcError> {
        // Resolve every name reference before touching /instances; each
        // resolution failure carries the kind and name that missed.
        let resource_group_id = self.get_resource_group_id_by_name(&spec.resource_group).await?;
        let image_id = self.get_image_id_by_name(&spec.image, &resource_group_id).await?;
        let vpc_id = self.get_vpc_id_by_name(&spec.vpc, &resource_group_id).await?;
        let subnet_id = self
            .get_subnet_id_by_name(&spec.primary_network_interface.subnet, &resource_group_id)
            .await?;
        let security_group_ids = self
            .get_security_group_ids_by_name(
                &spec.primary_network_interface.security_groups,
                &resource_group_id,
                &vpc_id,
            )
            .await?;

        let prototype = InstancePrototype {
            name: name.to_string(),
            image: IdentityById { id: image_id },
            profile: IdentityByName {
                name: spec.profile.clone(),
            },
            zone: IdentityByName {
                name: spec.zone.clone(),
            },
            resource_group: IdentityById {
                id: resource_group_id,
            },
            primary_network_interface: NetworkInterfacePrototype {
                subnet: IdentityById { id: subnet_id },
                security_groups: security_group_ids
                    .into_iter()
                    .map(|id| IdentityById { id })
                    .collect(),
            },
            vpc: IdentityById { id: vpc_id },
            user_data: user_data.to_string(),
        };

        let url = format!("{}/instances", self.base_url);
        debug!("POST {} name={}", url, name);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
            .json(&prototype)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(VpcError::Api(format!(
                "instance create failed: {status} - {body}"
            )));
        }

        serde_json::from_str(&body).map_err(VpcError::Serialization)
    }

    async fn get_instance_by_name(
        &self,
        name: &str,
        spec: &VpcMachineProviderSpec,
    ) -> Result<Instance, VpcError> {
        let collection: InstanceCollection = self
            .get_json("/instances", &[("name", name), ("vpc.name", &spec.vpc)])
            .await?;

        // Instance names are unique within a VPC; the first match is the
        // instance.
        collection
            .instances
            .into_iter()
            .next()
            .ok_or(VpcError::InstanceNotFound)
    }

    async fn get_instance_by_id(&self, id: &str) -> Result<Instance, VpcError> {
        self.get_json(&format!("/instances/{}", urlencoding::encode(id)), &[])
            .await
    }

    async fn delete_instance_by_name(
        &self,
        name: &str,
        spec: &VpcMachineProviderSpec,
    ) -> Result<(), VpcError> {
        let instance = self.get_instance_by_name(name, spec).await?;
        if instance.id.is_empty() {
            return Err(VpcError::Api("could not get the instance id".to_string()));
        }

        let url = format!(
            "{}/instances/{}",
            self.base_url,
            urlencoding::encode(&instance.id)
        );
        debug!("DELETE {}", url);

        let response = self
            .client
            .delete(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VpcError::Api(format!(
                "instance delete failed: {status} - {body}"
            )));
        }
        Ok(())
    }

    async fn get_instance_profile(&self, name: &str) -> Result<bool, VpcError> {
        // Reject before making an api call
        if name.is_empty() {
            return Err(VpcError::InvalidRequest("instance profile not set".to_string()));
        }

        let url = format!(
            "{}/instance/profiles/{}",
            self.base_url,
            urlencoding::encode(name)
        );
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(VpcError::ResourceNotFound {
                kind: ResourceKind::InstanceProfile,
                name: name.to_string(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VpcError::Api(format!(
                "instance profile lookup failed: {status} - {body}"
            )));
        }
        Ok(true)
    }

    async fn get_vpc_id_by_name(
        &self,
        name: &str,
        resource_group_id: &str,
    ) -> Result<String, VpcError> {
        let collection: VpcCollection = self
            .get_json("/vpcs", &[("resource_group.id", resource_group_id)])
            .await?;

        collection
            .vpcs
            .into_iter()
            .find(|vpc| vpc.name == name)
            .map(|vpc| vpc.id)
            .ok_or_else(|| VpcError::ResourceNotFound {
                kind: ResourceKind::Vpc,
                name: name.to_string(),
            })
    }

    async fn get_subnet_id_by_name(
        &self,
        name: &str,
        resource_group_id: &str,
    ) -> Result<String, VpcError> {
        let collection: SubnetCollection = self
            .get_json("/subnets", &[("resource_group.id", resource_group_id)])
            .await?;

        collection
            .subnets
            .into_iter()
            .find(|subnet| subnet.name == name)
            .map(|subnet| subnet.id)
            .ok_or_else(|| VpcError::ResourceNotFound {
                kind: ResourceKind::Subnet,
                name: name.to_string(),
            })
    }

    async fn get_security_group_ids_by_name(
        &self,
        names: &[String],
        resource_group_id: &str,
        vpc_id: &str,
    ) -> Result<Vec<String>, VpcError> {
        let collection: SecurityGroupCollection = self
            .get_json(
                "/security_groups",
                &[("resource_group.id", resource_group_id), ("vpc.id", vpc_id)],
            )
            .await?;

        resolve_security_group_ids(&collection.security_groups, names)
    }

    async fn get_resource_group_id_by_name(&self, name: &str) -> Result<String, VpcError> {
        let collection: ResourceGroupCollection =
            self.get_json("/resource_groups", &[("name", name)]).await?;

        collection
            .resources
            .into_iter()
            .next()
            .map(|group| group.id)
            .ok_or_else(|| VpcError::ResourceNotFound {
                kind: ResourceKind::ResourceGroup,
                name: name.to_string(),
            })
    }

    async fn get_image_id_by_name(
        &self,
        name: &str,
        resource_group_id: &str,
    ) -> Result<String, VpcError> {
        let collection: ImageCollection = self
            .get_json(
                "/images",
                &[
                    ("resource_group.id", resource_group_id),
                    ("name", name),
                    ("visibility", "private"),
                ],
            )
            .await?;

        collection
            .images
            .into_iter()
            .next()
            .map(|image| image.id)
            .ok_or_else(|| VpcError::ResourceNotFound {
                kind: ResourceKind::Image,
                name: name.to_string(),
            })
    }
}

/// Default [`VpcClientBuilder`]: builds an HTTP client against the
/// region-derived service URL, or an explicit override.
#[derive(Debug, Clone, Default)]
pub struct DefaultVpcClientBuilder {
    /// Explicit service URL; when `None` the URL is derived from the
    /// machine's region
    pub service_url: Option<String>,
}

impl VpcClientBuilder for DefaultVpcClientBuilder {
    fn build(
        &self,
        api_key: &str,
        spec: &VpcMachineProviderSpec,
    ) -> Result<Arc<dyn VpcClient>, VpcError> {
        let base_url = self
            .service_url
            .clone()
            .unwrap_or_else(|| region_service_url(&spec.region));
        Ok(Arc::new(VpcApiClient::new(base_url, api_key.to_string())?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(id: &str, name: &str) -> SecurityGroup {
        SecurityGroup {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    #[test]
    fn security_groups_resolve_all_names() {
        let groups = vec![group("id-a", "sg-a"), group("id-b", "sg-b"), group("id-c", "sg-c")];
        let names = vec!["sg-a".to_string(), "sg-c".to_string()];
        let ids = resolve_security_group_ids(&groups, &names).unwrap();
        assert_eq!(ids, vec!["id-a".to_string(), "id-c".to_string()]);
    }

    #[test]
    fn security_groups_partial_match_is_an_error() {
        let groups = vec![group("id-a", "sg-a")];
        let names = vec!["sg-a".to_string(), "sg-b".to_string()];
        let err = resolve_security_group_ids(&groups, &names).unwrap_err();
        match err {
            VpcError::SecurityGroupsNotResolved(missing) => {
                assert_eq!(missing, vec!["sg-b".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn security_groups_empty_request_resolves_empty() {
        let groups = vec![group("id-a", "sg-a")];
        let ids = resolve_security_group_ids(&groups, &[]).unwrap();
        assert!(ids.is_empty());
    }

    #[test]
    fn region_url_is_derived_from_region() {
        assert_eq!(
            region_service_url("us-south"),
            "https://us-south.iaas.cloud-vpc.io/v1"
        );
    }
}
