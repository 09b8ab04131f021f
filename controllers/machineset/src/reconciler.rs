//! Reconciliation logic for MachineSet capacity annotations.
//!
//! Exposes compute information derived from the template's provider spec
//! so the autoscaler can foresee upcoming capacity when scaling from
//! zero. The annotations are advisory: a failed profile lookup emits a
//! warning and ends the cycle without error so the rest of the
//! machineset machinery is never blocked on them.

use crate::credentials::{get_credentials_secret, SecretSource};
use crate::error::ControllerError;
use crate::events::EventSink;
use crds::{
    provider_spec_from_value, MachineSet, MACHINE_SET_MEMORY_ANNOTATION,
    MACHINE_SET_PROFILE_ANNOTATION, MACHINE_SET_VCPU_ANNOTATION,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info};
use vpc_client::VpcClientBuilder;

/// Compute capacity encoded in an instance profile name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileCapacity {
    /// Virtual CPU count
    pub vcpu: i64,
    /// Memory in GiB
    pub memory_gb: i64,
}

impl ProfileCapacity {
    /// Memory in MiB, the unit the autoscaler annotation expects.
    pub fn memory_mb(&self) -> i64 {
        self.memory_gb * 1024
    }
}

/// Parse capacity from a `<family>-<vcpu>x<memGiB>` profile name, e.g.
/// `bx2-2x8` or `mx2d-48x384`. Unrecognized shapes yield `None`.
pub fn profile_capacity(profile: &str) -> Option<ProfileCapacity> {
    let size = profile.split('-').nth(1)?;
    let (vcpu, memory_gb) = size.split_once('x')?;
    Some(ProfileCapacity {
        vcpu: vcpu.parse().ok()?,
        memory_gb: memory_gb.parse().ok()?,
    })
}

/// Reconciles MachineSet capacity annotations.
pub struct Reconciler {
    secrets: Arc<dyn SecretSource>,
    builder: Arc<dyn VpcClientBuilder>,
    events: Arc<dyn EventSink>,
}

impl Reconciler {
    /// Creates a new reconciler instance.
    pub fn new(
        secrets: Arc<dyn SecretSource>,
        builder: Arc<dyn VpcClientBuilder>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            secrets,
            builder,
            events,
        }
    }

    /// Compute the annotations for one machineset.
    ///
    /// `Ok(None)` means "nothing to stamp this cycle": the profile could
    /// not be confirmed and a warning event was emitted instead.
    pub async fn reconcile(
        &self,
        machine_set: &MachineSet,
    ) -> Result<Option<BTreeMap<String, String>>, ControllerError> {
        let name = machine_set.metadata.name.as_deref().unwrap_or("<unknown>");
        let namespace = machine_set.metadata.namespace.as_deref().unwrap_or("default");

        info!("Reconciling MachineSet {}/{}", namespace, name);

        let spec_value = machine_set
            .spec
            .template
            .spec
            .provider_spec
            .as_ref()
            .ok_or_else(|| {
                ControllerError::InvalidConfiguration(
                    "machineset template does not carry a providerSpec payload".to_string(),
                )
            })?;
        let config = provider_spec_from_value(spec_value).map_err(|err| {
            ControllerError::InvalidConfiguration(format!("failed to get providerConfig: {err}"))
        })?;

        let api_key = get_credentials_secret(self.secrets.as_ref(), namespace, &config).await?;
        let client = self.builder.build(&api_key, &config).map_err(|err| {
            ControllerError::InvalidConfiguration(format!("error creating vpc client: {err}"))
        })?;

        if let Err(err) = client.get_instance_profile(&config.profile).await {
            error!(
                "unable to set annotations: unknown profile {:?}: {}",
                config.profile, err
            );
            error!(
                "autoscaling from zero will not work; manually populate {:?} annotations for the instance profile",
                MACHINE_SET_PROFILE_ANNOTATION
            );
            // User intervention is required; emit an event but do not
            // block reconciliation on an advisory annotation.
            self.events
                .warn(
                    machine_set,
                    "FailedUpdate",
                    "Failed to set autoscaling from zero annotations, instance profile unknown"
                        .to_string(),
                )
                .await;
            return Ok(None);
        }

        let mut annotations = BTreeMap::new();
        annotations.insert(
            MACHINE_SET_PROFILE_ANNOTATION.to_string(),
            config.profile.clone(),
        );
        if let Some(capacity) = profile_capacity(&config.profile) {
            annotations.insert(
                MACHINE_SET_VCPU_ANNOTATION.to_string(),
                capacity.vcpu.to_string(),
            );
            annotations.insert(
                MACHINE_SET_MEMORY_ANNOTATION.to_string(),
                capacity.memory_mb().to_string(),
            );
        }
        Ok(Some(annotations))
    }
}
