//! Machine reconciliation state machine.
//!
//! Each operation classifies the machine by what the cloud reports
//! (absent, creating, running, draining) and converges spec, status and
//! conditions toward it. Outcomes are explicit: [`ReconcileStatus::Done`]
//! ends the cycle, [`ReconcileStatus::RequeueAfter`] asks the controller
//! to look again later; genuine failures travel the error channel.

use crate::conditions::{
    new_provider_condition, reconcile_provider_conditions, MACHINE_CREATION_FAILED_REASON,
    MACHINE_CREATION_SUCCEEDED_MESSAGE, MACHINE_CREATION_SUCCEEDED_REASON,
};
use crate::credentials::get_user_data;
use crate::error::ControllerError;
use crate::metrics;
use crate::scope::MachineScope;
use crds::{
    ConditionStatus, Machine, MachineStatus, NodeAddress, NodeAddressType, ProviderCondition,
    ProviderConditionType, MACHINE_CLUSTER_ID_LABEL, MACHINE_INSTANCE_STATE_ANNOTATION,
    MACHINE_INSTANCE_TYPE_LABEL, MACHINE_REGION_LABEL, MACHINE_ZONE_LABEL,
};
use std::time::Duration;
use tracing::{error, info};
use vpc_client::Instance;

/// Poll interval while waiting for the cloud to converge (instance
/// booting, delete draining).
pub const REQUEUE_AFTER: Duration = Duration::from_secs(20);

/// Instance lifecycle state that ends the convergence loop.
const INSTANCE_STATE_RUNNING: &str = "running";

/// Provider ID scheme; full form is `vpc://<clusterID>/<zone>/<name>`.
const PROVIDER_ID_SCHEME: &str = "vpc";

/// Outcome of a reconcile operation that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileStatus {
    /// Converged; wait for the next object change
    Done,
    /// Expected transient state; check again after the delay
    RequeueAfter(Duration),
}

/// Reject machines without the cluster-scoping label before any cloud
/// call is made.
pub fn validate_machine(machine: &Machine) -> Result<(), ControllerError> {
    if machine.cluster_id().is_empty() {
        return Err(ControllerError::InvalidConfiguration(format!(
            "machine is missing {MACHINE_CLUSTER_ID_LABEL:?} label"
        )));
    }
    Ok(())
}

/// Runs the machine state machine against one scope.
pub struct Reconciler<'a> {
    scope: &'a mut MachineScope,
}

impl<'a> Reconciler<'a> {
    /// Wrap a scope for one operation.
    pub fn new(scope: &'a mut MachineScope) -> Self {
        Self { scope }
    }

    /// Whether the backing instance exists in the cloud.
    pub async fn exists(&self) -> Result<bool, ControllerError> {
        let exists = self
            .scope
            .vpc
            .instance_exists_by_name(&self.scope.name(), &self.scope.provider_spec)
            .await?;
        Ok(exists)
    }

    /// Create the backing instance and fold the resulting cloud state
    /// into the machine.
    pub async fn create(&mut self) -> Result<ReconcileStatus, ControllerError> {
        validate_machine(&self.scope.machine)?;

        let name = self.scope.name();
        let namespace = self.scope.namespace();

        let user_data =
            get_user_data(self.scope.secrets.as_ref(), &namespace, &self.scope.provider_spec)
                .await?;

        match self
            .scope
            .vpc
            .create_instance(&name, &self.scope.provider_spec, &user_data)
            .await
        {
            Ok(_) => self.reconcile_machine_with_cloud_state(None).await,
            Err(err) => {
                error!("{}: error occurred while creating machine: {}", name, err);
                metrics::register_failed_instance_create(&name, &namespace, &err.to_string());

                let condition = new_provider_condition(
                    ProviderConditionType::MachineCreated,
                    ConditionStatus::False,
                    MACHINE_CREATION_FAILED_REASON,
                    &err.to_string(),
                );
                if let Err(fold_err) =
                    self.reconcile_machine_with_cloud_state(Some(condition)).await
                {
                    error!(
                        "failed to reconcile machine condition with cloud state: {}",
                        fold_err
                    );
                }

                Err(ControllerError::InstanceCreateFailed(err.to_string()))
            }
        }
    }

    /// Refresh machine status from live cloud state; never re-creates.
    pub async fn update(&mut self) -> Result<ReconcileStatus, ControllerError> {
        validate_machine(&self.scope.machine)?;
        self.reconcile_machine_with_cloud_state(None).await
    }

    /// Delete the backing instance.
    ///
    /// Absent instance means done (idempotent delete). A successful
    /// delete request still requeues: the cloud delete is eventually
    /// consistent, so absence must be re-observed before the machine can
    /// be finalized.
    pub async fn delete(&mut self) -> Result<ReconcileStatus, ControllerError> {
        let name = self.scope.name();

        if !self.exists().await? {
            info!("{}: machine not found during delete, skipping", name);
            return Ok(ReconcileStatus::Done);
        }

        if let Err(err) = self
            .scope
            .vpc
            .delete_instance_by_name(&name, &self.scope.provider_spec)
            .await
        {
            metrics::register_failed_instance_delete(&name, &self.scope.namespace(), &err.to_string());
            return Err(ControllerError::InstanceDeleteFailed(err.to_string()));
        }

        info!("{}: instance delete issued, requeuing to confirm", name);
        Ok(ReconcileStatus::RequeueAfter(REQUEUE_AFTER))
    }

    /// Fold cloud state into the machine.
    ///
    /// With a failed condition, only the condition list is updated and
    /// the cloud is not contacted. Otherwise the live instance drives
    /// addresses, provider ID, provider status, labels and annotations;
    /// a non-running instance requeues after updating everything.
    pub async fn reconcile_machine_with_cloud_state(
        &mut self,
        failed_condition: Option<ProviderCondition>,
    ) -> Result<ReconcileStatus, ControllerError> {
        if let Some(condition) = failed_condition {
            let conditions = std::mem::take(&mut self.scope.provider_status.conditions);
            self.scope.provider_status.conditions =
                reconcile_provider_conditions(conditions, condition);
            return Ok(ReconcileStatus::Done);
        }

        let name = self.scope.name();
        let instance = self
            .scope
            .vpc
            .get_instance_by_name(&name, &self.scope.provider_spec)
            .await
            .map_err(|err| ControllerError::InstanceLookupFailed(err.to_string()))?;

        let Some(ip_addr) = instance.primary_ipv4_address() else {
            return Err(ControllerError::InstanceLookupFailed(format!(
                "could not get the primary ipv4 address of instance: {}",
                instance.name
            )));
        };
        let addresses = vec![
            NodeAddress {
                address_type: NodeAddressType::InternalDNS,
                address: name.clone(),
            },
            NodeAddress {
                address_type: NodeAddressType::InternalIP,
                address: ip_addr.to_string(),
            },
        ];
        self.scope
            .machine
            .status
            .get_or_insert_with(MachineStatus::default)
            .addresses = addresses;

        let cluster_id = self.scope.machine.cluster_id().to_string();
        let provider_id = format!(
            "{PROVIDER_ID_SCHEME}://{cluster_id}/{}/{name}",
            self.scope.provider_spec.zone
        );
        match &self.scope.machine.spec.provider_id {
            Some(current) if *current == provider_id => {
                info!("{}: provider id already set in the machine spec with value: {}", name, current);
            }
            _ => {
                self.scope.machine.spec.provider_id = Some(provider_id.clone());
                info!("{}: provider id set at machine spec: {}", name, provider_id);
            }
        }

        self.scope.provider_status.instance_id = Some(instance.id.clone());
        self.scope.provider_status.instance_state = Some(instance.status.clone());

        let condition_success = new_provider_condition(
            ProviderConditionType::MachineCreated,
            ConditionStatus::True,
            MACHINE_CREATION_SUCCEEDED_REASON,
            MACHINE_CREATION_SUCCEEDED_MESSAGE,
        );
        let conditions = std::mem::take(&mut self.scope.provider_status.conditions);
        self.scope.provider_status.conditions =
            reconcile_provider_conditions(conditions, condition_success);

        self.set_machine_cloud_provider_specifics(&instance);

        if instance.status != INSTANCE_STATE_RUNNING {
            info!("{}: machine status is {:?}, requeuing...", name, instance.status);
            return Ok(ReconcileStatus::RequeueAfter(REQUEUE_AFTER));
        }
        Ok(ReconcileStatus::Done)
    }

    /// Stamp cloud-derived labels and the instance-state annotation;
    /// always overwritten, never diffed.
    fn set_machine_cloud_provider_specifics(&mut self, instance: &Instance) {
        let spec = &self.scope.provider_spec;

        let labels = self
            .scope
            .machine
            .metadata
            .labels
            .get_or_insert_with(Default::default);
        labels.insert(MACHINE_REGION_LABEL.to_string(), spec.region.clone());
        labels.insert(MACHINE_ZONE_LABEL.to_string(), spec.zone.clone());
        labels.insert(MACHINE_INSTANCE_TYPE_LABEL.to_string(), spec.profile.clone());

        let annotations = self
            .scope
            .machine
            .metadata
            .annotations
            .get_or_insert_with(Default::default);
        annotations.insert(
            MACHINE_INSTANCE_STATE_ANNOTATION.to_string(),
            instance.status.clone(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use crds::SecretReference;

    #[tokio::test]
    async fn create_without_cluster_label_makes_no_cloud_calls() {
        let harness = TestHarness::new().with_inventory();
        let machine = test_machine("worker-0", None);

        let mut scope = harness.scope(&machine).await.unwrap();
        let err = Reconciler::new(&mut scope).create().await.unwrap_err();

        assert!(err.is_invalid_configuration());
        assert!(err.to_string().contains("missing"));
        assert_eq!(harness.vpc.total_calls(), 0);
    }

    #[tokio::test]
    async fn update_without_cluster_label_makes_no_cloud_calls() {
        let harness = TestHarness::new().with_inventory();
        let machine = test_machine("worker-0", Some(""));

        let mut scope = harness.scope(&machine).await.unwrap();
        let err = Reconciler::new(&mut scope).update().await.unwrap_err();

        assert!(err.is_invalid_configuration());
        assert_eq!(harness.vpc.total_calls(), 0);
    }

    #[tokio::test]
    async fn create_converges_and_stamps_cloud_state() {
        let harness = TestHarness::new().with_inventory();
        let machine = test_machine("worker-0", Some("cluster-1"));

        let mut scope = harness.scope(&machine).await.unwrap();
        let status = Reconciler::new(&mut scope).create().await.unwrap();

        assert_eq!(status, ReconcileStatus::Done);
        assert_eq!(
            scope.machine.spec.provider_id.as_deref(),
            Some("vpc://cluster-1/us-south-1/worker-0")
        );
        let conditions = &scope.provider_status.conditions;
        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].status, ConditionStatus::True);
        assert_eq!(conditions[0].reason, MACHINE_CREATION_SUCCEEDED_REASON);

        let labels = scope.machine.metadata.labels.as_ref().unwrap();
        assert_eq!(labels.get(MACHINE_REGION_LABEL).unwrap(), "us-south");
        assert_eq!(labels.get(MACHINE_ZONE_LABEL).unwrap(), "us-south-1");
        assert_eq!(labels.get(MACHINE_INSTANCE_TYPE_LABEL).unwrap(), "bx2-2x8");
        let annotations = scope.machine.metadata.annotations.as_ref().unwrap();
        assert_eq!(
            annotations.get(MACHINE_INSTANCE_STATE_ANNOTATION).unwrap(),
            "running"
        );
    }

    #[tokio::test]
    async fn create_failure_folds_a_false_condition_and_errors() {
        let harness = TestHarness::new().with_inventory();
        harness.vpc.fail_instance_create("quota exceeded");
        let machine = test_machine("worker-0", Some("cluster-1"));

        let mut scope = harness.scope(&machine).await.unwrap();
        let err = Reconciler::new(&mut scope).create().await.unwrap_err();

        assert!(matches!(err, ControllerError::InstanceCreateFailed(_)));
        let conditions = &scope.provider_status.conditions;
        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].status, ConditionStatus::False);
        assert_eq!(conditions[0].reason, MACHINE_CREATION_FAILED_REASON);
        assert!(conditions[0].message.contains("quota exceeded"));
        // The failure path folds the condition without re-fetching cloud
        // state.
        assert_eq!(harness.vpc.call_count("get_instance_by_name"), 0);
    }

    #[tokio::test]
    async fn create_with_missing_user_data_secret_is_a_configuration_error() {
        let harness = TestHarness::new().with_inventory();
        let mut machine = test_machine("worker-0", Some("cluster-1"));
        let mut spec = test_provider_spec();
        spec.user_data_secret = Some(SecretReference::new("missing-user-data"));
        machine.spec.provider_spec = Some(crds::provider_spec_to_value(&spec).unwrap());

        let mut scope = harness.scope(&machine).await.unwrap();
        let err = Reconciler::new(&mut scope).create().await.unwrap_err();

        assert!(err.is_invalid_configuration());
        assert_eq!(harness.vpc.call_count("create_instance"), 0);
    }

    #[tokio::test]
    async fn status_round_trips_from_a_running_instance() {
        let harness = TestHarness::new();
        harness
            .vpc
            .add_instance(test_instance("i-1", "worker-0", "running", Some("10.0.0.1")));
        let machine = test_machine("worker-0", Some("cluster-1"));

        let mut scope = harness.scope(&machine).await.unwrap();
        let status = Reconciler::new(&mut scope)
            .reconcile_machine_with_cloud_state(None)
            .await
            .unwrap();

        assert_eq!(status, ReconcileStatus::Done);
        let addresses = &scope.machine.status.as_ref().unwrap().addresses;
        assert_eq!(
            addresses,
            &vec![
                NodeAddress {
                    address_type: NodeAddressType::InternalDNS,
                    address: "worker-0".to_string(),
                },
                NodeAddress {
                    address_type: NodeAddressType::InternalIP,
                    address: "10.0.0.1".to_string(),
                },
            ]
        );
        assert_eq!(scope.provider_status.instance_id.as_deref(), Some("i-1"));
        assert_eq!(scope.provider_status.instance_state.as_deref(), Some("running"));
    }

    #[tokio::test]
    async fn non_running_instance_requeues_but_still_updates_status() {
        let harness = TestHarness::new();
        harness
            .vpc
            .add_instance(test_instance("i-1", "worker-0", "pending", Some("10.0.0.1")));
        let machine = test_machine("worker-0", Some("cluster-1"));

        let mut scope = harness.scope(&machine).await.unwrap();
        let status = Reconciler::new(&mut scope)
            .reconcile_machine_with_cloud_state(None)
            .await
            .unwrap();

        assert_eq!(status, ReconcileStatus::RequeueAfter(REQUEUE_AFTER));
        assert_eq!(scope.provider_status.instance_state.as_deref(), Some("pending"));
        assert!(!scope.machine.status.as_ref().unwrap().addresses.is_empty());
    }

    #[tokio::test]
    async fn instance_without_address_is_a_retryable_error() {
        let harness = TestHarness::new();
        harness
            .vpc
            .add_instance(test_instance("i-1", "worker-0", "pending", None));
        let machine = test_machine("worker-0", Some("cluster-1"));

        let mut scope = harness.scope(&machine).await.unwrap();
        let err = Reconciler::new(&mut scope)
            .reconcile_machine_with_cloud_state(None)
            .await
            .unwrap_err();

        assert!(matches!(err, ControllerError::InstanceLookupFailed(_)));
        assert!(err.to_string().contains("primary ipv4 address"));
    }

    #[tokio::test]
    async fn provider_id_set_is_idempotent() {
        let harness = TestHarness::new();
        harness
            .vpc
            .add_instance(test_instance("i-1", "worker-0", "running", Some("10.0.0.1")));
        let machine = test_machine("worker-0", Some("cluster-1"));

        let mut scope = harness.scope(&machine).await.unwrap();
        Reconciler::new(&mut scope)
            .reconcile_machine_with_cloud_state(None)
            .await
            .unwrap();
        let first = scope.machine.spec.provider_id.clone();
        Reconciler::new(&mut scope)
            .reconcile_machine_with_cloud_state(None)
            .await
            .unwrap();

        assert_eq!(scope.machine.spec.provider_id, first);
    }

    #[tokio::test]
    async fn delete_of_absent_instance_is_a_noop() {
        let harness = TestHarness::new();
        let machine = test_machine("worker-0", Some("cluster-1"));

        let mut scope = harness.scope(&machine).await.unwrap();
        let status = Reconciler::new(&mut scope).delete().await.unwrap();

        assert_eq!(status, ReconcileStatus::Done);
        assert_eq!(harness.vpc.call_count("delete_instance_by_name"), 0);
    }

    #[tokio::test]
    async fn successful_delete_always_requeues() {
        let harness = TestHarness::new();
        harness
            .vpc
            .add_instance(test_instance("i-1", "worker-0", "running", Some("10.0.0.1")));
        let machine = test_machine("worker-0", Some("cluster-1"));

        let mut scope = harness.scope(&machine).await.unwrap();
        let status = Reconciler::new(&mut scope).delete().await.unwrap();

        assert_eq!(status, ReconcileStatus::RequeueAfter(Duration::from_secs(20)));
        assert!(harness.vpc.instances().is_empty());
    }

    #[tokio::test]
    async fn failed_delete_propagates_the_error() {
        let harness = TestHarness::new();
        harness
            .vpc
            .add_instance(test_instance("i-1", "worker-0", "running", Some("10.0.0.1")));
        harness.vpc.fail_instance_delete("instance busy");
        let machine = test_machine("worker-0", Some("cluster-1"));

        let mut scope = harness.scope(&machine).await.unwrap();
        let err = Reconciler::new(&mut scope).delete().await.unwrap_err();

        assert!(matches!(err, ControllerError::InstanceDeleteFailed(_)));
        assert!(err.to_string().contains("instance busy"));
    }

    #[tokio::test]
    async fn exists_reflects_cloud_inventory() {
        let harness = TestHarness::new();
        let machine = test_machine("worker-0", Some("cluster-1"));

        let mut scope = harness.scope(&machine).await.unwrap();
        assert!(!Reconciler::new(&mut scope).exists().await.unwrap());

        harness
            .vpc
            .add_instance(test_instance("i-1", "worker-0", "running", Some("10.0.0.1")));
        assert!(Reconciler::new(&mut scope).exists().await.unwrap());
    }
}
