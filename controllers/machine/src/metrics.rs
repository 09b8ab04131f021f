//! Failure counters for instance lifecycle operations.

use prometheus::{register_int_counter_vec, IntCounterVec};
use std::sync::LazyLock;

static FAILED_INSTANCE_CREATE: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "machine_controller_failed_instance_create_total",
        "Instance create attempts that failed at the cloud API",
        &["name", "namespace", "reason"]
    )
    .expect("failed-create counter registers once at startup")
});

static FAILED_INSTANCE_DELETE: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "machine_controller_failed_instance_delete_total",
        "Instance delete attempts that failed at the cloud API",
        &["name", "namespace", "reason"]
    )
    .expect("failed-delete counter registers once at startup")
});

/// Count one failed instance create for a machine.
pub fn register_failed_instance_create(name: &str, namespace: &str, reason: &str) {
    FAILED_INSTANCE_CREATE
        .with_label_values(&[name, namespace, reason])
        .inc();
}

/// Count one failed instance delete for a machine.
pub fn register_failed_instance_delete(name: &str, namespace: &str, reason: &str) {
    FAILED_INSTANCE_DELETE
        .with_label_values(&[name, namespace, reason])
        .inc();
}
