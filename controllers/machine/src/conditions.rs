//! Provider condition folding.
//!
//! Conditions live in the provider status and carry two timestamps with
//! different contracts: `last_probe_time` moves on every effective update,
//! `last_transition_time` only when the status value flips. Folding the
//! same condition twice in a row must leave both untouched the second time.

use chrono::{DateTime, Utc};
use crds::{ConditionStatus, ProviderCondition, ProviderConditionType};

/// Reason recorded when the instance create succeeded.
pub const MACHINE_CREATION_SUCCEEDED_REASON: &str = "MachineCreationSucceeded";

/// Message recorded when the instance create succeeded.
pub const MACHINE_CREATION_SUCCEEDED_MESSAGE: &str = "Machine successfully created";

/// Reason recorded when the instance create failed.
pub const MACHINE_CREATION_FAILED_REASON: &str = "MachineCreationFailed";

/// Build a condition value to fold; the timestamps are placeholders and
/// assigned by the fold itself.
pub fn new_provider_condition(
    condition_type: ProviderConditionType,
    status: ConditionStatus,
    reason: &str,
    message: &str,
) -> ProviderCondition {
    ProviderCondition {
        condition_type,
        status,
        reason: reason.to_string(),
        message: message.to_string(),
        last_transition_time: DateTime::UNIX_EPOCH,
        last_probe_time: DateTime::UNIX_EPOCH,
    }
}

/// Fold a condition into the list, keeping at most one entry per type.
pub fn reconcile_provider_conditions(
    conditions: Vec<ProviderCondition>,
    new_condition: ProviderCondition,
) -> Vec<ProviderCondition> {
    reconcile_provider_conditions_at(conditions, new_condition, Utc::now())
}

/// Fold with an explicit clock.
///
/// An existing entry is updated when any of status/reason/message differ;
/// `last_transition_time` moves only when the status itself differed.
pub(crate) fn reconcile_provider_conditions_at(
    mut conditions: Vec<ProviderCondition>,
    new_condition: ProviderCondition,
    now: DateTime<Utc>,
) -> Vec<ProviderCondition> {
    match conditions
        .iter_mut()
        .find(|condition| condition.condition_type == new_condition.condition_type)
    {
        None => {
            conditions.push(ProviderCondition {
                last_transition_time: now,
                last_probe_time: now,
                ..new_condition
            });
        }
        Some(current) => {
            let changed = current.status != new_condition.status
                || current.reason != new_condition.reason
                || current.message != new_condition.message;
            if changed {
                if current.status != new_condition.status {
                    current.last_transition_time = now;
                }
                current.status = new_condition.status;
                current.reason = new_condition.reason;
                current.message = new_condition.message;
                current.last_probe_time = now;
            }
        }
    }
    conditions
}
