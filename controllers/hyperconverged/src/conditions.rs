//! Aggregated HyperConverged conditions.
//!
//! Each operand folds the conditions its downstream object reports into a
//! per-reconcile [`ConditionSet`]. Only unhealthy contributions are recorded,
//! so the last contributor of a type is also the worst one. The reconciler
//! writes the set into the HyperConverged status at the end of the pass.

use hco_crds::condition_types::{AVAILABLE, DEGRADED, PROGRESSING, UPGRADEABLE};
use hco_crds::{find_status_condition, Condition, ConditionStatus};
use std::collections::BTreeMap;

/// Conditions keyed by type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConditionSet {
    conditions: BTreeMap<String, Condition>,
}

impl ConditionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the condition of the same type.
    pub fn set_status_condition(&mut self, condition: Condition) {
        self.conditions.insert(condition.type_.clone(), condition);
    }

    /// Inserts the condition only if its type is not present yet.
    pub fn set_status_condition_if_unset(&mut self, condition: Condition) {
        self.conditions
            .entry(condition.type_.clone())
            .or_insert(condition);
    }

    pub fn get(&self, type_: &str) -> Option<&Condition> {
        self.conditions.get(type_)
    }

    pub fn contains(&self, type_: &str) -> bool {
        self.conditions.contains_key(type_)
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    /// Conditions in type order.
    pub fn iter(&self) -> impl Iterator<Item = &Condition> {
        self.conditions.values()
    }
}

/// Folds the conditions reported by `component` into `set`.
///
/// Returns true when the component is ready: it reported `Available=True`,
/// `Progressing` other than `True` and `Degraded` other than `True`.
pub fn handle_component_conditions(
    set: &mut ConditionSet,
    component: &str,
    conditions: &[Condition],
    generation: Option<i64>,
) -> bool {
    let cond = |type_: &str, status: ConditionStatus, reason: String, message: String| {
        Condition::new(type_, status, reason, message).with_generation(generation)
    };

    if conditions.is_empty() {
        let reason = format!("{component}Conditions");
        let message = format!("{component} resource has no conditions");
        set.set_status_condition(cond(AVAILABLE, ConditionStatus::False, reason.clone(), message.clone()));
        set.set_status_condition(cond(PROGRESSING, ConditionStatus::True, reason.clone(), message.clone()));
        set.set_status_condition(cond(UPGRADEABLE, ConditionStatus::False, reason, message));
        return false;
    }

    let mut is_ready = true;
    let mut found_progressing = false;
    let mut found_degraded = false;

    for c in conditions {
        match c.type_.as_str() {
            AVAILABLE => {
                if c.status == ConditionStatus::False {
                    is_ready = false;
                    set.set_status_condition(cond(
                        AVAILABLE,
                        ConditionStatus::False,
                        format!("{component}NotAvailable"),
                        format!("{component} is not available: {}", c.message),
                    ));
                }
            }
            PROGRESSING => {
                found_progressing = true;
                if c.status == ConditionStatus::True {
                    is_ready = false;
                    let reason = format!("{component}Progressing");
                    let message = format!("{component} is progressing: {}", c.message);
                    set.set_status_condition(cond(
                        PROGRESSING,
                        ConditionStatus::True,
                        reason.clone(),
                        message.clone(),
                    ));
                    set.set_status_condition_if_unset(cond(UPGRADEABLE, ConditionStatus::False, reason, message));
                }
            }
            DEGRADED => {
                found_degraded = true;
                if c.status == ConditionStatus::True {
                    is_ready = false;
                    set.set_status_condition(cond(
                        DEGRADED,
                        ConditionStatus::True,
                        format!("{component}Degraded"),
                        format!("{component} is degraded: {}", c.message),
                    ));
                }
            }
            UPGRADEABLE => {
                if c.status == ConditionStatus::False {
                    set.set_status_condition(cond(
                        UPGRADEABLE,
                        ConditionStatus::False,
                        format!("{component}NotUpgradeable"),
                        format!("{component} is not upgradeable: {}", c.message),
                    ));
                }
            }
            _ => {}
        }
    }

    let found_available = find_status_condition(conditions, AVAILABLE).is_some();
    if !found_available {
        set.set_status_condition(cond(
            AVAILABLE,
            ConditionStatus::False,
            format!("{component}NotAvailable"),
            format!("{component} is not available: missing \"Available\" condition"),
        ));
    }

    is_ready && found_available && found_progressing && found_degraded
}
