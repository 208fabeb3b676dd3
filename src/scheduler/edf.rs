//! Earliest-deadline-first policy

use crate::model::ReadySegment;

use super::{PriorityDomain, PriorityKey, PriorityPolicy, LOWEST_PRIORITY};

/// Global EDF over ready segments.
///
/// The key sorts by the negated effective priority, which equals the absolute
/// deadline for unboosted segments; a protocol boost (PIP inheritance, PCP
/// ceiling) moves a segment ahead exactly as if its deadline were earlier.
pub struct EdfPolicy;

impl PriorityPolicy for EdfPolicy {
    fn priority_key(&self, segment: &ReadySegment, _now: f64) -> PriorityKey {
        PriorityKey::new(
            vec![-segment.priority_value, segment.release_time],
            segment.key(),
        )
    }

    fn priority_domain(&self) -> PriorityDomain {
        PriorityDomain::AbsoluteDeadline
    }

    fn task_priority_value(&self, deadline: Option<f64>, _period: Option<f64>) -> f64 {
        deadline.map_or(LOWEST_PRIORITY, |d| -d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(deadline: Option<f64>, release: f64, key_suffix: &str) -> ReadySegment {
        ReadySegment {
            job_id: format!("t{key_suffix}@0"),
            task_id: format!("t{key_suffix}"),
            subtask_id: "s0".to_string(),
            segment_id: "seg0".to_string(),
            remaining_time: 1.0,
            absolute_deadline: deadline,
            task_period: None,
            mapping_hint: None,
            required_resources: vec![],
            preemptible: true,
            release_time: release,
            priority_value: deadline.map_or(LOWEST_PRIORITY, |d| -d),
        }
    }

    #[test]
    fn earlier_deadline_sorts_first() {
        let policy = EdfPolicy;
        let a = policy.priority_key(&segment(Some(5.0), 0.0, "a"), 0.0);
        let b = policy.priority_key(&segment(Some(9.0), 0.0, "b"), 0.0);
        assert!(a < b);
    }

    #[test]
    fn missing_deadline_sorts_last() {
        let policy = EdfPolicy;
        let with = policy.priority_key(&segment(Some(1e9), 0.0, "a"), 0.0);
        let without = policy.priority_key(&segment(None, 0.0, "b"), 0.0);
        assert!(with < without);
    }

    #[test]
    fn boosted_segment_overtakes_shorter_deadline() {
        let policy = EdfPolicy;
        let mut boosted = segment(Some(50.0), 0.0, "low");
        boosted.priority_value = -6.0;
        let medium = segment(Some(20.0), 0.5, "med");
        assert!(policy.priority_key(&boosted, 1.0) < policy.priority_key(&medium, 1.0));
    }

    #[test]
    fn priority_value_is_negated_deadline() {
        let policy = EdfPolicy;
        assert_eq!(policy.task_priority_value(Some(10.0), None), -10.0);
        assert_eq!(policy.task_priority_value(None, Some(4.0)), LOWEST_PRIORITY);
    }
}
