//! Rate-monotonic / fixed-priority policy

use crate::model::ReadySegment;

use super::{PriorityDomain, PriorityKey, PriorityPolicy, LOWEST_PRIORITY};

/// Fixed-priority policy derived from task period.
///
/// Sorts by the negated effective priority (the period for unboosted
/// segments), then absolute deadline and release time.
pub struct RmPolicy;

impl PriorityPolicy for RmPolicy {
    fn priority_key(&self, segment: &ReadySegment, _now: f64) -> PriorityKey {
        let deadline = segment.absolute_deadline.unwrap_or(f64::INFINITY);
        PriorityKey::new(
            vec![-segment.priority_value, deadline, segment.release_time],
            segment.key(),
        )
    }

    fn priority_domain(&self) -> PriorityDomain {
        PriorityDomain::Period
    }

    fn task_priority_value(&self, _deadline: Option<f64>, period: Option<f64>) -> f64 {
        period.map_or(LOWEST_PRIORITY, |p| -p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(period: Option<f64>, deadline: Option<f64>, key_suffix: &str) -> ReadySegment {
        ReadySegment {
            job_id: format!("t{key_suffix}@0"),
            task_id: format!("t{key_suffix}"),
            subtask_id: "s0".to_string(),
            segment_id: "seg0".to_string(),
            remaining_time: 1.0,
            absolute_deadline: deadline,
            task_period: period,
            mapping_hint: None,
            required_resources: vec![],
            preemptible: true,
            release_time: 0.0,
            priority_value: period.map_or(LOWEST_PRIORITY, |p| -p),
        }
    }

    #[test]
    fn shorter_period_sorts_first() {
        let policy = RmPolicy;
        let fast = policy.priority_key(&segment(Some(2.0), Some(20.0), "a"), 0.0);
        let slow = policy.priority_key(&segment(Some(8.0), Some(8.0), "b"), 0.0);
        assert!(fast < slow);
    }

    #[test]
    fn equal_periods_fall_back_to_deadline() {
        let policy = RmPolicy;
        let soon = policy.priority_key(&segment(Some(4.0), Some(3.0), "a"), 0.0);
        let late = policy.priority_key(&segment(Some(4.0), Some(9.0), "b"), 0.0);
        assert!(soon < late);
    }

    #[test]
    fn missing_period_sorts_last() {
        let policy = RmPolicy;
        let with = policy.priority_key(&segment(Some(1e9), Some(1.0), "a"), 0.0);
        let without = policy.priority_key(&segment(None, Some(1.0), "b"), 0.0);
        assert!(with < without);
    }

    #[test]
    fn priority_value_is_negated_period() {
        let policy = RmPolicy;
        assert_eq!(policy.task_priority_value(Some(10.0), Some(4.0)), -4.0);
        assert_eq!(policy.task_priority_value(Some(10.0), None), LOWEST_PRIORITY);
    }
}
