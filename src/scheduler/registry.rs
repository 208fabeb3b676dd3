//! Scheduler registry and factory

use crate::error::{SimError, SimResult};
use crate::model::Params;
use crate::registry::PluginRegistry;

use super::{EdfPolicy, PriorityScheduler, RmPolicy, Scheduler};

fn allow_preempt(params: &Params) -> SimResult<bool> {
    match params.get("allow_preempt") {
        None => Ok(true),
        Some(value) => value.as_bool().ok_or_else(|| {
            SimError::config("scheduler.params.allow_preempt", "must be boolean")
        }),
    }
}

/// Registry with the built-in scheduling policies registered
pub fn scheduler_registry() -> PluginRegistry<dyn Scheduler> {
    let mut registry: PluginRegistry<dyn Scheduler> = PluginRegistry::new("scheduler");
    for name in ["edf", "earliest_deadline_first"] {
        registry.register(name, |params| {
            Ok(Box::new(PriorityScheduler::new(EdfPolicy, allow_preempt(params)?)))
        });
    }
    for name in ["rm", "rate_monotonic", "fixed_priority"] {
        registry.register(name, |params| {
            Ok(Box::new(PriorityScheduler::new(RmPolicy, allow_preempt(params)?)))
        });
    }
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::PriorityDomain;

    #[test]
    fn builtin_names_resolve() {
        let registry = scheduler_registry();
        for name in ["edf", "earliest_deadline_first", "rm", "rate_monotonic", "fixed_priority"] {
            assert!(registry.contains(name), "missing {name}");
        }
    }

    #[test]
    fn unknown_name_fails() {
        let registry = scheduler_registry();
        assert!(registry.create("lottery", &Params::new()).is_err());
    }

    #[test]
    fn aliases_share_the_priority_domain() {
        let registry = scheduler_registry();
        let edf = registry.create("EDF", &Params::new()).unwrap();
        assert_eq!(edf.priority_domain(), PriorityDomain::AbsoluteDeadline);
        let rm = registry.create("fixed_priority", &Params::new()).unwrap();
        assert_eq!(rm.priority_domain(), PriorityDomain::Period);
    }

    #[test]
    fn invalid_allow_preempt_is_a_config_error() {
        let registry = scheduler_registry();
        let mut params = Params::new();
        params.insert("allow_preempt".to_string(), serde_json::json!("yes"));
        assert!(registry.create("edf", &params).is_err());
    }
}
