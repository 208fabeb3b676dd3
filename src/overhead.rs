//! Scheduling overhead models

use crate::error::{SimError, SimResult};
use crate::model::Params;
use crate::registry::PluginRegistry;

/// Additive delays charged to the clock by the engine
pub trait OverheadModel: Send + Sync {
    /// Context-switch overhead in simulation time units
    fn context_switch(&self, job_id: &str, core_id: &str) -> f64;

    /// Migration overhead in simulation time units
    fn migration(&self, job_id: &str, from_core: &str, to_core: &str) -> f64;

    /// Scheduler decision overhead
    fn schedule(&self, scheduler_name: &str) -> f64;
}

/// Constant overhead values from configuration; defaults are all zero
pub struct SimpleOverheadModel {
    context_switch: f64,
    migration: f64,
    schedule: f64,
}

impl SimpleOverheadModel {
    /// Build with explicit values, clamped non-negative
    pub fn new(context_switch: f64, migration: f64, schedule: f64) -> Self {
        Self {
            context_switch: context_switch.max(0.0),
            migration: migration.max(0.0),
            schedule: schedule.max(0.0),
        }
    }

    /// Build from `scheduler.params.overhead`
    pub fn from_params(params: &Params) -> SimResult<Self> {
        let mut values = [0.0f64; 3];
        for (slot, key) in ["context_switch", "migration", "schedule"].iter().enumerate() {
            if let Some(raw) = params.get(*key) {
                values[slot] = raw.as_f64().ok_or_else(|| {
                    SimError::config(format!("scheduler.params.overhead.{key}"), "must be number")
                })?;
            }
        }
        Ok(Self::new(values[0], values[1], values[2]))
    }
}

impl OverheadModel for SimpleOverheadModel {
    fn context_switch(&self, _job_id: &str, _core_id: &str) -> f64 {
        self.context_switch
    }

    fn migration(&self, _job_id: &str, _from_core: &str, _to_core: &str) -> f64 {
        self.migration
    }

    fn schedule(&self, _scheduler_name: &str) -> f64 {
        self.schedule
    }
}

/// Registry with the built-in overhead models registered
pub fn overhead_registry() -> PluginRegistry<dyn OverheadModel> {
    let mut registry: PluginRegistry<dyn OverheadModel> = PluginRegistry::new("overhead model");
    for name in ["simple", "default"] {
        registry.register(name, |params| {
            Ok(Box::new(SimpleOverheadModel::from_params(params)?))
        });
    }
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_are_zero() {
        let model = SimpleOverheadModel::from_params(&Params::new()).unwrap();
        assert_eq!(model.context_switch("j", "c0"), 0.0);
        assert_eq!(model.migration("j", "c0", "c1"), 0.0);
        assert_eq!(model.schedule("edf"), 0.0);
    }

    #[test]
    fn negative_values_are_clamped() {
        let model = SimpleOverheadModel::new(-1.0, 0.5, -0.25);
        assert_eq!(model.context_switch("j", "c0"), 0.0);
        assert_eq!(model.migration("j", "c0", "c1"), 0.5);
        assert_eq!(model.schedule("edf"), 0.0);
    }

    #[test]
    fn params_populate_each_slot() {
        let mut params = Params::new();
        params.insert("context_switch".to_string(), json!(0.1));
        params.insert("migration".to_string(), json!(0.2));
        params.insert("schedule".to_string(), json!(0.05));
        let model = SimpleOverheadModel::from_params(&params).unwrap();
        assert_eq!(model.context_switch("j", "c0"), 0.1);
        assert_eq!(model.migration("j", "c0", "c1"), 0.2);
        assert_eq!(model.schedule("rm"), 0.05);
    }

    #[test]
    fn non_numeric_value_is_a_config_error() {
        let mut params = Params::new();
        params.insert("migration".to_string(), json!("fast"));
        assert!(SimpleOverheadModel::from_params(&params).is_err());
    }

    #[test]
    fn registry_resolves_builtin_names() {
        let registry = overhead_registry();
        assert!(registry.create("default", &Params::new()).is_ok());
        assert!(registry.create("quantum", &Params::new()).is_err());
    }
}
