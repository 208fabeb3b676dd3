//! Execution-time models

use crate::error::{SimError, SimResult};
use crate::model::Params;
use crate::registry::PluginRegistry;

/// Identity of the segment/core pair being estimated
#[derive(Debug, Clone, Copy, Default)]
pub struct EstimateContext<'a> {
    pub task_id: Option<&'a str>,
    pub subtask_id: Option<&'a str>,
    pub segment_id: Option<&'a str>,
    pub core_id: Option<&'a str>,
}

/// Execution-time estimation plugin
pub trait ExecutionTimeModel: Send + Sync {
    /// Estimate the service time of `remaining` work on a core
    fn estimate(&self, remaining: f64, core_speed: f64, now: f64, ctx: &EstimateContext<'_>)
        -> f64;

    /// Observe execution progress for adaptive models
    fn on_exec(&mut self, _segment_key: &str, _core_id: &str, _dt: f64) {}
}

/// Baseline model: `remaining / core_speed`
pub struct ConstantEtm;

impl ExecutionTimeModel for ConstantEtm {
    fn estimate(
        &self,
        remaining: f64,
        core_speed: f64,
        _now: f64,
        _ctx: &EstimateContext<'_>,
    ) -> f64 {
        remaining / core_speed
    }
}

/// Table-driven scaling on top of the baseline.
///
/// Lookup keys, most specific first: `"{task}/{subtask}/{segment}@{core}"`,
/// `"{task}/{subtask}/{segment}@*"`, `"{segment}@{core}"`, `"{segment}@*"`.
pub struct TableBasedEtm {
    default_scale: f64,
    scale_table: std::collections::HashMap<String, f64>,
}

impl TableBasedEtm {
    /// Build from `scheduler.params.etm_params`; all scales must be > 0
    pub fn from_params(params: &Params) -> SimResult<Self> {
        let default_scale = match params.get("default_scale") {
            None => 1.0,
            Some(raw) => raw.as_f64().ok_or_else(|| {
                SimError::config("scheduler.params.etm_params.default_scale", "must be number")
            })?,
        };
        if default_scale <= 0.0 {
            return Err(SimError::config(
                "scheduler.params.etm_params.default_scale",
                "must be > 0",
            ));
        }

        let mut scale_table = std::collections::HashMap::new();
        if let Some(raw_table) = params.get("table") {
            let table = raw_table.as_object().ok_or_else(|| {
                SimError::config("scheduler.params.etm_params.table", "must be object")
            })?;
            for (raw_key, raw_scale) in table {
                let key = raw_key.trim();
                if key.is_empty() {
                    return Err(SimError::config(
                        "scheduler.params.etm_params.table",
                        "contains empty key",
                    ));
                }
                let scale = raw_scale.as_f64().ok_or_else(|| {
                    SimError::config(
                        format!("scheduler.params.etm_params.table.{key}"),
                        "must be number",
                    )
                })?;
                if scale <= 0.0 {
                    return Err(SimError::config(
                        format!("scheduler.params.etm_params.table.{key}"),
                        "must be > 0",
                    ));
                }
                scale_table.insert(key.to_string(), scale);
            }
        }

        Ok(Self {
            default_scale,
            scale_table,
        })
    }

    fn resolve_scale(&self, ctx: &EstimateContext<'_>) -> f64 {
        let segment_id = match ctx.segment_id {
            Some(segment_id) => segment_id,
            None => return self.default_scale,
        };
        let core = ctx.core_id.unwrap_or("*");
        let mut candidates: Vec<String> = Vec::with_capacity(4);
        if let (Some(task_id), Some(subtask_id)) = (ctx.task_id, ctx.subtask_id) {
            let prefix = format!("{task_id}/{subtask_id}/{segment_id}");
            candidates.push(format!("{prefix}@{core}"));
            candidates.push(format!("{prefix}@*"));
        }
        candidates.push(format!("{segment_id}@{core}"));
        candidates.push(format!("{segment_id}@*"));

        for key in candidates {
            if let Some(scale) = self.scale_table.get(&key) {
                return *scale;
            }
        }
        self.default_scale
    }
}

impl ExecutionTimeModel for TableBasedEtm {
    fn estimate(
        &self,
        remaining: f64,
        core_speed: f64,
        _now: f64,
        ctx: &EstimateContext<'_>,
    ) -> f64 {
        (remaining / core_speed) * self.resolve_scale(ctx)
    }
}

/// Registry with the built-in execution-time models registered
pub fn etm_registry() -> PluginRegistry<dyn ExecutionTimeModel> {
    let mut registry: PluginRegistry<dyn ExecutionTimeModel> =
        PluginRegistry::new("execution time model");
    for name in ["constant", "default"] {
        registry.register(name, |_params| Ok(Box::new(ConstantEtm)));
    }
    registry.register("table_based", |params| {
        Ok(Box::new(TableBasedEtm::from_params(params)?))
    });
    registry
}
