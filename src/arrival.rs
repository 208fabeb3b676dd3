//! Arrival-process generators for aperiodic task releases
//!
//! Generators produce inter-arrival intervals; all randomness comes from the
//! engine's seeded RNG so release times replay exactly for a fixed seed.

use crate::error::{SimError, SimResult};
use crate::model::{Params, TaskGraphSpec};
use crate::registry::PluginRegistry;

/// Inputs for one interval draw
#[derive(Debug, Clone, Copy)]
pub struct ArrivalContext<'a> {
    pub task: &'a TaskGraphSpec,
    pub now: f64,
    pub current_release: f64,
    /// Target release index; the first generated interval uses index 1
    pub release_index: u64,
    pub params: &'a Params,
}

/// Plugin contract for custom arrival-process intervals
pub trait ArrivalGenerator: Send + Sync {
    /// Return the next release interval (> 0)
    fn next_interval(&self, ctx: &ArrivalContext<'_>, rng: &mut fastrand::Rng) -> SimResult<f64>;
}

fn param_number(params: &Params, generator: &str, key: &str) -> SimResult<f64> {
    params
        .get(key)
        .and_then(|value| value.as_f64())
        .ok_or_else(|| {
            SimError::plugin(
                format!("arrival:{generator}"),
                format!("requires numeric params.{key}"),
            )
        })
}

/// Always return the fixed `params.interval`
pub struct ConstantIntervalGenerator;

impl ArrivalGenerator for ConstantIntervalGenerator {
    fn next_interval(&self, ctx: &ArrivalContext<'_>, _rng: &mut fastrand::Rng) -> SimResult<f64> {
        let interval = param_number(ctx.params, "constant_interval", "interval")?;
        if interval <= 0.0 {
            return Err(SimError::plugin(
                "arrival:constant_interval",
                "requires params.interval > 0",
            ));
        }
        Ok(interval)
    }
}

/// Uniform draw from `[min_interval, max_interval]`
pub struct UniformIntervalGenerator;

impl ArrivalGenerator for UniformIntervalGenerator {
    fn next_interval(&self, ctx: &ArrivalContext<'_>, rng: &mut fastrand::Rng) -> SimResult<f64> {
        let lower = param_number(ctx.params, "uniform_interval", "min_interval")?;
        let upper = param_number(ctx.params, "uniform_interval", "max_interval")?;
        if lower <= 0.0 || upper <= 0.0 {
            return Err(SimError::plugin(
                "arrival:uniform_interval",
                "requires intervals > 0",
            ));
        }
        if upper < lower - 1e-12 {
            return Err(SimError::plugin(
                "arrival:uniform_interval",
                "requires max_interval >= min_interval",
            ));
        }
        Ok(lower + (upper - lower) * rng.f64())
    }
}

/// Exponential inter-arrival times at `params.rate`
pub struct PoissonRateGenerator;

impl ArrivalGenerator for PoissonRateGenerator {
    fn next_interval(&self, ctx: &ArrivalContext<'_>, rng: &mut fastrand::Rng) -> SimResult<f64> {
        let rate = param_number(ctx.params, "poisson_rate", "rate")?;
        if rate <= 0.0 {
            return Err(SimError::plugin(
                "arrival:poisson_rate",
                "requires params.rate > 0",
            ));
        }
        let interval = -(1.0 - rng.f64()).ln() / rate;
        if interval <= 0.0 {
            return Err(SimError::plugin(
                "arrival:poisson_rate",
                "produced non-positive interval",
            ));
        }
        Ok(interval)
    }
}

/// Intervals from a numeric sequence (comma-separated string or single number)
pub struct SequenceGenerator;

impl SequenceGenerator {
    fn parse_sequence(raw: Option<&serde_json::Value>) -> SimResult<Vec<f64>> {
        let values: Vec<f64> = match raw {
            Some(value) if value.is_number() => vec![value.as_f64().unwrap_or(0.0)],
            Some(serde_json::Value::String(text)) => {
                let tokens: Vec<&str> = text.split(',').map(str::trim).collect();
                if tokens.is_empty() || tokens.iter().any(|token| token.is_empty()) {
                    return Err(SimError::plugin(
                        "arrival:sequence",
                        "requires non-empty params.sequence",
                    ));
                }
                let mut parsed = Vec::with_capacity(tokens.len());
                for token in tokens {
                    let value: f64 = token.parse().map_err(|_| {
                        SimError::plugin(
                            "arrival:sequence",
                            format!("invalid interval '{token}' in params.sequence"),
                        )
                    })?;
                    parsed.push(value);
                }
                parsed
            }
            _ => {
                return Err(SimError::plugin(
                    "arrival:sequence",
                    "requires params.sequence as string/number",
                ))
            }
        };

        if values.iter().any(|value| !value.is_finite() || *value <= 0.0) {
            return Err(SimError::plugin(
                "arrival:sequence",
                "requires all intervals > 0",
            ));
        }
        Ok(values)
    }
}

impl ArrivalGenerator for SequenceGenerator {
    fn next_interval(&self, ctx: &ArrivalContext<'_>, _rng: &mut fastrand::Rng) -> SimResult<f64> {
        let values = Self::parse_sequence(ctx.params.get("sequence"))?;
        let interval_index = ctx.release_index.saturating_sub(1) as usize;
        let repeat = ctx
            .params
            .get("repeat")
            .and_then(|value| value.as_bool())
            .unwrap_or(true);
        let idx = if repeat {
            interval_index % values.len()
        } else {
            interval_index.min(values.len() - 1)
        };
        Ok(values[idx])
    }
}

/// Registry with the built-in arrival generators registered
pub fn arrival_registry() -> PluginRegistry<dyn ArrivalGenerator> {
    let mut registry: PluginRegistry<dyn ArrivalGenerator> =
        PluginRegistry::new("arrival generator");
    registry.register("constant_interval", |_params| {
        Ok(Box::new(ConstantIntervalGenerator))
    });
    registry.register("uniform_interval", |_params| {
        Ok(Box::new(UniformIntervalGenerator))
    });
    registry.register("poisson_rate", |_params| Ok(Box::new(PoissonRateGenerator)));
    registry.register("sequence", |_params| Ok(Box::new(SequenceGenerator)));
    registry
}
