//! Deterministic discrete-event simulator for real-time task sets
//!
//! This crate provides the core of an RTOS task-set simulator:
//! - A validated data model (platform, resources, task DAGs, segments)
//! - A discrete-event engine with a totally ordered, seed-stable event stream
//! - Priority schedulers (EDF, RM/fixed-priority) over multi-core snapshots
//! - Resource protocols: plain mutex, priority inheritance, priority ceiling
//! - Pluggable execution-time, overhead and arrival-process models
//! - An event-driven metrics aggregator (response times, utilisation, misses)

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod arrival;
pub mod engine;
pub mod error;
pub mod etm;
pub mod events;
pub mod io;
pub mod metrics;
pub mod model;
pub mod overhead;
pub mod protocols;
pub mod registry;
pub mod scheduler;

pub use engine::SimEngine;
pub use error::{SimError, SimResult};
pub use events::{EventBus, EventIdMode, EventType, SimEvent};
pub use io::ConfigLoader;
pub use metrics::{MetricsAggregator, MetricsReport};
pub use model::{ModelSpec, ResourceAcquirePolicy, TaskType};
pub use protocols::{MutexProtocol, PcpProtocol, PipProtocol, ResourceProtocol};
pub use scheduler::{PriorityDomain, Scheduler};
