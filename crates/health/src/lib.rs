//! # Zenith Health
//!
//! A read-only supervisor for a running backtest. The `HealthMonitor` turns
//! the snapshot history into four weighted sub-scores and an overall status;
//! the `HealthCheckPolicy` decides on which days the engine bothers to ask.
//!
//! Alerts are informational text. Nothing in this crate changes how a run
//! proceeds.

pub mod monitor;
pub mod schedule;

pub use monitor::{DEFAULT_WINDOW, HealthMetrics, HealthMonitor, status_for_score};
pub use schedule::{EveryDay, HealthCheckPolicy, PeriodicHealthCheck, ScheduleContext};
