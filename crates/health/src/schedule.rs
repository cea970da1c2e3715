use core_types::HealthStatus;

/// What the engine knows when deciding whether to run the health monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleContext {
    /// Zero-based position of the day in the run.
    pub day_index: usize,
    /// True on the last day that will be processed, whether the run completes
    /// or stops early on liquidation.
    pub is_final_day: bool,
    /// Status from the most recent assessment, if any.
    pub prior_status: Option<HealthStatus>,
}

impl ScheduleContext {
    /// Days on which monitoring cannot be skipped: the first, the last, and
    /// the day after a degraded reading.
    pub fn is_mandatory(&self) -> bool {
        self.day_index == 0
            || self.is_final_day
            || self.prior_status.is_some_and(|s| s.is_degraded())
    }
}

/// Cadence rule for the health monitor, injected into the engine.
///
/// The engine always checks on mandatory days; the policy only decides the
/// rest.
pub trait HealthCheckPolicy {
    fn should_check(&self, ctx: &ScheduleContext) -> bool;
}

/// Check every `interval_days`, counting from the first day.
#[derive(Debug, Clone, Copy)]
pub struct PeriodicHealthCheck {
    interval_days: usize,
}

impl PeriodicHealthCheck {
    pub fn new(interval_days: usize) -> Self {
        Self {
            interval_days: interval_days.max(1),
        }
    }
}

impl HealthCheckPolicy for PeriodicHealthCheck {
    fn should_check(&self, ctx: &ScheduleContext) -> bool {
        ctx.day_index % self.interval_days == 0
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EveryDay;

impl HealthCheckPolicy for EveryDay {
    fn should_check(&self, _ctx: &ScheduleContext) -> bool {
        true
    }
}
