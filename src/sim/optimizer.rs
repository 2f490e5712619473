use chrono::{DateTime, TimeDelta, Utc};

use crate::data::Session;
use crate::error::{DispatchError, Result};

use super::clock::{step_hours, steps_to_delta};
use super::types::Signal;

/// Source of per-tick charging signals.
///
/// The dispatcher calls this only on triggered ticks and reuses the returned
/// signals until the next trigger. Implementations may hold any internal
/// state; nothing about how signals are chosen is assumed by the hub.
pub trait Optimizer {
    /// Produces signals for the cars that are charging at `current_time`.
    ///
    /// # Errors
    ///
    /// Implementations return an error to abort the run.
    fn signals(
        &mut self,
        current_time: DateTime<Utc>,
        charging_cars: &[&Session],
        timestep: TimeDelta,
    ) -> Result<Vec<Signal>>;
}

/// Naive optimizer.
///
/// Asks every charging car for as much as its charger can take in one tick,
/// holding the signal for a fixed number of ticks.
#[derive(Debug, Clone, Copy)]
pub struct NaiveOptimizer {
    /// Number of ticks each signal stays valid.
    pub signal_horizon_steps: u32,
}

impl NaiveOptimizer {
    /// # Panics
    ///
    /// Panics if `signal_horizon_steps` is zero.
    pub fn new(signal_horizon_steps: u32) -> Self {
        assert!(signal_horizon_steps > 0, "signal_horizon_steps must be > 0");
        Self {
            signal_horizon_steps,
        }
    }
}

impl Default for NaiveOptimizer {
    fn default() -> Self {
        Self::new(4)
    }
}

impl Optimizer for NaiveOptimizer {
    fn signals(
        &mut self,
        current_time: DateTime<Utc>,
        charging_cars: &[&Session],
        timestep: TimeDelta,
    ) -> Result<Vec<Signal>> {
        let dt_hours = step_hours(timestep);
        let field = "optimizer.signal_horizon_steps";
        let horizon = steps_to_delta(timestep, i64::from(self.signal_horizon_steps), field)?;
        let valid_until = current_time.checked_add_signed(horizon).ok_or_else(|| {
            DispatchError::configuration(field, "signal validity ends out of range")
        })?;
        Ok(charging_cars
            .iter()
            .map(|s| {
                let per_tick_kwh = (s.charging_speed_kw * dt_hours).min(s.remaining_energy_kwh());
                Signal::new(s.car_id.clone(), current_time, valid_until, per_tick_kwh)
            })
            .collect())
    }
}
