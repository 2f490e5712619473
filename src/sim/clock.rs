use chrono::{DateTime, DurationRound, TimeDelta, Utc};

use crate::error::{DispatchError, Result};

/// A simulation clock that walks a closed datetime span in fixed steps.
///
/// The tick at exactly `end` is still produced; the clock is exhausted once
/// the current time passes `end`.
///
/// # Examples
///
/// ```
/// use chrono::{DateTime, TimeDelta, Utc};
/// use ev_dispatch_sim::sim::clock::Clock;
///
/// let start = DateTime::<Utc>::UNIX_EPOCH;
/// let step = TimeDelta::minutes(15);
/// let mut clock = Clock::new(start, start + step * 2, step);
/// let mut ticks = Vec::new();
///
/// clock.run(|t| ticks.push(t));
/// assert_eq!(ticks, vec![start, start + step, start + step * 2]);
/// ```
pub struct Clock {
    /// Next time to hand out
    current: DateTime<Utc>,
    /// Last time that may be handed out (inclusive)
    end: DateTime<Utc>,
    /// Fixed tick length
    step: TimeDelta,
}

impl Clock {
    /// Creates a clock over `[start, end]`.
    ///
    /// # Panics
    ///
    /// Panics if `step` is not strictly positive.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, step: TimeDelta) -> Self {
        assert!(step > TimeDelta::zero(), "clock step must be > 0");
        Self {
            current: start,
            end,
            step,
        }
    }

    /// Advances the clock by one step.
    ///
    /// # Returns
    ///
    /// * `Some(t)` - The time of the tick to process
    /// * `None` - If the clock has moved past `end`
    pub fn tick(&mut self) -> Option<DateTime<Utc>> {
        if self.current <= self.end {
            let t = self.current;
            self.current += self.step;
            Some(t)
        } else {
            None
        }
    }

    /// Runs a function for each remaining tick.
    pub fn run(&mut self, mut f: impl FnMut(DateTime<Utc>)) {
        while let Some(t) = self.tick() {
            f(t);
        }
    }

    /// Returns `true` once every tick has been handed out.
    pub fn is_done(&self) -> bool {
        self.current > self.end
    }
}

/// Length of `step` in hours.
pub fn step_hours(step: TimeDelta) -> f64 {
    step.num_milliseconds() as f64 / 3_600_000.0
}

/// `n` whole steps as a duration.
///
/// # Errors
///
/// Returns [`DispatchError::Configuration`] naming `field` when the product
/// does not fit a [`TimeDelta`].
pub fn steps_to_delta(step: TimeDelta, n: i64, field: &str) -> Result<TimeDelta> {
    i32::try_from(n)
        .ok()
        .and_then(|n| step.checked_mul(n))
        .ok_or_else(|| {
            let message = format!("{n} steps of {step} overflow the time range");
            DispatchError::configuration(field, message)
        })
}

/// Floors `t` onto the grid of whole `step`s since the Unix epoch.
///
/// # Errors
///
/// Returns [`DispatchError::Configuration`] if `step` cannot be used as a
/// rounding grid (zero, negative, or out of range).
pub fn floor_to_step(t: DateTime<Utc>, step: TimeDelta) -> Result<DateTime<Utc>> {
    t.duration_trunc(step)
        .map_err(|e| DispatchError::configuration("simulation.timestep_minutes", e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(minutes: i64) -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + TimeDelta::minutes(minutes)
    }

    #[test]
    fn test_tick_includes_end() {
        let mut clock = Clock::new(t(0), t(30), TimeDelta::minutes(15));
        assert_eq!(clock.tick(), Some(t(0)));
        assert_eq!(clock.tick(), Some(t(15)));
        assert_eq!(clock.tick(), Some(t(30)));
        assert_eq!(clock.tick(), None);
        assert!(clock.is_done());
    }

    #[test]
    fn test_end_off_grid_stops_before_passing_it() {
        let mut clock = Clock::new(t(0), t(20), TimeDelta::minutes(15));
        let mut ticks = Vec::new();
        clock.run(|tick| ticks.push(tick));
        assert_eq!(ticks, vec![t(0), t(15)]);
    }

    #[test]
    fn test_start_after_end_is_empty() {
        let mut clock = Clock::new(t(30), t(0), TimeDelta::minutes(15));
        let mut was_called = false;
        clock.run(|_| was_called = true);
        assert!(!was_called);
    }

    #[test]
    #[should_panic]
    fn test_zero_step_panics() {
        Clock::new(t(0), t(30), TimeDelta::zero());
    }

    #[test]
    fn test_step_hours() {
        assert_eq!(step_hours(TimeDelta::minutes(15)), 0.25);
        assert_eq!(step_hours(TimeDelta::hours(2)), 2.0);
    }

    #[test]
    fn test_floor_to_step() {
        let step = TimeDelta::minutes(15);
        let odd = t(37) + TimeDelta::seconds(12);
        assert_eq!(floor_to_step(odd, step).ok(), Some(t(30)));
        assert_eq!(floor_to_step(t(45), step).ok(), Some(t(45)));
    }

    #[test]
    fn test_steps_to_delta_rejects_overflow() {
        let step = TimeDelta::minutes(15);
        assert_eq!(steps_to_delta(step, 4, "n").ok(), Some(TimeDelta::hours(1)));
        assert!(steps_to_delta(step, 3_000_000_000, "n").is_err());
        assert!(steps_to_delta(TimeDelta::days(365), 1_000_000_000, "n").is_err());
    }
}
