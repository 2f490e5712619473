//! Tick loop that sequences trigger check, optimizer, hub, and logger.

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, error, info};

use crate::data::Session;
use crate::error::{DispatchError, Result};

use super::clock::{Clock, floor_to_step};
use super::hub::ChargingHub;
use super::logger::{ChargingLogger, LogEntry};
use super::optimizer::Optimizer;
use super::trigger::{TriggerChecker, TriggerReason};
use super::types::{AllocationResult, Signal};

/// Lifecycle of a dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    /// Constructed, no tick processed yet.
    Idle,
    /// Inside the run span.
    Ticking,
    /// Past the end of the span, or aborted.
    Done,
}

/// Owns the simulation clock and drives one strictly sequential run.
///
/// Generic over `O: Optimizer` for static dispatch, like the other
/// components it is handed fully built.
pub struct Dispatcher<O: Optimizer> {
    trigger_checker: TriggerChecker,
    charging_hub: ChargingHub,
    optimizer: O,
    logger: ChargingLogger,
    state: DispatchState,
    signals: Option<Vec<Signal>>,
    previous: Option<AllocationResult>,
    trigger_count: usize,
}

impl<O: Optimizer> Dispatcher<O> {
    pub fn new(
        trigger_checker: TriggerChecker,
        charging_hub: ChargingHub,
        optimizer: O,
        logger: ChargingLogger,
    ) -> Self {
        Self {
            trigger_checker,
            charging_hub,
            optimizer,
            logger,
            state: DispatchState::Idle,
            signals: None,
            previous: None,
            trigger_count: 0,
        }
    }

    /// Runs every tick of `[start, end]` in order.
    ///
    /// The tick at exactly `end` is processed. The first error aborts the
    /// run; ticks already processed stay logged and booked.
    ///
    /// # Errors
    ///
    /// * [`DispatchError::Configuration`] if `step` is not positive
    /// * Any error from [`Dispatcher::tick`]
    pub fn run(
        &mut self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: TimeDelta,
    ) -> Result<()> {
        if step <= TimeDelta::zero() {
            return Err(DispatchError::configuration(
                "simulation.timestep_minutes",
                "timestep must be > 0",
            ));
        }
        info!(
            %start,
            %end,
            step_minutes = step.num_minutes(),
            sessions = self.charging_hub.sessions().len(),
            max_grid_power_kw = self.charging_hub.max_grid_power_kw(),
            "dispatch run starting"
        );

        let mut clock = Clock::new(start, end, step);
        while let Some(current_time) = clock.tick() {
            if let Err(e) = self.tick(current_time, step) {
                error!(time = %current_time, error = %e, "dispatch run aborted");
                self.state = DispatchState::Done;
                return Err(e);
            }
        }
        self.state = DispatchState::Done;

        info!(
            ticks = self.logger.stored() + self.logger.buffered(),
            triggers = self.trigger_count,
            "dispatch run finished"
        );
        Ok(())
    }

    /// Processes a single tick starting at `current_time`.
    ///
    /// # Returns
    ///
    /// The trigger reason if signals were recomputed, `None` if the previous
    /// signals were reused.
    ///
    /// # Errors
    ///
    /// Propagates optimizer errors and the hub's coverage and configuration
    /// errors.
    pub fn tick(
        &mut self,
        current_time: DateTime<Utc>,
        timestep: TimeDelta,
    ) -> Result<Option<TriggerReason>> {
        self.state = DispatchState::Ticking;

        let reason = self.trigger_checker.check(
            current_time,
            self.previous.as_ref(),
            self.signals.as_deref(),
        );
        if let Some(reason) = reason {
            let charging_cars = self.charging_hub.get_charging_cars(current_time);
            let signals = self
                .optimizer
                .signals(current_time, &charging_cars, timestep)?;
            debug!(
                time = %current_time,
                %reason,
                cars = charging_cars.len(),
                signals = signals.len(),
                "signals recomputed"
            );
            self.signals = Some(signals);
            self.trigger_count += 1;
        }

        let signals = self.signals.as_deref().unwrap_or_default();
        let result = self.charging_hub.charge(signals, current_time, timestep)?;
        debug!(
            time = %current_time,
            available_kwh = result.available_energy_kwh,
            granted_kwh = result.total_granted_kwh(),
            cars = result.allocations.len(),
            "tick allocated"
        );

        self.logger.log(current_time, result.clone());
        self.previous = Some(result);
        Ok(reason)
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    /// Signals used by the most recent tick.
    pub fn signals(&self) -> Option<&[Signal]> {
        self.signals.as_deref()
    }

    pub fn previous_result(&self) -> Option<&AllocationResult> {
        self.previous.as_ref()
    }

    /// Number of ticks that recomputed signals.
    pub fn trigger_count(&self) -> usize {
        self.trigger_count
    }

    pub fn hub(&self) -> &ChargingHub {
        &self.charging_hub
    }

    /// Flushes the logger and returns every logged tick.
    pub fn logs(&mut self) -> &[LogEntry] {
        self.logger.get_logs()
    }

    /// Consumes the dispatcher, returning the hub and the flushed log.
    pub fn into_parts(self) -> (ChargingHub, Vec<LogEntry>) {
        (self.charging_hub, self.logger.into_logs())
    }
}

/// Derives the run span from the session table.
///
/// Start is the earliest session start and end the latest session end, both
/// floored onto the `step` grid.
///
/// # Errors
///
/// Returns [`DispatchError::Configuration`] if `sessions` is empty or `step`
/// cannot be used as a grid.
pub fn span_from_sessions(
    sessions: &[Session],
    step: TimeDelta,
) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let start = sessions.iter().map(|s| s.start_dt_utc).min();
    let end = sessions.iter().map(|s| s.end_dt_utc).max();
    let (Some(start), Some(end)) = (start, end) else {
        return Err(DispatchError::configuration(
            "sessions",
            "no sessions loaded, cannot derive the run span",
        ));
    };
    Ok((floor_to_step(start, step)?, floor_to_step(end, step)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MeterValue;
    use crate::sim::optimizer::NaiveOptimizer;
    use crate::sim::smart_meter::SmartMeter;

    fn t(minutes: i64) -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + TimeDelta::minutes(minutes)
    }

    fn step() -> TimeDelta {
        TimeDelta::minutes(15)
    }

    fn session(car: &str, start: i64, end: i64) -> Session {
        Session {
            car_id: car.into(),
            session_id: format!("S-{car}"),
            start_dt_utc: t(start),
            end_dt_utc: t(end),
            charging_speed_kw: 8.0,
            charged_energy_kwh: 0.0,
            target_energy_kwh: 100.0,
        }
    }

    fn meter_until(end: i64) -> SmartMeter {
        let values = (0..end / 15)
            .map(|k| MeterValue {
                start_dt_utc: t(k * 15),
                end_dt_utc: t(k * 15 + 15),
                meter_energy_kwh: 1.0,
            })
            .collect();
        SmartMeter::new(values).expect("valid meter")
    }

    fn dispatcher(sessions: Vec<Session>, meter_end: i64) -> Dispatcher<NaiveOptimizer> {
        let checker = TriggerChecker::new(&sessions);
        let hub = ChargingHub::new(sessions, meter_until(meter_end), 20.0).expect("valid hub");
        Dispatcher::new(checker, hub, NaiveOptimizer::new(2), ChargingLogger::new(4))
    }

    #[test]
    fn processes_end_tick_inclusively() {
        let mut d = dispatcher(vec![session("A", 0, 60)], 120);
        assert_eq!(d.state(), DispatchState::Idle);
        d.run(t(0), t(60), step()).expect("run");
        assert_eq!(d.state(), DispatchState::Done);

        let times: Vec<_> = d.logs().iter().map(|e| e.timestamp).collect();
        assert_eq!(times, vec![t(0), t(15), t(30), t(45), t(60)]);
    }

    #[test]
    fn reuses_signals_between_triggers() {
        let mut d = dispatcher(vec![session("A", 0, 120)], 180);

        assert_eq!(d.tick(t(0), step()).ok(), Some(Some(TriggerReason::FirstTick)));
        let first = d.signals().map(<[Signal]>::to_vec);

        assert_eq!(d.tick(t(15), step()).ok(), Some(None));
        assert_eq!(d.signals().map(<[Signal]>::to_vec), first);

        // Horizon of two ticks: the signals expire at t=30.
        assert_eq!(
            d.tick(t(30), step()).ok(),
            Some(Some(TriggerReason::SignalExpired))
        );
        assert_eq!(d.trigger_count(), 2);
    }

    #[test]
    fn coverage_failure_aborts_run() {
        let mut d = dispatcher(vec![session("A", 0, 120)], 30);
        let err = d.run(t(0), t(120), step()).unwrap_err();
        assert!(matches!(err, DispatchError::DataCoverage { .. }));
        assert_eq!(d.state(), DispatchState::Done);
        // [0,15), [15,30) and the edge tick [30,45) were processed.
        assert_eq!(d.logs().len(), 3);
    }

    #[test]
    fn non_positive_step_is_rejected() {
        let mut d = dispatcher(vec![session("A", 0, 60)], 60);
        assert!(d.run(t(0), t(60), TimeDelta::zero()).is_err());
        assert_eq!(d.state(), DispatchState::Idle);
    }

    #[test]
    fn span_is_floored_to_step() {
        let mut a = session("A", 0, 60);
        a.start_dt_utc += TimeDelta::minutes(7);
        let mut b = session("B", 30, 100);
        b.end_dt_utc += TimeDelta::seconds(30);
        let span = span_from_sessions(&[a, b], step()).expect("span");
        assert_eq!(span, (t(0), t(90)));
    }

    #[test]
    fn span_needs_sessions() {
        assert!(span_from_sessions(&[], step()).is_err());
    }
}
