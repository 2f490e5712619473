//! Session ledger and per-tick energy allocation.

use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{trace, warn};

use crate::data::Session;
use crate::error::{DispatchError, Result};

use super::clock::step_hours;
use super::smart_meter::SmartMeter;
use super::types::{Allocation, AllocationResult, Signal};

/// Owns the session ledger and hands out each tick's energy.
///
/// The hub is the only writer of `charged_energy_kwh`. Everything else sees
/// sessions through [`ChargingHub::sessions`] or
/// [`ChargingHub::get_charging_cars`].
#[derive(Debug, Clone)]
pub struct ChargingHub {
    sessions: Vec<Session>,
    smart_meter: SmartMeter,
    max_grid_power_kw: f64,
}

impl ChargingHub {
    /// Creates a hub over a validated session ledger.
    ///
    /// # Arguments
    ///
    /// * `sessions` - All sessions of the run, in any order
    /// * `smart_meter` - Local surplus source
    /// * `max_grid_power_kw` - Constant grid allowance (kW, >= 0)
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Configuration`] if a session is malformed, a
    /// car has overlapping sessions, or the grid limit is not a finite
    /// non-negative number.
    pub fn new(
        mut sessions: Vec<Session>,
        smart_meter: SmartMeter,
        max_grid_power_kw: f64,
    ) -> Result<Self> {
        if !max_grid_power_kw.is_finite() || max_grid_power_kw < 0.0 {
            return Err(DispatchError::configuration(
                "hub.max_grid_power_kw",
                format!("{max_grid_power_kw} is not a finite value >= 0"),
            ));
        }
        for s in &sessions {
            s.validate()?;
        }
        sessions.sort_by(|a, b| {
            a.start_dt_utc
                .cmp(&b.start_dt_utc)
                .then_with(|| a.car_id.cmp(&b.car_id))
        });
        check_no_overlap(&sessions)?;

        Ok(Self {
            sessions,
            smart_meter,
            max_grid_power_kw,
        })
    }

    /// Read-only view of the ledger, sorted by start time.
    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    /// Grid import limit (kW).
    pub fn max_grid_power_kw(&self) -> f64 {
        self.max_grid_power_kw
    }

    /// Sessions present at `current_time` that still need energy.
    pub fn get_charging_cars(&self, current_time: DateTime<Utc>) -> Vec<&Session> {
        self.sessions
            .iter()
            .filter(|s| s.is_charging(current_time))
            .collect()
    }

    /// Local surplus plus grid allowance for the tick starting at `current_time`.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::DataCoverage`] if the meter data does not
    /// reach the tick.
    pub fn available_energy_kwh(
        &self,
        current_time: DateTime<Utc>,
        timestep: TimeDelta,
    ) -> Result<f64> {
        let local_surplus_kwh = self
            .smart_meter
            .energy_kwh(current_time, current_time + timestep)?;
        Ok(local_surplus_kwh + self.max_grid_power_kw * step_hours(timestep))
    }

    /// Allocates the tick's energy to the signalled cars and books it.
    ///
    /// Each car's request is capped by its remaining energy and by what its
    /// charger can deliver in one tick. When the capped requests exceed the
    /// available energy, every request is scaled by the same factor.
    /// Signals for cars that are not charging are ignored.
    ///
    /// # Errors
    ///
    /// * [`DispatchError::DataCoverage`] if meter data does not reach the tick
    /// * [`DispatchError::Configuration`] for a malformed signal or two
    ///   signals for the same car
    pub fn charge(
        &mut self,
        signals: &[Signal],
        current_time: DateTime<Utc>,
        timestep: TimeDelta,
    ) -> Result<AllocationResult> {
        let available_energy_kwh = self.available_energy_kwh(current_time, timestep)?;
        let by_car = index_signals(signals)?;
        if by_car.is_empty() {
            return Ok(AllocationResult::empty(current_time, available_energy_kwh));
        }

        let dt_hours = step_hours(timestep);
        let mut requests: Vec<(usize, f64)> = Vec::new();
        for (idx, session) in self.sessions.iter().enumerate() {
            if !session.is_charging(current_time) {
                continue;
            }
            let Some(signal) = by_car.get(session.car_id.as_str()) else {
                continue;
            };
            let speed_cap_kwh = session.charging_speed_kw * dt_hours;
            let requested_kwh = signal
                .signal_energy_kwh
                .min(session.remaining_energy_kwh())
                .min(speed_cap_kwh)
                .max(0.0);
            requests.push((idx, requested_kwh));
        }

        let total_requested_kwh: f64 = requests.iter().map(|(_, r)| r).sum();
        let scale = if available_energy_kwh <= 0.0 {
            0.0
        } else if total_requested_kwh > available_energy_kwh {
            available_energy_kwh / total_requested_kwh
        } else {
            1.0
        };
        if scale < 1.0 && total_requested_kwh > 0.0 {
            warn!(
                time = %current_time,
                available_kwh = available_energy_kwh,
                requested_kwh = total_requested_kwh,
                scale,
                "demand exceeds available energy, rationing"
            );
        }

        let mut allocations = Vec::with_capacity(requests.len());
        for (idx, requested_kwh) in requests {
            let granted_kwh = if scale == 1.0 {
                requested_kwh
            } else {
                requested_kwh * scale
            };
            let session = &mut self.sessions[idx];
            session.charged_energy_kwh =
                (session.charged_energy_kwh + granted_kwh).min(session.target_energy_kwh);
            trace!(
                car_id = %session.car_id,
                requested_kwh,
                granted_kwh,
                charged_kwh = session.charged_energy_kwh,
                "granted"
            );
            allocations.push(Allocation {
                car_id: session.car_id.clone(),
                session_id: session.session_id.clone(),
                requested_kwh,
                charged_energy_kwh: granted_kwh,
            });
        }

        Ok(AllocationResult {
            timestamp: current_time,
            available_energy_kwh,
            total_requested_kwh,
            scale,
            allocations,
        })
    }
}

/// Validates signals and indexes them by car id.
fn index_signals(signals: &[Signal]) -> Result<HashMap<&str, &Signal>> {
    let mut by_car = HashMap::with_capacity(signals.len());
    for signal in signals {
        signal.validate()?;
        if by_car.insert(signal.car_id.as_str(), signal).is_some() {
            return Err(DispatchError::configuration(
                "signal.car_id",
                format!("more than one signal for car \"{}\"", signal.car_id),
            ));
        }
    }
    Ok(by_car)
}

/// Rejects ledgers where one car is present in two sessions at once.
///
/// Expects `sessions` sorted by start time.
fn check_no_overlap(sessions: &[Session]) -> Result<()> {
    let mut last_by_car: HashMap<&str, &Session> = HashMap::new();
    for s in sessions {
        if let Some(prev) = last_by_car.get(s.car_id.as_str()) {
            if s.start_dt_utc < prev.end_dt_utc {
                return Err(DispatchError::configuration(
                    "session.car_id",
                    format!(
                        "car \"{}\" has overlapping sessions \"{}\" and \"{}\"",
                        s.car_id, prev.session_id, s.session_id
                    ),
                ));
            }
        }
        last_by_car.insert(s.car_id.as_str(), s);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MeterValue;

    const TOL: f64 = 1e-9;

    fn t(minutes: i64) -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + TimeDelta::minutes(minutes)
    }

    fn step() -> TimeDelta {
        TimeDelta::minutes(15)
    }

    fn session(car: &str, start: i64, end: i64, speed_kw: f64, target_kwh: f64) -> Session {
        Session {
            car_id: car.into(),
            session_id: format!("S-{car}"),
            start_dt_utc: t(start),
            end_dt_utc: t(end),
            charging_speed_kw: speed_kw,
            charged_energy_kwh: 0.0,
            target_energy_kwh: target_kwh,
        }
    }

    /// A meter with constant per-tick surplus over the first four hours.
    fn meter(surplus_per_tick_kwh: f64) -> SmartMeter {
        let values = (0..16)
            .map(|k| MeterValue {
                start_dt_utc: t(k * 15),
                end_dt_utc: t(k * 15 + 15),
                meter_energy_kwh: surplus_per_tick_kwh,
            })
            .collect();
        SmartMeter::new(values).expect("valid meter")
    }

    fn signal(car: &str, kwh: f64) -> Signal {
        Signal::new(car, t(0), t(60), kwh)
    }

    #[test]
    fn charging_cars_use_half_open_presence() {
        let hub = ChargingHub::new(
            vec![session("A", 15, 60, 11.0, 20.0), session("B", 0, 15, 11.0, 20.0)],
            meter(0.0),
            10.0,
        )
        .expect("valid hub");

        let at_15: Vec<&str> = hub
            .get_charging_cars(t(15))
            .iter()
            .map(|s| s.car_id.as_str())
            .collect();
        assert_eq!(at_15, vec!["A"]);
    }

    #[test]
    fn single_car_is_capped_by_charger_speed() {
        // 20 kW for 0.25 h caps the tick at 5 kWh.
        let mut hub = ChargingHub::new(
            vec![session("A", 0, 240, 20.0, 50.0)],
            meter(100.0),
            0.0,
        )
        .expect("valid hub");

        let result = hub.charge(&[signal("A", 10.0)], t(0), step()).expect("charge");
        assert_eq!(result.available_energy_kwh, 100.0);
        assert_eq!(result.get("A").map(|a| a.charged_energy_kwh), Some(5.0));
        assert_eq!(hub.sessions()[0].charged_energy_kwh, 5.0);
    }

    #[test]
    fn oversubscribed_tick_splits_evenly() {
        let mut hub = ChargingHub::new(
            vec![
                session("A", 0, 240, 100.0, 50.0),
                session("B", 0, 240, 100.0, 50.0),
            ],
            meter(10.0),
            0.0,
        )
        .expect("valid hub");

        let result = hub
            .charge(&[signal("A", 10.0), signal("B", 10.0)], t(0), step())
            .expect("charge");
        assert!(result.is_rationed());
        assert_eq!(result.get("A").map(|a| a.charged_energy_kwh), Some(5.0));
        assert_eq!(result.get("B").map(|a| a.charged_energy_kwh), Some(5.0));
    }

    #[test]
    fn rationing_uses_one_ratio_for_every_car() {
        let mut hub = ChargingHub::new(
            vec![
                session("A", 0, 240, 100.0, 50.0),
                session("B", 0, 240, 100.0, 50.0),
                session("C", 0, 240, 8.0, 50.0),
            ],
            meter(3.0),
            4.0,
        )
        .expect("valid hub");

        let result = hub
            .charge(
                &[signal("A", 6.0), signal("B", 1.5), signal("C", 9.0)],
                t(0),
                step(),
            )
            .expect("charge");

        // C is capped at 8 kW * 0.25 h = 2 kWh before rationing.
        let available = 3.0 + 4.0 * 0.25;
        let total = 6.0 + 1.5 + 2.0;
        let ratio = available / total;
        assert_eq!(result.available_energy_kwh, available);
        assert_eq!(result.total_requested_kwh, total);
        for a in &result.allocations {
            assert_eq!(a.charged_energy_kwh, a.requested_kwh * ratio);
        }
        assert!((result.total_granted_kwh() - available).abs() < TOL);
    }

    #[test]
    fn grant_never_exceeds_remaining_energy() {
        let mut s = session("A", 0, 240, 50.0, 10.0);
        s.charged_energy_kwh = 9.0;
        let mut hub = ChargingHub::new(vec![s], meter(100.0), 0.0).expect("valid hub");

        let result = hub.charge(&[signal("A", 20.0)], t(0), step()).expect("charge");
        assert_eq!(result.get("A").map(|a| a.charged_energy_kwh), Some(1.0));
        assert_eq!(hub.sessions()[0].charged_energy_kwh, 10.0);
        assert!(hub.get_charging_cars(t(15)).is_empty());
    }

    #[test]
    fn empty_signals_leave_ledger_untouched() {
        let mut hub = ChargingHub::new(
            vec![session("A", 0, 240, 11.0, 20.0)],
            meter(5.0),
            0.0,
        )
        .expect("valid hub");
        let before = hub.sessions().to_vec();

        let result = hub.charge(&[], t(0), step()).expect("charge");
        assert!(result.is_empty());
        assert_eq!(hub.sessions(), before.as_slice());
    }

    #[test]
    fn signals_for_absent_cars_are_discarded() {
        let mut hub = ChargingHub::new(
            vec![session("A", 60, 240, 11.0, 20.0)],
            meter(5.0),
            0.0,
        )
        .expect("valid hub");

        let result = hub
            .charge(&[signal("A", 2.0), signal("GHOST", 2.0)], t(0), step())
            .expect("charge");
        assert!(result.is_empty());
        assert_eq!(hub.sessions()[0].charged_energy_kwh, 0.0);
    }

    #[test]
    fn negative_available_energy_grants_zero() {
        let mut hub = ChargingHub::new(
            vec![session("A", 0, 240, 11.0, 20.0)],
            meter(-4.0),
            4.0,
        )
        .expect("valid hub");

        let result = hub.charge(&[signal("A", 2.0)], t(0), step()).expect("charge");
        assert_eq!(result.available_energy_kwh, -3.0);
        assert_eq!(result.get("A").map(|a| a.charged_energy_kwh), Some(0.0));
        assert!(result.has_unmet_demand());
        assert_eq!(hub.sessions()[0].charged_energy_kwh, 0.0);
    }

    #[test]
    fn zero_requests_skip_scaling() {
        let mut hub = ChargingHub::new(
            vec![session("A", 0, 240, 11.0, 20.0)],
            meter(1.0),
            0.0,
        )
        .expect("valid hub");

        let result = hub.charge(&[signal("A", 0.0)], t(0), step()).expect("charge");
        assert_eq!(result.scale, 1.0);
        assert_eq!(result.total_granted_kwh(), 0.0);
    }

    #[test]
    fn duplicate_signal_is_rejected() {
        let mut hub = ChargingHub::new(
            vec![session("A", 0, 240, 11.0, 20.0)],
            meter(1.0),
            0.0,
        )
        .expect("valid hub");

        let err = hub
            .charge(&[signal("A", 1.0), signal("A", 2.0)], t(0), step())
            .unwrap_err();
        assert!(matches!(err, DispatchError::Configuration { .. }));
        assert_eq!(hub.sessions()[0].charged_energy_kwh, 0.0);
    }

    #[test]
    fn malformed_signal_is_rejected() {
        let mut hub = ChargingHub::new(
            vec![session("A", 0, 240, 11.0, 20.0)],
            meter(1.0),
            0.0,
        )
        .expect("valid hub");

        let err = hub.charge(&[signal("A", f64::NAN)], t(0), step()).unwrap_err();
        assert!(matches!(err, DispatchError::Configuration { .. }));
    }

    #[test]
    fn tick_past_meter_data_is_coverage_error() {
        let mut hub = ChargingHub::new(
            vec![session("A", 0, 600, 11.0, 20.0)],
            meter(1.0),
            0.0,
        )
        .expect("valid hub");

        let err = hub.charge(&[signal("A", 1.0)], t(300), step()).unwrap_err();
        assert!(matches!(err, DispatchError::DataCoverage { .. }));
    }

    #[test]
    fn overlapping_sessions_for_one_car_are_rejected() {
        let err = ChargingHub::new(
            vec![session("A", 0, 60, 11.0, 20.0), session("A", 30, 90, 11.0, 20.0)],
            meter(1.0),
            0.0,
        )
        .unwrap_err();
        assert!(matches!(err, DispatchError::Configuration { .. }));
    }

    #[test]
    fn back_to_back_sessions_for_one_car_are_allowed() {
        let hub = ChargingHub::new(
            vec![session("A", 0, 60, 11.0, 20.0), session("A", 60, 90, 11.0, 20.0)],
            meter(1.0),
            0.0,
        );
        assert!(hub.is_ok());
    }

    #[test]
    fn invalid_grid_limit_is_rejected() {
        assert!(ChargingHub::new(Vec::new(), meter(0.0), -1.0).is_err());
        assert!(ChargingHub::new(Vec::new(), meter(0.0), f64::INFINITY).is_err());
    }
}
