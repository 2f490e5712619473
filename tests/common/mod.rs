//! Shared test fixtures for integration tests.
#![allow(dead_code)]

use chrono::{DateTime, TimeDelta, Utc};
use ev_dispatch_sim::data::{DataSource, EnergyForecast, MeterValue, Session};
use ev_dispatch_sim::error::Result;
use ev_dispatch_sim::sim::hub::ChargingHub;
use ev_dispatch_sim::sim::smart_meter::SmartMeter;

/// Default tick length (15 minutes).
pub fn step() -> TimeDelta {
    TimeDelta::minutes(15)
}

/// Run origin (2024-06-01T00:00:00Z) plus `minutes`.
pub fn t(minutes: i64) -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH + TimeDelta::days(19_875) + TimeDelta::minutes(minutes)
}

/// Session with nothing charged yet.
pub fn session(car: &str, start: i64, end: i64, speed_kw: f64, target_kwh: f64) -> Session {
    Session {
        car_id: car.to_string(),
        session_id: format!("SESSION-{car}"),
        start_dt_utc: t(start),
        end_dt_utc: t(end),
        charging_speed_kw: speed_kw,
        charged_energy_kwh: 0.0,
        target_energy_kwh: target_kwh,
    }
}

/// One 15-minute record of `kwh_per_step` for every step of `[0, until)`.
pub fn flat_meter_values(until: i64, kwh_per_step: f64) -> Vec<MeterValue> {
    (0..until / 15)
        .map(|k| MeterValue {
            start_dt_utc: t(k * 15),
            end_dt_utc: t(k * 15 + 15),
            meter_energy_kwh: kwh_per_step,
        })
        .collect()
}

/// Hub over a flat meter.
pub fn hub(sessions: Vec<Session>, until: i64, kwh_per_step: f64, grid_kw: f64) -> ChargingHub {
    let meter = SmartMeter::new(flat_meter_values(until, kwh_per_step)).expect("valid meter");
    ChargingHub::new(sessions, meter, grid_kw).expect("valid hub")
}

/// In-memory data source for library-level runs.
pub struct MemorySource {
    pub sessions: Vec<Session>,
    pub meter_values: Vec<MeterValue>,
}

impl DataSource for MemorySource {
    fn read_sessions(&mut self) -> Result<Vec<Session>> {
        Ok(self.sessions.clone())
    }

    fn read_energy_forecast(&mut self) -> Result<Vec<EnergyForecast>> {
        Ok(self.meter_values.iter().map(EnergyForecast::from).collect())
    }

    fn read_meter_values(&mut self, _forecast: &[EnergyForecast]) -> Result<Vec<MeterValue>> {
        Ok(self.meter_values.clone())
    }
}
