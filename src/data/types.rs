//! Session and energy record types supplied by the data sources.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DispatchError, Result};

/// One charging session of one car.
///
/// The car is present on `[start_dt_utc, end_dt_utc)`. `charged_energy_kwh`
/// only ever grows and never passes `target_energy_kwh`; the charging hub is
/// the only writer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub car_id: String,
    pub session_id: String,
    /// Arrival time (inclusive).
    pub start_dt_utc: DateTime<Utc>,
    /// Departure time (exclusive).
    pub end_dt_utc: DateTime<Utc>,
    /// Maximum deliverable power (kW).
    pub charging_speed_kw: f64,
    /// Energy delivered so far (kWh).
    pub charged_energy_kwh: f64,
    /// Energy the car wants by departure (kWh).
    pub target_energy_kwh: f64,
}

impl Session {
    /// Returns `true` when `t` lies in the half-open presence interval.
    pub fn is_present(&self, t: DateTime<Utc>) -> bool {
        self.start_dt_utc <= t && t < self.end_dt_utc
    }

    /// Returns `true` once the target energy has been delivered.
    pub fn is_complete(&self) -> bool {
        self.charged_energy_kwh >= self.target_energy_kwh
    }

    /// Present at `t` and still short of its target.
    pub fn is_charging(&self, t: DateTime<Utc>) -> bool {
        self.is_present(t) && !self.is_complete()
    }

    /// Energy still missing to reach the target (kWh, >= 0).
    pub fn remaining_energy_kwh(&self) -> f64 {
        (self.target_energy_kwh - self.charged_energy_kwh).max(0.0)
    }

    /// Checks the record for missing or inconsistent values.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Configuration`] naming the first bad field.
    pub fn validate(&self) -> Result<()> {
        if self.car_id.trim().is_empty() {
            return Err(DispatchError::configuration(
                "session.car_id",
                format!("empty car id in session \"{}\"", self.session_id),
            ));
        }
        if self.session_id.trim().is_empty() {
            return Err(DispatchError::configuration(
                "session.session_id",
                format!("empty session id for car \"{}\"", self.car_id),
            ));
        }
        if self.end_dt_utc <= self.start_dt_utc {
            return Err(DispatchError::configuration(
                "session.end_dt_utc",
                format!("session \"{}\" must end after it starts", self.session_id),
            ));
        }
        check_non_negative(
            "session.charging_speed_kw",
            &self.session_id,
            self.charging_speed_kw,
        )?;
        check_non_negative(
            "session.charged_energy_kwh",
            &self.session_id,
            self.charged_energy_kwh,
        )?;
        check_non_negative(
            "session.target_energy_kwh",
            &self.session_id,
            self.target_energy_kwh,
        )?;
        if self.charged_energy_kwh > self.target_energy_kwh {
            return Err(DispatchError::configuration(
                "session.charged_energy_kwh",
                format!(
                    "session \"{}\" already exceeds its target ({} > {})",
                    self.session_id, self.charged_energy_kwh, self.target_energy_kwh
                ),
            ));
        }
        Ok(())
    }
}

fn check_non_negative(field: &str, id: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(DispatchError::configuration(
            field,
            format!("\"{id}\" has {value}, expected a finite value >= 0"),
        ));
    }
    Ok(())
}

/// Metered local energy over `[start_dt_utc, end_dt_utc)`.
///
/// Positive values are surplus available to the hub, negative values are
/// net consumption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterValue {
    pub start_dt_utc: DateTime<Utc>,
    pub end_dt_utc: DateTime<Utc>,
    pub meter_energy_kwh: f64,
}

impl MeterValue {
    /// Returns `true` if the record shares any instant with `[start, end)`.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start_dt_utc < end && start < self.end_dt_utc
    }

    /// Energy of this record falling inside `[start, end)`, pro-rated by time.
    pub fn energy_within_kwh(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
        if !self.overlaps(start, end) {
            return 0.0;
        }
        let from = self.start_dt_utc.max(start);
        let to = self.end_dt_utc.min(end);
        let overlap = (to - from).num_milliseconds() as f64;
        let length = (self.end_dt_utc - self.start_dt_utc).num_milliseconds() as f64;
        if length <= 0.0 {
            return 0.0;
        }
        self.meter_energy_kwh * (overlap / length)
    }

    /// Checks interval ordering and that the energy is a finite number.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Configuration`] on a malformed record.
    pub fn validate(&self) -> Result<()> {
        if self.end_dt_utc <= self.start_dt_utc {
            return Err(DispatchError::configuration(
                "meter_value.end_dt_utc",
                format!("record starting {} must end after it starts", self.start_dt_utc),
            ));
        }
        if !self.meter_energy_kwh.is_finite() {
            return Err(DispatchError::configuration(
                "meter_value.meter_energy_kwh",
                format!("record starting {} is not a finite number", self.start_dt_utc),
            ));
        }
        Ok(())
    }
}

/// Forecast local energy over `[start_dt_utc, end_dt_utc)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyForecast {
    pub start_dt_utc: DateTime<Utc>,
    pub end_dt_utc: DateTime<Utc>,
    pub forecasted_energy_kwh: f64,
}

impl From<&EnergyForecast> for MeterValue {
    fn from(f: &EnergyForecast) -> Self {
        MeterValue {
            start_dt_utc: f.start_dt_utc,
            end_dt_utc: f.end_dt_utc,
            meter_energy_kwh: f.forecasted_energy_kwh,
        }
    }
}

impl From<&MeterValue> for EnergyForecast {
    fn from(m: &MeterValue) -> Self {
        EnergyForecast {
            start_dt_utc: m.start_dt_utc,
            end_dt_utc: m.end_dt_utc,
            forecasted_energy_kwh: m.meter_energy_kwh,
        }
    }
}
