//! Core dispatch types: optimizer signals and per-tick allocation results.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DispatchError, Result};

/// A per-car energy request produced by the optimizer.
///
/// `signal_energy_kwh` is the energy asked for in one tick. The signal stays
/// in force on `[start_dt_utc, end_dt_utc)`; the dispatcher recomputes
/// signals when one of them expires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub car_id: String,
    pub start_dt_utc: DateTime<Utc>,
    pub end_dt_utc: DateTime<Utc>,
    pub signal_energy_kwh: f64,
}

impl Signal {
    pub fn new(
        car_id: impl Into<String>,
        start_dt_utc: DateTime<Utc>,
        end_dt_utc: DateTime<Utc>,
        signal_energy_kwh: f64,
    ) -> Self {
        Self {
            car_id: car_id.into(),
            start_dt_utc,
            end_dt_utc,
            signal_energy_kwh,
        }
    }

    /// Checks the signal before it is allowed to drive an allocation.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Configuration`] for an empty car id, an
    /// empty validity window, or a non-finite or negative request.
    pub fn validate(&self) -> Result<()> {
        if self.car_id.trim().is_empty() {
            return Err(DispatchError::configuration(
                "signal.car_id",
                "signal without a car id",
            ));
        }
        if self.end_dt_utc <= self.start_dt_utc {
            return Err(DispatchError::configuration(
                "signal.end_dt_utc",
                format!("signal for \"{}\" must end after it starts", self.car_id),
            ));
        }
        if !self.signal_energy_kwh.is_finite() || self.signal_energy_kwh < 0.0 {
            return Err(DispatchError::configuration(
                "signal.signal_energy_kwh",
                format!(
                    "signal for \"{}\" requests {} kWh, expected a finite value >= 0",
                    self.car_id, self.signal_energy_kwh
                ),
            ));
        }
        Ok(())
    }
}

/// Energy granted to one car in one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub car_id: String,
    pub session_id: String,
    /// Request after the target and speed caps (kWh).
    pub requested_kwh: f64,
    /// Energy actually granted (kWh), `<= requested_kwh`.
    pub charged_energy_kwh: f64,
}

/// Complete allocation record of one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationResult {
    /// Start of the tick.
    pub timestamp: DateTime<Utc>,
    /// Local surplus plus grid allowance for the tick (kWh, may be <= 0).
    pub available_energy_kwh: f64,
    /// Sum of capped requests (kWh).
    pub total_requested_kwh: f64,
    /// Factor applied to every request: `1.0` unrationed, `0.0` without energy.
    pub scale: f64,
    /// One entry per car that had both a signal and an active session.
    pub allocations: Vec<Allocation>,
}

impl AllocationResult {
    /// A tick in which nothing was requested.
    pub fn empty(timestamp: DateTime<Utc>, available_energy_kwh: f64) -> Self {
        Self {
            timestamp,
            available_energy_kwh,
            total_requested_kwh: 0.0,
            scale: 1.0,
            allocations: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.allocations.is_empty()
    }

    pub fn total_granted_kwh(&self) -> f64 {
        self.allocations.iter().map(|a| a.charged_energy_kwh).sum()
    }

    /// Demand exceeded supply and every request was scaled down.
    pub fn is_rationed(&self) -> bool {
        self.scale < 1.0
    }

    /// Some car received exactly nothing this tick.
    pub fn has_unmet_demand(&self) -> bool {
        self.allocations.iter().any(|a| a.charged_energy_kwh == 0.0)
    }

    /// Returns the allocation for `car_id`, if that car was served.
    pub fn get(&self, car_id: &str) -> Option<&Allocation> {
        self.allocations.iter().find(|a| a.car_id == car_id)
    }
}

impl fmt::Display for AllocationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | available={:>7.3} kWh  requested={:>7.3} kWh  granted={:>7.3} kWh \
             | cars={:>3}  scale={:.3}",
            self.timestamp.format("%Y-%m-%d %H:%M"),
            self.available_energy_kwh,
            self.total_requested_kwh,
            self.total_granted_kwh(),
            self.allocations.len(),
            self.scale,
        )
    }
}
