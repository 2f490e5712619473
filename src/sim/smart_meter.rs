//! Read-only windowed access to metered local energy.

use chrono::{DateTime, Utc};

use crate::data::MeterValue;
use crate::error::{DispatchError, Result};

/// Holds the loaded meter records and answers window queries over them.
#[derive(Debug, Clone)]
pub struct SmartMeter {
    /// Records sorted by start time.
    meter_values: Vec<MeterValue>,
}

impl SmartMeter {
    /// Validates and indexes the meter records.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Configuration`] if any record is malformed.
    pub fn new(mut meter_values: Vec<MeterValue>) -> Result<Self> {
        for m in &meter_values {
            m.validate()?;
        }
        meter_values.sort_by_key(|m| m.start_dt_utc);
        Ok(Self { meter_values })
    }

    /// Earliest record start and latest record end, if any data is loaded.
    pub fn span(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let first = self.meter_values.first()?.start_dt_utc;
        let last = self.meter_values.iter().map(|m| m.end_dt_utc).max()?;
        Some((first, last))
    }

    /// Returns all records overlapping `[start, end)`.
    ///
    /// A window that touches the loaded span, or falls into a gap inside
    /// it, yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::DataCoverage`] when the window ends before
    /// the earliest record starts, starts after the latest record ends, or
    /// no records are loaded at all.
    pub fn get_meter_values(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<&MeterValue>> {
        let Some((data_start, data_end)) = self.span() else {
            return Err(DispatchError::coverage(start, end, "has no meter data loaded"));
        };
        if end < data_start {
            return Err(DispatchError::coverage(
                start,
                end,
                format!("ends before the earliest meter value start ({data_start})"),
            ));
        }
        if start > data_end {
            return Err(DispatchError::coverage(
                start,
                end,
                format!("starts after the latest meter value end ({data_end})"),
            ));
        }

        Ok(self
            .meter_values
            .iter()
            .take_while(|m| m.start_dt_utc < end)
            .filter(|m| m.overlaps(start, end))
            .collect())
    }

    /// Local surplus inside `[start, end)` in kWh.
    ///
    /// Records that only partly overlap the window contribute the overlapped
    /// share of their energy.
    ///
    /// # Errors
    ///
    /// Propagates the coverage error of [`SmartMeter::get_meter_values`].
    pub fn energy_kwh(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<f64> {
        Ok(self
            .get_meter_values(start, end)?
            .into_iter()
            .map(|m| m.energy_within_kwh(start, end))
            .sum())
    }
}
