use crate::error::Result;

use super::types::{EnergyForecast, MeterValue, Session};

/// Supplier of the three input tables of a dispatch run.
///
/// Implementations either load from files or generate data. Every returned
/// record has already been validated.
pub trait DataSource {
    /// Returns the session table.
    ///
    /// # Errors
    ///
    /// Returns an error if the sessions cannot be read or a record is malformed.
    fn read_sessions(&mut self) -> Result<Vec<Session>>;

    /// Returns the local energy forecast.
    ///
    /// # Errors
    ///
    /// Returns an error if the forecast cannot be read or a record is malformed.
    fn read_energy_forecast(&mut self) -> Result<Vec<EnergyForecast>>;

    /// Returns the metered local energy.
    ///
    /// Generating backends derive the meter values from `forecast`; file
    /// backends may ignore it.
    ///
    /// # Errors
    ///
    /// Returns an error if the meter values cannot be read or a record is malformed.
    fn read_meter_values(&mut self, forecast: &[EnergyForecast]) -> Result<Vec<MeterValue>>;
}
