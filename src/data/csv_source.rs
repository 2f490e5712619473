//! File-backed data source reading the session and meter value tables.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::error::{DispatchError, Result};

use super::source::DataSource;
use super::types::{EnergyForecast, MeterValue, Session};

/// Deserializes every row of a headered CSV table.
///
/// # Arguments
///
/// * `reader` - CSV content
/// * `table` - Table name used in error messages
///
/// # Errors
///
/// Returns [`DispatchError::Configuration`] naming the table and row of the
/// first record that does not match the schema.
pub fn read_records<R: Read, T: DeserializeOwned>(reader: R, table: &str) -> Result<Vec<T>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut records = Vec::new();
    for (row, record) in rdr.deserialize().enumerate() {
        let record: T = record.map_err(|e| {
            DispatchError::configuration(table, format!("row {}: {e}", row + 1))
        })?;
        records.push(record);
    }
    Ok(records)
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| {
        DispatchError::configuration(
            "data",
            format!("cannot open \"{}\": {e}", path.display()),
        )
    })
}

/// Reads sessions and meter values from CSV files.
///
/// Columns follow the record field names, timestamps are RFC 3339. Without
/// a forecast file the meter values double as the forecast.
#[derive(Debug, Clone)]
pub struct CsvSource {
    sessions_path: PathBuf,
    meter_values_path: PathBuf,
    forecast_path: Option<PathBuf>,
}

impl CsvSource {
    pub fn new(sessions_path: impl Into<PathBuf>, meter_values_path: impl Into<PathBuf>) -> Self {
        Self {
            sessions_path: sessions_path.into(),
            meter_values_path: meter_values_path.into(),
            forecast_path: None,
        }
    }

    /// Reads the forecast from a separate file instead of the meter values.
    pub fn with_forecast(mut self, path: impl Into<PathBuf>) -> Self {
        self.forecast_path = Some(path.into());
        self
    }

    fn meter_values(&self) -> Result<Vec<MeterValue>> {
        let values: Vec<MeterValue> =
            read_records(open(&self.meter_values_path)?, "meter_values")?;
        for v in &values {
            v.validate()?;
        }
        Ok(values)
    }
}

impl DataSource for CsvSource {
    fn read_sessions(&mut self) -> Result<Vec<Session>> {
        let sessions: Vec<Session> = read_records(open(&self.sessions_path)?, "sessions")?;
        for s in &sessions {
            s.validate()?;
        }
        info!(
            path = %self.sessions_path.display(),
            count = sessions.len(),
            "loaded sessions"
        );
        Ok(sessions)
    }

    fn read_energy_forecast(&mut self) -> Result<Vec<EnergyForecast>> {
        let Some(path) = &self.forecast_path else {
            debug!("no forecast file, using meter values as forecast");
            return Ok(self.meter_values()?.iter().map(EnergyForecast::from).collect());
        };
        let forecast: Vec<EnergyForecast> = read_records(open(path)?, "energy_forecast")?;
        for f in &forecast {
            MeterValue::from(f).validate()?;
        }
        info!(path = %path.display(), count = forecast.len(), "loaded energy forecast");
        Ok(forecast)
    }

    fn read_meter_values(&mut self, _forecast: &[EnergyForecast]) -> Result<Vec<MeterValue>> {
        let values = self.meter_values()?;
        info!(
            path = %self.meter_values_path.display(),
            count = values.len(),
            "loaded meter values"
        );
        Ok(values)
    }
}
