//! Input data model and the sources that supply it.

pub mod csv_source;
pub mod source;
pub mod synthetic;
pub mod types;

pub use csv_source::CsvSource;
pub use source::DataSource;
pub use synthetic::SyntheticSource;
pub use types::{EnergyForecast, MeterValue, Session};

use crate::config::ScenarioConfig;
use crate::error::{DispatchError, Result};

/// Builds the data source selected by `[data] source`.
///
/// # Errors
///
/// Returns [`DispatchError::Configuration`] for an unknown source or a csv
/// source without paths.
pub fn source_from_config(cfg: &ScenarioConfig) -> Result<Box<dyn DataSource>> {
    match cfg.data.source.as_str() {
        "synthetic" => Ok(Box::new(SyntheticSource::new(
            cfg.synthetic.clone(),
            cfg.simulation.timestep(),
            cfg.simulation.seed,
        ))),
        "csv" => {
            let d = &cfg.data;
            let (Some(sessions), Some(meter)) = (&d.sessions_path, &d.meter_values_path) else {
                return Err(DispatchError::configuration(
                    "data",
                    "csv source needs sessions_path and meter_values_path",
                ));
            };
            let mut src = CsvSource::new(sessions.clone(), meter.clone());
            if let Some(forecast) = &d.energy_forecast_path {
                src = src.with_forecast(forecast.clone());
            }
            Ok(Box::new(src))
        }
        other => Err(DispatchError::configuration(
            "data.source",
            format!("unknown source \"{other}\""),
        )),
    }
}
