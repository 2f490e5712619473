//! TOML-based scenario configuration and preset definitions.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;

use crate::error::DispatchError;
use crate::sim::logger::DEFAULT_BATCH_SIZE;

/// Synthetic data sources cannot hand out more distinct `CAR-nnnn` ids.
pub const MAX_SYNTHETIC_SESSIONS: usize = 9000;

/// Longest synthetic horizon, one leap year.
pub const MAX_HORIZON_DAYS: u32 = 366;

/// Longest signal validity, in ticks.
pub const MAX_SIGNAL_HORIZON_STEPS: u32 = 10_000;

/// Top-level scenario configuration parsed from TOML.
///
/// All fields have defaults matching the baseline scenario. Load from
/// TOML with [`ScenarioConfig::from_toml_file`] or use
/// [`ScenarioConfig::baseline`] for the built-in default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Clock and global parameters.
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Charging hub limits.
    #[serde(default)]
    pub hub: HubConfig,
    /// Allocation log batching.
    #[serde(default)]
    pub logger: LoggerConfig,
    /// Signal generation.
    #[serde(default)]
    pub optimizer: OptimizerConfig,
    /// Data source selection.
    #[serde(default)]
    pub data: DataConfig,
    /// Synthetic data generation parameters.
    #[serde(default)]
    pub synthetic: SyntheticConfig,
    /// Tracing output.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Clock and global parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Tick length in minutes (must be > 0).
    pub timestep_minutes: u32,
    /// Master random seed.
    pub seed: u64,
    /// First tick (RFC 3339 string). Derived from the sessions when absent.
    pub start: Option<DateTime<Utc>>,
    /// Last tick, inclusive (RFC 3339 string). Derived from the sessions when absent.
    pub end: Option<DateTime<Utc>>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            timestep_minutes: 15,
            seed: 42,
            start: None,
            end: None,
        }
    }
}

impl SimulationConfig {
    /// Tick length as a duration.
    pub fn timestep(&self) -> TimeDelta {
        TimeDelta::minutes(i64::from(self.timestep_minutes))
    }
}

/// Charging hub limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HubConfig {
    /// Constant grid allowance (kW).
    pub max_grid_power_kw: f64,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            max_grid_power_kw: 50.0,
        }
    }
}

/// Allocation log batching.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggerConfig {
    /// Entries buffered before a flush (must be > 0).
    pub batch_size: usize,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Signal generation.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OptimizerConfig {
    /// Ticks each signal stays valid (must be > 0).
    pub signal_horizon_steps: u32,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            signal_horizon_steps: 4,
        }
    }
}

/// Data source selection.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DataConfig {
    /// Backend: `"synthetic"` or `"csv"`.
    pub source: String,
    /// Session table for the csv backend.
    pub sessions_path: Option<PathBuf>,
    /// Meter value table for the csv backend.
    pub meter_values_path: Option<PathBuf>,
    /// Optional energy forecast table for the csv backend.
    pub energy_forecast_path: Option<PathBuf>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            source: "synthetic".to_string(),
            sessions_path: None,
            meter_values_path: None,
            energy_forecast_path: None,
        }
    }
}

/// Synthetic data generation parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyntheticConfig {
    /// Start of the generated horizon (RFC 3339 string).
    pub start: DateTime<Utc>,
    /// Length of the generated horizon in days (must be > 0).
    pub horizon_days: u32,
    /// Number of sessions to generate.
    pub num_sessions: usize,
    /// Minimum session dwell (hours).
    pub dwell_hours_min: f64,
    /// Maximum session dwell (hours).
    pub dwell_hours_max: f64,
    /// Minimum charger power (kW).
    pub charging_speed_kw_min: f64,
    /// Maximum charger power (kW).
    pub charging_speed_kw_max: f64,
    /// Minimum session target (kWh).
    pub target_energy_kwh_min: f64,
    /// Maximum session target (kWh).
    pub target_energy_kwh_max: f64,
    /// Peak local PV power (kW).
    pub pv_kw_peak: f64,
    /// Hour of day PV output starts.
    pub sunrise_hour: f64,
    /// Hour of day PV output ends.
    pub sunset_hour: f64,
    /// Mean site consumption competing with the chargers (kW).
    pub baseload_kw: f64,
    /// Daily sinusoidal amplitude of the site consumption (kW).
    pub baseload_amp_kw: f64,
    /// Standard deviation of meter deviations from the forecast (kWh).
    pub meter_noise_std_kwh: f64,
    /// Probability of a positive surplus spike in a meter record.
    pub spike_probability: f64,
    /// Smallest spike (kWh).
    pub spike_kwh_min: f64,
    /// Largest spike (kWh).
    pub spike_kwh_max: f64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            // 2024-06-01T00:00:00Z
            start: DateTime::<Utc>::UNIX_EPOCH + TimeDelta::days(19_875),
            horizon_days: 2,
            num_sessions: 20,
            dwell_hours_min: 1.0,
            dwell_hours_max: 12.0,
            charging_speed_kw_min: 7.4,
            charging_speed_kw_max: 22.0,
            target_energy_kwh_min: 10.0,
            target_energy_kwh_max: 80.0,
            pv_kw_peak: 40.0,
            sunrise_hour: 6.0,
            sunset_hour: 20.0,
            baseload_kw: 6.0,
            baseload_amp_kw: 3.0,
            meter_noise_std_kwh: 0.5,
            spike_probability: 0.1,
            spike_kwh_min: 2.0,
            spike_kwh_max: 5.0,
        }
    }
}

/// Tracing output.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug)]
pub struct ConfigError {
    /// Dotted field path (e.g., `"simulation.timestep_minutes"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config error: {} - {}", self.field, self.message)
    }
}

impl From<ConfigError> for DispatchError {
    fn from(e: ConfigError) -> Self {
        DispatchError::Configuration {
            field: e.field,
            message: e.message,
        }
    }
}

impl ScenarioConfig {
    /// Returns the baseline scenario.
    pub fn baseline() -> Self {
        Self::default()
    }

    /// Returns the congested preset: many cars behind a small grid connection.
    pub fn congested() -> Self {
        Self {
            hub: HubConfig {
                max_grid_power_kw: 11.0,
            },
            synthetic: SyntheticConfig {
                num_sessions: 60,
                pv_kw_peak: 10.0,
                ..SyntheticConfig::default()
            },
            ..Self::default()
        }
    }

    /// Returns the solar-surplus preset: large PV array, no grid allowance.
    pub fn solar_surplus() -> Self {
        Self {
            hub: HubConfig {
                max_grid_power_kw: 0.0,
            },
            synthetic: SyntheticConfig {
                pv_kw_peak: 150.0,
                sunrise_hour: 5.0,
                sunset_hour: 21.0,
                baseload_kw: 4.0,
                baseload_amp_kw: 1.0,
                ..SyntheticConfig::default()
            },
            ..Self::default()
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["baseline", "congested", "solar_surplus"];

    /// Loads a scenario from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "baseline" => Ok(Self::baseline()),
            "congested" => Ok(Self::congested()),
            "solar_surplus" => Ok(Self::solar_surplus()),
            _ => Err(ConfigError {
                field: "preset".to_string(),
                message: format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            }),
        }
    }

    /// Parses a scenario from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError {
            field: "scenario".to_string(),
            message: format!("cannot read \"{}\": {e}", path.display()),
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a scenario from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError {
            field: "toml".to_string(),
            message: e.to_string(),
        })
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let mut check = |ok: bool, field: &str, message: &str| {
            if !ok {
                errors.push(ConfigError {
                    field: field.into(),
                    message: message.into(),
                });
            }
        };

        let s = &self.simulation;
        check(s.timestep_minutes > 0, "simulation.timestep_minutes", "must be > 0");
        if let (Some(start), Some(end)) = (s.start, s.end) {
            check(start <= end, "simulation.start", "must be <= simulation.end");
        }

        let h = &self.hub;
        check(
            h.max_grid_power_kw.is_finite() && h.max_grid_power_kw >= 0.0,
            "hub.max_grid_power_kw",
            "must be a finite value >= 0",
        );
        check(self.logger.batch_size > 0, "logger.batch_size", "must be > 0");
        check(
            (1..=MAX_SIGNAL_HORIZON_STEPS).contains(&self.optimizer.signal_horizon_steps),
            "optimizer.signal_horizon_steps",
            "must be in [1, 10000]",
        );

        let d = &self.data;
        match d.source.as_str() {
            "synthetic" => {}
            "csv" => {
                check(
                    d.sessions_path.is_some(),
                    "data.sessions_path",
                    "required when data.source is \"csv\"",
                );
                check(
                    d.meter_values_path.is_some(),
                    "data.meter_values_path",
                    "required when data.source is \"csv\"",
                );
            }
            _ => check(false, "data.source", "must be \"synthetic\" or \"csv\""),
        }

        let sy = &self.synthetic;
        check(
            (1..=MAX_HORIZON_DAYS).contains(&sy.horizon_days),
            "synthetic.horizon_days",
            "must be in [1, 366]",
        );
        check(
            sy.num_sessions <= MAX_SYNTHETIC_SESSIONS,
            "synthetic.num_sessions",
            "must be <= 9000",
        );
        check(
            sy.dwell_hours_min > 0.0 && sy.dwell_hours_min <= sy.dwell_hours_max,
            "synthetic.dwell_hours_min",
            "must be > 0 and <= synthetic.dwell_hours_max",
        );
        check(
            sy.charging_speed_kw_min >= 0.0 && sy.charging_speed_kw_min <= sy.charging_speed_kw_max,
            "synthetic.charging_speed_kw_min",
            "must be >= 0 and <= synthetic.charging_speed_kw_max",
        );
        check(
            sy.target_energy_kwh_min >= 0.0 && sy.target_energy_kwh_min <= sy.target_energy_kwh_max,
            "synthetic.target_energy_kwh_min",
            "must be >= 0 and <= synthetic.target_energy_kwh_max",
        );
        check(
            (0.0..24.0).contains(&sy.sunrise_hour) && sy.sunrise_hour < sy.sunset_hour,
            "synthetic.sunrise_hour",
            "must be in [0, 24) and < synthetic.sunset_hour",
        );
        check(sy.sunset_hour <= 24.0, "synthetic.sunset_hour", "must be <= 24");
        check(sy.meter_noise_std_kwh >= 0.0, "synthetic.meter_noise_std_kwh", "must be >= 0");
        check(
            (0.0..=1.0).contains(&sy.spike_probability),
            "synthetic.spike_probability",
            "must be in [0.0, 1.0]",
        );
        check(
            sy.spike_kwh_min <= sy.spike_kwh_max,
            "synthetic.spike_kwh_min",
            "must be <= synthetic.spike_kwh_max",
        );

        check(!self.logging.level.trim().is_empty(), "logging.level", "must not be empty");

        errors
    }
}
