//! Seeded generator for sessions, forecasts, and meter values.

use std::f64::consts::PI;

use chrono::{DateTime, TimeDelta, Timelike, Utc};
use rand::{Rng, SeedableRng, rngs::StdRng, seq::index};
use tracing::debug;

use crate::config::{MAX_SYNTHETIC_SESSIONS, SyntheticConfig};
use crate::error::{DispatchError, Result};
use crate::sim::clock::{floor_to_step, step_hours, steps_to_delta};

use super::source::DataSource;
use super::types::{EnergyForecast, MeterValue, Session};

/// Seed offset for the meter RNG so meter noise is independent of sessions.
const METER_SEED_OFFSET: u64 = 57;

/// Number of distinct `CAR-nnnn` ids.
const CAR_ID_SPACE: usize = 9000;
/// Number of distinct `SESSION-nnnnnn` ids.
const SESSION_ID_SPACE: usize = 900_000;

/// Draws a Gaussian sample using the Box-Muller transform.
///
/// # Arguments
///
/// * `rng` - Random number generator
/// * `std_dev` - Standard deviation of the noise
///
/// # Returns
///
/// Random value from a Gaussian distribution with mean 0 and specified standard deviation
pub fn gaussian_noise(rng: &mut StdRng, std_dev: f64) -> f64 {
    if std_dev <= 0.0 {
        return 0.0;
    }

    let u1: f64 = rng.random::<f64>().clamp(1e-12, 1.0);
    let u2: f64 = rng.random::<f64>();
    let z0 = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos();
    z0 * std_dev
}

/// Fraction of peak PV output at `hour` (fractional hour of day).
///
/// Half-sine between sunrise and sunset, zero outside.
pub fn daylight_frac(hour: f64, sunrise_hour: f64, sunset_hour: f64) -> f64 {
    if hour < sunrise_hour || hour >= sunset_hour || sunset_hour <= sunrise_hour {
        return 0.0;
    }
    let x = (hour - sunrise_hour) / (sunset_hour - sunrise_hour);
    (PI * x).sin().max(0.0)
}

fn hour_of_day(t: DateTime<Utc>) -> f64 {
    f64::from(t.num_seconds_from_midnight()) / 3600.0
}

/// Generates a reproducible scenario from a seed.
///
/// Session times are placed on the timestep grid. Forecast and meter records
/// are one timestep long and cover the horizon plus one trailing step.
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    config: SyntheticConfig,
    timestep: TimeDelta,
    seed: u64,
}

impl SyntheticSource {
    /// # Panics
    ///
    /// Panics if `timestep` is not positive. Generation panics on ranges that
    /// [`crate::config::ScenarioConfig::validate`] rejects.
    pub fn new(config: SyntheticConfig, timestep: TimeDelta, seed: u64) -> Self {
        assert!(timestep > TimeDelta::zero(), "timestep must be > 0");
        Self {
            config,
            timestep,
            seed,
        }
    }

    fn origin(&self) -> Result<DateTime<Utc>> {
        floor_to_step(self.config.start, self.timestep)
    }

    /// Time of grid step `k` after `origin`.
    fn step_time(&self, origin: DateTime<Utc>, k: i64) -> Result<DateTime<Utc>> {
        let offset = steps_to_delta(self.timestep, k, "synthetic.horizon_days")?;
        origin.checked_add_signed(offset).ok_or_else(|| {
            DispatchError::configuration(
                "synthetic.horizon_days",
                "horizon ends past the supported date range",
            )
        })
    }

    /// Number of whole timesteps in the horizon.
    ///
    /// Fails up front when the trailing record would not be representable.
    fn horizon_steps(&self) -> Result<i64> {
        let horizon = TimeDelta::days(i64::from(self.config.horizon_days));
        let steps = (horizon.num_milliseconds() / self.timestep.num_milliseconds()).max(1);
        self.step_time(self.origin()?, steps + 1)?;
        Ok(steps)
    }

    /// Local surplus power at `t` (kW): PV minus site consumption.
    fn surplus_kw(&self, t: DateTime<Utc>) -> f64 {
        let c = &self.config;
        let hour = hour_of_day(t);
        let pv_kw = c.pv_kw_peak * daylight_frac(hour, c.sunrise_hour, c.sunset_hour);
        let load_kw = (c.baseload_kw - c.baseload_amp_kw * (2.0 * PI * hour / 24.0).cos()).max(0.0);
        pv_kw - load_kw
    }
}

impl DataSource for SyntheticSource {
    fn read_sessions(&mut self) -> Result<Vec<Session>> {
        let c = &self.config;
        if c.num_sessions > MAX_SYNTHETIC_SESSIONS {
            return Err(DispatchError::configuration(
                "synthetic.num_sessions",
                format!("cannot generate more than {MAX_SYNTHETIC_SESSIONS} distinct cars"),
            ));
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let origin = self.origin()?;
        let steps = self.horizon_steps()?;
        let step_minutes = self.timestep.num_milliseconds() as f64 / 60_000.0;

        let car_ids = index::sample(&mut rng, CAR_ID_SPACE, c.num_sessions);
        let session_ids = index::sample(&mut rng, SESSION_ID_SPACE, c.num_sessions);

        let mut sessions: Vec<Session> = car_ids
            .into_iter()
            .zip(session_ids)
            .map(|(car, session)| -> Result<Session> {
                let start_step = rng.random_range(0..steps);
                let dwell_hours = rng.random_range(c.dwell_hours_min..=c.dwell_hours_max);
                let dwell_steps = ((dwell_hours * 60.0 / step_minutes).round() as i64).max(1);
                let end_step = (start_step + dwell_steps).min(steps);

                Ok(Session {
                    car_id: format!("CAR-{}", 1000 + car),
                    session_id: format!("SESSION-{}", 100_000 + session),
                    start_dt_utc: self.step_time(origin, start_step)?,
                    end_dt_utc: self.step_time(origin, end_step)?,
                    charging_speed_kw: rng
                        .random_range(c.charging_speed_kw_min..=c.charging_speed_kw_max),
                    charged_energy_kwh: 0.0,
                    target_energy_kwh: rng
                        .random_range(c.target_energy_kwh_min..=c.target_energy_kwh_max),
                })
            })
            .collect::<Result<_>>()?;

        sessions.sort_by(|a, b| {
            a.start_dt_utc
                .cmp(&b.start_dt_utc)
                .then_with(|| a.car_id.cmp(&b.car_id))
        });
        for s in &sessions {
            s.validate()?;
        }
        debug!(count = sessions.len(), "generated sessions");
        Ok(sessions)
    }

    fn read_energy_forecast(&mut self) -> Result<Vec<EnergyForecast>> {
        let origin = self.origin()?;
        let dt_hours = step_hours(self.timestep);

        // One trailing record so the tick at the horizon end is covered.
        let forecast: Vec<EnergyForecast> = (0..=self.horizon_steps()?)
            .map(|k| -> Result<EnergyForecast> {
                let start = self.step_time(origin, k)?;
                Ok(EnergyForecast {
                    start_dt_utc: start,
                    end_dt_utc: self.step_time(origin, k + 1)?,
                    forecasted_energy_kwh: self.surplus_kw(start) * dt_hours,
                })
            })
            .collect::<Result<_>>()?;
        debug!(count = forecast.len(), "generated energy forecast");
        Ok(forecast)
    }

    fn read_meter_values(&mut self, forecast: &[EnergyForecast]) -> Result<Vec<MeterValue>> {
        let c = &self.config;
        let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(METER_SEED_OFFSET));

        let values: Vec<MeterValue> = forecast
            .iter()
            .map(|f| {
                let noise = gaussian_noise(&mut rng, c.meter_noise_std_kwh);
                let mut energy = f.forecasted_energy_kwh + noise;
                if rng.random_bool(c.spike_probability) {
                    energy += rng.random_range(c.spike_kwh_min..=c.spike_kwh_max);
                }
                MeterValue {
                    start_dt_utc: f.start_dt_utc,
                    end_dt_utc: f.end_dt_utc,
                    meter_energy_kwh: energy,
                }
            })
            .collect();

        for v in &values {
            v.validate()?;
        }
        debug!(count = values.len(), "generated meter values");
        Ok(values)
    }
}
