//! Config-driven construction and execution of a dispatch run.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::config::ScenarioConfig;
use crate::data::{DataSource, Session, source_from_config};
use crate::error::{DispatchError, Result};
use crate::sim::dispatcher::{Dispatcher, span_from_sessions};
use crate::sim::hub::ChargingHub;
use crate::sim::kpi::RunSummary;
use crate::sim::logger::{ChargingLogger, LogEntry};
use crate::sim::optimizer::NaiveOptimizer;
use crate::sim::smart_meter::SmartMeter;
use crate::sim::trigger::TriggerChecker;

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// First tick.
    pub start: DateTime<Utc>,
    /// Last tick (inclusive).
    pub end: DateTime<Utc>,
    /// One entry per processed tick.
    pub logs: Vec<LogEntry>,
    /// Ledger as left by the run.
    pub sessions: Vec<Session>,
    pub summary: RunSummary,
}

/// Runs the scenario with the data source it configures.
///
/// # Errors
///
/// Returns configuration errors for an invalid scenario or bad input records,
/// and coverage errors when the meter data does not span the run.
pub fn run_scenario(cfg: &ScenarioConfig) -> Result<RunOutput> {
    check_config(cfg)?;
    let mut source = source_from_config(cfg)?;
    run_with_source(cfg, source.as_mut())
}

/// Runs the scenario against an explicit data source.
///
/// The run span is `[simulation.start, simulation.end]` where given, and the
/// floored session span otherwise.
///
/// # Errors
///
/// See [`run_scenario`].
pub fn run_with_source(cfg: &ScenarioConfig, source: &mut dyn DataSource) -> Result<RunOutput> {
    check_config(cfg)?;
    let step = cfg.simulation.timestep();

    let sessions = source.read_sessions()?;
    let forecast = source.read_energy_forecast()?;
    let meter_values = source.read_meter_values(&forecast)?;

    let (start, end) = match (cfg.simulation.start, cfg.simulation.end) {
        (Some(start), Some(end)) => (start, end),
        (start, end) => {
            let (derived_start, derived_end) = span_from_sessions(&sessions, step)?;
            (start.unwrap_or(derived_start), end.unwrap_or(derived_end))
        }
    };
    if start > end {
        return Err(DispatchError::configuration(
            "simulation.start",
            format!("run start {start} is after run end {end}"),
        ));
    }
    info!(
        source = %cfg.data.source,
        sessions = sessions.len(),
        meter_values = meter_values.len(),
        "inputs loaded"
    );

    let trigger_checker = TriggerChecker::new(&sessions);
    let smart_meter = SmartMeter::new(meter_values)?;
    let hub = ChargingHub::new(sessions, smart_meter, cfg.hub.max_grid_power_kw)?;
    let optimizer = NaiveOptimizer::new(cfg.optimizer.signal_horizon_steps);
    let logger = ChargingLogger::new(cfg.logger.batch_size);

    let mut dispatcher = Dispatcher::new(trigger_checker, hub, optimizer, logger);
    dispatcher.run(start, end, step)?;
    let triggers = dispatcher.trigger_count();

    let (hub, logs) = dispatcher.into_parts();
    let sessions = hub.sessions().to_vec();
    let summary = RunSummary::from_logs(&logs, &sessions, triggers);

    Ok(RunOutput {
        start,
        end,
        logs,
        sessions,
        summary,
    })
}

/// Fails with the first problem [`ScenarioConfig::validate`] reports.
fn check_config(cfg: &ScenarioConfig) -> Result<()> {
    match cfg.validate().into_iter().next() {
        Some(first) => Err(first.into()),
        None => Ok(()),
    }
}
