//! Post-hoc run summary computed from the allocation log.

use std::fmt;

use serde::Serialize;

use crate::data::Session;

use super::logger::LogEntry;

/// Aggregate indicators of a complete dispatch run.
///
/// Computed post-hoc from the log and the final ledger so the figures always
/// agree with what was recorded tick by tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    /// Number of ticks processed.
    pub ticks: usize,
    /// Number of ticks that recomputed signals.
    pub triggers: usize,
    /// Total energy granted across all cars and ticks (kWh).
    pub total_delivered_kwh: f64,
    /// Largest energy granted in a single tick (kWh).
    pub peak_tick_kwh: f64,
    /// Ticks in which requests were scaled down.
    pub rationed_ticks: usize,
    /// Sessions that reached their target.
    pub sessions_completed: usize,
    /// Sessions in the ledger.
    pub sessions_total: usize,
    /// Energy still missing across all sessions at run end (kWh).
    pub unmet_energy_kwh: f64,
}

impl RunSummary {
    /// Computes the summary.
    ///
    /// # Arguments
    ///
    /// * `logs` - Every logged tick of the run
    /// * `sessions` - Ledger as left by the run
    /// * `triggers` - Trigger count reported by the dispatcher
    pub fn from_logs(logs: &[LogEntry], sessions: &[Session], triggers: usize) -> Self {
        let mut total = 0.0_f64;
        let mut peak = 0.0_f64;
        let mut rationed = 0_usize;

        for entry in logs {
            let granted = entry.result.total_granted_kwh();
            total += granted;
            peak = peak.max(granted);
            if entry.result.is_rationed() && entry.result.total_requested_kwh > 0.0 {
                rationed += 1;
            }
        }

        Self {
            ticks: logs.len(),
            triggers,
            total_delivered_kwh: total,
            peak_tick_kwh: peak,
            rationed_ticks: rationed,
            sessions_completed: sessions.iter().filter(|s| s.is_complete()).count(),
            sessions_total: sessions.len(),
            unmet_energy_kwh: sessions.iter().map(Session::remaining_energy_kwh).sum(),
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Run Summary ---")?;
        writeln!(f, "Ticks processed:       {}", self.ticks)?;
        writeln!(f, "Signal recomputations: {}", self.triggers)?;
        writeln!(f, "Energy delivered:      {:.3} kWh", self.total_delivered_kwh)?;
        writeln!(f, "Peak tick energy:      {:.3} kWh", self.peak_tick_kwh)?;
        writeln!(f, "Rationed ticks:        {}", self.rationed_ticks)?;
        writeln!(
            f,
            "Sessions completed:    {} / {}",
            self.sessions_completed, self.sessions_total
        )?;
        write!(f, "Unmet energy:          {:.3} kWh", self.unmet_energy_kwh)
    }
}
