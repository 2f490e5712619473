//! Per-tick decision of whether signals must be recomputed.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};

use crate::data::Session;

use super::types::{AllocationResult, Signal};

/// Why a tick recomputes its signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerReason {
    /// No previous result or signals exist yet.
    FirstTick,
    /// A session starts at the current time.
    SessionStart,
    /// A session ends at the current time.
    SessionEnd,
    /// The previous tick granted exactly zero to some car.
    UnmetDemand,
    /// A signal's validity ends at the current time.
    SignalExpired,
}

impl fmt::Display for TriggerReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TriggerReason::FirstTick => "first_tick",
            TriggerReason::SessionStart => "session_start",
            TriggerReason::SessionEnd => "session_end",
            TriggerReason::UnmetDemand => "unmet_demand",
            TriggerReason::SignalExpired => "signal_expired",
        };
        f.write_str(s)
    }
}

/// Detects ticks where the allocation inputs changed.
///
/// Session boundaries are copied at construction; sessions are never added
/// or moved during a run, so the checker needs no access to the live ledger.
#[derive(Debug, Clone, Default)]
pub struct TriggerChecker {
    starts: BTreeSet<DateTime<Utc>>,
    ends: BTreeSet<DateTime<Utc>>,
}

impl TriggerChecker {
    pub fn new(sessions: &[Session]) -> Self {
        Self {
            starts: sessions.iter().map(|s| s.start_dt_utc).collect(),
            ends: sessions.iter().map(|s| s.end_dt_utc).collect(),
        }
    }

    /// Returns the first matching reason to recompute, or `None` to reuse
    /// the previous signals unchanged.
    pub fn check(
        &self,
        current_time: DateTime<Utc>,
        previous: Option<&AllocationResult>,
        signals: Option<&[Signal]>,
    ) -> Option<TriggerReason> {
        let (Some(previous), Some(signals)) = (previous, signals) else {
            return Some(TriggerReason::FirstTick);
        };
        if self.starts.contains(&current_time) {
            return Some(TriggerReason::SessionStart);
        }
        if self.ends.contains(&current_time) {
            return Some(TriggerReason::SessionEnd);
        }
        if previous.has_unmet_demand() {
            return Some(TriggerReason::UnmetDemand);
        }
        if signals.iter().any(|s| s.end_dt_utc == current_time) {
            return Some(TriggerReason::SignalExpired);
        }
        None
    }

    pub fn is_triggered(
        &self,
        current_time: DateTime<Utc>,
        previous: Option<&AllocationResult>,
        signals: Option<&[Signal]>,
    ) -> bool {
        self.check(current_time, previous, signals).is_some()
    }
}
