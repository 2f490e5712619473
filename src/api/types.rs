//! API response and query types.
//!
//! Allocation field names match the CSV export columns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::sim::kpi::RunSummary;
use crate::sim::logger::LogEntry;
use crate::sim::types::Allocation;

/// Run span plus summary.
#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    /// First tick.
    pub start: DateTime<Utc>,
    /// Last tick (inclusive).
    pub end: DateTime<Utc>,
    pub summary: RunSummary,
}

/// One logged tick.
#[derive(Debug, Serialize)]
pub struct AllocationRecord {
    pub timestamp: DateTime<Utc>,
    pub available_energy_kwh: f64,
    pub total_requested_kwh: f64,
    pub total_granted_kwh: f64,
    pub scale: f64,
    pub allocations: Vec<Allocation>,
}

impl From<&LogEntry> for AllocationRecord {
    fn from(e: &LogEntry) -> Self {
        Self {
            timestamp: e.timestamp,
            available_energy_kwh: e.result.available_energy_kwh,
            total_requested_kwh: e.result.total_requested_kwh,
            total_granted_kwh: e.result.total_granted_kwh(),
            scale: e.result.scale,
            allocations: e.result.allocations.clone(),
        }
    }
}

/// Optional time range for the allocations endpoint (RFC 3339, inclusive).
#[derive(Debug, Deserialize)]
pub struct AllocationQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// Error response body for 400-class errors.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
}
