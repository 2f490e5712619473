//! CSV export for the allocation log.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::error::Result;
use crate::sim::logger::LogEntry;

/// Column header for the allocation log export.
const HEADER: &str = "timestamp,car_id,session_id,requested_kwh,charged_energy_kwh";

/// Exports the allocation log to a CSV file at the given path.
///
/// Writes a header row followed by one row per car per tick. Ticks without
/// allocations produce no rows. Produces deterministic output for identical
/// inputs.
///
/// # Arguments
///
/// * `logs` - Complete allocation log of a run
/// * `path` - Output file path
///
/// # Errors
///
/// Returns an error if file creation or writing fails.
pub fn export_csv(logs: &[LogEntry], path: &Path) -> Result<()> {
    let file = File::create(path)?;
    let buf = io::BufWriter::new(file);
    write_csv(logs, buf)
}

/// Writes the allocation log as CSV to any writer.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_csv(logs: &[LogEntry], writer: impl Write) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    wtr.write_record(HEADER.split(','))?;

    for entry in logs {
        let timestamp = entry.timestamp.to_rfc3339();
        for a in &entry.result.allocations {
            let requested = format!("{:.6}", a.requested_kwh);
            let charged = format!("{:.6}", a.charged_energy_kwh);
            wtr.write_record([
                timestamp.as_str(),
                a.car_id.as_str(),
                a.session_id.as_str(),
                requested.as_str(),
                charged.as_str(),
            ])?;
        }
    }

    wtr.flush()?;
    Ok(())
}
