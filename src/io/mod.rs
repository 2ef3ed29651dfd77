//! Adapters between the pipelines and the outside world: report files,
//! spreadsheet exports, the Google APIs, the task tracker and the database.

use std::path::Path;

use crate::error::Result;
use crate::report::ReportTable;

pub mod asana;
pub mod csv_write;
pub mod database;
pub mod drive;
pub mod excel_read;
pub mod excel_write;
pub mod sheets;

/// Writes a report as `.xlsx` when the path says so, as CSV otherwise.
pub fn write_report(path: &Path, report: &ReportTable) -> Result<()> {
    let is_xlsx = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("xlsx"));
    if is_xlsx {
        excel_write::write_report(path, report)
    } else {
        csv_write::write_report_file(path, report)
    }
}
