use std::io::Write;
use std::path::Path;

use crate::error::Result;
use crate::report::ReportTable;

/// Writes the header row followed by every report row.
pub fn write_report<W: Write>(writer: W, report: &ReportTable) -> Result<()> {
    write_records(csv::Writer::from_writer(writer), report)
}

/// Creates (or truncates) `path` and writes the report into it.
pub fn write_report_file(path: &Path, report: &ReportTable) -> Result<()> {
    write_records(csv::Writer::from_path(path)?, report)
}

fn write_records<W: Write>(mut csv_writer: csv::Writer<W>, report: &ReportTable) -> Result<()> {
    csv_writer.write_record(&report.columns)?;
    for row in &report.rows {
        csv_writer.write_record(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}
