use std::path::Path;

use rust_xlsxwriter::{Table, TableColumn, Workbook};

use crate::error::Result;
use crate::report::ReportTable;

/// Writes the report as a single worksheet with an auto-filtered table.
pub fn write_report(path: &Path, report: &ReportTable) -> Result<()> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(&report.sheet_name)?;

    for (col_idx, header) in report.columns.iter().enumerate() {
        worksheet.write_string(0, col_idx as u16, header)?;
    }

    for (row_idx, row) in report.rows.iter().enumerate() {
        for (col_idx, cell) in row.iter().enumerate() {
            worksheet.write_string((row_idx + 1) as u32, col_idx as u16, cell)?;
        }
    }

    let col_end = (report.columns.len() as u16).saturating_sub(1);
    let row_end = report.rows.len() as u32;
    if row_end > 0 {
        let columns: Vec<TableColumn> = report
            .columns
            .iter()
            .map(|header| TableColumn::new().set_header(header))
            .collect();
        let mut table = Table::new();
        table.set_autofilter(true).set_columns(&columns);
        worksheet.add_table(0, 0, row_end, col_end, &table)?;
    }

    workbook.save(path)?;
    Ok(())
}
