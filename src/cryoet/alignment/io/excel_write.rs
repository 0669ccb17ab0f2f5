use std::path::Path;

use rust_xlsxwriter::{Table, Workbook};
use tracing::debug;

use crate::cryoet::alignment::error::Result;
use crate::cryoet::alignment::tables::WorkbookData;

/// Writes the provided workbook data to the given path, one autofiltered
/// table per sheet.
pub fn write_workbook(path: &Path, workbook: &WorkbookData) -> Result<()> {
    let mut workbook_writer = Workbook::new();

    for table in &workbook.tables {
        let worksheet = workbook_writer.add_worksheet();
        worksheet.set_name(&table.sheet_name)?;

        for (col_idx, header) in table.columns.iter().enumerate() {
            worksheet.write_string(0, col_idx as u16, header)?;
        }

        for (row_idx, row) in table.rows.iter().enumerate() {
            for (col_idx, value) in row.iter().enumerate() {
                worksheet.write_number((row_idx + 1) as u32, col_idx as u16, *value)?;
            }
        }

        // Header-only sheets stay plain ranges.
        if table.rows.is_empty() || table.columns.is_empty() {
            continue;
        }
        let mut excel_table = Table::new();
        excel_table.set_autofilter(true);
        let col_end = (table.columns.len() as u16).saturating_sub(1);
        worksheet.add_table(0, 0, table.rows.len() as u32, col_end, &excel_table)?;
    }

    workbook_writer.save(path)?;
    debug!(
        path = %path.display(),
        sheets = workbook.tables.len(),
        "wrote workbook"
    );
    Ok(())
}
