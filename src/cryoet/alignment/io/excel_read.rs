use std::path::Path;

use calamine::{DataType, Range, Reader, Xlsx, open_workbook};

use crate::cryoet::alignment::error::{Result, ToolError};
use crate::cryoet::alignment::tables::{SheetTable, WorkbookData};

/// Reads every sheet of a workbook written by
/// [`write_workbook`](crate::io::excel_write::write_workbook). The first row
/// of each sheet holds the column names; every other row must be numeric.
pub fn read_workbook(path: &Path) -> Result<WorkbookData> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let sheet_names = workbook.sheet_names().to_vec();

    let tables = sheet_names
        .into_iter()
        .map(|sheet_name| {
            let range = read_required_sheet(&mut workbook, &sheet_name)?;
            sheet_table(sheet_name, &range)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(WorkbookData { tables })
}

fn read_required_sheet<R: std::io::Read + std::io::Seek>(
    workbook: &mut Xlsx<R>,
    name: &str,
) -> Result<Range<DataType>> {
    let range_result = workbook
        .worksheet_range(name)
        .ok_or_else(|| ToolError::InvalidWorkbook(format!("missing sheet '{name}'")))?;
    let range = range_result.map_err(ToolError::from)?;
    Ok(range)
}

fn sheet_table(sheet_name: String, range: &Range<DataType>) -> Result<SheetTable> {
    let mut rows = range.rows();
    let columns: Vec<String> = match rows.next() {
        Some(header) => header
            .iter()
            .map(cell_to_string)
            .take_while(|name| !name.is_empty())
            .collect(),
        None => Vec::new(),
    };

    let mut table = SheetTable::new(sheet_name, columns);
    for (row_idx, row) in rows.enumerate() {
        if row.iter().all(|cell| matches!(cell, DataType::Empty)) {
            continue;
        }
        let values = row
            .iter()
            .take(table.columns.len())
            .enumerate()
            .map(|(col_idx, cell)| {
                cell_to_number(cell).ok_or_else(|| {
                    ToolError::InvalidWorkbook(format!(
                        "sheet '{}' row {} column '{}' is not numeric",
                        table.sheet_name,
                        row_idx + 2,
                        table.columns[col_idx]
                    ))
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        table.rows.push(values);
    }

    Ok(table)
}

fn cell_to_string(cell: &DataType) -> String {
    match cell {
        DataType::String(value) => value.trim().to_string(),
        DataType::Empty => String::new(),
        other => other.to_string(),
    }
}

fn cell_to_number(cell: &DataType) -> Option<f64> {
    match cell {
        DataType::Float(value) => Some(*value),
        DataType::Int(value) => Some(*value as f64),
        DataType::String(value) => value.trim().parse().ok(),
        _ => None,
    }
}
