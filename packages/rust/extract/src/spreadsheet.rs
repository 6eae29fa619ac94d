//! Spreadsheet extraction via `calamine`. Every sheet becomes one grid.

use std::io::Cursor;

use budgetlens_shared::{BudgetLensError, Result};
use calamine::{Data, Reader, open_workbook_auto_from_rs};

use crate::grid::ExtractionGrid;

/// A named sheet's raw cells.
#[derive(Debug, Clone)]
pub struct Sheet {
    pub name: String,
    pub grid: ExtractionGrid,
}

/// The readable sheets of a workbook, plus one message per sheet that could
/// not be read.
#[derive(Debug, Clone, Default)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
    pub errors: Vec<String>,
}

/// Read every sheet of an `.xlsx`/`.xls` workbook without filling blanks.
///
/// Only a workbook that cannot be opened at all is an error; a sheet that
/// fails to parse is reported in [`Workbook::errors`] and the others are kept.
pub fn read_sheets(bytes: &[u8]) -> Result<Workbook> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| BudgetLensError::extraction(format!("failed to open workbook: {e}")))?;

    let mut read = Workbook::default();
    for name in workbook.sheet_names() {
        match workbook.worksheet_range(&name) {
            Ok(range) => {
                let rows = range
                    .rows()
                    .map(|row| row.iter().map(cell_text).collect())
                    .collect();
                read.sheets.push(Sheet {
                    name,
                    grid: ExtractionGrid::new(rows),
                });
            }
            Err(e) => {
                tracing::warn!(sheet = %name, error = %e, "failed to read sheet");
                read.errors
                    .push(format!("failed to read sheet '{name}': {e}"));
            }
        }
    }
    Ok(read)
}

/// Read every sheet and fill merged-cell gaps down each column.
pub fn extract_sheets(bytes: &[u8]) -> Result<Workbook> {
    let mut read = read_sheets(bytes)?;
    for sheet in &mut read.sheets {
        sheet.grid.fill_down();
    }
    tracing::debug!(
        sheets = read.sheets.len(),
        failed = read.errors.len(),
        "workbook read"
    );
    Ok(read)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        other => other.to_string().trim().to_string(),
    }
}
