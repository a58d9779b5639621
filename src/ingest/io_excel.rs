// Reading the first worksheet of an xlsx export into a raw table.

use calamine::{open_workbook, Reader, Xlsx};
use log::debug;
use snafu::prelude::*;

use metric_ingest::{RawRow, RawTable};

use crate::ingest::{EmptyExcelSnafu, IngestResult, OpeningExcelSnafu};

pub fn read_excel_table(path: &str) -> IngestResult<RawTable> {
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;
    let wrange = workbook
        .worksheet_range_at(0)
        .context(EmptyExcelSnafu { path })?
        .context(OpeningExcelSnafu { path })?;

    let mut iter = wrange.rows();
    let header_row = iter.next().context(EmptyExcelSnafu { path })?;
    let headers: Vec<String> = header_row.iter().map(cell_to_string).collect();
    debug!("read_excel_table: headers: {:?}", headers);

    let mut rows: Vec<RawRow> = Vec::new();
    for row in iter {
        let cells: Vec<String> = row.iter().map(cell_to_string).collect();
        if cells.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        rows.push(RawRow(cells));
    }
    Ok(RawTable { headers, rows })
}

// Spreadsheet numbers come back as floats; integral values are rendered
// without the trailing ".0" so they read like what the user typed. Native
// date cells arrive as serial day counts and are rendered as YYYY-MM-DD so
// the period parser understands them.
fn cell_to_string(cell: &calamine::DataType) -> String {
    match cell {
        calamine::DataType::String(s) => s.clone(),
        calamine::DataType::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => {
            format!("{}", *f as i64)
        }
        calamine::DataType::Float(f) => format!("{}", f),
        calamine::DataType::Int(i) => format!("{}", i),
        calamine::DataType::Bool(b) => format!("{}", b),
        calamine::DataType::DateTime(days) => {
            // Excel's epoch is 1899-12-30 (with the 1900 leap year quirk baked in).
            let base = chrono::NaiveDate::from_ymd_opt(1899, 12, 30).unwrap();
            match base.checked_add_days(chrono::Days::new(*days as u64)) {
                Some(d) => d.format("%Y-%m-%d").to_string(),
                None => "".to_string(),
            }
        }
        _ => "".to_string(),
    }
}
