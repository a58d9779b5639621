// Primitives for reading delimited text files into a raw table.

use snafu::prelude::*;

use metric_ingest::{RawRow, RawTable};

use crate::ingest::{CsvLineParseSnafu, IngestResult, OpeningCsvSnafu};

/// Reads a comma- or tab-delimited file. The first row is always the
/// headers; fully blank lines are skipped; ragged rows are kept as-is and
/// padded lazily by the pipeline.
pub fn read_delimited_table(path: &str, delimiter: u8) -> IngestResult<RawTable> {
    let rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_path(path)
        .context(OpeningCsvSnafu { path })?;

    let mut headers: Vec<String> = Vec::new();
    let mut rows: Vec<RawRow> = Vec::new();
    for (idx, record_r) in rdr.into_records().enumerate() {
        let record = record_r.context(CsvLineParseSnafu { path })?;
        let cells: Vec<String> = record.iter().map(|s| s.to_string()).collect();
        if idx == 0 {
            headers = cells;
            continue;
        }
        if cells.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        rows.push(RawRow(cells));
    }
    Ok(RawTable { headers, rows })
}
