//! Validation pipeline for human-produced metric spreadsheets.
//!
//! The library takes an already-parsed table (headers plus string cells),
//! a column mapping (inferred from the headers or corrected by a human),
//! and the read-only reference catalogs, and classifies every data row as
//! valid or in error. The dual flow generates a blank template whose
//! columns auto-map when the filled-in file comes back.
//!
//! The pipeline performs no I/O and keeps no state between invocations:
//! the same table and catalogs always produce the same row results.

pub mod config;
pub mod headers;
pub mod periods;
pub mod resolve;
pub mod template;
pub mod values;

use log::{debug, info};

pub use crate::config::*;
pub use crate::headers::{infer_header, CanonicalField, ColumnMapping};
pub use crate::template::generate_template;

use crate::periods::parse_period;
use crate::resolve::{resolve_entity, resolve_region};
use crate::values::derive_value;

/// Run-wide options for a validation pass.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ImportOptions {
    /// The reporting cadence stamped on every validated record.
    pub period_type: PeriodType,
    /// When configured, every record is scoped to this division and the
    /// per-row division column (if any) is ignored.
    pub fixed_division_id: Option<EntityId>,
}

// Resolved column positions for one run. A required field whose mapped
// header is absent from the table is caught before any row is processed.
struct ColumnIndexes {
    metric: usize,
    period: usize,
    value: Option<usize>,
    numerator: Option<usize>,
    denominator: Option<usize>,
    division: Option<usize>,
    region: Option<usize>,
    notes: Option<usize>,
}

fn required_index(
    mapping: &ColumnMapping,
    headers: &[String],
    field: CanonicalField,
) -> Result<usize, ImportError> {
    mapping
        .column_index(headers, field)
        .ok_or_else(|| ImportError::MissingRequiredMapping(field.key().to_string()))
}

fn resolve_indexes(
    mapping: &ColumnMapping,
    headers: &[String],
) -> Result<ColumnIndexes, ImportError> {
    mapping.check_required()?;
    let value = mapping.column_index(headers, CanonicalField::Value);
    let numerator = mapping.column_index(headers, CanonicalField::Numerator);
    let denominator = mapping.column_index(headers, CanonicalField::Denominator);
    if value.is_none() && (numerator.is_none() || denominator.is_none()) {
        return Err(ImportError::MissingRequiredMapping(
            "value, or numerator and denominator".to_string(),
        ));
    }
    Ok(ColumnIndexes {
        metric: required_index(mapping, headers, CanonicalField::Metric)?,
        period: required_index(mapping, headers, CanonicalField::Period)?,
        value,
        numerator,
        denominator,
        division: mapping.column_index(headers, CanonicalField::Division),
        region: mapping.column_index(headers, CanonicalField::Region),
        notes: mapping.column_index(headers, CanonicalField::Notes),
    })
}

/// Validates every data row of the table against the reference catalogs.
///
/// Returns one `RowResult` per input row, in input order. A row's failure
/// never affects any other row; only precondition violations (missing
/// required mapping, too many rows) abort the whole run.
pub fn validate_table(
    table: &RawTable,
    mapping: &ColumnMapping,
    catalogs: &Catalogs,
    opts: &ImportOptions,
) -> Result<Vec<RowResult>, ImportError> {
    if table.rows.len() > MAX_ROWS {
        return Err(ImportError::TooManyRows(table.rows.len()));
    }
    let cols = resolve_indexes(mapping, &table.headers)?;
    info!(
        "validate_table: {} rows, {} metrics in catalog",
        table.rows.len(),
        catalogs.metrics.len()
    );

    let mut results: Vec<RowResult> = Vec::new();
    for (idx, row) in table.rows.iter().enumerate() {
        // Row 1 is the header row, so the first data row is row 2. This
        // keeps messages directly actionable against the source file.
        let row_number = idx + 2;
        let res = match validate_row(row, &cols, catalogs, opts) {
            Ok(record) => RowResult {
                row_number,
                status: RowStatus::Valid,
                message: None,
                data: Some(record),
            },
            Err(message) => {
                debug!("row {}: {}", row_number, message);
                RowResult {
                    row_number,
                    status: RowStatus::Error,
                    message: Some(message),
                    data: None,
                }
            }
        };
        results.push(res);
    }
    Ok(results)
}

fn cell_at<'a>(row: &'a RawRow, idx: Option<usize>) -> Option<&'a str> {
    idx.map(|i| row.cell(i))
}

// One pass per row, stopping at the first failing step. The step order
// matters: region resolution depends on the resolved division, and the
// value derivation depends on the resolved metric's data type.
fn validate_row(
    row: &RawRow,
    cols: &ColumnIndexes,
    catalogs: &Catalogs,
    opts: &ImportOptions,
) -> Result<CanonicalRecord, String> {
    // 1. The metric drives everything else.
    let metric_text = row.cell(cols.metric);
    let metric_id = resolve_entity(metric_text, &catalogs.metrics)
        .ok_or_else(|| format!("Unknown metric '{}'", metric_text.trim()))?;
    let metric = catalogs
        .metrics
        .iter()
        .find(|m| m.id == metric_id)
        .ok_or_else(|| format!("Unknown metric '{}'", metric_text.trim()))?;

    // 2. The department comes from the metric, never from the file.
    let department_id = metric.department_id.ok_or_else(|| {
        format!("could not resolve department for metric '{}'", metric.name)
    })?;

    // 3. Value, directly or from the ratio columns.
    let ratio_columns_mapped = cols.numerator.is_some() && cols.denominator.is_some();
    let derived = derive_value(
        metric.data_type,
        metric.rate_multiplier,
        cell_at(row, cols.numerator),
        cell_at(row, cols.denominator),
        cell_at(row, cols.value),
        ratio_columns_mapped,
    )
    .map_err(|e| e.to_string())?;

    // 4. Period.
    let period_text = row.cell(cols.period);
    let period_start = parse_period(period_text).ok_or_else(|| {
        format!(
            "Invalid date '{}' (accepted formats: YYYY-MM, YYYY-MM-DD, M/YYYY, M/D/YYYY)",
            period_text.trim()
        )
    })?;

    // 5. Division is an optional dimension; unresolved text means "no
    // division", not an error.
    let division_id = match opts.fixed_division_id {
        Some(id) => Some(id),
        None => cell_at(row, cols.division)
            .and_then(|text| resolve_entity(text, &catalogs.divisions)),
    };

    // 6. Region, narrowed to the resolved division's regions.
    let region_id = cell_at(row, cols.region)
        .and_then(|text| resolve_region(text, &catalogs.regions, division_id));

    // 7. Notes pass through verbatim.
    let notes = cell_at(row, cols.notes)
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.to_string());

    Ok(CanonicalRecord {
        metric_id,
        department_id,
        division_id,
        region_id,
        period_type: opts.period_type,
        period_start,
        value: derived.value,
        numerator: derived.numerator,
        denominator: derived.denominator,
        notes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn catalogs() -> Catalogs {
        Catalogs {
            metrics: vec![
                MetricDef {
                    id: 1,
                    name: "Total Calls".to_string(),
                    slug: None,
                    data_type: MetricDataType::Continuous,
                    rate_multiplier: None,
                    numerator_label: None,
                    denominator_label: None,
                    department_id: Some(7),
                },
                MetricDef {
                    id: 2,
                    name: "Compliance Rate".to_string(),
                    slug: Some("compliance-rate".to_string()),
                    data_type: MetricDataType::Proportion,
                    rate_multiplier: None,
                    numerator_label: None,
                    denominator_label: None,
                    department_id: Some(7),
                },
                MetricDef {
                    id: 3,
                    name: "Adverse Events".to_string(),
                    slug: None,
                    data_type: MetricDataType::Rate,
                    rate_multiplier: Some(1000.0),
                    numerator_label: Some("Events".to_string()),
                    denominator_label: Some("Patient Days".to_string()),
                    department_id: Some(7),
                },
                MetricDef {
                    id: 4,
                    name: "Orphan Metric".to_string(),
                    slug: None,
                    data_type: MetricDataType::Continuous,
                    rate_multiplier: None,
                    numerator_label: None,
                    denominator_label: None,
                    department_id: None,
                },
            ],
            divisions: vec![Division {
                id: 1,
                name: "Air Care".to_string(),
                slug: None,
            }],
            regions: vec![Region {
                id: 10,
                name: "North".to_string(),
                slug: None,
                division_id: 1,
            }],
            departments: vec![Department {
                id: 7,
                name: "Clinical QA".to_string(),
                slug: None,
            }],
        }
    }

    fn table(headers: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable {
            headers: headers.iter().map(|s| s.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| RawRow(r.iter().map(|s| s.to_string()).collect()))
                .collect(),
        }
    }

    fn opts() -> ImportOptions {
        ImportOptions {
            period_type: PeriodType::Monthly,
            fixed_division_id: None,
        }
    }

    fn run(t: &RawTable) -> Vec<RowResult> {
        let mapping = ColumnMapping::infer(&t.headers);
        validate_table(t, &mapping, &catalogs(), &opts()).unwrap()
    }

    #[test]
    fn continuous_row_validates_end_to_end() {
        let t = table(
            &["Metric", "Period", "Value", "Division"],
            &[&["Total Calls", "2025-01", "1523", "Air Care"]],
        );
        let res = run(&t);
        assert_eq!(res.len(), 1);
        assert_eq!(res[0].status, RowStatus::Valid);
        assert_eq!(res[0].row_number, 2);
        let data = res[0].data.as_ref().unwrap();
        assert_eq!(data.metric_id, 1);
        assert_eq!(data.department_id, 7);
        assert_eq!(data.value, 1523.0);
        assert_eq!(data.period_start, d(2025, 1, 1));
        assert_eq!(data.division_id, Some(1));
    }

    #[test]
    fn proportion_row_derives_value_from_ratio() {
        let t = table(
            &["Metric", "Period", "Value", "Numerator", "Denominator"],
            &[&["Compliance Rate", "2025-01", "", "45", "50"]],
        );
        let res = run(&t);
        assert_eq!(res[0].status, RowStatus::Valid);
        let data = res[0].data.as_ref().unwrap();
        assert_eq!(data.value, 0.9);
        assert_eq!(data.numerator, Some(45.0));
        assert_eq!(data.denominator, Some(50.0));
    }

    #[test]
    fn unknown_metric_is_a_row_error() {
        let t = table(
            &["Metric", "Period", "Value"],
            &[&["Unknown Thing", "2025-01", "5"]],
        );
        let res = run(&t);
        assert_eq!(res[0].status, RowStatus::Error);
        assert!(res[0]
            .message
            .as_ref()
            .unwrap()
            .contains("Unknown metric"));
        assert_eq!(res[0].data, None);
    }

    #[test]
    fn metric_without_department_is_a_catalog_integrity_error() {
        let t = table(
            &["Metric", "Period", "Value"],
            &[&["Orphan Metric", "2025-01", "5"]],
        );
        let res = run(&t);
        assert_eq!(res[0].status, RowStatus::Error);
        assert!(res[0]
            .message
            .as_ref()
            .unwrap()
            .contains("could not resolve department"));
    }

    #[test]
    fn bad_date_reports_accepted_formats() {
        let t = table(
            &["Metric", "Period", "Value"],
            &[&["Total Calls", "sometime", "5"]],
        );
        let res = run(&t);
        assert_eq!(res[0].status, RowStatus::Error);
        let msg = res[0].message.as_ref().unwrap();
        assert!(msg.contains("Invalid date"));
        assert!(msg.contains("YYYY-MM"));
    }

    #[test]
    fn one_bad_row_does_not_affect_its_neighbors() {
        let t = table(
            &["Metric", "Period", "Value"],
            &[
                &["Total Calls", "2025-01", "10"],
                &["Total Calls", "2025-01", "oops"],
                &["Total Calls", "2025-02", "20"],
            ],
        );
        let res = run(&t);
        assert_eq!(res[0].status, RowStatus::Valid);
        assert_eq!(res[1].status, RowStatus::Error);
        assert_eq!(res[1].row_number, 3);
        assert_eq!(res[2].status, RowStatus::Valid);
        assert_eq!(res[2].data.as_ref().unwrap().period_start, d(2025, 2, 1));
    }

    #[test]
    fn unresolved_division_text_is_tolerated() {
        let t = table(
            &["Metric", "Period", "Value", "Division"],
            &[&["Total Calls", "2025-01", "5", "Atlantis"]],
        );
        let res = run(&t);
        assert_eq!(res[0].status, RowStatus::Valid);
        assert_eq!(res[0].data.as_ref().unwrap().division_id, None);
    }

    #[test]
    fn fixed_division_override_applies_to_every_row() {
        let t = table(
            &["Metric", "Period", "Value"],
            &[&["Total Calls", "2025-01", "5"]],
        );
        let mapping = ColumnMapping::infer(&t.headers);
        let o = ImportOptions {
            period_type: PeriodType::Monthly,
            fixed_division_id: Some(1),
        };
        let res = validate_table(&t, &mapping, &catalogs(), &o).unwrap();
        assert_eq!(res[0].data.as_ref().unwrap().division_id, Some(1));
    }

    #[test]
    fn ragged_rows_read_missing_cells_as_blank() {
        let t = table(
            &["Metric", "Period", "Value", "Notes"],
            &[&["Total Calls", "2025-01", "5"]],
        );
        let res = run(&t);
        assert_eq!(res[0].status, RowStatus::Valid);
        assert_eq!(res[0].data.as_ref().unwrap().notes, None);
    }

    #[test]
    fn missing_required_mapping_aborts_the_run() {
        let t = table(&["Metric", "Value"], &[&["Total Calls", "5"]]);
        let mapping = ColumnMapping::infer(&t.headers);
        let res = validate_table(&t, &mapping, &catalogs(), &opts());
        assert_eq!(
            res,
            Err(ImportError::MissingRequiredMapping("period".to_string()))
        );
    }

    #[test]
    fn too_many_rows_aborts_before_any_row_runs() {
        let row: Vec<String> = vec!["Total Calls".to_string(), "2025-01".to_string(), "5".to_string()];
        let t = RawTable {
            headers: vec!["Metric".to_string(), "Period".to_string(), "Value".to_string()],
            rows: (0..MAX_ROWS + 1).map(|_| RawRow(row.clone())).collect(),
        };
        let mapping = ColumnMapping::infer(&t.headers);
        let res = validate_table(&t, &mapping, &catalogs(), &opts());
        assert_eq!(res, Err(ImportError::TooManyRows(MAX_ROWS + 1)));
    }

    #[test]
    fn validation_is_a_pure_function_of_its_inputs() {
        let t = table(
            &["Metric", "Period", "Value", "Division", "Notes"],
            &[
                &["Total Calls", "2025-01", "1,523", "Air Care", "ok"],
                &["Bad", "2025-01", "1", "", ""],
            ],
        );
        let mapping = ColumnMapping::infer(&t.headers);
        let a = validate_table(&t, &mapping, &catalogs(), &opts()).unwrap();
        let b = validate_table(&t, &mapping, &catalogs(), &opts()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn template_round_trips_through_the_pipeline() {
        let req = TemplateRequest {
            metric_ids: vec![1, 2, 3],
            division_id: None,
            department_id: None,
            period_type: PeriodType::Monthly,
            start: Some(d(2025, 1, 1)),
            end: Some(d(2025, 2, 1)),
            expand_by_scope: false,
        };
        let cats = catalogs();
        let mut t = generate_template(&req, &cats, &[]);

        // Every column the generator emits must auto-map.
        let mapping = ColumnMapping::infer(&t.headers);
        for field in [
            CanonicalField::Metric,
            CanonicalField::Period,
            CanonicalField::Value,
            CanonicalField::Numerator,
            CanonicalField::Denominator,
            CanonicalField::Division,
            CanonicalField::Department,
            CanonicalField::Notes,
        ] {
            assert!(
                mapping.header(field).is_some(),
                "field {:?} did not auto-map against {:?}",
                field,
                t.headers
            );
        }

        // Fill in the blanks the way a user would and validate.
        for row in t.rows.iter_mut() {
            if row.cell(0) == "Total Calls" {
                row.0[2] = "12".to_string();
            } else {
                row.0[3] = "45".to_string();
                row.0[4] = "50".to_string();
            }
        }
        let res = validate_table(&t, &mapping, &cats, &opts()).unwrap();
        assert!(res.iter().all(|r| r.status == RowStatus::Valid));
    }
}
