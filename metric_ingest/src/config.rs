// ********* Input data structures ***********

use std::error::Error;
use std::fmt::Display;

use chrono::NaiveDate;

/// Identifier of a reference entity (metric, division, region, department).
/// These are opaque to the pipeline: they come from the reference catalogs
/// and are carried through to the validated records unchanged.
pub type EntityId = i64;

/// Hard cap on the number of data rows a single run will accept.
/// Enforced as a precondition before any row is inspected.
pub const MAX_ROWS: usize = 10_000;
/// Hard cap on the input file size in bytes. Enforced by the caller
/// before the table is even parsed.
pub const MAX_FILE_BYTES: u64 = 5 * 1024 * 1024;

/// How a metric's value is computed.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum MetricDataType {
    /// A plain number, entered directly.
    Continuous,
    /// A ratio of two counts, in [0, 1].
    Proportion,
    /// A ratio scaled by a configured multiplier (e.g. events per 1000).
    Rate,
}

/// The reporting cadence of a period. Drives period expansion in the
/// template generator and is stamped on every validated record.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum PeriodType {
    Daily,
    Weekly,
    BiWeekly,
    Monthly,
    Quarterly,
    Annual,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Division {
    pub id: EntityId,
    pub name: String,
    pub slug: Option<String>,
}

/// A region always belongs to exactly one division.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Region {
    pub id: EntityId,
    pub name: String,
    pub slug: Option<String>,
    pub division_id: EntityId,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Department {
    pub id: EntityId,
    pub name: String,
    pub slug: Option<String>,
}

/// Reference description of a measurable quantity.
#[derive(PartialEq, Debug, Clone)]
pub struct MetricDef {
    pub id: EntityId,
    pub name: String,
    pub slug: Option<String>,
    pub data_type: MetricDataType,
    /// Only meaningful for `Rate` metrics.
    pub rate_multiplier: Option<f64>,
    /// Display label for the numerator column in templates.
    pub numerator_label: Option<String>,
    /// Display label for the denominator column in templates.
    pub denominator_label: Option<String>,
    /// The owning department. Derived from the metric, never read from the
    /// imported file. `None` is a catalog integrity problem and fails the row.
    pub department_id: Option<EntityId>,
}

/// One row of the metric-to-scope association table. Used only by the
/// template generator's scope expansion.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ScopeAssociation {
    pub metric_id: EntityId,
    pub division_id: Option<EntityId>,
    pub region_id: Option<EntityId>,
}

/// The read-only reference catalogs, fetched by the caller before the
/// pipeline is invoked.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct Catalogs {
    pub metrics: Vec<MetricDef>,
    pub divisions: Vec<Division>,
    pub regions: Vec<Region>,
    pub departments: Vec<Department>,
}

/// One parsed data row: an ordered list of string cells. May be shorter
/// than the header row when the source file is ragged.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct RawRow(pub Vec<String>);

impl RawRow {
    /// Cell at the given column, or the empty string for cells beyond the
    /// end of a ragged row.
    pub fn cell(&self, idx: usize) -> &str {
        self.0.get(idx).map(|s| s.as_str()).unwrap_or("")
    }
}

/// An already-parsed tabular file: headers plus data rows. Immutable once
/// constructed.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

// ******** Output data structures *********

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum RowStatus {
    Valid,
    Warning,
    Error,
}

/// A fully validated, strongly-typed metric record, ready for the import
/// executor.
#[derive(PartialEq, Debug, Clone)]
pub struct CanonicalRecord {
    pub metric_id: EntityId,
    pub department_id: EntityId,
    pub division_id: Option<EntityId>,
    pub region_id: Option<EntityId>,
    pub period_type: PeriodType,
    pub period_start: NaiveDate,
    pub value: f64,
    pub numerator: Option<f64>,
    pub denominator: Option<f64>,
    pub notes: Option<String>,
}

/// The classified outcome of validating one input row.
///
/// `data` is populated if and only if `status` is `Valid`.
#[derive(PartialEq, Debug, Clone)]
pub struct RowResult {
    /// 1-indexed position in the original file; the first data row is 2
    /// because row 1 holds the headers.
    pub row_number: usize,
    pub status: RowStatus,
    pub message: Option<String>,
    pub data: Option<CanonicalRecord>,
}

/// Request for a blank template, constructed from user selections.
#[derive(PartialEq, Debug, Clone)]
pub struct TemplateRequest {
    pub metric_ids: Vec<EntityId>,
    pub division_id: Option<EntityId>,
    pub department_id: Option<EntityId>,
    pub period_type: PeriodType,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub expand_by_scope: bool,
}

/// Errors that abort a whole run before any row is processed. Per-row data
/// problems are never represented here; they become `RowResult`s.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum ImportError {
    /// A required canonical field has no column mapping.
    MissingRequiredMapping(String),
    /// The table exceeds `MAX_ROWS` data rows.
    TooManyRows(usize),
}

impl Error for ImportError {}

impl Display for ImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportError::MissingRequiredMapping(what) => {
                write!(f, "missing required column mapping: {}", what)
            }
            ImportError::TooManyRows(n) => {
                write!(f, "too many rows: {} (maximum {})", n, MAX_ROWS)
            }
        }
    }
}
