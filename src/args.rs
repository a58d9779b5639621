use clap::Parser;

/// Checks quality-metric spreadsheet exports against the reference catalogs
/// and generates blank import templates.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path) The JSON file holding the reference catalogs: metrics,
    /// divisions, regions, departments and the metric-to-scope associations.
    #[clap(short, long, value_parser)]
    pub catalogs: String,

    /// (file path) The tabular file to validate. CSV, TSV and xlsx are
    /// supported; the extension decides the reader. Omit this option when
    /// generating a template.
    #[clap(short, long, value_parser)]
    pub input: Option<String>,

    /// (file path or empty) Where to write the validation report (JSON) or
    /// the generated template (CSV). Defaults to the standard output.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (default monthly) The reporting cadence of the imported periods:
    /// daily, weekly, bi-weekly, monthly, quarterly or annual.
    #[clap(long, value_parser)]
    pub period_type: Option<String>,

    /// (repeatable) Overrides one inferred column mapping, written as
    /// field=Header, e.g. --map "metric=QI Measure Name". An empty header
    /// unmaps the field.
    #[clap(long = "map", value_parser)]
    pub map_overrides: Vec<String>,

    /// (name or empty) Scope every imported row to this division,
    /// overriding the division column of the file.
    #[clap(long, value_parser)]
    pub division: Option<String>,

    /// (comma-separated metric names) If specified, a blank template is
    /// generated for these metrics instead of validating an input file.
    #[clap(long, value_parser)]
    pub template: Option<String>,

    /// (period, template mode) The first period of the template, e.g. 2025-01.
    #[clap(long, value_parser)]
    pub start: Option<String>,

    /// (period, template mode) The last period of the template, inclusive.
    #[clap(long, value_parser)]
    pub end: Option<String>,

    /// (template mode) Emit one row per division/region the metric is
    /// associated with instead of a single unscoped row.
    #[clap(long, takes_value = false)]
    pub expand_scope: bool,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
