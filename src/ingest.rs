use log::{debug, info};

use metric_ingest::*;
use snafu::{prelude::*, Snafu};

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::json;
use serde_json::Value as JSValue;

use crate::args::Args;
use crate::ingest::catalog_reader::*;

pub mod io_csv;
pub mod io_excel;

#[derive(Debug, Snafu)]
pub enum IngestError {
    #[snafu(display("Error opening file {path}"))]
    OpeningCsv { source: csv::Error, path: String },
    #[snafu(display("Error reading a line of {path}"))]
    CsvLineParse { source: csv::Error, path: String },
    #[snafu(display("Error opening file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("No worksheet found in {path}"))]
    EmptyExcel { path: String },
    #[snafu(display("Error opening the catalog file"))]
    OpeningJson { source: std::io::Error },
    #[snafu(display("Error opening input file {path}"))]
    OpeningInput { source: std::io::Error, path: String },
    #[snafu(display("Error parsing the catalog file"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Input file is {size} bytes, over the {limit} byte limit"))]
    FileTooLarge { size: u64, limit: u64 },
    #[snafu(display("{source}"))]
    Pipeline { source: ImportError },
    #[snafu(display("Error writing output"))]
    WritingOutput { source: std::io::Error },
    #[snafu(display("Error writing the template file"))]
    WritingCsv { source: csv::Error },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type IngestResult<T> = Result<T, IngestError>;

pub mod catalog_reader {
    use crate::ingest::*;

    #[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct MetricEntry {
        pub id: EntityId,
        pub name: String,
        pub slug: Option<String>,
        #[serde(rename = "dataType")]
        pub data_type: String,
        #[serde(rename = "rateMultiplier")]
        pub rate_multiplier: Option<f64>,
        #[serde(rename = "numeratorLabel")]
        pub numerator_label: Option<String>,
        #[serde(rename = "denominatorLabel")]
        pub denominator_label: Option<String>,
        #[serde(rename = "departmentId")]
        pub department_id: Option<EntityId>,
    }

    #[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct DivisionEntry {
        pub id: EntityId,
        pub name: String,
        pub slug: Option<String>,
    }

    #[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct RegionEntry {
        pub id: EntityId,
        pub name: String,
        pub slug: Option<String>,
        #[serde(rename = "divisionId")]
        pub division_id: EntityId,
    }

    #[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct DepartmentEntry {
        pub id: EntityId,
        pub name: String,
        pub slug: Option<String>,
    }

    #[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct ScopeEntry {
        #[serde(rename = "metricId")]
        pub metric_id: EntityId,
        #[serde(rename = "divisionId")]
        pub division_id: Option<EntityId>,
        #[serde(rename = "regionId")]
        pub region_id: Option<EntityId>,
    }

    #[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct CatalogFile {
        pub metrics: Vec<MetricEntry>,
        pub divisions: Vec<DivisionEntry>,
        pub regions: Vec<RegionEntry>,
        #[serde(default)]
        pub departments: Vec<DepartmentEntry>,
        #[serde(rename = "metricScopes", default)]
        pub metric_scopes: Vec<ScopeEntry>,
    }

    pub fn read_catalog_file(path: &str) -> IngestResult<CatalogFile> {
        let contents = fs::read_to_string(path).context(OpeningJsonSnafu {})?;
        let cf: CatalogFile =
            serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
        debug!("read_catalog_file: {} metrics", cf.metrics.len());
        Ok(cf)
    }

    fn data_type(s: &str) -> IngestResult<MetricDataType> {
        match s {
            "continuous" => Ok(MetricDataType::Continuous),
            "proportion" => Ok(MetricDataType::Proportion),
            "rate" => Ok(MetricDataType::Rate),
            x => whatever!("Unknown metric data type {:?}", x),
        }
    }

    pub fn to_catalogs(cf: &CatalogFile) -> IngestResult<Catalogs> {
        let mut metrics: Vec<MetricDef> = Vec::new();
        for m in cf.metrics.iter() {
            metrics.push(MetricDef {
                id: m.id,
                name: m.name.clone(),
                slug: match m.slug.clone() {
                    Some(x) if x.is_empty() => None,
                    x => x,
                },
                data_type: data_type(m.data_type.as_str())?,
                rate_multiplier: m.rate_multiplier,
                numerator_label: m.numerator_label.clone(),
                denominator_label: m.denominator_label.clone(),
                department_id: m.department_id,
            });
        }
        Ok(Catalogs {
            metrics,
            divisions: cf
                .divisions
                .iter()
                .map(|d| Division {
                    id: d.id,
                    name: d.name.clone(),
                    slug: d.slug.clone(),
                })
                .collect(),
            regions: cf
                .regions
                .iter()
                .map(|r| Region {
                    id: r.id,
                    name: r.name.clone(),
                    slug: r.slug.clone(),
                    division_id: r.division_id,
                })
                .collect(),
            departments: cf
                .departments
                .iter()
                .map(|d| Department {
                    id: d.id,
                    name: d.name.clone(),
                    slug: d.slug.clone(),
                })
                .collect(),
        })
    }

    pub fn to_scope_associations(cf: &CatalogFile) -> Vec<ScopeAssociation> {
        cf.metric_scopes
            .iter()
            .map(|s| ScopeAssociation {
                metric_id: s.metric_id,
                division_id: s.division_id,
                region_id: s.region_id,
            })
            .collect()
    }
}

fn parse_period_type(s: &Option<String>) -> IngestResult<PeriodType> {
    match s.as_deref() {
        None | Some("monthly") => Ok(PeriodType::Monthly),
        Some("daily") => Ok(PeriodType::Daily),
        Some("weekly") => Ok(PeriodType::Weekly),
        Some("bi-weekly" | "biweekly") => Ok(PeriodType::BiWeekly),
        Some("quarterly") => Ok(PeriodType::Quarterly),
        Some("annual") => Ok(PeriodType::Annual),
        Some(x) => whatever!("Unknown period type {:?}", x),
    }
}

fn read_table(path: &str) -> IngestResult<RawTable> {
    let size = fs::metadata(path)
        .context(OpeningInputSnafu { path })?
        .len();
    if size > MAX_FILE_BYTES {
        return Err(IngestError::FileTooLarge {
            size,
            limit: MAX_FILE_BYTES,
        });
    }
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    match ext.as_str() {
        "xlsx" => io_excel::read_excel_table(path),
        "tsv" | "txt" => io_csv::read_delimited_table(path, b'\t'),
        _ => io_csv::read_delimited_table(path, b','),
    }
}

/// Applies `--map field=Header` overrides on top of the inferred mapping.
fn apply_overrides(mapping: &mut ColumnMapping, overrides: &[String]) -> IngestResult<()> {
    for ov in overrides {
        let (field_s, header) = match ov.split_once('=') {
            Some(x) => x,
            None => whatever!("Bad --map value {:?}, expected field=Header", ov),
        };
        let field = match CanonicalField::from_key(field_s) {
            Some(f) => f,
            None => whatever!("Unknown canonical field {:?}", field_s),
        };
        mapping.set(field, header);
    }
    Ok(())
}

fn status_str(s: RowStatus) -> &'static str {
    match s {
        RowStatus::Valid => "valid",
        RowStatus::Warning => "warning",
        RowStatus::Error => "error",
    }
}

fn report_to_json(mapping: &ColumnMapping, results: &[RowResult]) -> JSValue {
    let valid = results.iter().filter(|r| r.status == RowStatus::Valid).count();
    let errors = results.iter().filter(|r| r.status == RowStatus::Error).count();
    let rows: Vec<JSValue> = results
        .iter()
        .map(|r| {
            let mut js = json!({
                "rowNumber": r.row_number,
                "status": status_str(r.status),
            });
            if let Some(msg) = &r.message {
                js["message"] = json!(msg);
            }
            if let Some(data) = &r.data {
                js["data"] = json!({
                    "metricId": data.metric_id,
                    "departmentId": data.department_id,
                    "divisionId": data.division_id,
                    "regionId": data.region_id,
                    "periodStart": data.period_start.format("%Y-%m-%d").to_string(),
                    "value": data.value,
                    "numerator": data.numerator,
                    "denominator": data.denominator,
                    "notes": data.notes,
                });
            }
            js
        })
        .collect();
    let mut mapping_js = serde_json::Map::new();
    for field in CanonicalField::ALL {
        if let Some(h) = mapping.header(field) {
            mapping_js.insert(field.key().to_string(), json!(h));
        }
    }
    json!({
        "summary": {
            "total": results.len(),
            "valid": valid,
            "warning": results.len() - valid - errors,
            "error": errors,
        },
        "mapping": mapping_js,
        "rows": rows,
    })
}

fn write_output(out: &Option<String>, contents: &str) -> IngestResult<()> {
    match out {
        Some(path) => fs::write(path, contents).context(WritingOutputSnafu {}),
        None => {
            println!("{}", contents);
            Ok(())
        }
    }
}

/// Validation flow: read catalogs and the input table, infer the column
/// mapping, run the pipeline, emit the JSON report.
pub fn run_check(args: &Args) -> IngestResult<()> {
    let input = match &args.input {
        Some(p) => p.clone(),
        None => whatever!("No input file given (use --input, or --template to generate one)"),
    };
    let cf = read_catalog_file(&args.catalogs)?;
    let catalogs = to_catalogs(&cf)?;
    let table = read_table(&input)?;
    info!(
        "run_check: {} with {} data rows",
        input,
        table.rows.len()
    );

    let mut mapping = ColumnMapping::infer(&table.headers);
    apply_overrides(&mut mapping, &args.map_overrides)?;

    let fixed_division_id = match &args.division {
        Some(name) => match metric_ingest::resolve::resolve_entity(name, &catalogs.divisions) {
            Some(id) => Some(id),
            None => whatever!("Unknown division {:?}", name),
        },
        None => None,
    };
    let opts = ImportOptions {
        period_type: parse_period_type(&args.period_type)?,
        fixed_division_id,
    };

    let results = validate_table(&table, &mapping, &catalogs, &opts).context(PipelineSnafu {})?;
    let report = report_to_json(&mapping, &results);
    let pretty = serde_json::to_string_pretty(&report).context(ParsingJsonSnafu {})?;
    write_output(&args.out, &pretty)
}

/// Template flow: resolve the requested metrics and write a blank CSV whose
/// columns round-trip through the validation pipeline.
pub fn run_template(args: &Args) -> IngestResult<()> {
    let cf = read_catalog_file(&args.catalogs)?;
    let catalogs = to_catalogs(&cf)?;
    let associations = to_scope_associations(&cf);

    let selection = args.template.clone().unwrap_or_default();
    let mut metric_ids: Vec<EntityId> = Vec::new();
    for name in selection.split(',').map(|s| s.trim()).filter(|s| !s.is_empty()) {
        match metric_ingest::resolve::resolve_entity(name, &catalogs.metrics) {
            Some(id) => metric_ids.push(id),
            None => whatever!("Unknown metric {:?}", name),
        }
    }
    if metric_ids.is_empty() {
        whatever!("No metrics selected for the template");
    }

    let division_id = match &args.division {
        Some(name) => match metric_ingest::resolve::resolve_entity(name, &catalogs.divisions) {
            Some(id) => Some(id),
            None => whatever!("Unknown division {:?}", name),
        },
        None => None,
    };

    let start = match &args.start {
        Some(s) => match periods::parse_period(s) {
            Some(d) => Some(d),
            None => whatever!("Could not parse start period {:?}", s),
        },
        None => None,
    };
    let end = match &args.end {
        Some(s) => match periods::parse_period(s) {
            Some(d) => Some(d),
            None => whatever!("Could not parse end period {:?}", s),
        },
        None => None,
    };

    let req = TemplateRequest {
        metric_ids,
        division_id,
        department_id: None,
        period_type: parse_period_type(&args.period_type)?,
        start,
        end,
        expand_by_scope: args.expand_scope,
    };
    let table = generate_template(&req, &catalogs, &associations);
    info!("run_template: {} rows generated", table.rows.len());

    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(&table.headers).context(WritingCsvSnafu {})?;
    for row in table.rows.iter() {
        wtr.write_record(&row.0).context(WritingCsvSnafu {})?;
    }
    let bytes = match wtr.into_inner() {
        Ok(b) => b,
        Err(e) => whatever!("Could not flush the template: {:?}", e),
    };
    let contents = match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => whatever!("Template is not valid UTF-8: {:?}", e),
    };
    write_output(&args.out, &contents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_file_converts_to_catalogs() {
        let raw = r#"{
            "metrics": [
                {"id": 1, "name": "Total Calls", "slug": "", "dataType": "continuous",
                 "rateMultiplier": null, "numeratorLabel": null, "denominatorLabel": null,
                 "departmentId": 7},
                {"id": 2, "name": "Adverse Events", "slug": "adverse-events", "dataType": "rate",
                 "rateMultiplier": 1000, "numeratorLabel": "Events", "denominatorLabel": "Patient Days",
                 "departmentId": 7}
            ],
            "divisions": [{"id": 1, "name": "Air Care", "slug": null}],
            "regions": [{"id": 10, "name": "North", "slug": null, "divisionId": 1}],
            "departments": [{"id": 7, "name": "Clinical QA", "slug": null}],
            "metricScopes": [{"metricId": 2, "divisionId": 1, "regionId": null}]
        }"#;
        let cf: CatalogFile = serde_json::from_str(raw).unwrap();
        let catalogs = to_catalogs(&cf).unwrap();
        assert_eq!(catalogs.metrics.len(), 2);
        // empty slugs are dropped
        assert_eq!(catalogs.metrics[0].slug, None);
        assert_eq!(catalogs.metrics[1].data_type, MetricDataType::Rate);
        assert_eq!(catalogs.metrics[1].rate_multiplier, Some(1000.0));
        let assocs = to_scope_associations(&cf);
        assert_eq!(assocs.len(), 1);
        assert_eq!(assocs[0].division_id, Some(1));
    }

    #[test]
    fn unknown_data_type_is_rejected() {
        let cf = CatalogFile {
            metrics: vec![MetricEntry {
                id: 1,
                name: "X".to_string(),
                slug: None,
                data_type: "mystery".to_string(),
                rate_multiplier: None,
                numerator_label: None,
                denominator_label: None,
                department_id: None,
            }],
            divisions: vec![],
            regions: vec![],
            departments: vec![],
            metric_scopes: vec![],
        };
        assert!(to_catalogs(&cf).is_err());
    }

    #[test]
    fn map_overrides_are_parsed() {
        let headers = vec!["A".to_string(), "B".to_string()];
        let mut mapping = ColumnMapping::infer(&headers);
        apply_overrides(
            &mut mapping,
            &["metric=A".to_string(), "period=B".to_string()],
        )
        .unwrap();
        assert_eq!(mapping.header(CanonicalField::Metric), Some("A"));
        assert_eq!(mapping.header(CanonicalField::Period), Some("B"));
        assert!(apply_overrides(&mut mapping, &["bogus".to_string()]).is_err());
        assert!(apply_overrides(&mut mapping, &["nope=A".to_string()]).is_err());
    }

    #[test]
    fn period_type_flag_values() {
        assert_eq!(parse_period_type(&None).unwrap(), PeriodType::Monthly);
        assert_eq!(
            parse_period_type(&Some("quarterly".to_string())).unwrap(),
            PeriodType::Quarterly
        );
        assert_eq!(
            parse_period_type(&Some("bi-weekly".to_string())).unwrap(),
            PeriodType::BiWeekly
        );
        assert!(parse_period_type(&Some("fortnightly".to_string())).is_err());
    }
}
