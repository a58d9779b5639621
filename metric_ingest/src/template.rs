// Template generation: the inverse of the validation pipeline.

use log::debug;

use crate::config::{
    Catalogs, EntityId, MetricDataType, MetricDef, RawRow, RawTable, ScopeAssociation,
    TemplateRequest,
};
use crate::periods::{expand_periods, format_period};

// Labels used when a ratio metric has no configured column labels.
const PROPORTION_LABELS: (&str, &str) = ("Compliant", "Total");
const RATE_LABELS: (&str, &str) = ("Events", "Exposure");

fn is_ratio(m: &MetricDef) -> bool {
    matches!(
        m.data_type,
        MetricDataType::Proportion | MetricDataType::Rate
    )
}

fn ratio_labels(m: &MetricDef) -> (String, String) {
    let defaults = match m.data_type {
        MetricDataType::Rate => RATE_LABELS,
        _ => PROPORTION_LABELS,
    };
    (
        m.numerator_label.clone().unwrap_or_else(|| defaults.0.to_string()),
        m.denominator_label.clone().unwrap_or_else(|| defaults.1.to_string()),
    )
}

/// The numerator/denominator header labels shared by the selected metrics,
/// or `None` when the ratio metrics disagree: one header cannot show two
/// labels, so the caller falls back to the bare generic pair.
fn shared_ratio_labels(metrics: &[&MetricDef]) -> Option<(String, String)> {
    let mut labels: Option<(String, String)> = None;
    for m in metrics.iter().filter(|m| is_ratio(m)) {
        let l = ratio_labels(m);
        match &labels {
            None => labels = Some(l),
            Some(prev) if *prev == l => {}
            Some(_) => return None,
        }
    }
    labels
}

fn division_name(catalogs: &Catalogs, id: EntityId) -> String {
    catalogs
        .divisions
        .iter()
        .find(|d| d.id == id)
        .map(|d| d.name.clone())
        .unwrap_or_default()
}

fn department_name(catalogs: &Catalogs, id: Option<EntityId>) -> String {
    id.and_then(|did| {
        catalogs
            .departments
            .iter()
            .find(|d| d.id == did)
            .map(|d| d.name.clone())
    })
    .unwrap_or_default()
}

/// The organizational rows to emit for one metric: `(division display name)`
/// per expansion entry, or a single unscoped entry.
fn scope_rows(
    metric: &MetricDef,
    req: &TemplateRequest,
    catalogs: &Catalogs,
    associations: &[ScopeAssociation],
) -> Vec<String> {
    if !req.expand_by_scope {
        return vec!["".to_string()];
    }
    let assocs: Vec<&ScopeAssociation> = associations
        .iter()
        .filter(|a| a.metric_id == metric.id)
        .collect();

    // Regions first: each associated region becomes a row displayed under
    // its parent division. Division-only associations come next. A metric
    // with no associations stays unscoped.
    let mut entries: Vec<(Option<EntityId>, String)> = Vec::new();
    let region_ids: Vec<EntityId> = assocs.iter().filter_map(|a| a.region_id).collect();
    if !region_ids.is_empty() {
        for rid in region_ids {
            if let Some(region) = catalogs.regions.iter().find(|r| r.id == rid) {
                entries.push((
                    Some(region.division_id),
                    division_name(catalogs, region.division_id),
                ));
            }
        }
    } else {
        let division_ids: Vec<EntityId> = assocs.iter().filter_map(|a| a.division_id).collect();
        for did in division_ids {
            entries.push((Some(did), division_name(catalogs, did)));
        }
    }
    if entries.is_empty() {
        return vec!["".to_string()];
    }

    // Restrict to the division selected in the request, when there is one.
    let filtered: Vec<String> = entries
        .into_iter()
        .filter(|(did, _)| match req.division_id {
            Some(want) => *did == Some(want),
            None => true,
        })
        .map(|(_, name)| name)
        .collect();
    filtered
}

/// Generates a blank table for the requested metrics, periods and scope.
///
/// The emitted headers are chosen so that header inference maps every
/// column back without human help when the filled-in file is re-uploaded;
/// changing a label here requires checking the synonym tables in
/// `headers.rs`.
pub fn generate_template(
    req: &TemplateRequest,
    catalogs: &Catalogs,
    associations: &[ScopeAssociation],
) -> RawTable {
    let metrics: Vec<&MetricDef> = req
        .metric_ids
        .iter()
        .filter_map(|id| catalogs.metrics.iter().find(|m| m.id == *id))
        .filter(|m| match req.department_id {
            Some(want) => m.department_id == Some(want),
            None => true,
        })
        .collect();
    debug!(
        "generate_template: {} metrics selected, period_type {:?}",
        metrics.len(),
        req.period_type
    );

    let any_ratio = metrics.iter().any(|m| is_ratio(m));
    let mut headers: Vec<String> = vec!["Metric".to_string(), "Period".to_string(), "Value".to_string()];
    if any_ratio {
        match shared_ratio_labels(&metrics) {
            Some((num_label, den_label)) => {
                headers.push(format!("Numerator ({})", num_label));
                headers.push(format!("Denominator ({})", den_label));
            }
            None => {
                headers.push("Numerator".to_string());
                headers.push("Denominator".to_string());
            }
        }
    }
    headers.push("Division".to_string());
    headers.push("Department".to_string());
    headers.push("Notes".to_string());

    let periods = expand_periods(req.period_type, req.start, req.end);

    let mut rows: Vec<RawRow> = Vec::new();
    for metric in &metrics {
        let dept = department_name(catalogs, metric.department_id);
        for period in &periods {
            let period_s = format_period(*period, req.period_type);
            for division in scope_rows(metric, req, catalogs, associations) {
                let mut cells: Vec<String> =
                    vec![metric.name.clone(), period_s.clone(), "".to_string()];
                if any_ratio {
                    cells.push("".to_string());
                    cells.push("".to_string());
                }
                cells.push(division);
                cells.push(dept.clone());
                cells.push("".to_string());
                rows.push(RawRow(cells));
            }
        }
    }
    RawTable { headers, rows }
}
