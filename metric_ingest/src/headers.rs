// Header inference: guessing which raw column holds which logical field.

use std::collections::HashMap;

use log::debug;

use crate::config::ImportError;

/// The fixed logical columns the pipeline understands, independent of how
/// the source file labels them.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum CanonicalField {
    Metric,
    Period,
    Value,
    Numerator,
    Denominator,
    Department,
    Division,
    Region,
    Notes,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 9] = [
        CanonicalField::Metric,
        CanonicalField::Period,
        CanonicalField::Value,
        CanonicalField::Numerator,
        CanonicalField::Denominator,
        CanonicalField::Department,
        CanonicalField::Division,
        CanonicalField::Region,
        CanonicalField::Notes,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            CanonicalField::Metric => "metric",
            CanonicalField::Period => "period",
            CanonicalField::Value => "value",
            CanonicalField::Numerator => "numerator",
            CanonicalField::Denominator => "denominator",
            CanonicalField::Department => "department",
            CanonicalField::Division => "division",
            CanonicalField::Region => "region",
            CanonicalField::Notes => "notes",
        }
    }

    pub fn from_key(s: &str) -> Option<CanonicalField> {
        CanonicalField::ALL
            .iter()
            .find(|f| f.key() == s.to_lowercase().trim())
            .copied()
    }

    /// Synonyms in declared priority order. The first synonym to produce
    /// any match wins, so order is the only tie-break.
    ///
    /// These tables are the contract between the template generator and the
    /// inference step: every header the generator emits must be recognized
    /// by the synonyms of its field.
    fn synonyms(&self) -> &'static [&'static str] {
        match self {
            CanonicalField::Metric => &["metric", "measure", "indicator"],
            CanonicalField::Period => &["period", "month", "date"],
            CanonicalField::Value => &["value", "result", "score"],
            CanonicalField::Numerator => &["numerator", "compliant", "events"],
            CanonicalField::Denominator => &["denominator", "exposure"],
            CanonicalField::Department => &["department", "dept"],
            CanonicalField::Division => &["division"],
            CanonicalField::Region => &["region", "area", "site"],
            CanonicalField::Notes => &["notes", "note", "comment"],
        }
    }
}

/// Returns the raw header that best matches the given canonical field, or
/// the empty string when no header qualifies.
///
/// For each synonym in priority order: an exact (case-insensitive, trimmed)
/// header match wins, else the first header containing the synonym as a
/// substring. Total and deterministic; the empty result means "unmapped,
/// ask the human".
pub fn infer_header(headers: &[String], field: CanonicalField) -> String {
    let normalized: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();
    for syn in field.synonyms() {
        for (idx, h) in normalized.iter().enumerate() {
            if h == syn {
                return headers[idx].clone();
            }
        }
        for (idx, h) in normalized.iter().enumerate() {
            if h.contains(syn) {
                return headers[idx].clone();
            }
        }
    }
    "".to_string()
}

/// Canonical field -> raw header name. Produced by inference and possibly
/// corrected by a human before validation runs.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct ColumnMapping {
    map: HashMap<CanonicalField, String>,
}

impl ColumnMapping {
    pub fn new() -> ColumnMapping {
        ColumnMapping {
            map: HashMap::new(),
        }
    }

    /// Runs header inference for every canonical field.
    pub fn infer(headers: &[String]) -> ColumnMapping {
        let mut map = HashMap::new();
        for field in CanonicalField::ALL {
            let header = infer_header(headers, field);
            if !header.is_empty() {
                debug!("infer: {:?} -> {:?}", field, header);
                map.insert(field, header);
            }
        }
        ColumnMapping { map }
    }

    /// Sets or clears a single mapping. An empty header name unmaps the
    /// field.
    pub fn set(&mut self, field: CanonicalField, header: &str) {
        if header.trim().is_empty() {
            self.map.remove(&field);
        } else {
            self.map.insert(field, header.to_string());
        }
    }

    pub fn header(&self, field: CanonicalField) -> Option<&str> {
        self.map.get(&field).map(|s| s.as_str())
    }

    /// Index of the mapped column in the header row, if the field is mapped
    /// and its header actually exists in the table.
    pub fn column_index(&self, headers: &[String], field: CanonicalField) -> Option<usize> {
        let name = self.map.get(&field)?;
        headers.iter().position(|h| h == name)
    }

    /// Precondition check before any row runs: `metric` and `period` must
    /// be mapped, plus either `value` or both `numerator` and
    /// `denominator`.
    pub fn check_required(&self) -> Result<(), ImportError> {
        if self.header(CanonicalField::Metric).is_none() {
            return Err(ImportError::MissingRequiredMapping("metric".to_string()));
        }
        if self.header(CanonicalField::Period).is_none() {
            return Err(ImportError::MissingRequiredMapping("period".to_string()));
        }
        let has_value = self.header(CanonicalField::Value).is_some();
        let has_ratio = self.header(CanonicalField::Numerator).is_some()
            && self.header(CanonicalField::Denominator).is_some();
        if !has_value && !has_ratio {
            return Err(ImportError::MissingRequiredMapping(
                "value, or numerator and denominator".to_string(),
            ));
        }
        Ok(())
    }
}
