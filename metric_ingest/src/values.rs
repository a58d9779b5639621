// Deriving the numeric value of a row, directly or from a ratio.

use std::error::Error;
use std::fmt::Display;

use crate::config::MetricDataType;

/// Why a value could not be derived. These are per-row data failures, never
/// crashes; the pipeline turns them into error row results.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum ValueError {
    InvalidNumerator,
    InvalidDenominator,
    ZeroDenominator,
    InvalidValue,
    /// A ratio-typed metric with no numerator/denominator columns mapped at
    /// all. Distinct from `InvalidValue` so the message can point the user
    /// at the missing columns rather than at a bad cell.
    MissingValue,
}

impl Error for ValueError {}

impl Display for ValueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueError::InvalidNumerator => write!(f, "invalid numerator"),
            ValueError::InvalidDenominator => write!(f, "invalid denominator"),
            ValueError::ZeroDenominator => write!(f, "denominator is zero"),
            ValueError::InvalidValue => write!(f, "invalid value"),
            ValueError::MissingValue => {
                write!(f, "missing value (expected numerator and denominator columns)")
            }
        }
    }
}

/// A successfully derived value, with the ratio inputs carried along when
/// the ratio path was taken.
#[derive(PartialEq, Debug, Clone)]
pub struct DerivedValue {
    pub value: f64,
    pub numerator: Option<f64>,
    pub denominator: Option<f64>,
}

/// Strips the decoration humans paste from spreadsheets ($ signs, thousands
/// separators, percent signs) and parses what remains as a number.
fn parse_number(s: &str) -> Option<f64> {
    let cleaned: String = s
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | '%'))
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok()
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.filter(|v| !v.trim().is_empty())
}

/// Derives the numeric value of a row.
///
/// The ratio path wins when both numerator and denominator cells are
/// present and non-blank: the value is `numerator / denominator`, scaled by
/// the rate multiplier for rate metrics. Otherwise a direct value cell is
/// parsed as-is. `ratio_columns_mapped` tells the empty case apart: a
/// ratio-typed metric whose file has no ratio columns at all gets the
/// "missing value" diagnostic instead of "invalid value".
pub fn derive_value(
    data_type: MetricDataType,
    rate_multiplier: Option<f64>,
    numerator: Option<&str>,
    denominator: Option<&str>,
    value: Option<&str>,
    ratio_columns_mapped: bool,
) -> Result<DerivedValue, ValueError> {
    if let (Some(num_s), Some(den_s)) = (non_blank(numerator), non_blank(denominator)) {
        let num = parse_number(num_s).ok_or(ValueError::InvalidNumerator)?;
        let den = parse_number(den_s).ok_or(ValueError::InvalidDenominator)?;
        if den == 0.0 {
            return Err(ValueError::ZeroDenominator);
        }
        let raw = num / den;
        let value = match (data_type, rate_multiplier) {
            (MetricDataType::Rate, Some(mult)) => raw * mult,
            _ => raw,
        };
        return Ok(DerivedValue {
            value,
            numerator: Some(num),
            denominator: Some(den),
        });
    }

    if let Some(value_s) = non_blank(value) {
        let v = parse_number(value_s).ok_or(ValueError::InvalidValue)?;
        return Ok(DerivedValue {
            value: v,
            numerator: None,
            denominator: None,
        });
    }

    let is_ratio_type = matches!(data_type, MetricDataType::Proportion | MetricDataType::Rate);
    if is_ratio_type && !ratio_columns_mapped {
        Err(ValueError::MissingValue)
    } else {
        Err(ValueError::InvalidValue)
    }
}
