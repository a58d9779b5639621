// Period parsing and expansion.

use chrono::{Datelike, Months, NaiveDate};
use log::debug;

use crate::config::PeriodType;

/// Parses a free-text period token into a calendar date, or `None` when no
/// recognized form matches. Never panics on bad input.
///
/// Recognized forms, tried in order:
/// 1. `YYYY-MM` or `YYYY-MM-DD` (day defaults to 1);
/// 2. `M/YYYY` or `MM/YYYY` (day defaults to 1);
/// 3. `M/D/YYYY` or `MM/DD/YYYY`;
/// 4. a handful of common textual forms ("January 2025", "Jan 5, 2025").
///
/// Dates are plain calendar dates with no timezone attached, so a period
/// can never drift by a day between environments.
pub fn parse_period(input: &str) -> Option<NaiveDate> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }

    // YYYY-MM or YYYY-MM-DD
    let dash_parts: Vec<&str> = s.split('-').collect();
    if (dash_parts.len() == 2 || dash_parts.len() == 3) && dash_parts[0].len() == 4 {
        if let (Ok(y), Ok(m)) = (dash_parts[0].parse::<i32>(), dash_parts[1].parse::<u32>()) {
            let d = if dash_parts.len() == 3 {
                dash_parts[2].parse::<u32>().ok()?
            } else {
                1
            };
            return NaiveDate::from_ymd_opt(y, m, d);
        }
    }

    // M/YYYY or M/D/YYYY
    let slash_parts: Vec<&str> = s.split('/').collect();
    if slash_parts.len() == 2 {
        if let (Ok(m), Ok(y)) = (slash_parts[0].parse::<u32>(), slash_parts[1].parse::<i32>()) {
            if slash_parts[1].len() == 4 {
                return NaiveDate::from_ymd_opt(y, m, 1);
            }
        }
    }
    if slash_parts.len() == 3 {
        if let (Ok(m), Ok(d), Ok(y)) = (
            slash_parts[0].parse::<u32>(),
            slash_parts[1].parse::<u32>(),
            slash_parts[2].parse::<i32>(),
        ) {
            if slash_parts[2].len() == 4 {
                return NaiveDate::from_ymd_opt(y, m, d);
            }
        }
    }

    // Generic fallback for textual dates.
    for fmt in ["%B %d, %Y", "%b %d, %Y", "%d %B %Y", "%Y/%m/%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    // Month-year forms carry no day; parse with an explicit day of 1.
    let with_day = format!("{} 1", s);
    for fmt in ["%B %Y %d", "%b %Y %d"] {
        if let Ok(d) = NaiveDate::parse_from_str(&with_day, fmt) {
            return Some(d);
        }
    }
    debug!("parse_period: no format matched {:?}", s);
    None
}

/// Formats a period cell so that `parse_period` reads it back to the same
/// date. Day-resolution period types keep the full date.
pub fn format_period(date: Option<NaiveDate>, period_type: PeriodType) -> String {
    match (date, period_type) {
        (None, _) => "".to_string(),
        (Some(d), PeriodType::Daily | PeriodType::Weekly | PeriodType::BiWeekly) => {
            d.format("%Y-%m-%d").to_string()
        }
        (Some(d), _) => d.format("%Y-%m").to_string(),
    }
}

fn quarter_start(d: NaiveDate) -> NaiveDate {
    let m = 1 + 3 * ((d.month() - 1) / 3);
    NaiveDate::from_ymd_opt(d.year(), m, 1).unwrap()
}

fn month_start(d: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(d.year(), d.month(), 1).unwrap()
}

/// Builds the concrete list of periods to emit in a template.
///
/// Monthly, quarterly and annual ranges are walked from start to end
/// inclusive (quarters snapped to month 1/4/7/10). Day-resolution types
/// emit the start date only; the user fills in the following periods by
/// hand. With no start date at all, a single empty placeholder is emitted.
pub fn expand_periods(
    period_type: PeriodType,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Vec<Option<NaiveDate>> {
    let start = match start {
        Some(d) => d,
        None => return vec![None],
    };
    let end = end.unwrap_or(start);
    match period_type {
        PeriodType::Daily | PeriodType::Weekly | PeriodType::BiWeekly => vec![Some(start)],
        PeriodType::Monthly => walk_months(month_start(start), month_start(end), 1),
        PeriodType::Quarterly => walk_months(quarter_start(start), quarter_start(end), 3),
        PeriodType::Annual => {
            let mut res = Vec::new();
            let mut y = start.year();
            while y <= end.year() {
                res.push(NaiveDate::from_ymd_opt(y, 1, 1));
                y += 1;
            }
            res
        }
    }
}

fn walk_months(start: NaiveDate, end: NaiveDate, step: u32) -> Vec<Option<NaiveDate>> {
    let mut res = Vec::new();
    let mut cur = start;
    while cur <= end {
        res.push(Some(cur));
        cur = match cur.checked_add_months(Months::new(step)) {
            Some(d) => d,
            None => break,
        };
    }
    res
}
