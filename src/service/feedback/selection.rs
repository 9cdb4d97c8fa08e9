//! Ranking of feedback cases for prompt injection

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::model::FeedbackCase;

/// Select at most `limit` cases, most relevant first
///
/// Equal relevance is broken by the most recent incident date. The sort is
/// stable, so fully equal cases keep their input order.
pub fn select_feedback(cases: &[FeedbackCase], limit: usize) -> Vec<&FeedbackCase> {
    let mut ranked: Vec<&FeedbackCase> = cases.iter().collect();
    ranked.sort_by(|a, b| compare_relevance(a, b));
    ranked.truncate(limit);
    ranked
}

fn compare_relevance(a: &FeedbackCase, b: &FeedbackCase) -> Ordering {
    b.relevance_score
        .value()
        .total_cmp(&a.relevance_score.value())
        .then_with(|| compare_dates(&b.incident_date, &a.incident_date))
}

/// Parseable dates order chronologically and above unparseable ones
fn compare_dates(a: &str, b: &str) -> Ordering {
    match (parse_incident_date(a), parse_incident_date(b)) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => a.cmp(b),
    }
}

fn parse_incident_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.naive_utc())
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
