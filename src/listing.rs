//! Form listing: staleness annotation, search filter and sort order.
//!
//! Pure functions over a snapshot of forms; the engine reads the snapshot
//! and hands it here.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::config::StalenessConfig;
use crate::record::{Form, FormStatus};

/// How long an Incomplete form has sat untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Staleness {
    None,
    Low,
    Medium,
    High,
}

impl fmt::Display for Staleness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Staleness::None => "none",
            Staleness::Low => "low",
            Staleness::Medium => "medium",
            Staleness::High => "high",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormListing {
    pub form: Form,
    pub staleness: Staleness,
}

pub fn staleness(form: &Form, now: NaiveDateTime, thresholds: &StalenessConfig) -> Staleness {
    if form.status != FormStatus::Incomplete {
        return Staleness::None;
    }
    let age = now - form.last_update;
    if age >= thresholds.high() {
        Staleness::High
    } else if age >= thresholds.medium() {
        Staleness::Medium
    } else if age >= thresholds.low() {
        Staleness::Low
    } else {
        Staleness::None
    }
}

/// Case-insensitive match on id, status, inspector and date. An empty
/// query matches everything.
pub fn matches(form: &Form, query: &str) -> bool {
    let needle = query.trim().to_lowercase();
    needle.is_empty() || form.display_line().to_lowercase().contains(&needle)
}

/// Filter, annotate and order forms: status rank first, then creation date.
pub fn arrange(
    forms: Vec<Form>,
    query: &str,
    now: NaiveDateTime,
    thresholds: &StalenessConfig,
) -> Vec<FormListing> {
    let mut listing: Vec<FormListing> = forms
        .into_iter()
        .filter(|form| matches(form, query))
        .map(|form| FormListing {
            staleness: staleness(&form, now, thresholds),
            form,
        })
        .collect();
    listing.sort_by(|a, b| {
        a.form
            .status
            .rank()
            .cmp(&b.form.status.rank())
            .then(a.form.date.cmp(&b.form.date))
            .then_with(|| a.form.form_id.cmp(&b.form.form_id))
    });
    listing
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Outcome;
    use chrono::{Duration, NaiveDate};

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn form(id: &str, status: FormStatus, date: NaiveDateTime) -> Form {
        Form {
            form_id: id.into(),
            date,
            last_update: date,
            inspector_name: "Jordan Lee".into(),
            project_no: String::new(),
            contract_no: String::new(),
            curve_name: String::new(),
            status,
            tests: vec![],
            moisture_result: Outcome::Pending,
            deflection_result: Outcome::Pending,
            overall_result: Outcome::Pending,
            close_reason: None,
        }
    }

    #[test]
    fn test_staleness_thresholds_take_highest() {
        let thresholds = StalenessConfig::default();
        let f = form("F1", FormStatus::Incomplete, at(1, 8));
        let now = f.last_update;
        assert_eq!(staleness(&f, now, &thresholds), Staleness::None);
        assert_eq!(
            staleness(&f, now + Duration::hours(23), &thresholds),
            Staleness::None
        );
        assert_eq!(
            staleness(&f, now + Duration::hours(24), &thresholds),
            Staleness::Low
        );
        assert_eq!(
            staleness(&f, now + Duration::days(3), &thresholds),
            Staleness::Medium
        );
        assert_eq!(
            staleness(&f, now + Duration::weeks(1), &thresholds),
            Staleness::High
        );
        assert_eq!(
            staleness(&f, now + Duration::weeks(6), &thresholds),
            Staleness::High
        );
    }

    #[test]
    fn test_only_incomplete_forms_go_stale() {
        let thresholds = StalenessConfig::default();
        let f = form("F1", FormStatus::Pending, at(1, 8));
        assert_eq!(
            staleness(&f, at(28, 8), &thresholds),
            Staleness::None
        );
    }

    #[test]
    fn test_sorted_by_status_rank_then_date() {
        let forms = vec![
            form("F-closed", FormStatus::Closed, at(1, 8)),
            form("F-complete", FormStatus::Complete, at(2, 8)),
            form("F-late", FormStatus::Incomplete, at(5, 8)),
            form("F-pending", FormStatus::Pending, at(1, 8)),
            form("F-early", FormStatus::Incomplete, at(3, 8)),
        ];
        let ids: Vec<String> = arrange(forms, "", at(5, 9), &StalenessConfig::default())
            .into_iter()
            .map(|l| l.form.form_id)
            .collect();
        assert_eq!(
            ids,
            vec!["F-early", "F-late", "F-pending", "F-complete", "F-closed"]
        );
    }

    #[test]
    fn test_query_filters_case_insensitively() {
        let mut other = form("FAB20240601_0800_1", FormStatus::Pending, at(1, 8));
        other.inspector_name = "Alex Brown".into();
        let forms = vec![form("FJL20240601_0800_1", FormStatus::Incomplete, at(1, 8)), other];

        let hits = arrange(forms.clone(), "ALEX", at(1, 9), &StalenessConfig::default());
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].form.form_id, "FAB20240601_0800_1");

        let hits = arrange(forms.clone(), "incomplete", at(1, 9), &StalenessConfig::default());
        assert_eq!(hits.len(), 1);

        let hits = arrange(forms, "  ", at(1, 9), &StalenessConfig::default());
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn test_query_matches_date_in_id_format() {
        let forms = vec![
            form("F-first", FormStatus::Incomplete, at(1, 8)),
            form("F-second", FormStatus::Incomplete, at(2, 8)),
        ];
        let hits = arrange(forms, "20240601_08", at(2, 9), &StalenessConfig::default());
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].form.form_id, "F-first");
    }
}
