// src/compare.rs

use std::collections::{BTreeMap, HashMap};
use tracing::info;

use crate::analyze::{mean, truncate};
use crate::clean::{clean_occupation_title, OccupationRecord};

/// One occupation present with an LQ in both years.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonRow {
    pub occupation: String,
    pub lq_baseline: f64,
    pub lq_target: f64,
    /// `lq_target - lq_baseline`
    pub change: f64,
    /// Relative change in percent; 0 when the baseline LQ is not positive.
    pub percent_change: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonSummary {
    pub compared: usize,
    pub mean_baseline: f64,
    pub mean_target: f64,
    pub mean_change: f64,
    pub mean_percent_change: f64,
    pub increased: usize,
    pub decreased: usize,
    pub unchanged: usize,
}

impl ComparisonSummary {
    pub fn share(&self, count: usize) -> f64 {
        if self.compared == 0 {
            0.0
        } else {
            count as f64 / self.compared as f64 * 100.0
        }
    }
}

/// Matching key: cleaned, lower-cased title.
pub fn occupation_key(title: &str) -> String {
    clean_occupation_title(title).to_lowercase()
}

/// Upper-case the first letter of every run of letters, lower-case the rest.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_letter = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_letter = true;
        } else {
            out.push(c);
            prev_letter = false;
        }
    }
    out
}

fn first_lq_by_key(records: &[OccupationRecord]) -> HashMap<String, Option<f64>> {
    let mut map = HashMap::with_capacity(records.len());
    for r in records {
        map.entry(occupation_key(&r.occupation))
            .or_insert(r.location_quotient);
    }
    map
}

/// Join two years on the occupation key. The first record per key wins;
/// occupations missing an LQ in either year are dropped. Sorted by occupation.
pub fn compare_records(
    baseline: &[OccupationRecord],
    target: &[OccupationRecord],
) -> Vec<ComparisonRow> {
    let base = first_lq_by_key(baseline);
    let tgt = first_lq_by_key(target);
    info!(
        baseline = base.len(),
        target = tgt.len(),
        "unique occupations per year"
    );

    let mut rows: BTreeMap<String, ComparisonRow> = BTreeMap::new();
    for (key, lq_a) in &base {
        let (Some(a), Some(Some(b))) = (lq_a, tgt.get(key)) else {
            continue;
        };
        let change = b - a;
        let percent_change = if *a > 0.0 { change / a * 100.0 } else { 0.0 };
        rows.insert(
            key.clone(),
            ComparisonRow {
                occupation: title_case(key),
                lq_baseline: *a,
                lq_target: *b,
                change,
                percent_change,
            },
        );
    }
    info!(matched = rows.len(), "matched occupations");
    rows.into_values().collect()
}

fn mean_by(rows: &[ComparisonRow], f: impl Fn(&ComparisonRow) -> f64) -> f64 {
    let values: Vec<f64> = rows.iter().map(f).collect();
    mean(&values).unwrap_or(f64::NAN)
}

pub fn summarize(rows: &[ComparisonRow]) -> ComparisonSummary {
    ComparisonSummary {
        compared: rows.len(),
        mean_baseline: mean_by(rows, |r| r.lq_baseline),
        mean_target: mean_by(rows, |r| r.lq_target),
        mean_change: mean_by(rows, |r| r.change),
        mean_percent_change: mean_by(rows, |r| r.percent_change),
        increased: rows.iter().filter(|r| r.change > 0.0).count(),
        decreased: rows.iter().filter(|r| r.change < 0.0).count(),
        unchanged: rows.iter().filter(|r| r.change == 0.0).count(),
    }
}

fn ranked_by(
    rows: &[ComparisonRow],
    n: usize,
    key: fn(&ComparisonRow) -> f64,
    descending: bool,
) -> Vec<&ComparisonRow> {
    let mut sorted: Vec<_> = rows.iter().collect();
    sorted.sort_by(|a, b| {
        let ord = key(a).total_cmp(&key(b));
        if descending {
            ord.reverse()
        } else {
            ord
        }
    });
    sorted.truncate(n);
    sorted
}

pub fn biggest_increases(rows: &[ComparisonRow], n: usize) -> Vec<&ComparisonRow> {
    ranked_by(rows, n, |r| r.change, true)
}

pub fn biggest_decreases(rows: &[ComparisonRow], n: usize) -> Vec<&ComparisonRow> {
    ranked_by(rows, n, |r| r.change, false)
}

pub fn biggest_percent_changes(rows: &[ComparisonRow], n: usize) -> Vec<&ComparisonRow> {
    ranked_by(rows, n, |r| r.percent_change, true)
}

/// CSV shape of a comparison row; the LQ column names carry the labels.
pub fn to_csv_records(
    rows: &[ComparisonRow],
    label_baseline: &str,
    label_target: &str,
) -> (Vec<String>, Vec<Vec<String>>) {
    let headers = vec![
        "Occupation".to_string(),
        format!("LQ_{label_baseline}"),
        format!("LQ_{label_target}"),
        "Change".to_string(),
        "Percent_Change".to_string(),
    ];
    let body = rows
        .iter()
        .map(|r| {
            vec![
                r.occupation.clone(),
                r.lq_baseline.to_string(),
                r.lq_target.to_string(),
                r.change.to_string(),
                r.percent_change.to_string(),
            ]
        })
        .collect();
    (headers, body)
}

pub fn format_rows(rows: &[&ComparisonRow], label_baseline: &str, label_target: &str) -> Vec<String> {
    let mut out = vec![format!(
        "{:<4} {:<40} {:<8} {:<8} {:<8} {:<10}",
        "Rank", "Occupation", label_baseline, label_target, "Change", "% Change"
    )];
    out.extend(rows.iter().enumerate().map(|(i, r)| {
        format!(
            "{:<4} {:<40} {:<8.3} {:<8.3} {:<8.3} {:<9.1}%",
            i + 1,
            truncate(&r.occupation, 39),
            r.lq_baseline,
            r.lq_target,
            r.change,
            r.percent_change
        )
    }));
    out
}

/// Log the summary and the three rankings.
pub fn log_comparison(rows: &[ComparisonRow], top_n: usize, label_baseline: &str, label_target: &str) {
    let s = summarize(rows);
    info!(
        compared = s.compared,
        mean_baseline = format_args!("{:.3}", s.mean_baseline),
        mean_target = format_args!("{:.3}", s.mean_target),
        mean_change = format_args!("{:.3}", s.mean_change),
        mean_percent_change = format_args!("{:.1}%", s.mean_percent_change),
        "comparing {} to {}",
        label_baseline,
        label_target
    );

    let sections: [(&str, Vec<&ComparisonRow>); 3] = [
        ("biggest increases", biggest_increases(rows, top_n)),
        ("biggest decreases", biggest_decreases(rows, top_n)),
        ("biggest percentage changes", biggest_percent_changes(rows, top_n)),
    ];
    for (title, ranked) in sections {
        info!("top {} {}", top_n, title);
        for line in format_rows(&ranked, label_baseline, label_target) {
            info!("{}", line);
        }
    }

    info!(
        increased = s.increased,
        increased_pct = format_args!("{:.1}%", s.share(s.increased)),
        decreased = s.decreased,
        decreased_pct = format_args!("{:.1}%", s.share(s.decreased)),
        unchanged = s.unchanged,
        unchanged_pct = format_args!("{:.1}%", s.share(s.unchanged)),
        "change summary"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(name: &str, lq: Option<f64>) -> OccupationRecord {
        OccupationRecord {
            occupation: name.to_string(),
            soc_code: None,
            employment: None,
            annual_mean_wage: None,
            hourly_mean_wage: None,
            location_quotient: lq,
        }
    }

    #[test]
    fn title_case_capitalizes_after_non_letters() {
        assert_eq!(title_case("cooks, restaurant"), "Cooks, Restaurant");
        assert_eq!(title_case("heating, air conditioning, and refrigeration mechanics and installers"),
            "Heating, Air Conditioning, And Refrigeration Mechanics And Installers");
        assert_eq!(title_case("weighers/measurers"), "Weighers/Measurers");
        assert_eq!(title_case("o'brien"), "O'Brien");
    }

    #[test]
    fn matches_by_lowercased_clean_title() {
        let y2019 = vec![
            rec("Cooks, Restaurant", Some(1.0)),
            rec("Registered Nurses", Some(0.8)),
            rec("Actors", Some(0.0)),
            rec("Only In 2019", Some(1.0)),
            rec("Cooks, Restaurant", Some(9.9)),
        ];
        let y2024 = vec![
            rec("COOKS, RESTAURANT (35-2014)", Some(1.5)),
            rec("Registered Nurses(29-1141)", Some(0.6)),
            rec("Actors", Some(0.4)),
            rec("Only In 2024", Some(1.0)),
        ];
        let rows = compare_records(&y2019, &y2024);
        let names: Vec<_> = rows.iter().map(|r| r.occupation.as_str()).collect();
        assert_eq!(names, vec!["Actors", "Cooks, Restaurant", "Registered Nurses"]);

        let cooks = &rows[1];
        assert_eq!(cooks.lq_baseline, 1.0);
        assert_eq!(cooks.change, 0.5);
        assert_eq!(cooks.percent_change, 50.0);

        // zero baseline gives zero percent change
        assert_eq!(rows[0].percent_change, 0.0);
        assert!((rows[2].percent_change + 25.0).abs() < 1e-9);
    }

    #[test]
    fn missing_lq_in_either_year_is_dropped() {
        let rows = compare_records(
            &[rec("A", None), rec("B", Some(1.0))],
            &[rec("a", Some(1.0)), rec("b", None)],
        );
        assert!(rows.is_empty());
        let s = summarize(&rows);
        assert_eq!(s.compared, 0);
        assert!(s.mean_change.is_nan());
        assert_eq!(s.share(0), 0.0);
    }

    #[test]
    fn summary_and_rankings() {
        let rows = compare_records(
            &[rec("a", Some(1.0)), rec("b", Some(2.0)), rec("c", Some(0.5)), rec("d", Some(1.0))],
            &[rec("a", Some(1.5)), rec("b", Some(1.0)), rec("c", Some(1.0)), rec("d", Some(1.0))],
        );
        let s = summarize(&rows);
        assert_eq!((s.increased, s.decreased, s.unchanged), (2, 1, 1));
        assert_eq!(s.share(s.increased), 50.0);
        assert_eq!(s.mean_baseline, 1.125);

        assert_eq!(biggest_increases(&rows, 1)[0].occupation, "A");
        assert_eq!(biggest_decreases(&rows, 1)[0].occupation, "B");
        assert_eq!(biggest_percent_changes(&rows, 1)[0].occupation, "C");
        assert_eq!(biggest_increases(&rows, 10).len(), 4);
    }

    #[test]
    fn csv_headers_carry_labels() {
        let rows = compare_records(&[rec("a", Some(1.0))], &[rec("a", Some(2.0))]);
        let (headers, body) = to_csv_records(&rows, "2019", "2024");
        assert_eq!(headers, vec!["Occupation", "LQ_2019", "LQ_2024", "Change", "Percent_Change"]);
        assert_eq!(body, vec![vec!["A", "1", "2", "1", "100"]]);
    }
}
