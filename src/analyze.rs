// src/analyze.rs

use serde::Serialize;
use std::fmt;
use tracing::info;

use crate::clean::OccupationRecord;

/// Descriptive statistics over the records that carry a location quotient.
#[derive(Debug, Clone, PartialEq)]
pub struct LqStats {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    /// Sample standard deviation; `None` below two values.
    pub std: Option<f64>,
}

/// Counts per concentration bucket. Records without an LQ are in none of them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Distribution {
    /// LQ > 2.0
    pub high: usize,
    /// 1.0 < LQ ≤ 2.0
    pub moderate: usize,
    /// 0.5 < LQ ≤ 1.0
    pub average: usize,
    /// LQ ≤ 0.5
    pub low: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LqCategory {
    #[serde(rename = "Very High Concentration")]
    VeryHigh,
    #[serde(rename = "High Concentration")]
    High,
    #[serde(rename = "Above Average")]
    AboveAverage,
    #[serde(rename = "Below Average")]
    BelowAverage,
    #[serde(rename = "Low Concentration")]
    Low,
}

impl LqCategory {
    pub fn of(lq: f64) -> Self {
        if lq > 2.0 {
            Self::VeryHigh
        } else if lq > 1.5 {
            Self::High
        } else if lq > 1.0 {
            Self::AboveAverage
        } else if lq > 0.5 {
            Self::BelowAverage
        } else {
            Self::Low
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::VeryHigh => "Very High Concentration",
            Self::High => "High Concentration",
            Self::AboveAverage => "Above Average",
            Self::BelowAverage => "Below Average",
            Self::Low => "Low Concentration",
        }
    }
}

impl fmt::Display for LqCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Counts print as integers, statistics as floats.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Count(usize),
    Value(f64),
}

/// One `Metric,Value` line of the analysis summary CSV.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    #[serde(rename = "Metric")]
    pub metric: &'static str,
    #[serde(rename = "Value")]
    pub value: MetricValue,
}

impl SummaryRow {
    pub const HEADERS: &'static [&'static str] = &["Metric", "Value"];
}

/// One line of the ranked location-quotient report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    #[serde(rename = "Rank")]
    pub rank: usize,
    #[serde(rename = "Occupation")]
    pub occupation: String,
    #[serde(rename = "Location_Quotient")]
    pub location_quotient: f64,
    #[serde(rename = "Category")]
    pub category: LqCategory,
    #[serde(rename = "SOC_Code")]
    pub soc_code: Option<String>,
    #[serde(rename = "Employment")]
    pub employment: Option<u64>,
    #[serde(rename = "Annual_Mean_Wage")]
    pub annual_mean_wage: Option<f64>,
    #[serde(rename = "Hourly_Mean_Wage")]
    pub hourly_mean_wage: Option<f64>,
}

impl ReportRow {
    pub const HEADERS: &'static [&'static str] = &[
        "Rank",
        "Occupation",
        "Location_Quotient",
        "Category",
        "SOC_Code",
        "Employment",
        "Annual_Mean_Wage",
        "Hourly_Mean_Wage",
    ];
}

fn with_lq(records: &[OccupationRecord]) -> Vec<(&OccupationRecord, f64)> {
    records
        .iter()
        .filter_map(|r| r.location_quotient.map(|lq| (r, lq)))
        .collect()
}

fn lq_values(records: &[OccupationRecord]) -> Vec<f64> {
    records.iter().filter_map(|r| r.location_quotient).collect()
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    })
}

pub fn lq_stats(records: &[OccupationRecord]) -> Option<LqStats> {
    let values = lq_values(records);
    let mean = mean(&values)?;
    let median = median(&values)?;
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let std = (values.len() > 1).then(|| {
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
        var.sqrt()
    });
    Some(LqStats {
        count: values.len(),
        mean,
        median,
        min,
        max,
        std,
    })
}

/// The `n` records with the highest LQ, highest first. Ties keep input order.
pub fn top_n_highest(records: &[OccupationRecord], n: usize) -> Vec<&OccupationRecord> {
    let mut ranked = with_lq(records);
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked.into_iter().take(n).map(|(r, _)| r).collect()
}

/// The `n` records with the lowest LQ, lowest first. Ties keep input order.
pub fn top_n_lowest(records: &[OccupationRecord], n: usize) -> Vec<&OccupationRecord> {
    let mut ranked = with_lq(records);
    ranked.sort_by(|a, b| a.1.total_cmp(&b.1));
    ranked.into_iter().take(n).map(|(r, _)| r).collect()
}

pub fn distribution(records: &[OccupationRecord]) -> Distribution {
    let mut d = Distribution::default();
    for lq in lq_values(records) {
        if lq > 2.0 {
            d.high += 1;
        } else if lq > 1.0 {
            d.moderate += 1;
        } else if lq > 0.5 {
            d.average += 1;
        } else {
            d.low += 1;
        }
    }
    d
}

/// Rows of the `Metric,Value` summary file. Mean and median are NaN when no
/// record has an LQ.
pub fn analysis_summary(records: &[OccupationRecord]) -> Vec<SummaryRow> {
    let d = distribution(records);
    let stats = lq_stats(records);
    let row = |metric, value| SummaryRow { metric, value };
    let mean = stats.as_ref().map_or(f64::NAN, |s| s.mean);
    let median = stats.as_ref().map_or(f64::NAN, |s| s.median);
    vec![
        row("Total Occupations", MetricValue::Count(records.len())),
        row("High Concentration (LQ>2)", MetricValue::Count(d.high)),
        row("Moderate Concentration (1<LQ≤2)", MetricValue::Count(d.moderate)),
        row("Average Concentration (0.5<LQ≤1)", MetricValue::Count(d.average)),
        row("Low Concentration (LQ≤0.5)", MetricValue::Count(d.low)),
        row("Mean LQ", MetricValue::Value(mean)),
        row("Median LQ", MetricValue::Value(median)),
    ]
}

/// Records ranked by LQ, highest first. Records without an LQ are left out.
pub fn location_quotient_report(records: &[OccupationRecord]) -> Vec<ReportRow> {
    top_n_highest(records, usize::MAX)
        .into_iter()
        .enumerate()
        .filter_map(|(i, r)| {
            let lq = r.location_quotient?;
            Some(ReportRow {
                rank: i + 1,
                occupation: r.occupation.clone(),
                location_quotient: lq,
                category: LqCategory::of(lq),
                soc_code: r.soc_code.clone(),
                employment: r.employment.map(|e| e.round() as u64),
                annual_mean_wage: r.annual_mean_wage,
                hourly_mean_wage: r.hourly_mean_wage,
            })
        })
        .collect()
}

/// Shorten `s` to at most `width` characters.
pub fn truncate(s: &str, width: usize) -> String {
    s.chars().take(width).collect()
}

/// `NN. occupation   LQ: x.xxx` lines, as printed for the rankings.
pub fn format_ranking(records: &[&OccupationRecord]) -> Vec<String> {
    records
        .iter()
        .enumerate()
        .map(|(i, r)| {
            format!(
                "{:2}. {:<50} LQ: {:.3}",
                i + 1,
                truncate(&r.occupation, 50),
                r.location_quotient.unwrap_or(f64::NAN)
            )
        })
        .collect()
}

/// Log the full analysis of one source.
pub fn log_analysis(label: &str, records: &[OccupationRecord], top_n: usize) {
    info!(source = label, occupations = records.len(), "analyzing OES data");

    let Some(stats) = lq_stats(records) else {
        info!(source = label, "no location quotient values to analyze");
        return;
    };
    info!(
        source = label,
        count = stats.count,
        mean = format_args!("{:.3}", stats.mean),
        median = format_args!("{:.3}", stats.median),
        min = format_args!("{:.3}", stats.min),
        max = format_args!("{:.3}", stats.max),
        std = format_args!("{:.3}", stats.std.unwrap_or(f64::NAN)),
        "location quotient statistics"
    );

    info!(source = label, "top {} highest location quotients", top_n);
    for line in format_ranking(&top_n_highest(records, top_n)) {
        info!("{}", line);
    }
    info!(source = label, "top {} lowest location quotients", top_n);
    for line in format_ranking(&top_n_lowest(records, top_n)) {
        info!("{}", line);
    }

    let d = distribution(records);
    info!(
        source = label,
        high = d.high,
        moderate = d.moderate,
        average = d.average,
        low = d.low,
        "location quotient distribution"
    );
}

/// Log the headline counts of a report.
pub fn log_report(label: &str, report: &[ReportRow]) {
    let above = |t: f64| report.iter().filter(|r| r.location_quotient > t).count();
    info!(
        source = label,
        total = report.len(),
        very_high = above(2.0),
        high = above(1.5),
        above_average = above(1.0),
        "location quotient report"
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

    fn sample() -> Vec<OccupationRecord> {
        vec![
            rec("Farmworkers", Some(3.1)),
            rec("Cooks", Some(1.2)),
            rec("Actors", Some(0.2)),
            rec("Unknown", None),
            rec("Nurses", Some(0.8)),
            rec("Laborers", Some(2.0)),
        ]
    }

    #[test]
    fn stats_ignore_missing_values() {
        let s = lq_stats(&sample()).unwrap();
        assert_eq!(s.count, 5);
        assert!((s.mean - 1.46).abs() < 1e-9);
        assert_eq!(s.median, 1.2);
        assert_eq!(s.min, 0.2);
        assert_eq!(s.max, 3.1);
        // sample std of [3.1, 1.2, 0.2, 0.8, 2.0]
        assert!((s.std.unwrap() - 1.1260550608).abs() < 1e-6);

        assert!(lq_stats(&[rec("x", None)]).is_none());
        assert_eq!(lq_stats(&[rec("x", Some(1.0))]).unwrap().std, None);
        assert_eq!(median(&[1.0, 4.0, 2.0, 3.0]), Some(2.5));
    }

    #[test]
    fn rankings_skip_missing_and_respect_n() {
        let data = sample();
        let hi: Vec<_> = top_n_highest(&data, 2).iter().map(|r| r.occupation.as_str()).collect();
        assert_eq!(hi, vec!["Farmworkers", "Laborers"]);
        let lo: Vec<_> = top_n_lowest(&data, 10).iter().map(|r| r.occupation.as_str()).collect();
        assert_eq!(lo, vec!["Actors", "Nurses", "Cooks", "Laborers", "Farmworkers"]);
    }

    #[test]
    fn buckets_use_half_open_ranges() {
        let d = distribution(&sample());
        assert_eq!(d, Distribution { high: 1, moderate: 2, average: 1, low: 1 });
        let edges = distribution(&[rec("a", Some(1.0)), rec("b", Some(0.5))]);
        assert_eq!(edges.average, 1);
        assert_eq!(edges.low, 1);
    }

    #[test]
    fn categories_follow_thresholds() {
        assert_eq!(LqCategory::of(2.01), LqCategory::VeryHigh);
        assert_eq!(LqCategory::of(2.0), LqCategory::High);
        assert_eq!(LqCategory::of(1.5), LqCategory::AboveAverage);
        assert_eq!(LqCategory::of(1.0), LqCategory::BelowAverage);
        assert_eq!(LqCategory::of(0.5), LqCategory::Low);
        assert_eq!(LqCategory::High.to_string(), "High Concentration");
    }

    #[test]
    fn report_is_ranked_and_excludes_missing() {
        let report = location_quotient_report(&sample());
        assert_eq!(report.len(), 5);
        assert_eq!(report[0].rank, 1);
        assert_eq!(report[0].occupation, "Farmworkers");
        assert_eq!(report[0].category, LqCategory::VeryHigh);
        assert_eq!(report[4].occupation, "Actors");
        assert_eq!(report[4].rank, 5);
    }

    #[test]
    fn summary_counts_every_record() {
        let rows = analysis_summary(&sample());
        assert_eq!(
            rows[0],
            SummaryRow { metric: "Total Occupations", value: MetricValue::Count(6) }
        );
        assert_eq!(rows[1].value, MetricValue::Count(1));
        assert_eq!(rows[6].metric, "Median LQ");
        assert_eq!(rows[6].value, MetricValue::Value(1.2));
        assert!(matches!(analysis_summary(&[])[5].value, MetricValue::Value(v) if v.is_nan()));
    }

    #[test]
    fn ranking_lines_are_padded_and_truncated() {
        let long = rec(&"x".repeat(60), Some(1.23456));
        let lines = format_ranking(&[&long]);
        assert_eq!(lines[0], format!(" 1. {} LQ: 1.235", "x".repeat(50)));
    }
}
