// src/clean.rs

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::table::Table;

/// Header used by the query portal for the occupation column.
pub const PORTAL_OCCUPATION_HEADER: &str = "Occupation (SOC code)";

const OCCUPATION_HINTS: &[&str] = &["occupation", "title", "job", "soc"];
const LQ_HINTS: &[&str] = &["location quotient", "lq", "quotient"];

/// Occupation cells containing any of these are repeated header rows.
const HEADER_INDICATORS: &[&str] = &["occupation", "soc code", "employment", "wage", "title"];

const EMPLOYMENT_EXCLUDES: &[&str] = &["percent", "per 1,000", "rse", "quotient"];

/// The portal prefixes LQ cells with an empty `()` footnote marker.
static EMPTY_PARENS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(\)\s*").unwrap());
static PROFILE_HINT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\(\s*click on the occupation title to view its profile\s*\)").unwrap()
});
static SOC_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(\s*(\d{2}-\d{4})\s*\)").unwrap());
static BARE_SOC_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{2}-\d{4}$").unwrap());

/// One occupation row after cleaning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccupationRecord {
    pub occupation: String,
    pub soc_code: Option<String>,
    pub employment: Option<f64>,
    pub annual_mean_wage: Option<f64>,
    pub hourly_mean_wage: Option<f64>,
    pub location_quotient: Option<f64>,
}

/// Parse an OES cell as a number. Footnote markers and blanks give `None`.
pub fn parse_number(raw: &str) -> Option<f64> {
    let stripped = EMPTY_PARENS.replace_all(raw, "");
    let cleaned: String = stripped
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | '%'))
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Strip the profile-link hint and any `(NN-NNNN)` code from an occupation title.
pub fn clean_occupation_title(raw: &str) -> String {
    let no_hint = PROFILE_HINT.replace_all(raw, "");
    let no_code = SOC_CODE.replace_all(&no_hint, "");
    no_code.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// SOC code embedded in a title such as `Cooks, Restaurant(35-2014)`.
pub fn soc_code_in(raw: &str) -> Option<String> {
    SOC_CODE.captures(raw).map(|c| c[1].to_string())
}

/// Occupation column: the portal's exact header, else the first hinted header.
pub fn occupation_column(table: &Table) -> Option<usize> {
    table
        .column_index(PORTAL_OCCUPATION_HEADER)
        .or_else(|| table.find_column(OCCUPATION_HINTS))
}

/// Prefers a header naming the occupation title over a code column when both exist.
fn title_column(table: &Table) -> Option<usize> {
    table
        .column_index(PORTAL_OCCUPATION_HEADER)
        .or_else(|| table.find_column_excluding(&["occupation", "title"], &["code"]))
        .or_else(|| occupation_column(table))
}

pub fn lq_column(table: &Table) -> Option<usize> {
    table.find_column(LQ_HINTS)
}

fn is_header_row(occupation: &str) -> bool {
    let lower = occupation.to_lowercase();
    HEADER_INDICATORS.iter().any(|h| lower.contains(h))
}

/// Drop empty and repeated-header rows, trim headers and coerce the LQ column.
///
/// Without an occupation column only blank rows are removed. LQ cells that do
/// not parse become empty strings.
pub fn clean_table(mut table: Table) -> Table {
    let before = table.num_rows();
    table
        .rows
        .retain(|r| r.iter().any(|c| !c.trim().is_empty()));
    for h in &mut table.headers {
        *h = h.trim().to_string();
    }

    match occupation_column(&table) {
        Some(occ) => {
            debug!(column = %table.headers[occ], "occupation column");
            table.rows.retain(|r| {
                let cell = r[occ].trim();
                !cell.is_empty() && !is_header_row(cell)
            });
        }
        None => warn!(headers = ?table.headers, "no occupation column found"),
    }

    if let Some(lq) = lq_column(&table) {
        debug!(column = %table.headers[lq], "cleaning location quotient column");
        for row in &mut table.rows {
            row[lq] = parse_number(&row[lq])
                .map(|v| v.to_string())
                .unwrap_or_default();
        }
    } else {
        warn!("no location quotient column found");
    }

    info!(before, after = table.num_rows(), "cleaned table");
    table
}

fn number_at(row: &[String], idx: Option<usize>) -> Option<f64> {
    idx.and_then(|i| parse_number(&row[i]))
}

/// Turn a cleaned table into typed records. Needs an occupation column.
pub fn to_records(table: &Table) -> Option<Vec<OccupationRecord>> {
    let occ = title_column(table)?;
    let lq = lq_column(table);
    let employment = table.find_column_excluding(&["employment"], EMPLOYMENT_EXCLUDES);
    let annual = table
        .find_column(&["annual mean"])
        .or_else(|| table.find_column_excluding(&["mean wage"], &["hourly"]));
    let hourly = table.find_column(&["hourly mean", "mean hourly"]);
    let code = table
        .headers
        .iter()
        .enumerate()
        .find(|&(i, h)| {
            let h = h.to_lowercase();
            i != occ && (h.contains("soc") || h.contains("code"))
        })
        .map(|(i, _)| i);

    Some(
        table
            .rows
            .iter()
            .map(|row| {
                let raw = &row[occ];
                let soc_code = soc_code_in(raw).or_else(|| {
                    code.map(|i| row[i].trim())
                        .filter(|c| BARE_SOC_CODE.is_match(c))
                        .map(str::to_string)
                });
                OccupationRecord {
                    occupation: clean_occupation_title(raw),
                    soc_code,
                    employment: number_at(row, employment),
                    annual_mean_wage: number_at(row, annual),
                    hourly_mean_wage: number_at(row, hourly),
                    location_quotient: number_at(row, lq),
                }
            })
            .collect(),
    )
}
