// src/extract.rs

use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};

use crate::clean::parse_number;
use crate::config::TableSelection;
use crate::table::Table;

/// Header fragments that mark a table as OES data.
const OES_HEADER_HINTS: &[&str] = &["occupation", "employment", "wage", "location quotient", "lq"];

/// Row-like selectors tried when no `<table>` qualifies.
const ROW_SELECTORS: &[&str] = &[
    "tbody tr",
    ".data-row",
    "[data-testid='data-row']",
    ".oes-row",
    "tr",
];

/// A selector has to match more than this many elements to count as data rows.
const MIN_FALLBACK_ROWS: usize = 10;

/// Headerless tables need this many rows to be considered by shape alone.
const MIN_SHAPE_ROWS: usize = 100;
const MIN_NUMERIC_COLUMNS: usize = 3;

static TABLE: Lazy<Selector> = Lazy::new(|| sel("table"));
static TR: Lazy<Selector> = Lazy::new(|| sel("tr"));
static TD: Lazy<Selector> = Lazy::new(|| sel("td"));

fn sel(css: &str) -> Selector {
    Selector::parse(css).expect("static selector should parse")
}

/// How the final table was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionMethod {
    Tables { matched: usize, total: usize },
    Elements { selector: String },
}

#[derive(Debug)]
pub struct Extraction {
    pub table: Table,
    pub method: ExtractionMethod,
}

/// Parse every `<table>` in `html` into a [`Table`], in document order.
pub fn parse_tables(html: &str) -> Vec<Table> {
    let doc = Html::parse_document(html);
    doc.select(&TABLE).map(parse_table).collect()
}

fn parse_table(table: ElementRef<'_>) -> Table {
    let mut head_rows = Vec::new();
    let mut body_rows = Vec::new();

    for tr in table.select(&TR) {
        if owning_table(tr) != Some(table) {
            continue;
        }
        match section_of(tr) {
            Section::Head => head_rows.push(tr),
            Section::Foot => {}
            Section::Body => body_rows.push(tr),
        }
    }

    // No <thead>: a leading row made only of <th> cells is the header.
    if head_rows.is_empty() {
        if let Some(first) = body_rows.first().copied() {
            let cells = cell_elements(first);
            if !cells.is_empty() && cells.iter().all(|c| c.value().name() == "th") {
                head_rows.push(first);
                body_rows.remove(0);
            }
        }
    }

    let rows: Vec<Vec<String>> = body_rows
        .into_iter()
        .map(row_cells)
        .filter(|r| !r.is_empty())
        .collect();

    match head_rows.last() {
        Some(&header) => {
            let mut headers = row_cells(header);
            let width = headers
                .len()
                .max(rows.iter().map(Vec::len).max().unwrap_or(0));
            for i in headers.len()..width {
                headers.push(i.to_string());
            }
            Table::new(headers, rows)
        }
        None => Table::positional(rows),
    }
}

enum Section {
    Head,
    Body,
    Foot,
}

fn section_of(tr: ElementRef<'_>) -> Section {
    for node in tr.ancestors() {
        if let Some(el) = ElementRef::wrap(node) {
            match el.value().name() {
                "thead" => return Section::Head,
                "tfoot" => return Section::Foot,
                "tbody" | "table" => return Section::Body,
                _ => {}
            }
        }
    }
    Section::Body
}

fn owning_table(tr: ElementRef<'_>) -> Option<ElementRef<'_>> {
    tr.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "table")
}

fn cell_elements(tr: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    tr.children()
        .filter_map(ElementRef::wrap)
        .filter(|c| matches!(c.value().name(), "td" | "th"))
        .collect()
}

/// Cell texts of a row, repeating `colspan` cells.
fn row_cells(tr: ElementRef<'_>) -> Vec<String> {
    let mut out = Vec::new();
    for cell in cell_elements(tr) {
        let text = cell_text(cell);
        let span = cell
            .value()
            .attr("colspan")
            .and_then(|s| s.trim().parse::<usize>().ok())
            .unwrap_or(1)
            .clamp(1, 64);
        for _ in 1..span {
            out.push(text.clone());
        }
        out.push(text);
    }
    out
}

fn cell_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_numeric_column(table: &Table, idx: usize) -> bool {
    let mut any = false;
    for cell in table.column(idx) {
        if cell.trim().is_empty() {
            continue;
        }
        if parse_number(cell).is_none() {
            return false;
        }
        any = true;
    }
    any
}

/// Whether `table` looks like OES data: either a header mentions an OES
/// column, or it is large and mostly numeric.
pub fn is_oes_table(table: &Table) -> bool {
    if table.is_empty() {
        return false;
    }
    if table.find_column(OES_HEADER_HINTS).is_some() {
        return true;
    }
    if table.num_rows() > MIN_SHAPE_ROWS {
        let numeric = (0..table.num_columns())
            .filter(|&i| is_numeric_column(table, i))
            .count();
        return numeric >= MIN_NUMERIC_COLUMNS;
    }
    false
}

/// Pick the OES tables out of `tables` according to `selection`.
pub fn select_tables(tables: Vec<Table>, selection: TableSelection) -> Option<(Table, usize)> {
    let mut matched = tables.into_iter().enumerate().filter(|(i, t)| {
        let ok = is_oes_table(t);
        debug!(
            table = i + 1,
            rows = t.num_rows(),
            cols = t.num_columns(),
            headers = ?t.headers,
            oes = ok,
            "inspected table"
        );
        ok
    });

    match selection {
        TableSelection::First => matched.next().map(|(i, t)| {
            info!(table = i + 1, "found main data table");
            (t, 1)
        }),
        TableSelection::All => {
            let (_, mut combined) = matched.next()?;
            let mut count = 1;
            for (_, t) in matched {
                combined.concat(t);
                count += 1;
            }
            info!(tables = count, rows = combined.num_rows(), "combined OES tables");
            Some((combined, count))
        }
    }
}

/// Fallback: treat the first row-like selector with enough hits as data rows.
pub fn extract_rows_from_elements(html: &str) -> Option<(Table, &'static str)> {
    let doc = Html::parse_document(html);
    for &css in ROW_SELECTORS {
        let Ok(selector) = Selector::parse(css) else {
            continue;
        };
        let elements: Vec<_> = doc.select(&selector).collect();
        debug!(selector = css, count = elements.len(), "row selector");
        if elements.len() <= MIN_FALLBACK_ROWS {
            continue;
        }
        let rows: Vec<Vec<String>> = elements
            .into_iter()
            .map(|el| el.select(&TD).map(cell_text).collect::<Vec<_>>())
            .filter(|r| !r.is_empty())
            .collect();
        if !rows.is_empty() {
            info!(selector = css, rows = rows.len(), "extracted rows from page elements");
            return Some((Table::positional(rows), css));
        }
    }
    None
}

/// Tables first, page elements second.
pub fn extract_oes_table(html: &str, selection: TableSelection) -> Result<Extraction> {
    let tables = parse_tables(html);
    let total = tables.len();
    info!(tables = total, "parsed tables from page");

    if let Some((table, matched)) = select_tables(tables, selection) {
        return Ok(Extraction {
            table,
            method: ExtractionMethod::Tables { matched, total },
        });
    }

    warn!("no OES table found, trying page elements");
    extract_rows_from_elements(html)
        .map(|(table, selector)| Extraction {
            table,
            method: ExtractionMethod::Elements {
                selector: selector.to_string(),
            },
        })
        .ok_or_else(|| anyhow!("no OES data found in {} tables or page elements", total))
}
