// src/table.rs

use anyhow::{Context, Result};
use std::{collections::HashMap, fs, path::Path};

/// A header row plus string cells, as pulled out of an HTML `<table>` or a CSV.
///
/// Rows are always exactly `headers.len()` wide once they go through
/// [`Table::new`] or [`Table::push_row`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let mut table = Self {
            headers,
            rows: Vec::with_capacity(rows.len()),
        };
        for row in rows {
            table.push_row(row);
        }
        table
    }

    /// Headers `0, 1, 2, …` for tables scraped without a header row.
    pub fn positional(rows: Vec<Vec<String>>) -> Self {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        let headers = (0..width).map(|i| i.to_string()).collect();
        Self::new(headers, rows)
    }

    /// Append a row, padding with empty cells or truncating to the header width.
    pub fn push_row(&mut self, mut row: Vec<String>) {
        row.resize(self.headers.len(), String::new());
        self.rows.push(row);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_columns(&self) -> usize {
        self.headers.len()
    }

    /// Index of the first header containing any of `needles` (case-insensitive).
    pub fn find_column(&self, needles: &[&str]) -> Option<usize> {
        self.headers.iter().position(|h| {
            let h = h.to_lowercase();
            needles.iter().any(|n| h.contains(n))
        })
    }

    /// Like [`Table::find_column`], skipping headers that contain any of `excluded`.
    pub fn find_column_excluding(&self, needles: &[&str], excluded: &[&str]) -> Option<usize> {
        self.headers.iter().position(|h| {
            let h = h.to_lowercase();
            needles.iter().any(|n| h.contains(n)) && !excluded.iter().any(|x| h.contains(x))
        })
    }

    pub fn column_index(&self, exact: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == exact)
    }

    pub fn column(&self, idx: usize) -> impl Iterator<Item = &str> {
        self.rows.iter().map(move |r| r[idx].as_str())
    }

    /// Index of the `n`-th (0-based) header equal to `exact`.
    pub fn nth_column_index(&self, exact: &str, n: usize) -> Option<usize> {
        self.headers
            .iter()
            .enumerate()
            .filter(|(_, h)| *h == exact)
            .nth(n)
            .map(|(i, _)| i)
    }

    /// Stack `other` below `self`. Columns are matched by header name, the k-th
    /// repeat of a name in `other` to the k-th repeat in `self`; headers only
    /// present in `other` are appended and earlier rows get empty cells.
    pub fn concat(&mut self, other: Table) {
        let mut mapping = Vec::with_capacity(other.headers.len());
        let mut repeats: HashMap<&str, usize> = HashMap::new();
        for h in &other.headers {
            let nth = repeats.entry(h.as_str()).or_insert(0);
            let found = self.nth_column_index(h, *nth);
            *nth += 1;
            let idx = match found {
                Some(i) => i,
                None => {
                    self.headers.push(h.clone());
                    for row in &mut self.rows {
                        row.push(String::new());
                    }
                    self.headers.len() - 1
                }
            };
            mapping.push(idx);
        }

        for row in other.rows {
            let mut out = vec![String::new(); self.headers.len()];
            for (cell, &idx) in row.into_iter().zip(&mapping) {
                out[idx] = cell;
            }
            self.rows.push(out);
        }
    }

    pub fn read_csv(path: &Path) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .with_context(|| format!("opening CSV {}", path.display()))?;
        let headers = rdr
            .headers()
            .with_context(|| format!("reading header of {}", path.display()))?
            .iter()
            .map(str::to_string)
            .collect();
        let mut rows = Vec::new();
        for rec in rdr.records() {
            let rec = rec.with_context(|| format!("reading record from {}", path.display()))?;
            rows.push(rec.iter().map(str::to_string).collect());
        }
        Ok(Self::new(headers, rows))
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating directory {}", parent.display()))?;
        }
        let mut wtr = csv::Writer::from_path(path)
            .with_context(|| format!("creating CSV {}", path.display()))?;
        wtr.write_record(&self.headers)?;
        for row in &self.rows {
            wtr.write_record(row)?;
        }
        wtr.flush()
            .with_context(|| format!("flushing CSV {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn s(v: &[&str]) -> Vec<String> {
        v.iter().map(|x| x.to_string()).collect()
    }

    #[test]
    fn rows_are_fitted_to_header_width() {
        let t = Table::new(s(&["a", "b"]), vec![s(&["1"]), s(&["1", "2", "3"])]);
        assert_eq!(t.rows, vec![s(&["1", ""]), s(&["1", "2"])]);
    }

    #[test]
    fn find_column_is_case_insensitive_substring() {
        let t = Table::new(
            s(&["Occupation (SOC code)", "Employment(1)", "Employment percent relative standard error(3)"]),
            vec![],
        );
        assert_eq!(t.find_column(&["occupation"]), Some(0));
        assert_eq!(t.find_column_excluding(&["employment"], &["percent"]), Some(1));
        assert_eq!(t.find_column(&["quotient"]), None);
    }

    #[test]
    fn concat_unions_headers() {
        let mut a = Table::new(s(&["x", "y"]), vec![s(&["1", "2"])]);
        let b = Table::new(s(&["y", "z"]), vec![s(&["3", "4"])]);
        a.concat(b);
        assert_eq!(a.headers, s(&["x", "y", "z"]));
        assert_eq!(a.rows, vec![s(&["1", "2", ""]), s(&["", "3", "4"])]);
    }

    #[test]
    fn concat_keeps_repeated_headers_apart() {
        let headers = s(&["Occupation (SOC code)", "Annual wage", "Annual wage", "Location Quotient"]);
        let mut a = Table::new(headers.clone(), vec![s(&["Cooks", "100", "200", "1.5"])]);
        let b = Table::new(headers.clone(), vec![s(&["Nurses", "300", "400", "0.8"])]);
        a.concat(b);
        assert_eq!(a.headers, headers);
        assert_eq!(a.rows[1], s(&["Nurses", "300", "400", "0.8"]));

        // a third copy only in the new table gets its own column
        let c = Table::new(
            s(&["Annual wage", "Annual wage", "Annual wage"]),
            vec![s(&["1", "2", "3"])],
        );
        a.concat(c);
        assert_eq!(a.num_columns(), 5);
        assert_eq!(a.nth_column_index("Annual wage", 2), Some(4));
        assert_eq!(a.rows[2], s(&["", "1", "2", "", "3"]));
        assert_eq!(a.rows[0][4], "");
    }

    #[test]
    fn csv_round_trip_preserves_quoted_cells() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("nested").join("t.csv");
        let t = Table::new(
            s(&["Occupation", "Employment"]),
            vec![s(&["Cooks, Restaurant", "1,230"])],
        );
        t.write_csv(&path)?;
        assert_eq!(Table::read_csv(&path)?, t);
        Ok(())
    }
}
