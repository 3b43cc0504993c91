// src/pipeline.rs

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use glob::glob;
use reqwest::Client;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{info, instrument, warn};

use crate::{
    analyze::{self, ReportRow, SummaryRow},
    clean::{clean_table, to_records, OccupationRecord},
    compare::{self, ComparisonRow},
    config::{Config, SourceConfig, TableSelection},
    extract::{extract_oes_table, ExtractionMethod},
    fetch::{self, RenderedPage},
    manifest::RunManifest,
    report,
    table::Table,
};

const PAGE_SOURCE_SUFFIX: &str = "_page_source.html";

/// Where every artifact of one source lives.
#[derive(Debug, Clone)]
pub struct SourcePaths {
    pub dir: PathBuf,
    pub page_source: PathBuf,
    pub screenshot: PathBuf,
    pub raw_csv: PathBuf,
    pub cleaned_csv: PathBuf,
    pub analysis_csv: PathBuf,
    pub report_csv: PathBuf,
    pub manifest: PathBuf,
}

impl SourcePaths {
    pub fn new(dir: &Path, name: &str) -> Self {
        let f = |suffix: &str| dir.join(format!("{name}{suffix}"));
        Self {
            dir: dir.to_path_buf(),
            page_source: f(PAGE_SOURCE_SUFFIX),
            screenshot: f("_screenshot.png"),
            raw_csv: f("_data.csv"),
            cleaned_csv: f("_cleaned_data.csv"),
            analysis_csv: f("_analysis_results.csv"),
            report_csv: f("_location_quotient_report.csv"),
            manifest: f("_manifest.json"),
        }
    }

    pub fn for_source(cfg: &Config, src: &SourceConfig) -> Self {
        Self::new(&cfg.source_dir(src), &src.name)
    }
}

/// Result of running one source end to end.
#[derive(Debug)]
pub struct SourceOutcome {
    pub name: String,
    pub records: Vec<OccupationRecord>,
    pub manifest: RunManifest,
}

/// Everything `process_html` needs besides the HTML itself.
#[derive(Debug, Clone)]
pub struct ProcessOptions {
    pub name: String,
    pub url: String,
    pub selection: TableSelection,
    pub top_n: usize,
    pub started_at: DateTime<Utc>,
    /// Selector the renderer waited for, if it found one.
    pub wait_selector: Option<String>,
}

/// Scrape one source and run the offline steps on the result.
#[instrument(level = "info", skip_all, fields(source = %src.name))]
pub async fn run_source(src: &SourceConfig, cfg: &Config, client: &Client) -> Result<SourceOutcome> {
    let started_at = Utc::now();
    let paths = SourcePaths::for_source(cfg, src);
    fs::create_dir_all(&paths.dir)
        .with_context(|| format!("creating {}", paths.dir.display()))?;

    let page = fetch::fetch_page(src, cfg, client).await?;
    save_snapshot(&page, &paths)?;

    let opts = ProcessOptions {
        name: src.name.clone(),
        url: page.url.clone(),
        selection: src.selection,
        top_n: cfg.analysis.top_n,
        started_at,
        wait_selector: page.found_selector.clone(),
    };
    tokio::task::spawn_blocking(move || process_html(&page.html, &opts, &paths))
        .await
        .context("processing task panicked")?
}

/// Write the rendered HTML and screenshot next to the other artifacts.
pub fn save_snapshot(page: &RenderedPage, paths: &SourcePaths) -> Result<()> {
    fs::write(&paths.page_source, &page.html)
        .with_context(|| format!("saving page source {}", paths.page_source.display()))?;
    info!(path = %paths.page_source.display(), "page source saved");
    if let Some(png) = &page.screenshot {
        fs::write(&paths.screenshot, png)
            .with_context(|| format!("saving screenshot {}", paths.screenshot.display()))?;
        info!(path = %paths.screenshot.display(), "screenshot saved");
    }
    Ok(())
}

/// Extract, clean, analyze and write every CSV for one page.
pub fn process_html(html: &str, opts: &ProcessOptions, paths: &SourcePaths) -> Result<SourceOutcome> {
    fs::create_dir_all(&paths.dir)
        .with_context(|| format!("creating {}", paths.dir.display()))?;

    let extraction = extract_oes_table(html, opts.selection)
        .with_context(|| format!("extracting OES table for {}", opts.name))?;
    let raw = extraction.table;
    info!(rows = raw.num_rows(), cols = raw.num_columns(), headers = ?raw.headers, "extracted data");
    raw.write_csv(&paths.raw_csv)?;
    info!(path = %paths.raw_csv.display(), "data saved");

    let raw_rows = raw.num_rows();
    let cleaned = clean_table(raw);
    cleaned.write_csv(&paths.cleaned_csv)?;
    info!(path = %paths.cleaned_csv.display(), "cleaned data saved");

    let mut files = vec![paths.raw_csv.clone(), paths.cleaned_csv.clone()];
    let records = match to_records(&cleaned) {
        Some(records) => {
            analyze_records(&opts.name, &records, opts.top_n, paths)?;
            files.push(paths.analysis_csv.clone());
            files.push(paths.report_csv.clone());
            records
        }
        None => {
            warn!(source = %opts.name, "no occupation column; skipping analysis");
            Vec::new()
        }
    };

    let extraction = match extraction.method {
        ExtractionMethod::Tables { matched, total } => format!("tables {matched}/{total}"),
        ExtractionMethod::Elements { selector } => format!("elements {selector}"),
    };
    let manifest = RunManifest {
        source: opts.name.clone(),
        url: opts.url.clone(),
        started_at: opts.started_at,
        finished_at: Utc::now(),
        extraction,
        wait_selector: opts.wait_selector.clone(),
        raw_rows,
        cleaned_rows: cleaned.num_rows(),
        records_with_lq: records.iter().filter(|r| r.location_quotient.is_some()).count(),
        files,
    };
    manifest.write(&paths.manifest)?;

    Ok(SourceOutcome {
        name: opts.name.clone(),
        records,
        manifest,
    })
}

/// Log the analysis and write the summary and report CSVs.
pub fn analyze_records(
    label: &str,
    records: &[OccupationRecord],
    top_n: usize,
    paths: &SourcePaths,
) -> Result<()> {
    analyze::log_analysis(label, records, top_n);

    report::write_rows(
        &paths.analysis_csv,
        SummaryRow::HEADERS,
        &analyze::analysis_summary(records),
    )?;
    info!(path = %paths.analysis_csv.display(), "analysis results saved");

    let lq_report = analyze::location_quotient_report(records);
    report::write_rows(&paths.report_csv, ReportRow::HEADERS, &lq_report)?;
    analyze::log_report(label, &lq_report);
    info!(path = %paths.report_csv.display(), "location quotient report saved");
    Ok(())
}

/// Re-run the offline steps on a saved page source.
pub fn process_snapshot(
    html_path: &Path,
    name: &str,
    selection: TableSelection,
    out_dir: &Path,
    top_n: usize,
) -> Result<SourceOutcome> {
    let html = fs::read_to_string(html_path)
        .with_context(|| format!("reading {}", html_path.display()))?;
    info!(path = %html_path.display(), chars = html.len(), "read saved page source");
    let opts = ProcessOptions {
        name: name.to_string(),
        url: html_path.display().to_string(),
        selection,
        top_n,
        started_at: Utc::now(),
        wait_selector: None,
    };
    process_html(&html, &opts, &SourcePaths::new(out_dir, name))
}

/// Saved page sources under `dir`, as `(source name, path)`.
pub fn discover_snapshots(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let pattern = format!("{}/**/*{}", dir.display(), PAGE_SOURCE_SUFFIX);
    let mut out = Vec::new();
    for entry in glob(&pattern)? {
        let Ok(path) = entry else { continue };
        let Some(fname) = path.file_name().and_then(|s| s.to_str()) else {
            continue;
        };
        if let Some(name) = fname.strip_suffix(PAGE_SOURCE_SUFFIX) {
            out.push((name.to_string(), path.clone()));
        }
    }
    out.sort();
    Ok(out)
}

pub fn comparison_path(out_dir: &Path, label_baseline: &str, label_target: &str) -> PathBuf {
    out_dir.join(format!(
        "location_quotient_comparison_{label_baseline}_{label_target}.csv"
    ))
}

/// Compare two cleaned CSVs, log the rankings and write the comparison CSV.
#[instrument(level = "info", skip(out_path, top_n))]
pub fn compare_csvs(
    baseline_csv: &Path,
    target_csv: &Path,
    label_baseline: &str,
    label_target: &str,
    out_path: &Path,
    top_n: usize,
) -> Result<Vec<ComparisonRow>> {
    let baseline = report::read_records(baseline_csv)?;
    let target = report::read_records(target_csv)?;
    info!(baseline = baseline.len(), target = target.len(), "loaded both years");

    let rows = compare::compare_records(&baseline, &target);
    compare::log_comparison(&rows, top_n, label_baseline, label_target);

    let (headers, body) = compare::to_csv_records(&rows, label_baseline, label_target);
    Table::new(headers, body).write_csv(out_path)?;
    info!(path = %out_path.display(), "comparison results saved");
    Ok(rows)
}

/// Compare the configured baseline and target sources from their cleaned CSVs.
pub fn compare_configured(cfg: &Config) -> Result<Option<Vec<ComparisonRow>>> {
    let Some(pair) = &cfg.compare else {
        return Ok(None);
    };
    let lookup = |name: &str| {
        cfg.source(name)
            .with_context(|| format!("unknown source {}", name))
    };
    let baseline = lookup(&pair.baseline)?;
    let target = lookup(&pair.target)?;
    let label_a = baseline.year.to_string();
    let label_b = target.year.to_string();

    let rows = compare_csvs(
        &SourcePaths::for_source(cfg, baseline).cleaned_csv,
        &SourcePaths::for_source(cfg, target).cleaned_csv,
        &label_a,
        &label_b,
        &comparison_path(&cfg.output_dir, &label_a, &label_b),
        cfg.analysis.top_n,
    )?;
    Ok(Some(rows))
}

/// Run the configured comparison unless its baseline or target failed in this
/// run; their cleaned CSVs would be left over from an earlier run.
pub fn compare_after_run(cfg: &Config, failed: &[String]) -> Result<Option<Vec<ComparisonRow>>> {
    if let Some(pair) = &cfg.compare {
        let stale: Vec<&String> = [&pair.baseline, &pair.target]
            .into_iter()
            .filter(|name| failed.contains(name))
            .collect();
        if !stale.is_empty() {
            warn!(sources = ?stale, "skipping comparison, source failed in this run");
            return Ok(None);
        }
    }
    compare_configured(cfg)
}
