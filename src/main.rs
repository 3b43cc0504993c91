use anyhow::Result;
use clap::Parser;
use futures::{stream::FuturesUnordered, StreamExt};
use oesscraper::{
    config::Config,
    fetch::http::build_client,
    manifest,
    pipeline::{self, SourcePaths},
};
use std::{path::PathBuf, sync::Arc};
use tokio::{sync::Semaphore, time::Instant};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// Browsers are heavy; keep the number of live Chrome instances small.
const MAX_CONCURRENT_SOURCES: usize = 2;

#[derive(Parser)]
#[command(author, version, about = "Scrape and analyze OES location quotients")]
struct Args {
    /// YAML config; falls back to $OES_CONFIG, then built-in defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Override the output directory.
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Re-process saved page sources instead of scraping.
    #[arg(long)]
    skip_scrape: bool,
    /// Only run these sources (by name).
    #[arg(long = "source")]
    sources: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    info!("startup");

    // ─── 2) load config ──────────────────────────────────────────────
    let args = Args::parse();
    let mut cfg = Config::load(args.config.as_deref())?;
    if let Some(out) = args.output {
        cfg.output_dir = out;
    }
    std::fs::create_dir_all(&cfg.output_dir)?;
    let selected: Vec<_> = cfg
        .sources
        .iter()
        .filter(|s| args.sources.is_empty() || args.sources.contains(&s.name))
        .cloned()
        .collect();
    if selected.is_empty() {
        anyhow::bail!("no configured source matches {:?}", args.sources);
    }
    info!(
        output = %cfg.output_dir.display(),
        sources = selected.len(),
        "configured"
    );

    // ─── 3) scrape or re-process each source ─────────────────────────
    let cfg = Arc::new(cfg);
    let mut failed: Vec<String> = Vec::new();

    if args.skip_scrape {
        for src in selected {
            let paths = SourcePaths::for_source(&cfg, &src);
            if !paths.page_source.exists() {
                warn!(source = %src.name, path = %paths.page_source.display(), "no saved page source");
                failed.push(src.name);
                continue;
            }
            let top_n = cfg.analysis.top_n;
            let name = src.name.clone();
            let processed = tokio::task::spawn_blocking(move || {
                pipeline::process_snapshot(&paths.page_source, &name, src.selection, &paths.dir, top_n)
            })
            .await;
            match processed {
                Ok(Ok(outcome)) => info!(
                    source = %outcome.name,
                    occupations = outcome.records.len(),
                    "re-processed saved page source"
                ),
                Ok(Err(e)) => {
                    error!(source = %src.name, "processing failed: {:#}", e);
                    failed.push(src.name);
                }
                Err(e) => {
                    error!(source = %src.name, "processing task panicked: {}", e);
                    failed.push(src.name);
                }
            }
        }
    } else {
        let client = build_client(&cfg.http)?;
        let sem = Arc::new(Semaphore::new(MAX_CONCURRENT_SOURCES));
        let mut tasks = FuturesUnordered::new();

        for src in selected {
            let cfg = Arc::clone(&cfg);
            let client = client.clone();
            let sem = Arc::clone(&sem);
            let name = src.name.clone();
            let handle = tokio::spawn(async move {
                // Err only if the semaphore is closed
                let _permit = sem.acquire_owned().await;
                let start = Instant::now();
                let outcome = pipeline::run_source(&src, &cfg, &client).await;
                info!(source = %src.name, elapsed = ?start.elapsed(), ok = outcome.is_ok(), "source finished");
                outcome
            });
            tasks.push(async move { (name, handle.await) });
        }

        while let Some((name, joined)) = tasks.next().await {
            match joined {
                Ok(Ok(outcome)) => info!(
                    source = %outcome.name,
                    occupations = outcome.records.len(),
                    extraction = %outcome.manifest.extraction,
                    "extracted OES data"
                ),
                Ok(Err(e)) => {
                    error!(source = %name, "{:#}", e);
                    failed.push(name);
                }
                Err(e) => {
                    error!(source = %name, "source task panicked: {}", e);
                    failed.push(name);
                }
            }
        }
    }

    // ─── 4) compare the configured pair ──────────────────────────────
    let mut steps_failed = failed.len();
    match pipeline::compare_after_run(&cfg, &failed) {
        Ok(Some(rows)) => info!(compared = rows.len(), "comparison completed"),
        Ok(None) => info!("no comparison this run"),
        Err(e) => {
            error!("comparison failed: {:#}", e);
            steps_failed += 1;
        }
    }

    for m in manifest::load_all(&cfg.output_dir)? {
        info!(
            source = %m.source,
            finished = %m.finished_at,
            cleaned_rows = m.cleaned_rows,
            with_lq = m.records_with_lq,
            "run"
        );
    }

    if steps_failed > 0 {
        anyhow::bail!(
            "{} step(s) failed ({:?}); check the saved page sources and screenshots",
            steps_failed,
            failed
        );
    }
    info!("all done");
    Ok(())
}
