use anyhow::{Context, Result};
use clap::Parser;
use oesscraper::{pipeline, report};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Analyze location quotients in an extracted OES CSV")]
struct Args {
    /// Raw or cleaned OES CSV.
    input: PathBuf,
    #[arg(long, default_value_t = 10)]
    top_n: usize,
}

fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env).init();
    let args = Args::parse();

    let records = report::read_records(&args.input)?;
    info!(path = %args.input.display(), occupations = records.len(), "loaded");

    let stem = args
        .input
        .file_stem()
        .and_then(|s| s.to_str())
        .context("input has no file name")?;
    let name = stem
        .trim_end_matches("_cleaned_data")
        .trim_end_matches("_data");
    let dir = args.input.parent().map(PathBuf::from).unwrap_or_default();

    pipeline::analyze_records(name, &records, args.top_n, &pipeline::SourcePaths::new(&dir, name))
}
