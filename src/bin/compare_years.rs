use anyhow::Result;
use clap::Parser;
use oesscraper::pipeline;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Compare location quotients between two survey years")]
struct Args {
    /// Cleaned CSV of the earlier year.
    baseline: PathBuf,
    /// Cleaned CSV of the later year.
    target: PathBuf,
    #[arg(long, default_value = "2019")]
    label_a: String,
    #[arg(long, default_value = "2024")]
    label_b: String,
    /// Output CSV; defaults to the comparison file in the current directory.
    #[arg(short, long)]
    output: Option<PathBuf>,
    #[arg(long, default_value_t = 10)]
    top_n: usize,
}

fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env).init();
    let args = Args::parse();

    let out = args
        .output
        .unwrap_or_else(|| pipeline::comparison_path(&PathBuf::from("."), &args.label_a, &args.label_b));
    let rows = pipeline::compare_csvs(
        &args.baseline,
        &args.target,
        &args.label_a,
        &args.label_b,
        &out,
        args.top_n,
    )?;
    info!(compared = rows.len(), "comparison completed");
    Ok(())
}
