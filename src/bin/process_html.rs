use anyhow::{bail, Result};
use clap::Parser;
use oesscraper::{config::TableSelection, pipeline};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Extract and analyze OES tables from saved page sources")]
struct Args {
    /// A saved `*_page_source.html`, or a directory to search for them.
    input: PathBuf,
    /// Source name used as file prefix; defaults to the name in the file.
    #[arg(short, long)]
    name: Option<String>,
    #[arg(short, long, value_enum, default_value = "all")]
    selection: TableSelection,
    /// Output directory; defaults to the page source's directory.
    #[arg(short, long)]
    output: Option<PathBuf>,
    #[arg(long, default_value_t = 10)]
    top_n: usize,
}

fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env).init();
    let args = Args::parse();

    let snapshots = if args.input.is_dir() {
        pipeline::discover_snapshots(&args.input)?
    } else {
        let stem = args
            .input
            .file_name()
            .and_then(|s| s.to_str())
            .map(|f| f.trim_end_matches(".html").trim_end_matches("_page_source"))
            .unwrap_or("page")
            .to_string();
        vec![(stem, args.input.clone())]
    };
    if snapshots.is_empty() {
        bail!("no page sources found under {}", args.input.display());
    }

    let mut failed = 0;
    for (stem, path) in snapshots {
        let name = args.name.clone().unwrap_or(stem);
        let out_dir = match &args.output {
            Some(o) => o.clone(),
            None => path.parent().map(PathBuf::from).unwrap_or_default(),
        };
        match pipeline::process_snapshot(&path, &name, args.selection, &out_dir, args.top_n) {
            Ok(outcome) => info!(
                source = %outcome.name,
                occupations = outcome.records.len(),
                "processed {}",
                path.display()
            ),
            Err(e) => {
                error!("{}: {:#}", path.display(), e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{} page source(s) failed", failed);
    }
    Ok(())
}
