use anyhow::Result;
use clap::Parser;
use oesscraper::{config::Config, pipeline::SourcePaths};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Load the effective config and show where each source will write")]
struct Args {
    /// YAML config; falls back to $OES_CONFIG, then built-in defaults.
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env).init();
    let args = Args::parse();
    let cfg = Config::load(args.config.as_deref())?;

    for src in &cfg.sources {
        let paths = SourcePaths::for_source(&cfg, src);
        info!(
            source = %src.name,
            year = src.year,
            url = %src.url,
            renderer = ?src.renderer,
            selection = ?src.selection,
            dir = %paths.dir.display(),
            "source ok"
        );
    }
    println!("{}", serde_yaml::to_string(&cfg)?);
    Ok(())
}
