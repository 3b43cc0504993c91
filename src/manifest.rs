// src/manifest.rs

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use glob::glob;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::warn;

/// What one pipeline run over a source produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub source: String,
    pub url: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// e.g. `tables 2/5` or `elements tbody tr`
    pub extraction: String,
    /// Wait selector the browser saw before capturing the page.
    #[serde(default)]
    pub wait_selector: Option<String>,
    pub raw_rows: usize,
    pub cleaned_rows: usize,
    pub records_with_lq: usize,
    pub files: Vec<PathBuf>,
}

impl RunManifest {
    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("writing manifest {}", path.display()))
    }

    pub fn read(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading manifest {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing manifest {}", path.display()))
    }
}

/// Every readable `*_manifest.json` under `dir`, newest run first.
pub fn load_all(dir: &Path) -> Result<Vec<RunManifest>> {
    let pattern = format!("{}/**/*_manifest.json", dir.display());
    let mut out = Vec::new();
    for entry in glob(&pattern)? {
        let Ok(path) = entry else { continue };
        match RunManifest::read(&path) {
            Ok(m) => out.push(m),
            Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable manifest"),
        }
    }
    out.sort_by(|a, b| b.finished_at.cmp(&a.finished_at));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::tempdir;

    fn manifest(source: &str, finished_at: DateTime<Utc>) -> RunManifest {
        RunManifest {
            source: source.to_string(),
            url: "https://www.bls.gov/oes/2019/may/oes_40140.htm".to_string(),
            started_at: finished_at - Duration::seconds(30),
            finished_at,
            extraction: "tables 1/4".to_string(),
            wait_selector: Some("table".to_string()),
            raw_rows: 800,
            cleaned_rows: 780,
            records_with_lq: 770,
            files: vec![PathBuf::from("riverside_2019_data.csv")],
        }
    }

    #[test]
    fn load_all_orders_newest_first_and_skips_garbage() -> Result<()> {
        let dir = tempdir()?;
        let now = Utc::now();
        fs::create_dir_all(dir.path().join("a"))?;
        fs::create_dir_all(dir.path().join("b"))?;
        manifest("old", now - Duration::hours(1)).write(&dir.path().join("a/old_manifest.json"))?;
        manifest("new", now).write(&dir.path().join("b/new_manifest.json"))?;
        fs::write(dir.path().join("broken_manifest.json"), "{")?;

        let all = load_all(dir.path())?;
        let names: Vec<_> = all.iter().map(|m| m.source.as_str()).collect();
        assert_eq!(names, vec!["new", "old"]);
        assert_eq!(all[0], RunManifest::read(&dir.path().join("b/new_manifest.json"))?);
        Ok(())
    }
}
