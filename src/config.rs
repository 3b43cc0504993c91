// src/config.rs

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};
use url::Url;

/// Environment variable pointing at a YAML config file.
pub const CONFIG_ENV: &str = "OES_CONFIG";

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// How a page gets turned into HTML.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Renderer {
    /// Headless Chrome; needed for the JavaScript query portal.
    Browser,
    /// Plain GET; enough for the static archive pages.
    Http,
}

/// Which OES-looking tables to keep when a page has several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TableSelection {
    First,
    All,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// File prefix and comparison label, e.g. `riverside_2024`.
    pub name: String,
    pub year: u16,
    pub url: String,
    #[serde(default = "default_renderer")]
    pub renderer: Renderer,
    #[serde(default = "default_selection")]
    pub selection: TableSelection,
    /// The page must mention at least one of these.
    #[serde(default = "default_expect_any")]
    pub expect_any: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless: bool,
    pub sandbox: bool,
    pub window_width: u32,
    pub window_height: u32,
    pub user_agent: String,
    /// Pause after navigation before looking for tables.
    pub settle_ms: u64,
    /// Timeout applied to each wait selector in turn.
    pub selector_timeout_ms: u64,
    pub wait_selectors: Vec<String>,
    pub screenshot: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            sandbox: false,
            window_width: 1920,
            window_height: 1080,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            settle_ms: 5_000,
            selector_timeout_ms: 10_000,
            wait_selectors: [
                "table",
                "[data-testid='data-table']",
                ".data-table",
                ".oes-data",
                "tbody",
                "tr",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            screenshot: true,
        }
    }
}

impl BrowserConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn selector_timeout(&self) -> Duration {
        Duration::from_millis(self.selector_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 500,
            timeout_secs: 60,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub top_n: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self { top_n: 10 }
    }
}

/// The pair of sources compared year over year.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareConfig {
    pub baseline: String,
    pub target: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default = "default_compare")]
    pub compare: Option<CompareConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            sources: default_sources(),
            browser: BrowserConfig::default(),
            http: HttpConfig::default(),
            analysis: AnalysisConfig::default(),
            compare: default_compare(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("oes_data")
}

fn default_renderer() -> Renderer {
    Renderer::Browser
}

fn default_selection() -> TableSelection {
    TableSelection::All
}

fn default_expect_any() -> Vec<String> {
    vec!["Riverside".to_string(), "OES".to_string()]
}

fn default_sources() -> Vec<SourceConfig> {
    vec![
        SourceConfig {
            name: "riverside_2024".to_string(),
            year: 2024,
            // Riverside-San Bernardino-Ontario, CA MSA
            url: "https://data.bls.gov/oes/#/area/0040140".to_string(),
            renderer: Renderer::Browser,
            selection: TableSelection::All,
            expect_any: default_expect_any(),
        },
        SourceConfig {
            name: "riverside_2019".to_string(),
            year: 2019,
            url: "https://www.bls.gov/oes/2019/may/oes_40140.htm".to_string(),
            renderer: Renderer::Browser,
            selection: TableSelection::First,
            expect_any: default_expect_any(),
        },
    ]
}

fn default_compare() -> Option<CompareConfig> {
    Some(CompareConfig {
        baseline: "riverside_2019".to_string(),
        target: "riverside_2024".to_string(),
    })
}

impl Config {
    /// Load from `path`, else from `$OES_CONFIG`, else fall back to the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| env::var_os(CONFIG_ENV).map(PathBuf::from));
        let cfg = match path {
            Some(p) => Self::from_file(&p)?,
            None => Self::default(),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            bail!("config lists no sources");
        }
        let mut seen = HashSet::new();
        for src in &self.sources {
            if src.name.trim().is_empty() {
                bail!("source with url {} has an empty name", src.url);
            }
            if !seen.insert(src.name.as_str()) {
                bail!("duplicate source name {}", src.name);
            }
            Url::parse(&src.url).with_context(|| format!("source {} url {}", src.name, src.url))?;
        }
        if self.analysis.top_n == 0 {
            bail!("analysis.top_n must be greater than zero");
        }
        if let Some(cmp) = &self.compare {
            for name in [&cmp.baseline, &cmp.target] {
                if self.source(name).is_none() {
                    bail!("compare refers to unknown source {}", name);
                }
            }
        }
        Ok(())
    }

    pub fn source(&self, name: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.name == name)
    }

    /// Directory holding every artifact of one source.
    pub fn source_dir(&self, src: &SourceConfig) -> PathBuf {
        self.output_dir.join(&src.name)
    }
}
