// src/fetch/mod.rs

pub mod browser;
pub mod http;

use anyhow::{bail, Context, Result};
use reqwest::Client;
use tracing::{info, instrument};
use url::Url;

use crate::config::{Config, Renderer, SourceConfig};

/// HTML of a page after rendering, plus whatever the renderer captured.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub url: String,
    pub html: String,
    /// PNG bytes; browser renderer only.
    pub screenshot: Option<Vec<u8>>,
    /// Wait selector that matched, if any.
    pub found_selector: Option<String>,
}

/// Fail unless `html` mentions at least one of `markers`. No markers, no check.
pub fn validate_page(html: &str, markers: &[String]) -> Result<()> {
    if markers.is_empty() || markers.iter().any(|m| html.contains(m.as_str())) {
        return Ok(());
    }
    bail!("page does not contain any of the expected markers {:?}", markers)
}

/// Fetch and render one source with its configured renderer.
#[instrument(level = "info", skip(src, cfg, client), fields(source = %src.name))]
pub async fn fetch_page(src: &SourceConfig, cfg: &Config, client: &Client) -> Result<RenderedPage> {
    let url = Url::parse(&src.url).with_context(|| format!("parsing url {}", src.url))?;

    let page = match src.renderer {
        Renderer::Browser => {
            let browser_cfg = cfg.browser.clone();
            let target = url.to_string();
            tokio::task::spawn_blocking(move || browser::render(&target, &browser_cfg))
                .await
                .context("browser task panicked")??
        }
        Renderer::Http => {
            let html = http::get_text_with_retry(client, &url, &cfg.http).await?;
            RenderedPage {
                url: url.to_string(),
                html,
                screenshot: None,
                found_selector: None,
            }
        }
    };

    validate_page(&page.html, &src.expect_any)
        .with_context(|| format!("validating {}", page.url))?;
    info!(chars = page.html.len(), "page contains expected data");
    Ok(page)
}
