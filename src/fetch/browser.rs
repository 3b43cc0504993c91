// src/fetch/browser.rs

use anyhow::{anyhow, Context, Result};
use headless_chrome::{protocol::cdp::Page::CaptureScreenshotFormatOption, Browser, LaunchOptions, Tab};
use std::{ffi::OsStr, thread, time::Duration};
use tracing::{debug, info, warn};

use super::RenderedPage;
use crate::config::BrowserConfig;

/// Chrome is torn down after this long without DevTools traffic.
const IDLE_BROWSER_TIMEOUT: Duration = Duration::from_secs(180);

/// Render `url` in headless Chrome and return the resulting DOM.
///
/// Blocking; call from `spawn_blocking`. The browser process is killed when
/// `Browser` drops, whichever way this returns.
pub fn render(url: &str, cfg: &BrowserConfig) -> Result<RenderedPage> {
    let user_agent = format!("--user-agent={}", cfg.user_agent);
    let args: Vec<&OsStr> = vec![
        OsStr::new("--disable-dev-shm-usage"),
        OsStr::new("--disable-gpu"),
        OsStr::new(&user_agent),
    ];
    let options = LaunchOptions::default_builder()
        .headless(cfg.headless)
        .sandbox(cfg.sandbox)
        .window_size(Some((cfg.window_width, cfg.window_height)))
        .idle_browser_timeout(IDLE_BROWSER_TIMEOUT)
        .args(args)
        .build()
        .map_err(|e| anyhow!("building browser launch options: {e}"))?;

    debug!(headless = cfg.headless, "launching Chrome");
    let browser = Browser::new(options)
        .context("launching headless Chrome (is Chrome or Chromium installed?)")?;
    let tab = browser.new_tab().context("opening browser tab")?;

    info!(%url, "navigating");
    tab.navigate_to(url)
        .with_context(|| format!("navigating to {}", url))?;
    tab.wait_until_navigated()
        .with_context(|| format!("waiting for {} to load", url))?;

    thread::sleep(cfg.settle());

    let found_selector = wait_for_any(&tab, &cfg.wait_selectors, cfg.selector_timeout());
    if found_selector.is_none() {
        warn!(%url, "no data elements appeared, continuing anyway");
    }

    let screenshot = if cfg.screenshot {
        match tab.capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true) {
            Ok(png) => Some(png),
            Err(e) => {
                warn!(error = %e, "screenshot failed");
                None
            }
        }
    } else {
        None
    };

    let html = tab.get_content().context("reading rendered page content")?;
    info!(%url, chars = html.len(), "page rendered");

    Ok(RenderedPage {
        url: url.to_string(),
        html,
        screenshot,
        found_selector,
    })
}

/// Poll each selector in turn; the first one present wins.
fn wait_for_any(tab: &Tab, selectors: &[String], timeout: Duration) -> Option<String> {
    for sel in selectors {
        match tab.wait_for_element_with_custom_timeout(sel, timeout) {
            Ok(_) => {
                info!(selector = %sel, "found data element");
                return Some(sel.clone());
            }
            Err(e) => debug!(selector = %sel, error = %e, "selector not found"),
        }
    }
    None
}
