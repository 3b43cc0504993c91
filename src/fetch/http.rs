// src/fetch/http.rs

use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, warn};
use url::Url;

use crate::config::HttpConfig;

pub fn build_client(cfg: &HttpConfig) -> Result<Client> {
    Client::builder()
        .user_agent(cfg.user_agent.clone())
        .timeout(Duration::from_secs(cfg.timeout_secs))
        .cookie_store(true)
        .gzip(true)
        .build()
        .context("building HTTP client")
}

async fn get_text_core(client: &Client, url: &Url) -> Result<String> {
    debug!("Fetching text from {}", url);
    client
        .get(url.clone())
        .send()
        .await
        .with_context(|| format!("GET {} failed", url))?
        .error_for_status()
        .with_context(|| format!("Non-success status {}", url))?
        .text()
        .await
        .with_context(|| format!("Reading text from {}", url))
}

/// GET `url`, retrying with exponential backoff.
pub async fn get_text_with_retry(client: &Client, url: &Url, cfg: &HttpConfig) -> Result<String> {
    let mut attempts = 0;
    loop {
        match get_text_core(client, url).await {
            Ok(t) => return Ok(t),
            Err(e) if attempts < cfg.max_retries => {
                attempts += 1;
                let backoff = cfg.initial_backoff_ms * 2u64.pow(attempts - 1);
                warn!(%url, attempt = attempts, delay_ms = backoff, error = %e, "Retrying");
                sleep(Duration::from_millis(backoff)).await;
            }
            Err(e) => {
                error!(%url, error = %e, "Exhausted retries");
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
        time::Instant,
    };

    /// Answer one connection per status in `statuses`, then stop listening.
    async fn serve(statuses: Vec<u16>) -> Result<(Url, Arc<AtomicUsize>)> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let url = Url::parse(&format!("http://{}/oes/40140", listener.local_addr()?))?;
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        tokio::spawn(async move {
            for status in statuses {
                let Ok((mut sock, _)) = listener.accept().await else {
                    return;
                };
                let mut buf = [0u8; 4096];
                let _ = sock.read(&mut buf).await;
                counter.fetch_add(1, Ordering::SeqCst);
                let body = if status == 200 { "Riverside OES" } else { "busy" };
                let resp = format!(
                    "HTTP/1.1 {status} Status\r\ncontent-type: text/html\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = sock.write_all(resp.as_bytes()).await;
                let _ = sock.shutdown().await;
            }
        });
        Ok((url, hits))
    }

    fn http_cfg(max_retries: u32, initial_backoff_ms: u64) -> HttpConfig {
        HttpConfig {
            max_retries,
            initial_backoff_ms,
            timeout_secs: 5,
            ..HttpConfig::default()
        }
    }

    #[tokio::test]
    async fn retries_server_errors_with_doubling_backoff() -> Result<()> {
        let (url, hits) = serve(vec![500, 503, 200]).await?;
        let cfg = http_cfg(3, 40);
        let client = build_client(&cfg)?;

        let start = Instant::now();
        let body = get_text_with_retry(&client, &url, &cfg).await?;
        assert_eq!(body, "Riverside OES");
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        // 40ms then 80ms between the three attempts
        assert!(start.elapsed() >= Duration::from_millis(120));
        Ok(())
    }

    #[tokio::test]
    async fn gives_up_after_the_last_retry() -> Result<()> {
        let (url, hits) = serve(vec![500, 500, 500, 200]).await?;
        let cfg = http_cfg(2, 1);
        let client = build_client(&cfg)?;

        let err = get_text_with_retry(&client, &url, &cfg).await.unwrap_err();
        assert!(format!("{:#}", err).contains("Non-success status"));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        Ok(())
    }
}
