//! Auto-confirm sidecar.
//!
//! A stateless external poller: fetches `/api/pending` from the serving
//! process and confirms index 0 with the shared token until the queue
//! drains. Transient failures back off exponentially (2s to 30s).

use std::time::Duration;

use clap::Parser;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const IDLE_SLEEP: Duration = Duration::from_secs(3);
const CONFIRM_PAUSE: Duration = Duration::from_secs(1);
const BACKOFF_START: Duration = Duration::from_secs(2);
const BACKOFF_MAX: Duration = Duration::from_secs(30);

/// Auto-confirm sidecar for the kite-daytrader service.
#[derive(Parser, Debug)]
#[command(name = "auto-confirm")]
#[command(about = "Polls the trading helper and auto-approves queued trades")]
#[command(version)]
struct Args {
    /// Base URL of the serving process.
    #[arg(long, env = "APP_URL")]
    app_url: String,

    /// Shared confirm token.
    #[arg(long, env = "AUTO_CONFIRM_TOKEN")]
    token: String,

    /// Optional URL to ping while idle (hosting keepalive).
    #[arg(long, env = "KEEPALIVE_URL")]
    keepalive_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PendingResponse {
    pending: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ConfirmResult {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    order_id: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let app_url = args.app_url.trim_end_matches('/').to_string();
    let client = reqwest::Client::builder()
        .user_agent("auto-confirm/0.1")
        .timeout(Duration::from_secs(15))
        .build()?;

    info!("Watching {} for pending confirmations", app_url);

    let mut backoff = BACKOFF_START;
    loop {
        match confirm_all_pending(&client, &app_url, &args.token).await {
            Ok(confirmed) => {
                backoff = BACKOFF_START;
                if confirmed == 0 {
                    maybe_ping_keepalive(&client, args.keepalive_url.as_deref()).await;
                    tokio::time::sleep(IDLE_SLEEP).await;
                }
            }
            Err(e) => {
                error!("Poll failed: {}", e);
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(BACKOFF_MAX);
            }
        }
    }
}

/// Confirm queued actions one at a time, always index 0, until the queue is
/// empty. Returns how many were confirmed.
async fn confirm_all_pending(
    client: &reqwest::Client,
    app_url: &str,
    token: &str,
) -> anyhow::Result<usize> {
    let mut confirmed = 0usize;

    loop {
        let pending: PendingResponse = client
            .get(format!("{}/api/pending", app_url))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if pending.pending.is_empty() {
            return Ok(confirmed);
        }

        let response = client
            .post(format!("{}/api/confirm", app_url))
            .json(&json!({"index": 0, "token": token}))
            .send()
            .await?;

        let status = response.status();
        match response.json::<ConfirmResult>().await {
            Ok(result) if result.ok => {
                info!(order_id = ?result.order_id, "Confirmed pending action");
            }
            Ok(result) => {
                warn!(
                    %status,
                    error = ?result.error,
                    "Confirm rejected"
                );
            }
            Err(e) => {
                warn!(%status, "Unparseable confirm response: {}", e);
            }
        }

        confirmed += 1;
        tokio::time::sleep(CONFIRM_PAUSE).await;
    }
}

/// Ping the keepalive URL if one is configured; failures are logged only.
async fn maybe_ping_keepalive(client: &reqwest::Client, url: Option<&str>) {
    let Some(url) = url else { return };
    match client.get(url).send().await {
        Ok(response) => info!(status = %response.status(), "Keepalive ping"),
        Err(e) => warn!("Keepalive error: {}", e),
    }
}
