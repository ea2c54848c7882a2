//! `resilient-fetch`: fetch URLs through a configured resilient sender chain.
//!
//! Each URL is fetched concurrently. One JSON line per URL is printed to
//! stdout with the final status, the number of retries and the body length,
//! or the error that ended the request. Ctrl+C cancels outstanding requests.

use std::path::PathBuf;
use std::sync::Arc;

use axum::http::{Request, Uri};
use clap::Parser;
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinSet;

use resilient_sender::config::{self, load_config, validate_config, ResilienceConfig};
use resilient_sender::lifecycle::Shutdown;
use resilient_sender::observability::init_logging;
use resilient_sender::{retry_count, Body, HttpSender, LifecycleGuard, RequestContext, SendError, Sender};

#[derive(Parser)]
#[command(name = "resilient-fetch")]
#[command(about = "Fetch URLs with retries, rate limiting and concurrency limiting", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Maximum retries per request (0 = unlimited).
    #[arg(long)]
    retries: Option<u32>,

    /// Requests admitted per interval.
    #[arg(long)]
    rate_limit: Option<u32>,

    /// Rate limit interval in milliseconds.
    #[arg(long, requires = "rate_limit")]
    interval_ms: Option<u64>,

    /// Maximum simultaneous requests.
    #[arg(long)]
    concurrency: Option<usize>,

    /// URLs to fetch.
    #[arg(required = true)]
    urls: Vec<Uri>,
}

impl Cli {
    /// Command-line overrides applied on top of the file configuration.
    fn apply(&self, config: &mut ResilienceConfig) {
        if let Some(retries) = self.retries {
            config.retry.enabled = true;
            config.retry.limit = retries;
        }
        if let Some(limit) = self.rate_limit {
            config.rate_limit.enabled = true;
            config.rate_limit.limit = limit;
        }
        if let Some(interval_ms) = self.interval_ms {
            config.rate_limit.interval_ms = interval_ms;
        }
        if let Some(limit) = self.concurrency {
            config.concurrency.enabled = true;
            config.concurrency.limit = limit;
        }
    }
}

#[derive(Debug, Error)]
enum FetchError {
    #[error(transparent)]
    Send(#[from] SendError),

    #[error("reading body: {0}")]
    Body(#[from] axum::Error),
}

#[derive(Serialize)]
struct Report {
    url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    retries: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body_bytes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ResilienceConfig::default(),
    };
    cli.apply(&mut config);
    validate_config(&config).map_err(config::ConfigError::Validation)?;

    init_logging(&config.observability)?;
    tracing::info!(
        urls = cli.urls.len(),
        retry = config.retry.enabled,
        rate_limit = config.rate_limit.enabled,
        concurrency = config.concurrency.enabled,
        "resilient-fetch starting"
    );

    let sender = Arc::new(LifecycleGuard::new(
        config::build_chain(&config, HttpSender::new()).build(),
    ));

    let shutdown = Shutdown::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move { shutdown.trigger_on_ctrl_c().await }
    });

    let mut fetches = JoinSet::new();
    for url in cli.urls {
        let sender = Arc::clone(&sender);
        let cx = shutdown.context();
        fetches.spawn(async move { fetch(sender.as_ref(), url, cx).await });
    }

    let mut failures = 0usize;
    while let Some(report) = fetches.join_next().await {
        let report = report?;
        if report.error.is_some() {
            failures += 1;
        }
        println!("{}", serde_json::to_string(&report)?);
    }

    sender.close().await;
    tracing::info!(failures, "Done");

    if failures > 0 {
        std::process::exit(1);
    }
    Ok(())
}

async fn fetch<S: Sender>(sender: &S, url: Uri, cx: RequestContext) -> Report {
    let mut report = Report {
        url: url.to_string(),
        status: None,
        retries: None,
        body_bytes: None,
        error: None,
    };

    match send(sender, url, cx).await {
        Ok((status, retries, body_bytes)) => {
            report.status = Some(status);
            report.retries = Some(retries);
            report.body_bytes = Some(body_bytes);
        }
        Err(err) => {
            tracing::warn!(url = %report.url, error = %err, "Request failed");
            report.error = Some(err.to_string());
        }
    }
    report
}

async fn send<S: Sender>(sender: &S, url: Uri, cx: RequestContext) -> Result<(u16, u32, usize), FetchError> {
    let mut request = Request::get(url)
        .body(Body::empty())
        .map_err(|e| SendError::InvalidRequest(e.to_string()))?;
    cx.clone().attach(&mut request);

    let response = sender.send(request).await?;
    let status = response.status().as_u16();
    let retries = retry_count(&response);
    let body = cx
        .run(axum::body::to_bytes(response.into_body(), usize::MAX))
        .await??;

    Ok((status, retries, body.len()))
}
