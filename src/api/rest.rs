// src/api/rest.rs

use anyhow::{anyhow, Context, Result};
use futures::{stream, stream::BoxStream, StreamExt, TryStreamExt};
use reqwest::{Client, StatusCode};
use serde_json::json;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use super::auth::exchange_refresh_token;
use super::{SearchService, SearchStreamBatch};
use crate::config::{AdsConfig, Auth};

/// `SearchService` over the REST `googleAds:searchStream` endpoint.
#[derive(Debug, Clone)]
pub struct AdsRestClient {
    client: Client,
    base: Url,
    api_version: String,
    developer_token: String,
    login_customer_id: Option<String>,
    access_token: String,
    max_retries: u32,
    initial_backoff_ms: u64,
}

enum Failure {
    Transient(anyhow::Error),
    Fatal(anyhow::Error),
}

impl AdsRestClient {
    /// Build a client, exchanging the refresh token first if the config has one.
    #[instrument(level = "info", skip_all)]
    pub async fn connect(client: Client, cfg: &AdsConfig) -> Result<Self> {
        let access_token = match cfg.auth()? {
            Auth::AccessToken(t) => t,
            Auth::RefreshToken {
                client_id,
                client_secret,
                refresh_token,
            } => exchange_refresh_token(&client, &client_id, &client_secret, &refresh_token)
                .await
                .context("refreshing access token")?,
        };
        info!(api_version = %cfg.api_version, "ads client ready");
        Self::with_token(client, cfg, access_token)
    }

    pub fn with_token(client: Client, cfg: &AdsConfig, access_token: String) -> Result<Self> {
        let mut endpoint = cfg.endpoint.clone();
        if !endpoint.ends_with('/') {
            endpoint.push('/');
        }
        let base = Url::parse(&endpoint).with_context(|| format!("bad endpoint {}", endpoint))?;
        Ok(Self {
            client,
            base,
            api_version: cfg.api_version.clone(),
            developer_token: cfg.developer_token.clone(),
            login_customer_id: cfg.login_customer_id.clone(),
            access_token,
            max_retries: cfg.max_retries,
            initial_backoff_ms: cfg.initial_backoff_ms,
        })
    }

    pub fn search_stream_url(&self, customer_id: &str) -> Result<Url> {
        let rel = format!(
            "{}/customers/{}/googleAds:searchStream",
            self.api_version, customer_id
        );
        Ok(self.base.join(&rel)?)
    }

    async fn post_query(&self, url: &Url, query: &str) -> std::result::Result<String, Failure> {
        let mut req = self
            .client
            .post(url.clone())
            .bearer_auth(&self.access_token)
            .header("developer-token", &self.developer_token)
            .json(&json!({ "query": query }));
        if let Some(login) = &self.login_customer_id {
            req = req.header("login-customer-id", login);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| Failure::Transient(anyhow!(e).context(format!("POST {} failed", url))))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| Failure::Transient(anyhow!(e).context("reading searchStream body")))?;

        if status.is_success() {
            Ok(body)
        } else if is_transient(status) {
            Err(Failure::Transient(anyhow!("HTTP {}: {}", status, body)))
        } else {
            Err(Failure::Fatal(anyhow!("HTTP {}: {}", status, body)))
        }
    }

    #[instrument(level = "debug", skip(self, query))]
    async fn fetch_batches(&self, customer_id: &str, query: &str) -> Result<Vec<SearchStreamBatch>> {
        let url = self.search_stream_url(customer_id)?;
        let mut attempts = 0;
        loop {
            match self.post_query(&url, query).await {
                Ok(body) => {
                    let batches = parse_batches(&body)?;
                    debug!(batches = batches.len(), "searchStream done");
                    return Ok(batches);
                }
                Err(Failure::Transient(e)) if attempts < self.max_retries => {
                    attempts += 1;
                    let backoff = backoff_ms(self.initial_backoff_ms, attempts);
                    warn!(%url, attempt = attempts, delay_ms = backoff, error = %e, "Retrying");
                    sleep(Duration::from_millis(backoff)).await;
                }
                Err(Failure::Transient(e)) => {
                    error!(%url, error = %e, "Exhausted retries");
                    return Err(e);
                }
                Err(Failure::Fatal(e)) => {
                    return Err(e.context(format!("searchStream for customer {}", customer_id)))
                }
            }
        }
    }
}

impl SearchService for AdsRestClient {
    fn search_stream<'a>(
        &'a self,
        customer_id: &'a str,
        query: &'a str,
    ) -> BoxStream<'a, Result<SearchStreamBatch>> {
        stream::once(self.fetch_batches(customer_id, query))
            .map_ok(|batches| stream::iter(batches.into_iter().map(Ok::<_, anyhow::Error>)))
            .try_flatten()
            .boxed()
    }
}

const MAX_BACKOFF_MS: u64 = 60_000;

/// Delay before retry number `attempt` (1-based), doubling each time.
fn backoff_ms(initial_ms: u64, attempt: u32) -> u64 {
    let factor = 2u64
        .checked_pow(attempt.saturating_sub(1))
        .unwrap_or(u64::MAX);
    initial_ms.saturating_mul(factor).min(MAX_BACKOFF_MS)
}

// 429 is quota exhaustion; backing off from that is left to the caller
fn is_transient(status: StatusCode) -> bool {
    status.is_server_error()
}

/// The searchStream body is a JSON array of batches.
pub fn parse_batches(body: &str) -> Result<Vec<SearchStreamBatch>> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(trimmed).context("decoding searchStream response")
}
