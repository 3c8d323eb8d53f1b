// src/api/auth.rs

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

pub const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Trade an OAuth refresh token for a short-lived access token.
#[instrument(level = "debug", skip_all)]
pub async fn exchange_refresh_token(
    client: &Client,
    client_id: &str,
    client_secret: &str,
    refresh_token: &str,
) -> Result<String> {
    let resp = client
        .post(TOKEN_URL)
        .form(&[
            ("grant_type", "refresh_token"),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("refresh_token", refresh_token),
        ])
        .send()
        .await
        .context("POST token endpoint failed")?;

    let status = resp.status();
    let body = resp.text().await.context("reading token response")?;
    if !status.is_success() {
        anyhow::bail!("token exchange failed: HTTP {}: {}", status, body);
    }
    let token = parse_token_response(&body)?;
    debug!(expires_in = ?token.expires_in, "obtained access token");
    Ok(token.access_token)
}

fn parse_token_response(body: &str) -> Result<TokenResponse> {
    serde_json::from_str(body).context("decoding token response")
}
