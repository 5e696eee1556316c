//! HTTP client for the account inventory.
//!
//! `GET {base}/accounts?limit=N` returns credentials that were decrypted
//! upstream.

use super::{join_url, with_bearer, CredentialSource, HTTP_CLIENT};
use crate::data::Credential;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct HttpCredentialSource {
    base_url: String,
    token: Option<String>,
}

impl HttpCredentialSource {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token,
        }
    }
}

#[async_trait]
impl CredentialSource for HttpCredentialSource {
    async fn fetch_batch(&self, limit: usize) -> Result<Vec<Credential>> {
        let url = join_url(&self.base_url, "accounts");
        let request = HTTP_CLIENT
            .get(&url)
            .query(&[("limit", limit)])
            .timeout(REQUEST_TIMEOUT);

        let response = with_bearer(request, self.token.as_deref())
            .send()
            .await
            .map_err(|e| Error::CredentialFetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::CredentialFetch(format!(
                "account API returned status {}",
                response.status()
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::CredentialFetch(e.to_string()))?;

        parse_batch(&body, limit)
    }
}

/// Accepts either a bare array or `{ "accounts": [...] }`. Records without a
/// token are skipped rather than failing the whole batch.
pub fn parse_batch(body: &serde_json::Value, limit: usize) -> Result<Vec<Credential>> {
    let records = body
        .as_array()
        .or_else(|| body["accounts"].as_array())
        .ok_or_else(|| Error::CredentialFetch("expected an array of accounts".to_string()))?;

    let valid = records
        .iter()
        .filter_map(|r| {
            let token = r["token"].as_str().filter(|t| !t.is_empty())?;
            let id = r["id"]
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| r["id"].to_string());
            Some(Credential::new(id, token))
        })
        .collect::<Vec<_>>();

    let skipped = records.len() - valid.len();
    if skipped > 0 {
        tracing::debug!("Skipped {} account record(s) without a token", skipped);
    }

    Ok(valid.into_iter().take(limit).collect())
}
