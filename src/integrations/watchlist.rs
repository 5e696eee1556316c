//! HTTP client for the tracked-player list.

use super::{join_url, with_bearer, WatchListSource, HTTP_CLIENT};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct HttpWatchListSource {
    base_url: String,
    token: Option<String>,
}

impl HttpWatchListSource {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token,
        }
    }
}

#[async_trait]
impl WatchListSource for HttpWatchListSource {
    async fn fetch_ids(&self) -> Result<Vec<String>> {
        let url = join_url(&self.base_url, "watchlist");
        let request = HTTP_CLIENT.get(&url).timeout(REQUEST_TIMEOUT);

        let response = with_bearer(request, self.token.as_deref())
            .send()
            .await
            .map_err(|e| Error::WatchListFetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::WatchListFetch(format!(
                "watch list API returned status {}",
                response.status()
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::WatchListFetch(e.to_string()))?;

        parse_ids(&body)
    }
}

/// Each entry may be a plain id string or an object with an `id` field.
pub fn parse_ids(body: &serde_json::Value) -> Result<Vec<String>> {
    let entries = body
        .as_array()
        .or_else(|| body["players"].as_array())
        .ok_or_else(|| Error::WatchListFetch("expected an array of player ids".to_string()))?;

    Ok(entries
        .iter()
        .filter_map(|e| match e {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Object(_) => e["id"].as_str().map(str::to_string),
            _ => None,
        })
        .filter(|id| !id.is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_mixed_entries() {
        let body = json!(["p1", { "id": "p2" }, 42, { "name": "no id" }, ""]);
        assert_eq!(parse_ids(&body).unwrap(), vec!["p1", "p2"]);
    }

    #[test]
    fn test_parse_wrapped() {
        let body = json!({ "players": ["p9"] });
        assert_eq!(parse_ids(&body).unwrap(), vec!["p9"]);
    }

    #[test]
    fn test_parse_rejects_scalar() {
        assert!(parse_ids(&json!("p1")).is_err());
    }
}
