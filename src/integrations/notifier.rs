//! HTTP sink for sightings: `POST {base}/sightings`.

use super::{join_url, with_bearer, Notifier, HTTP_CLIENT};
use crate::data::Sighting;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Serialize)]
struct SightingBatch<'a> {
    sightings: &'a [Sighting],
}

pub struct HttpNotifier {
    base_url: String,
    token: Option<String>,
}

impl HttpNotifier {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token,
        }
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn notify(&self, sightings: Vec<Sighting>) -> Result<()> {
        let url = join_url(&self.base_url, "sightings");
        let request = HTTP_CLIENT
            .post(&url)
            .json(&SightingBatch {
                sightings: &sightings,
            })
            .timeout(REQUEST_TIMEOUT);

        let response = with_bearer(request, self.token.as_deref())
            .send()
            .await
            .map_err(|e| Error::NotifyDispatch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::NotifyDispatch(format!(
                "sighting API returned status {}",
                response.status()
            )));
        }

        tracing::info!("Reported {} sighting(s)", sightings.len());
        Ok(())
    }
}
