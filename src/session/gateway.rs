//! HTTP client for the matchmaking session gateway.
//!
//! The gateway process speaks the game's protocol and exposes each logged-in
//! account as a REST resource:
//!
//! ```text
//! POST   /sessions                 login        -> { "session_id" }
//! POST   /sessions/{id}/probe      silent launch probe
//! POST   /sessions/{id}/search     filtered search -> { "candidates": [...] }
//! DELETE /sessions/{id}/listeners  detach event subscriptions
//! DELETE /sessions/{id}            logoff
//! ```

use super::{SessionConnector, SessionHandle};
use crate::data::{Candidate, Credential, SearchFilter};
use crate::error::{Error, Result};
use crate::integrations::{join_url, HTTP_CLIENT};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const LOGIN_TIMEOUT: Duration = Duration::from_secs(30);
const PROBE_TIMEOUT: Duration = Duration::from_secs(20);
const CONTROL_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct LoginRequest<'a> {
    account: &'a str,
    token: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    session_id: String,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    #[serde(flatten)]
    filter: &'a SearchFilter,
    timeout_ms: u64,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

pub struct GatewayConnector {
    base_url: String,
}

impl GatewayConnector {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl SessionConnector for GatewayConnector {
    async fn connect(&self, credential: &Credential) -> Result<Arc<dyn SessionHandle>> {
        let response = HTTP_CLIENT
            .post(join_url(&self.base_url, "sessions"))
            .json(&LoginRequest {
                account: &credential.id,
                token: &credential.token,
            })
            .timeout(LOGIN_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::Gateway(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::SessionProbe(format!(
                "login for account {} rejected with status {}",
                credential.id,
                response.status()
            )));
        }

        let login: LoginResponse = response
            .json()
            .await
            .map_err(|e| Error::Gateway(format!("malformed login response: {}", e)))?;

        tracing::debug!(
            "Logged in account {} as session {}",
            credential.id,
            login.session_id
        );

        Ok(Arc::new(GatewaySession {
            base_url: self.base_url.clone(),
            session_id: login.session_id,
        }))
    }
}

pub struct GatewaySession {
    base_url: String,
    session_id: String,
}

impl GatewaySession {
    fn url(&self, suffix: &str) -> String {
        let path = format!("sessions/{}", urlencoding::encode(&self.session_id));
        if suffix.is_empty() {
            join_url(&self.base_url, &path)
        } else {
            join_url(&self.base_url, &format!("{}/{}", path, suffix))
        }
    }
}

#[async_trait]
impl SessionHandle for GatewaySession {
    fn id(&self) -> &str {
        &self.session_id
    }

    async fn probe(&self) -> Result<()> {
        let response = HTTP_CLIENT
            .post(self.url("probe"))
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::SessionProbe(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let reason = response.text().await.unwrap_or_default();
            Err(Error::SessionProbe(format!("{} {}", status, reason.trim())))
        }
    }

    async fn search(&self, filter: &SearchFilter, timeout: Duration) -> Result<Vec<Candidate>> {
        let pool = filter.pool;
        let response = HTTP_CLIENT
            .post(self.url("search"))
            .json(&SearchRequest {
                filter,
                timeout_ms: timeout.as_millis() as u64,
            })
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::SearchTimeout { pool, timeout }
                } else {
                    Error::Search {
                        pool,
                        message: e.to_string(),
                    }
                }
            })?;

        if !response.status().is_success() {
            return Err(Error::Search {
                pool,
                message: format!("gateway returned status {}", response.status()),
            });
        }

        let body: SearchResponse = response.json().await.map_err(|e| Error::Search {
            pool,
            message: format!("malformed search response: {}", e),
        })?;

        Ok(body.candidates)
    }

    async fn detach_listeners(&self) {
        let result = HTTP_CLIENT
            .delete(self.url("listeners"))
            .timeout(CONTROL_TIMEOUT)
            .send()
            .await;
        if let Err(e) = result {
            tracing::debug!("Failed to detach listeners on {}: {}", self.session_id, e);
        }
    }

    async fn close(&self) -> Result<()> {
        let response = HTTP_CLIENT
            .delete(self.url(""))
            .timeout(CONTROL_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::Gateway(e.to_string()))?;

        // Already gone counts as closed
        if response.status().is_success() || response.status().as_u16() == 404 {
            Ok(())
        } else {
            Err(Error::Gateway(format!(
                "logoff of {} returned status {}",
                self.session_id,
                response.status()
            )))
        }
    }
}
