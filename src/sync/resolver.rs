//! Identity resolution — maps an external (banner UDC) id to a PSU UUID
//! through the identity service's REST endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::config::SyncConfig;
use crate::error::SyncError;

/// Resolves external ids to stable account ids.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// `Ok(None)` means the service knows of no account for this id.
    async fn resolve(&self, external_id: &str) -> Result<Option<String>, SyncError>;
}

/// HTTP resolver: `GET <base>/identityiq/rest/custom/getUUID/<id>` with
/// basic auth, expecting a JSON string or `null`.
pub struct HttpIdentityResolver {
    base_url: Url,
    username: String,
    password: SecretString,
    timeout: Duration,
    client: reqwest::Client,
}

impl HttpIdentityResolver {
    pub fn new(
        base_url: &str,
        username: String,
        password: SecretString,
        timeout: Duration,
        accept_invalid_certs: bool,
    ) -> Result<Self, SyncError> {
        let base_url = Url::parse(base_url).map_err(|e| SyncError::Resolution {
            external_id: String::new(),
            reason: format!("invalid resolver URL {base_url:?}: {e}"),
        })?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()
            .map_err(|e| SyncError::Resolution {
                external_id: String::new(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            base_url,
            username,
            password,
            timeout,
            client,
        })
    }

    /// Build from job configuration; the host is always reached over HTTPS.
    pub fn from_config(config: &SyncConfig) -> Result<Self, SyncError> {
        Self::new(
            &format!("https://{}", config.resolver_host),
            config.resolver_username.clone(),
            config.resolver_password.clone(),
            config.resolver_timeout,
            config.accept_invalid_certs,
        )
    }

    fn lookup_url(&self, external_id: &str) -> Result<Url, SyncError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SyncError::Resolution {
                external_id: external_id.to_string(),
                reason: "resolver URL cannot carry a path".to_string(),
            })?
            .pop_if_empty()
            .extend(["identityiq", "rest", "custom", "getUUID", external_id]);
        Ok(url)
    }
}

#[async_trait]
impl IdentityResolver for HttpIdentityResolver {
    async fn resolve(&self, external_id: &str) -> Result<Option<String>, SyncError> {
        let url = self.lookup_url(external_id)?;
        debug!(external_id, "Resolving PSU UUID");

        let resp = self
            .client
            .get(url)
            .basic_auth(&self.username, Some(self.password.expose_secret()))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SyncError::Timeout {
                        external_id: external_id.to_string(),
                        timeout: self.timeout,
                    }
                } else {
                    SyncError::Resolution {
                        external_id: external_id.to_string(),
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SyncError::Resolution {
                external_id: external_id.to_string(),
                reason: format!("resolver returned {status}"),
            });
        }

        let body: serde_json::Value =
            resp.json().await.map_err(|e| SyncError::InvalidResponse {
                external_id: external_id.to_string(),
                reason: e.to_string(),
            })?;

        parse_resolved_id(external_id, body)
    }
}

/// Interpret the resolver's JSON body. `null` and the literal string
/// `"None"` both mean no account.
pub fn parse_resolved_id(
    external_id: &str,
    body: serde_json::Value,
) -> Result<Option<String>, SyncError> {
    match body {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::String(s) if s == "None" || s.trim().is_empty() => Ok(None),
        serde_json::Value::String(s) => Ok(Some(s)),
        other => Err(SyncError::InvalidResponse {
            external_id: external_id.to_string(),
            reason: format!("expected a string or null, got {other}"),
        }),
    }
}
