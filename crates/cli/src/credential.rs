// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OAuth2 refresh-token credential cache.
//!
//! Holds at most one access token for the process. The token is reused until
//! shortly before its server-reported expiry (the safety margin) and refreshed
//! on demand by the next caller that finds it stale.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{excerpt, CatalystError};

/// Default margin subtracted from the reported token lifetime (5 minutes).
pub const DEFAULT_SAFETY_MARGIN: Duration = Duration::from_secs(300);

/// Upper bound on a server-reported token lifetime (one day).
pub const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

/// Token endpoint coordinates and the long-lived credentials exchanged there.
#[derive(Debug, Clone)]
pub struct TokenEndpoint {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: SecretString,
    pub refresh_token: SecretString,
    /// Subtracted from `expires_in_sec` so a call never starts with a token
    /// that expires mid-flight.
    pub safety_margin: Duration,
    /// Bound on a single token request.
    pub timeout: Duration,
}

/// An access token paired with the instant it stops being usable.
///
/// Immutable: a refresh builds a new `Credential` and swaps it in whole.
#[derive(Debug)]
pub struct Credential {
    access_token: SecretString,
    issued_at: Instant,
    expires_at: Instant,
}

impl Credential {
    /// Build a credential valid for `lifetime - margin` from now. The
    /// lifetime is clamped to [`MAX_TOKEN_LIFETIME`].
    pub fn new(access_token: SecretString, lifetime: Duration, margin: Duration) -> Self {
        let issued_at = Instant::now();
        let usable = lifetime.min(MAX_TOKEN_LIFETIME).saturating_sub(margin);
        let expires_at = issued_at.checked_add(usable).unwrap_or(issued_at);
        Self { access_token, issued_at, expires_at }
    }

    pub fn access_token(&self) -> &SecretString {
        &self.access_token
    }

    pub fn issued_at(&self) -> Instant {
        self.issued_at
    }

    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    pub fn is_valid_at(&self, now: Instant) -> bool {
        now < self.expires_at
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Instant::now())
    }
}

/// Token endpoint reply. A body carrying `error` is a failure whatever the
/// HTTP status said.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TokenResponse {
    Error {
        error: String,
        #[serde(default)]
        error_description: Option<String>,
    },
    Granted {
        access_token: String,
        expires_in_sec: u64,
    },
}

/// Refresh-on-demand owner of the process's single [`Credential`].
pub struct TokenManager {
    endpoint: TokenEndpoint,
    http: reqwest::Client,
    current: RwLock<Option<Arc<Credential>>>,
    refreshes: AtomicU64,
}

impl TokenManager {
    pub fn new(endpoint: TokenEndpoint) -> Result<Self, CatalystError> {
        if endpoint.token_url.trim().is_empty() {
            return Err(CatalystError::Configuration("token URL is empty".into()));
        }
        if endpoint.client_id.trim().is_empty() {
            return Err(CatalystError::Configuration("client id is empty".into()));
        }
        if endpoint.client_secret.expose_secret().is_empty() {
            return Err(CatalystError::Configuration("client secret is empty".into()));
        }
        if endpoint.refresh_token.expose_secret().is_empty() {
            return Err(CatalystError::Configuration("refresh token is empty".into()));
        }
        let http = crate::tls::http_client(endpoint.timeout)
            .map_err(|e| CatalystError::Configuration(format!("build token client: {e}")))?;
        Ok(Self { endpoint, http, current: RwLock::new(None), refreshes: AtomicU64::new(0) })
    }

    /// Current credential, valid or not.
    pub fn snapshot(&self) -> Option<Arc<Credential>> {
        self.current.read().clone()
    }

    /// Number of token-endpoint requests issued so far.
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }

    /// Install a token obtained out of band. The safety margin still applies.
    pub fn seed(&self, access_token: SecretString, lifetime: Duration) -> Arc<Credential> {
        let credential =
            Arc::new(Credential::new(access_token, lifetime, self.endpoint.safety_margin));
        *self.current.write() = Some(Arc::clone(&credential));
        credential
    }

    /// Return a currently-valid access token, refreshing first if the cached
    /// one is missing or inside the safety margin.
    ///
    /// Concurrent callers that all see a stale credential each refresh; the
    /// last successful refresh wins the slot.
    pub async fn valid_access_token(&self) -> Result<SecretString, CatalystError> {
        if let Some(credential) = self.snapshot() {
            if credential.is_valid() {
                return Ok(credential.access_token().clone());
            }
            debug!("cached access token is stale");
        }
        let credential = self.refresh().await?;
        Ok(credential.access_token().clone())
    }

    /// Exchange the refresh token for a new access token. Never retries.
    async fn refresh(&self) -> Result<Arc<Credential>, CatalystError> {
        self.refreshes.fetch_add(1, Ordering::Relaxed);
        debug!(token_url = %self.endpoint.token_url, "refreshing access token");

        let resp = self
            .http
            .post(&self.endpoint.token_url)
            .form(&[
                ("refresh_token", self.endpoint.refresh_token.expose_secret().as_str()),
                ("client_id", self.endpoint.client_id.as_str()),
                ("client_secret", self.endpoint.client_secret.expose_secret().as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "token request failed");
                CatalystError::credential_transport(&e)
            })?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| CatalystError::credential_transport(&e))?;

        match serde_json::from_str::<TokenResponse>(&body) {
            Ok(TokenResponse::Error { error, error_description }) => {
                let message = match error_description {
                    Some(desc) if !desc.is_empty() => format!("{error}: {desc}"),
                    _ => error,
                };
                warn!(status = status.as_u16(), error = %message, "token endpoint rejected refresh");
                Err(CatalystError::credential(message))
            }
            Ok(TokenResponse::Granted { .. }) if !status.is_success() => {
                warn!(status = status.as_u16(), "token endpoint returned a grant with error status");
                Err(CatalystError::credential(format!("token endpoint returned {status}")))
            }
            Ok(TokenResponse::Granted { access_token, expires_in_sec }) => {
                if access_token.is_empty() {
                    warn!("token endpoint returned an empty access token");
                    return Err(CatalystError::credential("empty access token in grant"));
                }
                let lifetime = Duration::from_secs(expires_in_sec);
                if lifetime > MAX_TOKEN_LIFETIME {
                    warn!(
                        expires_in_sec,
                        max_secs = MAX_TOKEN_LIFETIME.as_secs(),
                        "token lifetime clamped"
                    );
                }
                if lifetime <= self.endpoint.safety_margin {
                    warn!(
                        expires_in_sec,
                        margin_secs = self.endpoint.safety_margin.as_secs(),
                        "token lifetime does not exceed the safety margin"
                    );
                }
                let credential = Arc::new(Credential::new(
                    SecretString::new(access_token),
                    lifetime,
                    self.endpoint.safety_margin,
                ));
                *self.current.write() = Some(Arc::clone(&credential));
                info!(expires_in_sec, "access token refreshed");
                Ok(credential)
            }
            Err(e) if status.is_success() => {
                // Success bodies may hold a token; only the parse error is logged.
                warn!(status = status.as_u16(), error = %e, "malformed token response");
                Err(CatalystError::credential(format!("malformed token response: {e}")))
            }
            Err(_) => {
                warn!(status = status.as_u16(), body = %excerpt(&body), "token endpoint error");
                Err(CatalystError::credential(format!(
                    "token endpoint returned {status}: {}",
                    excerpt(&body)
                )))
            }
        }
    }
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("endpoint", &self.endpoint)
            .field("refreshes", &self.refresh_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "credential_tests.rs"]
mod tests;
