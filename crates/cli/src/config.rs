// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use secrecy::{ExposeSecret, SecretString};

use crate::credential::TokenEndpoint;
use crate::error::CatalystError;
use crate::rag::ClientSettings;
use crate::retry::RetryPolicy;

pub const DEFAULT_TOKEN_URL: &str = "https://accounts.zoho.in/oauth/v2/token";
pub const DEFAULT_API_BASE: &str = "https://api.catalyst.zoho.in";

/// Ask the Catalyst finance advisor a question.
#[derive(Debug, Parser)]
#[command(name = "catalyst", version, about)]
pub struct Config {
    /// OAuth client id.
    #[arg(long, env = "CATALYST_CLIENT_ID")]
    pub client_id: Option<String>,

    /// OAuth client secret.
    #[arg(long, env = "CATALYST_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<SecretString>,

    /// Long-lived OAuth refresh token.
    #[arg(long, env = "CATALYST_REFRESH_TOKEN", hide_env_values = true)]
    pub refresh_token: Option<SecretString>,

    /// Catalyst organization id, sent on every RAG request.
    #[arg(long, env = "CATALYST_ORG_ID")]
    pub org_id: Option<String>,

    /// Catalyst project id hosting the RAG endpoint.
    #[arg(long, env = "CATALYST_PROJECT_ID")]
    pub project_id: Option<String>,

    /// OAuth token endpoint.
    #[arg(long, env = "CATALYST_TOKEN_URL", default_value = DEFAULT_TOKEN_URL)]
    pub token_url: String,

    /// Catalyst API base URL.
    #[arg(long, env = "CATALYST_API_BASE", default_value = DEFAULT_API_BASE)]
    pub api_base: String,

    /// Timeout for a token refresh in milliseconds.
    #[arg(long, env = "CATALYST_TOKEN_TIMEOUT_MS", default_value_t = 5_000)]
    pub token_timeout_ms: u64,

    /// Timeout for a RAG request in milliseconds.
    #[arg(long, env = "CATALYST_RAG_TIMEOUT_MS", default_value_t = 30_000)]
    pub rag_timeout_ms: u64,

    /// Seconds subtracted from the reported token lifetime.
    #[arg(long, env = "CATALYST_SAFETY_MARGIN_SECS", default_value_t = 300)]
    pub safety_margin_secs: u64,

    /// Retries for transient failures (0 disables retrying).
    #[arg(long, env = "CATALYST_MAX_RETRIES", default_value_t = 0)]
    pub max_retries: u32,

    /// Initial retry backoff in milliseconds, doubled per attempt.
    #[arg(long, env = "CATALYST_RETRY_BACKOFF_MS", default_value_t = 500)]
    pub retry_backoff_ms: u64,

    /// JSON file with an array of transactions to ground the answer in.
    #[arg(long, env = "CATALYST_TRANSACTIONS")]
    pub transactions: Option<PathBuf>,

    /// Log format (json or text).
    #[arg(long, env = "CATALYST_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "CATALYST_LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    /// The question to ask.
    #[arg(trailing_var_arg = true)]
    pub query: Vec<String>,
}

impl Config {
    /// Validate the configuration after parsing.
    ///
    /// Every missing credential is reported at once, by flag name only.
    pub fn validate(&self) -> Result<(), CatalystError> {
        let mut missing = Vec::new();
        if is_blank(self.client_id.as_deref()) {
            missing.push("--client-id");
        }
        if is_blank(self.client_secret.as_ref().map(|s| s.expose_secret().as_str())) {
            missing.push("--client-secret");
        }
        if is_blank(self.refresh_token.as_ref().map(|s| s.expose_secret().as_str())) {
            missing.push("--refresh-token");
        }
        if is_blank(self.org_id.as_deref()) {
            missing.push("--org-id");
        }
        if is_blank(self.project_id.as_deref()) {
            missing.push("--project-id");
        }
        if !missing.is_empty() {
            return Err(CatalystError::Configuration(format!(
                "missing required values: {}",
                missing.join(", ")
            )));
        }

        if self.query().is_empty() {
            return Err(CatalystError::Configuration("a question is required".into()));
        }
        if self.token_timeout_ms == 0 || self.rag_timeout_ms == 0 {
            return Err(CatalystError::Configuration("timeouts must be greater than zero".into()));
        }
        match self.log_format.as_str() {
            "json" | "text" => {}
            other => {
                return Err(CatalystError::Configuration(format!("invalid log format: {other}")))
            }
        }

        Ok(())
    }

    /// The question, joined from the trailing arguments.
    pub fn query(&self) -> String {
        self.query.join(" ").trim().to_owned()
    }

    pub fn token_timeout(&self) -> Duration {
        Duration::from_millis(self.token_timeout_ms)
    }

    pub fn rag_timeout(&self) -> Duration {
        Duration::from_millis(self.rag_timeout_ms)
    }

    pub fn safety_margin(&self) -> Duration {
        Duration::from_secs(self.safety_margin_secs)
    }

    /// Retry policy for the decorator, or `None` when retries are disabled.
    pub fn retry_policy(&self) -> Option<RetryPolicy> {
        if self.max_retries == 0 {
            return None;
        }
        let initial = Duration::from_millis(self.retry_backoff_ms);
        Some(RetryPolicy::new(self.max_retries, initial, initial.saturating_mul(16)))
    }

    /// Library settings for [`crate::rag::CatalystClient`].
    pub fn settings(&self) -> Result<ClientSettings, CatalystError> {
        self.validate()?;
        let missing = |name: &str| CatalystError::Configuration(format!("missing {name}"));
        Ok(ClientSettings {
            token: TokenEndpoint {
                token_url: self.token_url.clone(),
                client_id: self.client_id.clone().ok_or_else(|| missing("--client-id"))?,
                client_secret: self
                    .client_secret
                    .clone()
                    .ok_or_else(|| missing("--client-secret"))?,
                refresh_token: self
                    .refresh_token
                    .clone()
                    .ok_or_else(|| missing("--refresh-token"))?,
                safety_margin: self.safety_margin(),
                timeout: self.token_timeout(),
            },
            api_base: self.api_base.clone(),
            org_id: self.org_id.clone().ok_or_else(|| missing("--org-id"))?,
            project_id: self.project_id.clone().ok_or_else(|| missing("--project-id"))?,
            timeout: self.rag_timeout(),
        })
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.map(|v| v.trim().is_empty()).unwrap_or(true)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
