// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

/// Maximum number of characters of an upstream body kept for diagnostics.
pub const BODY_EXCERPT_CHARS: usize = 512;

/// Uniform failure channel for the credentialed RAG client.
///
/// Every failure of a call surfaces as exactly one of these kinds. None of
/// the variants ever carries a client secret, refresh token, or access token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalystError {
    /// Required configuration is missing or invalid. Fatal at construction.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The token refresh failed (network, non-success, or an `error` payload).
    #[error("credential error: {message}")]
    Credential {
        message: String,
        /// The failure happened at the transport level (connect, timeout).
        transient: bool,
    },

    /// The authenticated call returned a non-success status or the transport failed.
    #[error("{}", upstream_display(.status, .body))]
    Upstream { status: Option<u16>, body: String },

    /// The call succeeded but the answer field was missing or empty.
    #[error("empty response: upstream returned no answer")]
    EmptyResponse,
}

fn upstream_display(status: &Option<u16>, body: &str) -> String {
    match status {
        Some(code) => format!("upstream error ({code}): {body}"),
        None => format!("upstream error: {body}"),
    }
}

impl CatalystError {
    pub fn credential(message: impl Into<String>) -> Self {
        Self::Credential { message: message.into(), transient: false }
    }

    pub fn upstream(status: u16, body: &str) -> Self {
        Self::Upstream { status: Some(status), body: excerpt(body) }
    }

    /// Build from a `reqwest` transport failure during the token refresh.
    pub fn credential_transport(err: &reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            "token request timed out".to_owned()
        } else {
            format!("token request failed: {err}")
        };
        Self::Credential { message, transient: true }
    }

    /// Build from a `reqwest` transport failure during the RAG call.
    pub fn upstream_transport(err: &reqwest::Error) -> Self {
        let body = if err.is_timeout() {
            "request timed out".to_owned()
        } else {
            format!("request failed: {err}")
        };
        Self::Upstream { status: None, body }
    }

    /// Stable machine-readable code for this kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIGURATION",
            Self::Credential { .. } => "CREDENTIAL",
            Self::Upstream { .. } => "UPSTREAM",
            Self::EmptyResponse => "EMPTY_RESPONSE",
        }
    }

    /// Upstream HTTP status, when the failure carried one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Upstream { status, .. } => *status,
            _ => None,
        }
    }

    /// Whether a retry decorator may try this call again.
    ///
    /// Only transport-level credential failures and upstream failures that
    /// are plausibly temporary qualify. An empty answer is never retried.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Configuration(_) | Self::EmptyResponse => false,
            Self::Credential { transient, .. } => *transient,
            Self::Upstream { status: None, .. } => true,
            Self::Upstream { status: Some(code), .. } => {
                *code >= 500 || *code == 408 || *code == 429
            }
        }
    }

    /// A single human-readable line for the boundary that shows failures to users.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Configuration(_) => {
                "The advisor is not configured. Please contact the administrator."
            }
            Self::Credential { .. } => {
                "The advisor could not sign in to its answer service. Please try again later."
            }
            Self::Upstream { .. } => {
                "The advisor's answer service is unavailable right now. Please try again later."
            }
            Self::EmptyResponse => "The advisor did not return an answer. Please rephrase and try again.",
        }
    }
}

/// Truncate a body to [`BODY_EXCERPT_CHARS`] characters, marking the cut.
pub fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(BODY_EXCERPT_CHARS) {
        Some((idx, _)) => format!("{}…", &trimmed[..idx]),
        None => trimmed.to_owned(),
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
