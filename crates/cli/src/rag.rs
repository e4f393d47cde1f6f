// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authenticated client for the Catalyst RAG answer endpoint.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::header::{HeaderValue, AUTHORIZATION};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::context::{Document, RequestContext};
use crate::credential::{TokenEndpoint, TokenManager};
use crate::error::{excerpt, CatalystError};

/// Header carrying the Catalyst organization id.
pub const ORG_HEADER: &str = "CATALYST-ORG";

/// Authorization scheme the provider expects in front of the access token.
pub const AUTH_SCHEME: &str = "Zoho-oauthtoken";

/// Everything [`CatalystClient`] needs, fixed for the life of the process.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub token: TokenEndpoint,
    /// Scheme and host of the Catalyst API, without a trailing path.
    pub api_base: String,
    pub org_id: String,
    pub project_id: String,
    /// Bound on a single RAG request.
    pub timeout: Duration,
}

impl ClientSettings {
    /// Full URL of the RAG answer endpoint for this project.
    pub fn answer_url(&self) -> String {
        format!(
            "{}/quickml/v1/project/{}/rag/answer",
            self.api_base.trim_end_matches('/'),
            self.project_id
        )
    }

    fn validate(&self) -> Result<(), CatalystError> {
        let mut missing = Vec::new();
        if self.api_base.trim().is_empty() {
            missing.push("api base");
        }
        if self.org_id.trim().is_empty() {
            missing.push("organization id");
        }
        if self.project_id.trim().is_empty() {
            missing.push("project id");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(CatalystError::Configuration(format!("missing {}", missing.join(", "))))
        }
    }
}

#[derive(Debug, Serialize)]
struct RagRequest<'a> {
    query: &'a str,
    documents: &'a [Document],
}

#[derive(Debug, Deserialize)]
struct RagResponse {
    #[serde(default)]
    response: Option<String>,
}

/// Where a call is in its lifecycle. A failure is reported with the phase it
/// happened in; terminal states are never retried here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPhase {
    Idle,
    AcquiringCredential,
    Requesting,
    Succeeded,
}

/// Boxed future returned by [`Answerer::answer`].
pub type AnswerFuture<'a> = Pin<Box<dyn Future<Output = Result<String, CatalystError>> + Send + 'a>>;

/// Anything that turns a [`RequestContext`] into answer text.
pub trait Answerer: Send + Sync {
    fn answer<'a>(&'a self, ctx: &'a RequestContext) -> AnswerFuture<'a>;
}

/// Credentialed API client: one token cache, one HTTP client, one endpoint.
#[derive(Debug)]
pub struct CatalystClient {
    tokens: TokenManager,
    http: reqwest::Client,
    answer_url: String,
    org_id: String,
}

impl CatalystClient {
    pub fn new(settings: ClientSettings) -> Result<Self, CatalystError> {
        settings.validate()?;
        let answer_url = settings.answer_url();
        let http = crate::tls::http_client(settings.timeout)
            .map_err(|e| CatalystError::Configuration(format!("build http client: {e}")))?;
        let tokens = TokenManager::new(settings.token)?;
        debug!(%answer_url, "catalyst client ready");
        Ok(Self { tokens, http, answer_url, org_id: settings.org_id })
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    pub fn answer_url(&self) -> &str {
        &self.answer_url
    }

    /// Ask the RAG endpoint one question. Returns the answer text unmodified.
    #[instrument(skip_all, fields(documents = ctx.documents.len()))]
    pub async fn call(&self, ctx: &RequestContext) -> Result<String, CatalystError> {
        let mut phase = CallPhase::Idle;
        match self.execute(ctx, &mut phase).await {
            Ok(answer) => {
                debug!(answer_len = answer.len(), "catalyst call succeeded");
                Ok(answer)
            }
            Err(e) => {
                warn!(?phase, kind = e.kind(), error = %e, "catalyst call failed");
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        ctx: &RequestContext,
        phase: &mut CallPhase,
    ) -> Result<String, CatalystError> {
        *phase = CallPhase::AcquiringCredential;
        let token = self.tokens.valid_access_token().await?;
        let mut auth = HeaderValue::from_str(&format!("{AUTH_SCHEME} {}", token.expose_secret()))
            .map_err(|_| CatalystError::credential("access token is not a valid header value"))?;
        auth.set_sensitive(true);

        *phase = CallPhase::Requesting;
        let resp = self
            .http
            .post(&self.answer_url)
            .header(AUTHORIZATION, auth)
            .header(ORG_HEADER, &self.org_id)
            .json(&RagRequest { query: &ctx.query, documents: &ctx.documents })
            .send()
            .await
            .map_err(|e| CatalystError::upstream_transport(&e))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| CatalystError::upstream_transport(&e))?;
        if !status.is_success() {
            warn!(status = status.as_u16(), body = %excerpt(&body), "RAG endpoint error");
            return Err(CatalystError::upstream(status.as_u16(), &body));
        }

        let parsed: RagResponse = serde_json::from_str(&body).map_err(|e| {
            CatalystError::Upstream {
                status: Some(status.as_u16()),
                body: format!("malformed response: {e}"),
            }
        })?;
        match parsed.response {
            Some(answer) if !answer.is_empty() => {
                *phase = CallPhase::Succeeded;
                Ok(answer)
            }
            _ => Err(CatalystError::EmptyResponse),
        }
    }
}

impl Answerer for CatalystClient {
    fn answer<'a>(&'a self, ctx: &'a RequestContext) -> AnswerFuture<'a> {
        Box::pin(self.call(ctx))
    }
}

#[cfg(test)]
#[path = "rag_tests.rs"]
mod tests;
