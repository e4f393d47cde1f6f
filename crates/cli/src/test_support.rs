// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: an in-process mock of the token and RAG
//! endpoints, plus settings builders.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Form, Router};
use parking_lot::Mutex;
use secrecy::SecretString;
use tokio::net::TcpListener;

use crate::credential::TokenEndpoint;
use crate::rag::ClientSettings;

pub const TEST_CLIENT_ID: &str = "test-client";
pub const TEST_CLIENT_SECRET: &str = "test-client-secret-value";
pub const TEST_REFRESH_TOKEN: &str = "1000.test-refresh-token-value";
pub const TEST_ORG_ID: &str = "org-60001";
pub const TEST_PROJECT_ID: &str = "proj-7001";

/// Token endpoint success body.
pub fn granted(access_token: &str, expires_in_sec: u64) -> serde_json::Value {
    serde_json::json!({
        "access_token": access_token,
        "expires_in_sec": expires_in_sec,
        "token_type": "Bearer",
    })
}

/// RAG endpoint success body.
pub fn answered(text: &str) -> serde_json::Value {
    serde_json::json!({ "response": text })
}

/// A RAG request as the mock received it.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: serde_json::Value,
}

#[derive(Default)]
struct Recorded {
    token_forms: Mutex<Vec<HashMap<String, String>>>,
    rag_requests: Mutex<Vec<CapturedRequest>>,
    token_calls: AtomicU32,
    rag_calls: AtomicU32,
}

/// Builder for [`MockCatalyst`]. Each endpoint replays its responses in
/// order and then repeats the last one.
pub struct MockCatalystBuilder {
    token_responses: Vec<(u16, String)>,
    rag_responses: Vec<(u16, String)>,
    token_delay: Duration,
    rag_delay: Duration,
}

impl MockCatalystBuilder {
    pub fn token(mut self, status: u16, body: serde_json::Value) -> Self {
        self.token_responses.push((status, body.to_string()));
        self
    }

    pub fn token_raw(mut self, status: u16, body: impl Into<String>) -> Self {
        self.token_responses.push((status, body.into()));
        self
    }

    pub fn rag(mut self, status: u16, body: serde_json::Value) -> Self {
        self.rag_responses.push((status, body.to_string()));
        self
    }

    pub fn rag_raw(mut self, status: u16, body: impl Into<String>) -> Self {
        self.rag_responses.push((status, body.into()));
        self
    }

    pub fn token_delay(mut self, delay: Duration) -> Self {
        self.token_delay = delay;
        self
    }

    pub fn rag_delay(mut self, delay: Duration) -> Self {
        self.rag_delay = delay;
        self
    }

    pub async fn start(self) -> anyhow::Result<MockCatalyst> {
        let recorded = Arc::new(Recorded::default());
        let token_responses = Arc::new(self.token_responses);
        let rag_responses = Arc::new(self.rag_responses);

        let token_rec = Arc::clone(&recorded);
        let token_delay = self.token_delay;
        let rag_rec = Arc::clone(&recorded);
        let rag_delay = self.rag_delay;

        let app = Router::new()
            .route(
                "/oauth/v2/token",
                post(move |Form(form): Form<HashMap<String, String>>| {
                    let rec = Arc::clone(&token_rec);
                    let resps = Arc::clone(&token_responses);
                    async move {
                        let idx = rec.token_calls.fetch_add(1, Ordering::SeqCst) as usize;
                        rec.token_forms.lock().push(form);
                        if !token_delay.is_zero() {
                            tokio::time::sleep(token_delay).await;
                        }
                        reply(&resps, idx)
                    }
                }),
            )
            .route(
                "/quickml/v1/project/{project}/rag/answer",
                post(move |uri: axum::http::Uri, headers: HeaderMap, body: String| {
                    let rec = Arc::clone(&rag_rec);
                    let resps = Arc::clone(&rag_responses);
                    async move {
                        let idx = rec.rag_calls.fetch_add(1, Ordering::SeqCst) as usize;
                        let headers = headers
                            .iter()
                            .map(|(k, v)| {
                                (k.as_str().to_owned(), v.to_str().unwrap_or_default().to_owned())
                            })
                            .collect();
                        let body = serde_json::from_str(&body).unwrap_or(serde_json::Value::Null);
                        rec.rag_requests.lock().push(CapturedRequest {
                            path: uri.path().to_owned(),
                            headers,
                            body,
                        });
                        if !rag_delay.is_zero() {
                            tokio::time::sleep(rag_delay).await;
                        }
                        reply(&resps, idx)
                    }
                }),
            );

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Ok(MockCatalyst { addr, recorded })
    }
}

fn reply(
    responses: &[(u16, String)],
    idx: usize,
) -> (StatusCode, [(header::HeaderName, &'static str); 1], String) {
    let (status, body) = responses
        .get(idx)
        .or_else(|| responses.last())
        .cloned()
        .unwrap_or((500, "{}".to_owned()));
    (
        StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
}

/// Running mock of the Catalyst token and RAG endpoints.
pub struct MockCatalyst {
    pub addr: SocketAddr,
    recorded: Arc<Recorded>,
}

impl MockCatalyst {
    pub fn builder() -> MockCatalystBuilder {
        MockCatalystBuilder {
            token_responses: Vec::new(),
            rag_responses: Vec::new(),
            token_delay: Duration::ZERO,
            rag_delay: Duration::ZERO,
        }
    }

    pub fn token_url(&self) -> String {
        format!("http://{}/oauth/v2/token", self.addr)
    }

    pub fn api_base(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn token_calls(&self) -> u32 {
        self.recorded.token_calls.load(Ordering::SeqCst)
    }

    pub fn rag_calls(&self) -> u32 {
        self.recorded.rag_calls.load(Ordering::SeqCst)
    }

    pub fn token_forms(&self) -> Vec<HashMap<String, String>> {
        self.recorded.token_forms.lock().clone()
    }

    pub fn rag_requests(&self) -> Vec<CapturedRequest> {
        self.recorded.rag_requests.lock().clone()
    }

    /// Client settings pointing at this mock with the test credentials.
    pub fn settings(&self) -> ClientSettings {
        ClientSettings {
            token: TokenEndpoint {
                token_url: self.token_url(),
                client_id: TEST_CLIENT_ID.to_owned(),
                client_secret: SecretString::new(TEST_CLIENT_SECRET.to_owned()),
                refresh_token: SecretString::new(TEST_REFRESH_TOKEN.to_owned()),
                safety_margin: Duration::from_secs(300),
                timeout: Duration::from_secs(5),
            },
            api_base: self.api_base(),
            org_id: TEST_ORG_ID.to_owned(),
            project_id: TEST_PROJECT_ID.to_owned(),
            timeout: Duration::from_secs(10),
        }
    }

    /// CLI arguments (before the question) pointing at this mock.
    pub fn cli_args(&self) -> Vec<String> {
        [
            ("--client-id", TEST_CLIENT_ID.to_owned()),
            ("--client-secret", TEST_CLIENT_SECRET.to_owned()),
            ("--refresh-token", TEST_REFRESH_TOKEN.to_owned()),
            ("--org-id", TEST_ORG_ID.to_owned()),
            ("--project-id", TEST_PROJECT_ID.to_owned()),
            ("--token-url", self.token_url()),
            ("--api-base", self.api_base()),
        ]
        .into_iter()
        .flat_map(|(flag, value)| [flag.to_owned(), value])
        .collect()
    }
}

/// Assert that a `Result<_, CatalystError>` failed with the given kind code.
#[macro_export]
macro_rules! assert_err_kind {
    ($expr:expr, $kind:expr) => {{
        let kind = $expr.err().map(|e| e.kind());
        assert_eq!(kind, Some($kind), concat!("unexpected outcome for: ", stringify!($expr)));
    }};
}
