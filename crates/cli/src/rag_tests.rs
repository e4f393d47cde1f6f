// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use serde_json::json;

use super::*;
use crate::context::Transaction;
use crate::test_support::{answered, granted, MockCatalyst, TEST_ORG_ID, TEST_PROJECT_ID};

fn budget_question() -> RequestContext {
    RequestContext::with_transactions("How should I budget?", &[])
}

#[tokio::test]
async fn happy_path_returns_answer_verbatim() -> anyhow::Result<()> {
    let mock = MockCatalyst::builder()
        .token(200, granted("T1", 3600))
        .rag(200, answered("Save 20% of income."))
        .start()
        .await?;
    let client = CatalystClient::new(mock.settings())?;

    let answer = client.call(&budget_question()).await?;
    assert_eq!(answer, "Save 20% of income.");

    let requests = mock.rag_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].body,
        json!({
            "query": "How should I budget?",
            "documents": [{
                "document_name": "transactions.txt",
                "document": "No transaction history available.",
            }],
        })
    );
    Ok(())
}

#[tokio::test]
async fn request_carries_auth_org_and_content_type() -> anyhow::Result<()> {
    let mock = MockCatalyst::builder()
        .token(200, granted("T1", 3600))
        .rag(200, answered("ok"))
        .start()
        .await?;
    let client = CatalystClient::new(mock.settings())?;
    client.call(&budget_question()).await?;

    let request = &mock.rag_requests()[0];
    assert_eq!(request.path, format!("/quickml/v1/project/{TEST_PROJECT_ID}/rag/answer"));
    assert_eq!(
        request.headers.get("authorization").map(String::as_str),
        Some("Zoho-oauthtoken T1")
    );
    assert_eq!(request.headers.get("catalyst-org").map(String::as_str), Some(TEST_ORG_ID));
    assert_eq!(
        request.headers.get("content-type").map(String::as_str),
        Some("application/json")
    );
    Ok(())
}

#[tokio::test]
async fn transactions_are_sent_as_one_document() -> anyhow::Result<()> {
    let mock = MockCatalyst::builder()
        .token(200, granted("T1", 3600))
        .rag(200, answered("Looks balanced."))
        .start()
        .await?;
    let client = CatalystClient::new(mock.settings())?;
    let txs = [
        Transaction::new("Rent", "1000", "expense", "01/01/2024"),
        Transaction::new("Salary", "5000", "income", "01/01/2024"),
    ];
    client.call(&RequestContext::with_transactions("Am I on track?", &txs)).await?;

    let body = &mock.rag_requests()[0].body;
    assert_eq!(
        body["documents"][0]["document"],
        "- Rent: 1000 (expense) on 01/01/2024\n- Salary: 5000 (income) on 01/01/2024"
    );
    assert_eq!(body["documents"].as_array().map(Vec::len), Some(1));
    Ok(())
}

#[tokio::test]
async fn credential_failure_skips_the_post() -> anyhow::Result<()> {
    let mock = MockCatalyst::builder()
        .token(200, json!({ "error": "invalid_code" }))
        .rag(200, answered("never"))
        .start()
        .await?;
    let client = CatalystClient::new(mock.settings())?;

    let err = client.call(&budget_question()).await.err();
    assert_eq!(err, Some(CatalystError::credential("invalid_code")));
    assert_eq!(mock.rag_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn non_success_status_is_upstream_error() -> anyhow::Result<()> {
    for status in [400u16, 401, 404, 500, 503] {
        let mock = MockCatalyst::builder()
            .token(200, granted("T1", 3600))
            .rag_raw(status, "{\"code\":\"FAILED\",\"message\":\"rag unavailable\"}")
            .start()
            .await?;
        let client = CatalystClient::new(mock.settings())?;

        let err = client.call(&budget_question()).await.err();
        assert_eq!(err.as_ref().and_then(CatalystError::status), Some(status));
        let body = match err {
            Some(CatalystError::Upstream { body, .. }) => body,
            _ => String::new(),
        };
        assert!(body.contains("rag unavailable"), "status {status}: {body:?}");
    }
    Ok(())
}

#[tokio::test]
async fn long_error_bodies_are_truncated() -> anyhow::Result<()> {
    let mock = MockCatalyst::builder()
        .token(200, granted("T1", 3600))
        .rag_raw(502, "x".repeat(10_000))
        .start()
        .await?;
    let client = CatalystClient::new(mock.settings())?;

    let err = client.call(&budget_question()).await.err();
    let body_len = match err {
        Some(CatalystError::Upstream { body, .. }) => body.chars().count(),
        _ => 0,
    };
    assert_eq!(body_len, crate::error::BODY_EXCERPT_CHARS + 1);
    Ok(())
}

#[tokio::test]
async fn missing_or_empty_answer_is_empty_response() -> anyhow::Result<()> {
    let bodies = [
        json!({}),
        json!({ "response": "" }),
        json!({ "response": null }),
    ];
    for body in bodies {
        let mock = MockCatalyst::builder()
            .token(200, granted("T1", 3600))
            .rag(200, body.clone())
            .start()
            .await?;
        let client = CatalystClient::new(mock.settings())?;
        let err = client.call(&budget_question()).await.err();
        assert_eq!(err, Some(CatalystError::EmptyResponse), "body: {body}");
    }
    Ok(())
}

#[tokio::test]
async fn whitespace_answer_is_returned_unmodified() -> anyhow::Result<()> {
    let mock = MockCatalyst::builder()
        .token(200, granted("T1", 3600))
        .rag(200, answered(" "))
        .start()
        .await?;
    let client = CatalystClient::new(mock.settings())?;

    assert_eq!(client.call(&budget_question()).await?, " ");
    Ok(())
}

#[tokio::test]
async fn unparseable_answer_is_upstream_error() -> anyhow::Result<()> {
    let mock = MockCatalyst::builder()
        .token(200, granted("T1", 3600))
        .rag_raw(200, "not json")
        .start()
        .await?;
    let client = CatalystClient::new(mock.settings())?;

    let err = client.call(&budget_question()).await.err();
    assert_eq!(err.as_ref().map(CatalystError::kind), Some("UPSTREAM"));
    assert_eq!(err.as_ref().and_then(CatalystError::status), Some(200));
    Ok(())
}

#[tokio::test]
async fn slow_rag_endpoint_times_out_as_upstream() -> anyhow::Result<()> {
    let mock = MockCatalyst::builder()
        .token(200, granted("T1", 3600))
        .rag(200, answered("late"))
        .rag_delay(Duration::from_secs(2))
        .start()
        .await?;
    let mut settings = mock.settings();
    settings.timeout = Duration::from_millis(100);
    let client = CatalystClient::new(settings)?;

    let err = client.call(&budget_question()).await.err();
    assert_eq!(
        err,
        Some(CatalystError::Upstream { status: None, body: "request timed out".into() })
    );
    Ok(())
}

#[tokio::test]
async fn token_is_reused_across_calls() -> anyhow::Result<()> {
    let mock = MockCatalyst::builder()
        .token(200, granted("T1", 3600))
        .rag(200, answered("ok"))
        .start()
        .await?;
    let client = CatalystClient::new(mock.settings())?;

    for _ in 0..3 {
        client.call(&budget_question()).await?;
    }
    assert_eq!(mock.token_calls(), 1);
    assert_eq!(mock.rag_calls(), 3);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_cold_calls_bound_refreshes() -> anyhow::Result<()> {
    let mock = MockCatalyst::builder()
        .token(200, granted("T1", 3600))
        .token_delay(Duration::from_millis(50))
        .rag(200, answered("ok"))
        .start()
        .await?;
    let client = Arc::new(CatalystClient::new(mock.settings())?);

    let calls = (0..5).map(|_| {
        let client = Arc::clone(&client);
        async move { client.call(&budget_question()).await }
    });
    for result in join_all(calls).await {
        assert_eq!(result?, "ok");
    }
    let cold = mock.token_calls();
    assert!((1..=5).contains(&cold), "refreshes: {cold}");

    // Once a refresh has landed, nobody refreshes again while it is valid.
    let calls = (0..5).map(|_| {
        let client = Arc::clone(&client);
        async move { client.call(&budget_question()).await }
    });
    for result in join_all(calls).await {
        result?;
    }
    assert_eq!(mock.token_calls(), cold);
    assert_eq!(mock.rag_calls(), 10);
    Ok(())
}

#[tokio::test]
async fn missing_org_or_project_fails_fast() -> anyhow::Result<()> {
    let mock = MockCatalyst::builder().start().await?;
    let mut settings = mock.settings();
    settings.org_id = String::new();
    settings.project_id = " ".into();

    let err = CatalystClient::new(settings).err().map(|e| e.to_string());
    assert_eq!(
        err.as_deref(),
        Some("configuration error: missing organization id, project id")
    );
    Ok(())
}

#[tokio::test]
async fn answer_url_tolerates_trailing_slash() -> anyhow::Result<()> {
    let mock = MockCatalyst::builder().start().await?;
    let mut settings = mock.settings();
    settings.api_base = "https://api.catalyst.zoho.com/".into();
    assert_eq!(
        settings.answer_url(),
        format!("https://api.catalyst.zoho.com/quickml/v1/project/{TEST_PROJECT_ID}/rag/answer")
    );
    Ok(())
}
