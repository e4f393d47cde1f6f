// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use parking_lot::Mutex;

use super::*;
use crate::error::CatalystError;
use crate::rag::AnswerFuture;

/// Answerer that records the context it was given and returns a fixed outcome.
struct Fixed {
    outcome: Result<String, CatalystError>,
    seen: Mutex<Vec<RequestContext>>,
}

impl Fixed {
    fn new(outcome: Result<String, CatalystError>) -> Arc<Self> {
        Arc::new(Self { outcome, seen: Mutex::new(Vec::new()) })
    }
}

impl Answerer for Fixed {
    fn answer<'a>(&'a self, ctx: &'a RequestContext) -> AnswerFuture<'a> {
        self.seen.lock().push(ctx.clone());
        let outcome = self.outcome.clone();
        Box::pin(async move { outcome })
    }
}

#[tokio::test]
async fn answer_becomes_assistant_message() {
    let answerer = Fixed::new(Ok("Save 20% of income.".into()));
    let advisor = Advisor::new(answerer.clone());

    let message = advisor.ask("How should I budget?", &[]).await;
    assert_eq!(message.role, Role::Assistant);
    assert_eq!(message.content, "Save 20% of income.");
    assert!(!message.is_error());
    assert!(message.timestamp_ms > 0);
}

#[tokio::test]
async fn transactions_ground_the_question() {
    let answerer = Fixed::new(Ok("ok".into()));
    let advisor = Advisor::new(answerer.clone());
    let txs = [
        Transaction::new("Rent", "1000", "expense", "01/01/2024"),
        Transaction::new("Salary", "5000", "income", "01/01/2024"),
    ];

    advisor.ask("Am I on track?", &txs).await;

    let seen = answerer.seen.lock();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].query, "Am I on track?");
    assert_eq!(
        seen[0].documents[0].document,
        "- Rent: 1000 (expense) on 01/01/2024\n- Salary: 5000 (income) on 01/01/2024"
    );
}

#[tokio::test]
async fn failures_become_one_line_messages() {
    let failures = [
        CatalystError::credential("invalid_code"),
        CatalystError::upstream(503, "maintenance window"),
        CatalystError::EmptyResponse,
    ];
    for failure in failures {
        let advisor = Advisor::new(Fixed::new(Err(failure.clone())));
        let message = advisor.ask("q", &[]).await;

        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.content, failure.user_message());
        assert_eq!(message.error.as_deref(), Some(failure.kind()));
        assert!(!message.content.contains('\n'));
        assert!(!message.content.contains("invalid_code"));
        assert!(!message.content.contains("maintenance"));
    }
}

#[test]
fn chat_message_wire_shape() -> anyhow::Result<()> {
    let mut message = ChatMessage::user("hello");
    message.timestamp_ms = 42;
    assert_eq!(
        serde_json::to_value(&message)?,
        serde_json::json!({ "role": "user", "content": "hello", "timestamp_ms": 42 })
    );
    Ok(())
}

#[test]
fn timestamps_are_epoch_milliseconds() -> anyhow::Result<()> {
    let before = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH)?;
    let stamp = epoch_ms();
    let after = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH)?;
    assert!(u128::from(stamp) >= before.as_millis());
    assert!(u128::from(stamp) <= after.as_millis());
    Ok(())
}
