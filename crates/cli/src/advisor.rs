// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Chat advisor boundary: turns answers and failures into chat messages.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::context::{RequestContext, Transaction};
use crate::rag::Answerer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One entry in the advisor conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub timestamp_ms: u64,
    /// Machine code of the failure when this message reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into(), timestamp_ms: epoch_ms(), error: None }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp_ms: epoch_ms(),
            error: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Financial advisor that grounds questions in the caller's transactions.
pub struct Advisor {
    answerer: Arc<dyn Answerer>,
}

impl Advisor {
    pub fn new(answerer: Arc<dyn Answerer>) -> Self {
        Self { answerer }
    }

    /// Ask one question. Always yields an assistant message: the answer, or a
    /// single human-readable failure line.
    pub async fn ask(&self, query: &str, transactions: &[Transaction]) -> ChatMessage {
        let ctx = RequestContext::with_transactions(query, transactions);
        match self.answerer.answer(&ctx).await {
            Ok(answer) => ChatMessage::assistant(answer),
            Err(e) => {
                info!(kind = e.kind(), "advisor answered with a failure message");
                let mut message = ChatMessage::assistant(e.user_message());
                message.error = Some(e.kind().to_owned());
                message
            }
        }
    }
}

fn epoch_ms() -> u64 {
    let elapsed = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
#[path = "advisor_tests.rs"]
mod tests;
