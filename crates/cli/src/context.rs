// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-call input: the user's question plus the documents it is grounded in.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Name of the document carrying the caller's transaction history.
pub const TRANSACTIONS_DOCUMENT: &str = "transactions.txt";

/// Body sent when the caller has no transactions.
pub const NO_TRANSACTIONS: &str = "No transaction history available.";

/// One ledger entry as the finance app stores it. Fields are rendered verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub description: String,
    pub amount: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub date: String,
}

impl Transaction {
    pub fn new(
        description: impl Into<String>,
        amount: impl Into<String>,
        kind: impl Into<String>,
        date: impl Into<String>,
    ) -> Self {
        Self {
            description: description.into(),
            amount: amount.into(),
            kind: kind.into(),
            date: date.into(),
        }
    }

    /// `- {description}: {amount} ({type}) on {date}`
    pub fn to_line(&self) -> String {
        format!("- {}: {} ({}) on {}", self.description, self.amount, self.kind, self.date)
    }
}

/// A named text document, in the shape the RAG endpoint expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub document_name: String,
    pub document: String,
}

impl Document {
    pub fn new(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self { document_name: name.into(), document: body.into() }
    }

    /// Flatten transactions into the `transactions.txt` document.
    pub fn from_transactions(transactions: &[Transaction]) -> Self {
        let body = if transactions.is_empty() {
            NO_TRANSACTIONS.to_owned()
        } else {
            transactions.iter().map(Transaction::to_line).collect::<Vec<_>>().join("\n")
        };
        Self::new(TRANSACTIONS_DOCUMENT, body)
    }
}

/// Query plus ordered context documents. Not retained after the call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub query: String,
    pub documents: Vec<Document>,
}

impl RequestContext {
    pub fn new(query: impl Into<String>, documents: Vec<Document>) -> Self {
        Self { query: query.into(), documents }
    }

    /// The finance advisor's context: a single transactions document, or the
    /// placeholder when there is no history.
    pub fn with_transactions(query: impl Into<String>, transactions: &[Transaction]) -> Self {
        Self::new(query, vec![Document::from_transactions(transactions)])
    }
}

/// Read a JSON array of transactions.
pub fn load_transactions(path: &Path) -> anyhow::Result<Vec<Transaction>> {
    let contents = std::fs::read_to_string(path)?;
    let transactions = serde_json::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("invalid transactions file {}: {e}", path.display()))?;
    Ok(transactions)
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
