// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

pub mod advisor;
pub mod config;
pub mod context;
pub mod credential;
pub mod error;
pub mod rag;
pub mod retry;
pub mod test_support;
pub mod tls;
