// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use catalyst::advisor::Advisor;
use catalyst::config::Config;
use catalyst::context::load_transactions;
use catalyst::rag::{Answerer, CatalystClient};
use catalyst::retry::Retrying;

#[tokio::main]
async fn main() {
    let config = Config::parse();

    if let Err(e) = config.validate() {
        eprintln!("error: {e}");
        std::process::exit(2);
    }

    init_tracing(&config);

    match run(config).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("fatal: {e:#}");
            std::process::exit(1);
        }
    }
}

fn init_tracing(config: &Config) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));

    // Logs go to stderr so stdout carries only the answer.
    match config.log_format.as_str() {
        "json" => {
            fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).json().init();
        }
        _ => {
            fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
        }
    }
}

async fn run(config: Config) -> anyhow::Result<i32> {
    let client = CatalystClient::new(config.settings()?)?;
    let answerer: Arc<dyn Answerer> = match config.retry_policy() {
        Some(policy) => {
            info!(max_retries = policy.max_retries, "retrying transient failures");
            Arc::new(Retrying::new(client, policy))
        }
        None => Arc::new(client),
    };

    let transactions = match config.transactions {
        Some(ref path) => load_transactions(path)?,
        None => Vec::new(),
    };
    info!(transactions = transactions.len(), "asking advisor");

    let message = Advisor::new(answerer).ask(&config.query(), &transactions).await;
    if let Some(ref kind) = message.error {
        error!(kind = %kind, "advisor call failed");
        eprintln!("{}", message.content);
        return Ok(1);
    }
    println!("{}", message.content);
    Ok(0)
}
