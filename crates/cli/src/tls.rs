// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Once;

static CRYPTO_INIT: Once = Once::new();

/// Install the ring crypto provider for reqwest/rustls.
///
/// reqwest is built with `rustls-no-provider`, so a provider must be in place
/// before the first client is constructed. Only the first call has effect.
pub fn ensure_crypto() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Build a `reqwest` client with a total request timeout.
pub fn http_client(timeout: std::time::Duration) -> reqwest::Result<reqwest::Client> {
    ensure_crypto();
    reqwest::Client::builder().timeout(timeout).build()
}
