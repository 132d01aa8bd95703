// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::{Arc, Once};
use std::time::Duration;

use crate::config::GatewayConfig;
use crate::settings::{GatewaySettings, SettingsStore};
use crate::ui::HostUi;

static CRYPTO_INIT: Once = Once::new();

/// Install the ring crypto provider for reqwest/rustls.
/// Safe to call multiple times; only the first call has effect.
pub fn ensure_crypto() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Build the shared HTTP client with a bounded per-request timeout.
pub fn build_http_client(timeout: Duration) -> anyhow::Result<reqwest::Client> {
    ensure_crypto();
    Ok(reqwest::Client::builder().timeout(timeout).connect_timeout(timeout).build()?)
}

/// Services shared by the auth manager and the gateway.
pub struct AppContext {
    pub config: GatewayConfig,
    pub settings: GatewaySettings,
    pub ui: Arc<dyn HostUi>,
    pub http: reqwest::Client,
}

impl AppContext {
    pub fn new(
        config: GatewayConfig,
        store: Arc<dyn SettingsStore>,
        ui: Arc<dyn HostUi>,
    ) -> anyhow::Result<Arc<Self>> {
        let http = build_http_client(config.request_timeout())?;
        let settings = GatewaySettings::new(store, &config.default_host);
        Ok(Arc::new(Self { config, settings, ui, http }))
    }
}
