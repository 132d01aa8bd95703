// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Devgate: remote-development gateway client core.

pub mod account;
pub mod auth;
pub mod config;
pub mod connect;
pub mod context;
pub mod environment;
pub mod error;
pub mod gateway;
pub mod host;
pub mod oauth;
pub mod pending;
pub mod persist;
pub mod settings;
pub mod test_support;
pub mod token;
pub mod transport;
pub mod ui;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::account::persist::AccountFile;
use crate::auth::AuthManager;
use crate::config::GatewayConfig;
use crate::context::AppContext;
use crate::gateway::Gateway;
use crate::settings::FileSettingsStore;
use crate::transport::build_router;
use crate::ui::SystemUi;

/// Install the tracing subscriber. `RUST_LOG` wins over `--log-level`.
pub fn init_tracing(config: &GatewayConfig) {
    use tracing_subscriber::fmt;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let result = match config.log_format.as_str() {
        "json" => fmt::fmt().with_env_filter(filter).json().try_init(),
        _ => fmt::fmt().with_env_filter(filter).try_init(),
    };
    drop(result);
}

/// Run the gateway until ctrl-c.
pub async fn run(config: GatewayConfig) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.bind, config.port);
    let shutdown = CancellationToken::new();

    let state_dir = config.resolve_state_dir();
    std::fs::create_dir_all(&state_dir)?;
    let store = Arc::new(FileSettingsStore::open(config.settings_path()));
    let account_file = AccountFile::new(config.accounts_path());

    let ctx = AppContext::new(config, store, Arc::new(SystemUi))?;
    let auth = AuthManager::new(Arc::clone(&ctx), Some(account_file))?;
    let gateway = Gateway::new(Arc::clone(&ctx), Arc::clone(&auth));
    let router_task = gateway.spawn_phase_router(shutdown.clone());
    let settings_task = gateway.spawn_settings_watcher(shutdown.clone());

    match auth.current_account() {
        Some(account) => {
            tracing::info!(host = %account.host(), "restored current account");
            gateway.startup();
        }
        None => tracing::info!(host = %ctx.settings.host(), "no account for preferred host"),
    }
    if ctx.config.auth_token.is_none() {
        tracing::warn!("control API has no bearer token; any local process can call it");
    }

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutting down");
            }
            shutdown.cancel();
        });
    }

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(state_dir = %state_dir.display(), "devgate listening on {addr}");
    let router = build_router(gateway);
    axum::serve(listener, router).with_graceful_shutdown(shutdown.clone().cancelled_owned()).await?;

    shutdown.cancel();
    router_task.await.ok();
    settings_task.await.ok();
    Ok(())
}
