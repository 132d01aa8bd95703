// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Preferred host used until the user picks another one.
pub const DEFAULT_HOST: &str = "https://gitpod.io";

/// Deep link the authorization server redirects back to.
pub const DEFAULT_REDIRECT_URI: &str = "devgate://gateway/auth";

/// Remote-development gateway: OAuth accounts and workspace environment state.
#[derive(Debug, Clone, Parser)]
#[command(name = "devgate", version, about)]
pub struct GatewayConfig {
    /// Host address to bind the control API to.
    #[arg(long, default_value = "127.0.0.1", env = "DEVGATE_BIND")]
    pub bind: String,

    /// Port for the control API.
    #[arg(long, default_value_t = 9810, env = "DEVGATE_PORT")]
    pub port: u16,

    /// Bearer token for the control API. If unset, auth is disabled.
    #[arg(long, env = "DEVGATE_AUTH_TOKEN")]
    pub auth_token: Option<String>,

    /// Browser origins allowed to call the control API (comma-separated).
    /// Cross-origin requests are refused when empty.
    #[arg(long = "cors-origin", env = "DEVGATE_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Vec<String>,

    /// Directory for settings and account files.
    #[arg(long, env = "DEVGATE_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Preferred host when none has been persisted yet.
    #[arg(long, default_value = DEFAULT_HOST, env = "DEVGATE_DEFAULT_HOST")]
    pub default_host: String,

    /// OAuth redirect URI (a deep link routed back to `/api/v1/uri`).
    #[arg(long, default_value = DEFAULT_REDIRECT_URI, env = "DEVGATE_REDIRECT_URI")]
    pub redirect_uri: String,

    /// Override for the public API base URL (defaults to `https://api.<host>`).
    #[arg(long, env = "DEVGATE_API_BASE")]
    pub api_base: Option<String>,

    /// Timeout for token exchange and user-info requests in milliseconds.
    #[arg(long, default_value_t = 30000, env = "DEVGATE_REQUEST_TIMEOUT_MS")]
    pub request_timeout_ms: u64,

    /// Log format (json or text).
    #[arg(long, env = "DEVGATE_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "DEVGATE_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl GatewayConfig {
    /// Validate the configuration after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        let redirect = url::Url::parse(&self.redirect_uri)
            .map_err(|e| anyhow::anyhow!("invalid --redirect-uri {}: {e}", self.redirect_uri))?;
        if redirect.query().is_some() {
            anyhow::bail!("--redirect-uri must not carry a query string");
        }
        if self.request_timeout_ms == 0 {
            anyhow::bail!("--request-timeout-ms must be greater than zero");
        }
        match self.log_format.as_str() {
            "json" | "text" => {}
            other => anyhow::bail!("invalid log format: {other}"),
        }
        for origin in &self.cors_origins {
            let parsed = url::Url::parse(origin)
                .map_err(|e| anyhow::anyhow!("invalid --cors-origin {origin}: {e}"))?;
            if parsed.host_str().is_none() || parsed.path() != "/" || parsed.query().is_some() {
                anyhow::bail!("--cors-origin must be a bare origin like http://localhost:3000");
            }
        }
        if let Some(ref base) = self.api_base {
            url::Url::parse(base).map_err(|e| anyhow::anyhow!("invalid --api-base {base}: {e}"))?;
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Resolve the state directory.
    ///
    /// Checks `--state-dir`, then `$XDG_STATE_HOME/devgate`,
    /// then `$HOME/.local/state/devgate`.
    pub fn resolve_state_dir(&self) -> PathBuf {
        if let Some(ref dir) = self.state_dir {
            return dir.clone();
        }
        if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
            return PathBuf::from(xdg).join("devgate");
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(".local/state/devgate");
        }
        PathBuf::from(".devgate")
    }

    pub fn settings_path(&self) -> PathBuf {
        self.resolve_state_dir().join("settings.json")
    }

    pub fn accounts_path(&self) -> PathBuf {
        self.resolve_state_dir().join("accounts.json")
    }

    /// Config for tests: ephemeral port, short timeouts, explicit state dir.
    pub fn test(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 0,
            auth_token: None,
            cors_origins: Vec::new(),
            state_dir: Some(state_dir.into()),
            default_host: DEFAULT_HOST.into(),
            redirect_uri: DEFAULT_REDIRECT_URI.into(),
            api_base: None,
            request_timeout_ms: 2000,
            log_format: "text".into(),
            log_level: "debug".into(),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
