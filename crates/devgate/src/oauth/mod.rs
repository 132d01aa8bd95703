// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OAuth authorization code + PKCE flow against a control-plane host.
//!
//! Tokens are not refreshable: there is no refresh endpoint and no refresh
//! token is requested. An expired session can only be replaced by logging in
//! again.

pub mod pkce;

use std::collections::HashMap;
use std::fmt;

use parking_lot::Mutex;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::{ErrorCode, GatewayError};
use crate::host::{normalize_host, same_host};
use self::pkce::PkcePair;

/// OAuth client registered with the control plane.
pub const CLIENT_ID: &str = "toolbox-gateway-gitpod-plugin";

/// Scope granting full API access.
pub const SCOPE: &str = "function:*";

/// Per-attempt login input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginConfiguration {
    pub host: String,
}

impl LoginConfiguration {
    pub fn new(host: &str) -> Self {
        Self { host: normalize_host(host) }
    }
}

/// Endpoints and parameters of the authorization request and token exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationConfig {
    pub auth_params: Vec<(&'static str, &'static str)>,
    pub token_params: Vec<(&'static str, &'static str)>,
    pub base_url: String,
    pub authorize_endpoint: String,
    pub token_endpoint: String,
    pub code_challenge_param: &'static str,
    pub code_challenge_method: &'static str,
    pub code_verifier_param: &'static str,
    pub auth_header_scheme: &'static str,
}

impl AuthorizationConfig {
    pub fn from_login(login: &LoginConfiguration) -> Self {
        let base_url = normalize_host(&login.host);
        Self {
            auth_params: vec![("response_type", "code"), ("client_id", CLIENT_ID), ("scope", SCOPE)],
            token_params: vec![("grant_type", "authorization_code"), ("client_id", CLIENT_ID)],
            authorize_endpoint: format!("{base_url}/api/oauth/authorize"),
            token_endpoint: format!("{base_url}/api/oauth/token"),
            base_url,
            code_challenge_param: "code_challenge",
            code_challenge_method: pkce::CHALLENGE_METHOD,
            code_verifier_param: "code_verifier",
            auth_header_scheme: "Bearer",
        }
    }

    /// Always `None`: sessions are not refreshable.
    pub fn refresh_endpoint(&self) -> Option<&str> {
        None
    }
}

/// Result of a successful token exchange.
#[derive(Clone, PartialEq, Eq)]
pub struct OAuthToken {
    authorization_header: String,
}

impl OAuthToken {
    pub fn new(authorization_header: impl Into<String>) -> Self {
        Self { authorization_header: authorization_header.into() }
    }

    /// `"<scheme> <access token>"`.
    pub fn authorization_header(&self) -> &str {
        &self.authorization_header
    }
}

impl fmt::Debug for OAuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OAuthToken(..)")
    }
}

/// A completed authorization for one host, still cancellable by logout.
#[derive(Debug, Clone)]
pub struct AuthorizedLogin {
    pub host: String,
    pub token: OAuthToken,
    pub cancel: CancellationToken,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
}

/// In-flight PKCE login, keyed by `state`.
struct PendingLogin {
    config: AuthorizationConfig,
    code_verifier: String,
    cancel: CancellationToken,
}

/// Issues authorization URLs and completes callbacks.
pub struct OAuthFlow {
    http: reqwest::Client,
    redirect_uri: Url,
    pending: Mutex<HashMap<String, PendingLogin>>,
    /// One cancellation token per host, shared by all attempts for that host
    /// until [`OAuthFlow::cancel_host`] retires it.
    host_cancel: Mutex<HashMap<String, CancellationToken>>,
}

impl OAuthFlow {
    pub fn new(http: reqwest::Client, redirect_uri: Url) -> Self {
        Self {
            http,
            redirect_uri,
            pending: Mutex::new(HashMap::new()),
            host_cancel: Mutex::new(HashMap::new()),
        }
    }

    pub fn redirect_uri(&self) -> &Url {
        &self.redirect_uri
    }

    /// Number of logins waiting for a callback.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Start a PKCE login and return the authorization URL to open.
    ///
    /// A previous pending login for the same host is superseded.
    pub fn initiate_login(&self, login: &LoginConfiguration) -> Result<Url, GatewayError> {
        let config = AuthorizationConfig::from_login(login);
        let mut url = Url::parse(&config.authorize_endpoint).map_err(|e| {
            ErrorCode::BadRequest.with(format!("invalid host {}: {e}", config.base_url))
        })?;

        let pair = PkcePair::generate();
        let state = pkce::new_state();

        {
            let mut query = url.query_pairs_mut();
            for (k, v) in &config.auth_params {
                query.append_pair(k, v);
            }
            query.append_pair("redirect_uri", self.redirect_uri.as_str());
            query.append_pair(config.code_challenge_param, &pair.challenge);
            query.append_pair("code_challenge_method", config.code_challenge_method);
            query.append_pair("state", &state);
        }

        let cancel = self
            .host_cancel
            .lock()
            .entry(config.base_url.clone())
            .or_insert_with(CancellationToken::new)
            .clone();

        let mut pending = self.pending.lock();
        pending.retain(|_, p| !same_host(&p.config.base_url, &config.base_url));
        tracing::info!(host = %config.base_url, "initiated oauth login");
        pending.insert(state, PendingLogin { config, code_verifier: pair.verifier, cancel });
        Ok(url)
    }

    /// Whether `uri` is a callback to our redirect URI.
    pub fn can_handle(&self, uri: &Url) -> bool {
        uri.scheme() == self.redirect_uri.scheme()
            && uri.host_str() == self.redirect_uri.host_str()
            && uri.path().trim_end_matches('/') == self.redirect_uri.path().trim_end_matches('/')
    }

    /// Complete a login from its callback URI: validate `state`, exchange the
    /// code for a token.
    pub async fn handle(&self, uri: &Url) -> Result<AuthorizedLogin, GatewayError> {
        let params: HashMap<String, String> = uri.query_pairs().into_owned().collect();

        if let Some(error) = params.get("error") {
            let description = params.get("error_description").map(String::as_str).unwrap_or("");
            return Err(GatewayError::authentication_failed(format!(
                "authorization denied: {error} {description}"
            )));
        }
        let state = params
            .get("state")
            .ok_or_else(|| GatewayError::authentication_failed("callback has no state"))?;
        let code = params
            .get("code")
            .ok_or_else(|| GatewayError::authentication_failed("callback has no code"))?;

        let pending = self
            .pending
            .lock()
            .remove(state)
            .ok_or_else(|| GatewayError::authentication_failed("unknown or expired auth state"))?;

        let host = pending.config.base_url.clone();
        let token = tokio::select! {
            _ = pending.cancel.cancelled() => {
                return Err(GatewayError::authentication_failed("login cancelled"));
            }
            result = self.exchange_code(&pending.config, code, &pending.code_verifier) => result?,
        };

        tracing::info!(host = %host, "oauth code exchanged");
        Ok(AuthorizedLogin { host, token, cancel: pending.cancel })
    }

    /// Cancel pending and in-flight logins for `host`.
    pub fn cancel_host(&self, host: &str) {
        self.pending.lock().retain(|_, p| !same_host(&p.config.base_url, host));
        if let Some(cancel) = self.host_cancel.lock().remove(&normalize_host(host)) {
            tracing::debug!(host = %host, "cancelling in-flight login");
            cancel.cancel();
        }
    }

    async fn exchange_code(
        &self,
        config: &AuthorizationConfig,
        code: &str,
        code_verifier: &str,
    ) -> Result<OAuthToken, GatewayError> {
        let mut form: Vec<(&str, &str)> = config.token_params.clone();
        form.push(("code", code));
        form.push((config.code_verifier_param, code_verifier));
        form.push(("redirect_uri", self.redirect_uri.as_str()));

        let resp = self.http.post(&config.token_endpoint).form(&form).send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(GatewayError::authentication_failed(format!(
                "token exchange failed ({status}): {}",
                truncate(&text, 200)
            )));
        }

        let token: TokenResponse = resp.json().await.map_err(|e| {
            GatewayError::authentication_failed(format!("invalid token response: {e}"))
        })?;
        if let Some(ref kind) = token.token_type {
            if !kind.eq_ignore_ascii_case(config.auth_header_scheme) {
                tracing::debug!(token_type = %kind, "unexpected token type, using configured scheme");
            }
        }
        Ok(OAuthToken::new(format!("{} {}", config.auth_header_scheme, token.access_token)))
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
