// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authentication manager: known accounts, current-account selection,
//! OAuth login/logout and their event notification.

pub mod listener;
pub mod user_info;

use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::account::persist::AccountFile;
use crate::account::Account;
use crate::auth::listener::{Listener, ListenerId, ListenerRegistry};
use crate::auth::user_info::UserInfoClient;
use crate::context::AppContext;
use crate::error::{ErrorCode, GatewayError};
use crate::host::{normalize_host, same_host};
use crate::oauth::{LoginConfiguration, OAuthFlow, OAuthToken};

/// Login/logout notifications for async consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuthEvent {
    Login { account_id: String, host: String },
    Logout { account_id: String, host: String },
}

/// How [`AuthManager::login`] satisfied a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// The host's account was already current.
    Current,
    /// A known account became current.
    Switched,
    /// The authorization URL was opened in the browser.
    Browser(Url),
}

/// Owns the account set and drives OAuth logins.
pub struct AuthManager {
    ctx: Arc<AppContext>,
    flow: OAuthFlow,
    user_info: UserInfoClient,
    accounts: RwLock<Vec<Account>>,
    account_file: Option<AccountFile>,
    login_listeners: ListenerRegistry,
    logout_listeners: ListenerRegistry,
    event_tx: broadcast::Sender<AuthEvent>,
}

impl AuthManager {
    /// Create the manager, restoring persisted accounts from `account_file`.
    pub fn new(
        ctx: Arc<AppContext>,
        account_file: Option<AccountFile>,
    ) -> Result<Arc<Self>, GatewayError> {
        let redirect_uri = Url::parse(&ctx.config.redirect_uri).map_err(|e| {
            ErrorCode::BadRequest.with(format!("invalid redirect uri {}: {e}", ctx.config.redirect_uri))
        })?;
        let flow = OAuthFlow::new(ctx.http.clone(), redirect_uri);
        let user_info = UserInfoClient::new(ctx.http.clone(), ctx.config.api_base.clone());

        let accounts = match account_file.as_ref().map(AccountFile::load) {
            Some(Ok(list)) => {
                if !list.is_empty() {
                    tracing::info!(count = list.len(), "loaded persisted accounts");
                }
                list
            }
            Some(Err(e)) => {
                tracing::warn!(err = %e, "failed to load persisted accounts");
                vec![]
            }
            None => vec![],
        };

        let (event_tx, _) = broadcast::channel(64);
        Ok(Arc::new(Self {
            ctx,
            flow,
            user_info,
            accounts: RwLock::new(accounts),
            account_file,
            login_listeners: ListenerRegistry::new(),
            logout_listeners: ListenerRegistry::new(),
            event_tx,
        }))
    }

    pub fn flow(&self) -> &OAuthFlow {
        &self.flow
    }

    /// Snapshot of all known accounts.
    pub fn accounts(&self) -> Vec<Account> {
        self.accounts.read().clone()
    }

    pub fn account_for_host(&self, host: &str) -> Option<Account> {
        self.accounts.read().iter().find(|a| same_host(a.host(), host)).cloned()
    }

    /// The known account on the persisted preferred host.
    pub fn current_account(&self) -> Option<Account> {
        self.account_for_host(&self.ctx.settings.host())
    }

    /// Make `host` the current account's host.
    ///
    /// Returns `true` when an account for `host` is available now. Returns
    /// `false` after opening the authorization URL; completion arrives later
    /// through [`AuthManager::try_handle`].
    pub fn login_with_host(&self, host: &str) -> bool {
        match self.login(host) {
            Ok(LoginOutcome::Current | LoginOutcome::Switched) => true,
            Ok(LoginOutcome::Browser(_)) => false,
            Err(e) => {
                tracing::warn!(host = %host, err = %e, "cannot start login");
                self.ctx.ui.report_error(&format!("Cannot log in to {host}: {}", e.message));
                false
            }
        }
    }

    /// [`AuthManager::login_with_host`] with the outcome spelled out.
    ///
    /// The cached session is not re-validated here; a revoked session
    /// surfaces as an API 401 and is remedied by logging in again.
    pub fn login(&self, host: &str) -> Result<LoginOutcome, GatewayError> {
        let host = normalize_host(host);
        if self.current_account().is_some_and(|a| a.host() == host) {
            return Ok(LoginOutcome::Current);
        }
        if self.account_for_host(&host).is_some() {
            tracing::info!(host = %host, "switching to known account");
            self.ctx.settings.set_host(&host);
            self.login_listeners.fire();
            return Ok(LoginOutcome::Switched);
        }
        let url = self.oauth_login_url(&host)?;
        self.ctx.ui.open_url(url.as_str());
        Ok(LoginOutcome::Browser(url))
    }

    /// Log out the current account, if any.
    pub fn logout(&self) {
        let Some(account) = self.current_account() else {
            return;
        };
        self.flow.cancel_host(account.host());
        let remaining = {
            let mut accounts = self.accounts.write();
            accounts.retain(|a| a.host() != account.host());
            accounts.clone()
        };
        self.persist(&remaining);
        tracing::debug!(account = %account.id(), "user logged out");
        self.reset_current_account(&account);
        self.logout_listeners.fire();
        let _ = self.event_tx.send(AuthEvent::Logout {
            account_id: account.id().to_owned(),
            host: account.host().to_owned(),
        });
    }

    /// Start a PKCE login for `host` and return the authorization URL.
    pub fn oauth_login_url(&self, host: &str) -> Result<Url, GatewayError> {
        tracing::info!(host = %host, "get oauth url");
        self.flow.initiate_login(&LoginConfiguration::new(host))
    }

    pub fn can_handle(&self, uri: &Url) -> bool {
        self.flow.can_handle(uri)
    }

    /// Handle an OAuth callback deep link.
    ///
    /// Returns `false` if `uri` is not a callback. Failures are reported to
    /// the host UI; they leave the account set and listeners untouched.
    pub async fn try_handle(&self, uri: &Url) -> bool {
        if !self.flow.can_handle(uri) {
            return false;
        }
        self.ctx.ui.show_window();
        if let Err(e) = self.complete_login(uri).await {
            tracing::warn!(err = %e, "login failed");
            self.ctx.ui.report_error(&format!("Login failed: {}", e.message));
        }
        true
    }

    pub fn add_login_listener(&self, listener: Listener) -> ListenerId {
        self.login_listeners.add(listener)
    }

    pub fn add_logout_listener(&self, listener: Listener) -> ListenerId {
        self.logout_listeners.add(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.login_listeners.remove(id) || self.logout_listeners.remove(id)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.event_tx.subscribe()
    }

    async fn complete_login(&self, uri: &Url) -> Result<Account, GatewayError> {
        let login = self.flow.handle(uri).await?;
        let account = tokio::select! {
            _ = login.cancel.cancelled() => {
                return Err(GatewayError::authentication_failed("login cancelled"));
            }
            result = self.authenticated_user(&login.host, &login.token) => result?,
        };
        let snapshot = self.store_account(&account, &login.cancel)?;
        self.persist(&snapshot);

        tracing::debug!(account = %account.id(), host = %account.host(), "user logged in");
        self.reset_current_account(&account);
        self.login_listeners.fire();
        let _ = self.event_tx.send(AuthEvent::Login {
            account_id: account.id().to_owned(),
            host: account.host().to_owned(),
        });
        Ok(account)
    }

    /// Insert `account`, replacing any account for its host, unless `cancel`
    /// fired. `cancel` is checked under the write lock.
    fn store_account(
        &self,
        account: &Account,
        cancel: &CancellationToken,
    ) -> Result<Vec<Account>, GatewayError> {
        let mut accounts = self.accounts.write();
        if cancel.is_cancelled() {
            return Err(GatewayError::authentication_failed("login cancelled"));
        }
        accounts.retain(|a| a.host() != account.host());
        accounts.push(account.clone());
        Ok(accounts.clone())
    }

    /// Clear host-scoped settings so a previous organization selection does
    /// not leak into the account that just logged in or out.
    fn reset_current_account(&self, account: &Account) {
        tracing::debug!(host = %account.host(), "reset settings");
        self.ctx.settings.reset(account.host());
    }

    async fn authenticated_user(
        &self,
        host: &str,
        token: &OAuthToken,
    ) -> Result<Account, GatewayError> {
        let session = crate::token::extract_session_id(token.authorization_header())?;
        let user = self.user_info.authenticated_user(host, &session).await?;
        Ok(Account::new(session, user.id, user.name, host))
    }

    fn persist(&self, accounts: &[Account]) {
        let Some(ref file) = self.account_file else {
            return;
        };
        if let Err(e) = file.save(accounts) {
            tracing::warn!(path = %file.path().display(), err = %e, "failed to persist accounts");
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
