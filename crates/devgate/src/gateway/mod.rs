// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Remote-provider wiring: deep-link dispatch, environments, phase feed and
//! deferred connect replay.

use std::collections::HashSet;
use std::sync::{Arc, Weak};

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::auth::AuthManager;
use crate::connect::{parse_connect_uri, ConnectParams, ConnectRequest};
use crate::context::AppContext;
use crate::environment::registry::EnvironmentRegistry;
use crate::environment::state::{EnvAction, WorkspacePhase};
use crate::environment::{Environment, EnvironmentInfo};
use crate::error::{ErrorCode, GatewayError};
use crate::host::same_host;
use crate::pending::PendingConnectCoordinator;
use crate::settings::SettingKey;

/// Phase-feed message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseUpdate {
    pub workspace_id: String,
    pub phase: WorkspacePhase,
}

/// One entry of a workspace-list update for the current account's host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceUpdate {
    pub id: String,
    #[serde(default)]
    pub phase: Option<WorkspacePhase>,
    #[serde(default)]
    pub resolved_id: Option<String>,
}

/// What [`Gateway::handle_uri`] did with a deep link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UriDisposition {
    #[serde(rename = "oauth_callback")]
    OAuthCallback,
    Connect { environment_id: String, deferred: bool },
    Ignored { reason: String },
}

/// Which workspace list the external watcher should stream.
///
/// `generation` increases every time the watch must be (re)started.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkspaceWatch {
    pub generation: u64,
    pub host: Option<String>,
    pub organization_id: Option<String>,
}

pub struct Gateway {
    ctx: Arc<AppContext>,
    auth: Arc<AuthManager>,
    environments: EnvironmentRegistry,
    pending: PendingConnectCoordinator,
    phase_tx: broadcast::Sender<PhaseUpdate>,
    watch_tx: watch::Sender<WorkspaceWatch>,
}

impl Gateway {
    pub fn new(ctx: Arc<AppContext>, auth: Arc<AuthManager>) -> Arc<Self> {
        let (phase_tx, _) = broadcast::channel(256);
        let gateway = Arc::new(Self {
            ctx,
            auth: Arc::clone(&auth),
            environments: EnvironmentRegistry::new(),
            pending: PendingConnectCoordinator::new(),
            phase_tx,
            watch_tx: watch::Sender::new(WorkspaceWatch::default()),
        });

        let weak: Weak<Self> = Arc::downgrade(&gateway);
        auth.add_login_listener(Arc::new(move || {
            if let Some(gateway) = weak.upgrade() {
                gateway.on_login();
            }
        }));
        let weak: Weak<Self> = Arc::downgrade(&gateway);
        auth.add_logout_listener(Arc::new(move || {
            if let Some(gateway) = weak.upgrade() {
                gateway.show_environments();
            }
        }));
        gateway
    }

    pub fn context(&self) -> &Arc<AppContext> {
        &self.ctx
    }

    pub fn auth(&self) -> &Arc<AuthManager> {
        &self.auth
    }

    pub fn environments(&self) -> &EnvironmentRegistry {
        &self.environments
    }

    pub fn pending(&self) -> &PendingConnectCoordinator {
        &self.pending
    }

    /// Route a deep link: OAuth callback, connect request, or neither.
    pub async fn handle_uri(&self, uri: &Url) -> UriDisposition {
        if self.auth.try_handle(uri).await {
            return UriDisposition::OAuthCallback;
        }
        match parse_connect_uri(uri) {
            Ok(request) => self.handle_connect(request),
            Err(e) => {
                tracing::warn!(uri = %uri, err = %e, "ignoring deep link");
                UriDisposition::Ignored { reason: e.message }
            }
        }
    }

    /// Open the requested environment, or hold the request until the host
    /// is logged in.
    pub fn handle_connect(&self, request: ConnectRequest) -> UriDisposition {
        let environment_id = request.params.unique_id.clone();
        let host = request.host.clone();
        tracing::info!(host = %host, environment = %environment_id, "connect request");

        // Held first so a login listener fired from login_with_host sees it.
        let previous = self.pending.hold(request);
        if !self.auth.login_with_host(&host) {
            tracing::info!(environment = %environment_id, "connect deferred until login");
            return UriDisposition::Connect { environment_id, deferred: true };
        }

        if let Some(request) = self.pending.take_if(&environment_id) {
            self.show_environments();
            self.set_environment_visibility(&request.params);
        }
        // A request still waiting on another host's login outlives this one.
        if let Some(previous) = previous.filter(|p| !same_host(&p.host, &host)) {
            if self.pending.restore(previous) {
                tracing::debug!(host = %host, "kept pending connect for other host");
            }
        }
        UriDisposition::Connect { environment_id, deferred: false }
    }

    /// Get or create the environment for `params`, mark it active and ask
    /// the host to connect once it is ready.
    pub fn set_environment_visibility(&self, params: &ConnectParams) -> Arc<Environment> {
        tracing::info!(workspace = %params.workspace_id, "set environment visibility");
        let (env, _) = self.environments.get_or_create(params);
        env.mark_active();
        self.ctx.ui.set_auto_connect(env.id());
        env
    }

    /// Apply a workspace-list update for the current account's host.
    ///
    /// Creates missing environments, applies included phases and replays a
    /// pending connect request that targets one of the listed workspaces.
    pub fn consume_workspaces(
        &self,
        workspaces: &[WorkspaceUpdate],
    ) -> Result<Vec<EnvironmentInfo>, GatewayError> {
        let account = self
            .auth
            .current_account()
            .ok_or_else(|| ErrorCode::NotLoggedIn.with("no account is logged in"))?;
        let listed: HashSet<&str> = workspaces.iter().map(|w| w.id.as_str()).collect();
        let pruned = self.environments.prune_phases(&listed);
        if pruned > 0 {
            tracing::debug!(pruned, "dropped cached phases for unlisted workspaces");
        }
        let mut infos = Vec::with_capacity(workspaces.len());
        for workspace in workspaces {
            let params =
                ConnectParams::new(account.host(), &workspace.id, workspace.resolved_id.as_deref());
            let (env, _) = self.environments.get_or_create(&params);
            if let Some(phase) = workspace.phase {
                self.environments.apply_phase(&workspace.id, phase);
            }
            if let Some(request) = self.pending.take_if(&params.unique_id) {
                tracing::info!(environment = %params.unique_id, "replaying pending connect from workspace list");
                self.set_environment_visibility(&request.params);
            }
            infos.push(env.info());
        }
        Ok(infos)
    }

    /// Apply one phase-feed update. Returns the number of environments touched.
    pub fn push_phase(&self, update: &PhaseUpdate) -> usize {
        self.environments.apply_phase(&update.workspace_id, update.phase)
    }

    /// Sender for the phase feed consumed by [`Gateway::spawn_phase_router`].
    pub fn phase_sender(&self) -> broadcast::Sender<PhaseUpdate> {
        self.phase_tx.clone()
    }

    /// Spawn the task applying phase-feed updates until `shutdown`.
    pub fn spawn_phase_router(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let mut rx = self.phase_tx.subscribe();
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                let update = tokio::select! {
                    _ = shutdown.cancelled() => break,
                    msg = rx.recv() => match msg {
                        Ok(update) => update,
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            tracing::warn!(skipped = n, "phase router lagged");
                            continue;
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                };
                let Some(gateway) = weak.upgrade() else {
                    break;
                };
                gateway.push_phase(&update);
            }
            tracing::debug!("phase router stopped");
        })
    }

    /// Perform a user action on an environment.
    pub fn perform_action(
        &self,
        environment_id: &str,
        action: EnvAction,
    ) -> Result<EnvironmentInfo, GatewayError> {
        let env = self.environments.get(environment_id).ok_or_else(|| {
            ErrorCode::EnvironmentNotFound.with(format!("no environment {environment_id}"))
        })?;
        env.perform(action)?;
        if action == EnvAction::Connect {
            self.ctx.ui.set_auto_connect(env.id());
        }
        Ok(env.info())
    }

    pub fn environment_infos(&self) -> Vec<EnvironmentInfo> {
        self.environments.list().iter().map(|e| e.info()).collect()
    }

    /// Current workspace-watch request.
    pub fn workspace_watch(&self) -> WorkspaceWatch {
        self.watch_tx.borrow().clone()
    }

    pub fn subscribe_workspace_watch(&self) -> watch::Receiver<WorkspaceWatch> {
        self.watch_tx.subscribe()
    }

    /// Start serving the current account: watch its organization's
    /// workspaces, or ask the user to pick an organization first.
    pub fn startup(&self) {
        let Some(account) = self.auth.current_account() else {
            return;
        };
        let organization = self.ctx.settings.organization_id();
        tracing::info!(
            host = %account.host(),
            organization = organization.as_deref().unwrap_or("none"),
            "user logged in"
        );
        match organization {
            Some(org) => self.restart_workspace_watch(account.host(), &org),
            None => self.ctx.ui.show_organization_page(),
        }
    }

    /// Spawn the task that restarts the workspace watch when the selected
    /// organization changes, until `shutdown`.
    pub fn spawn_settings_watcher(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let mut rx = self.ctx.settings.subscribe();
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                let organization = tokio::select! {
                    _ = shutdown.cancelled() => break,
                    msg = rx.recv() => match msg {
                        Ok(change) if change.key == SettingKey::OrganizationId => change.value,
                        Ok(_) => continue,
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            tracing::warn!(skipped = n, "settings watcher lagged");
                            let Some(gateway) = weak.upgrade() else {
                                break;
                            };
                            gateway.ctx.settings.organization_id().unwrap_or_default()
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                };
                let Some(gateway) = weak.upgrade() else {
                    break;
                };
                gateway.on_organization_changed(&organization);
            }
            tracing::debug!("settings watcher stopped");
        })
    }

    fn on_organization_changed(&self, organization: &str) {
        if organization.trim().is_empty() {
            tracing::debug!("organization cleared");
            return;
        }
        match self.auth.current_account() {
            Some(account) => self.restart_workspace_watch(account.host(), organization),
            None => tracing::debug!(organization, "organization selected without an account"),
        }
    }

    fn restart_workspace_watch(&self, host: &str, organization: &str) {
        self.watch_tx.send_modify(|w| {
            w.generation += 1;
            w.host = Some(host.to_owned());
            w.organization_id = Some(organization.to_owned());
        });
        tracing::info!(host = %host, organization, "restarting workspace watch");
    }

    fn on_login(&self) {
        self.show_environments();
        self.startup();
        let Some(account) = self.auth.current_account() else {
            return;
        };
        if let Some(request) = self.pending.take_for_host(account.host()) {
            tracing::info!(
                host = %account.host(),
                environment = %request.params.unique_id,
                "replaying pending connect after login"
            );
            self.set_environment_visibility(&request.params);
        }
    }

    fn show_environments(&self) {
        self.ctx.ui.show_window();
        self.ctx.ui.show_environments_page();
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
