// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-workspace environment: merges the phase feed with local intent.

pub mod registry;
pub mod state;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::connect::ConnectParams;
use crate::environment::state::{EnvAction, EnvSnapshot, EnvironmentState, WorkspacePhase};
use crate::error::{ErrorCode, GatewayError};

/// Serializable view of an environment.
#[derive(Debug, Clone, Serialize)]
pub struct EnvironmentInfo {
    pub id: String,
    pub name: String,
    pub workspace_id: String,
    pub phase: WorkspacePhase,
    pub active: bool,
    pub state: EnvironmentState,
    pub actions: Vec<EnvAction>,
}

/// State machine for one remote workspace.
///
/// Snapshots are published on a `watch` channel: subscribers always see the
/// latest value and intermediate ones may be skipped.
pub struct Environment {
    params: ConnectParams,
    state_tx: watch::Sender<EnvSnapshot>,
    shutdown: CancellationToken,
}

impl Environment {
    pub fn new(params: ConnectParams) -> Self {
        Self::with_phase(params, WorkspacePhase::Unspecified)
    }

    pub fn with_phase(params: ConnectParams, phase: WorkspacePhase) -> Self {
        let (state_tx, _) = watch::channel(EnvSnapshot::new(phase, false));
        Self { params, state_tx, shutdown: CancellationToken::new() }
    }

    /// The unique id (`<host-authority>-<workspace id>`).
    pub fn id(&self) -> &str {
        &self.params.unique_id
    }

    pub fn name(&self) -> &str {
        &self.params.resolved_workspace_id
    }

    pub fn params(&self) -> &ConnectParams {
        &self.params
    }

    pub fn snapshot(&self) -> EnvSnapshot {
        *self.state_tx.borrow()
    }

    pub fn state(&self) -> EnvironmentState {
        self.snapshot().state()
    }

    pub fn actions(&self) -> Vec<EnvAction> {
        self.snapshot().actions()
    }

    pub fn info(&self) -> EnvironmentInfo {
        let snapshot = self.snapshot();
        EnvironmentInfo {
            id: self.params.unique_id.clone(),
            name: self.params.resolved_workspace_id.clone(),
            workspace_id: self.params.workspace_id.clone(),
            phase: snapshot.phase,
            active: snapshot.active,
            state: snapshot.state(),
            actions: snapshot.actions(),
        }
    }

    /// Record the intent to use this environment.
    ///
    /// The state only becomes `Active` once the phase is `running`; marking
    /// earlier is logged as a stale activation.
    pub fn mark_active(&self) -> bool {
        let changed = self.state_tx.send_if_modified(|s| !std::mem::replace(&mut s.active, true));
        let phase = self.snapshot().phase;
        if phase != WorkspacePhase::Running {
            tracing::debug!(
                environment = %self.id(),
                %phase,
                code = ErrorCode::StaleActivation.as_str(),
                "activation recorded before workspace is running"
            );
        }
        if changed {
            tracing::info!(environment = %self.id(), "environment marked active");
        }
        changed
    }

    /// Clear the active intent.
    pub fn close(&self) -> bool {
        let changed = self.state_tx.send_if_modified(|s| std::mem::replace(&mut s.active, false));
        if changed {
            tracing::info!(environment = %self.id(), "environment closed");
        }
        changed
    }

    /// Perform a user action, rejecting actions not currently offered.
    pub fn perform(&self, action: EnvAction) -> Result<EnvSnapshot, GatewayError> {
        let snapshot = self.snapshot();
        if !snapshot.offers(action) {
            return Err(ErrorCode::InvalidAction.with(format!(
                "{} is not available for {} in state {}",
                action.as_str(),
                self.id(),
                snapshot.state().as_str()
            )));
        }
        match action {
            EnvAction::Connect => self.mark_active(),
            EnvAction::Close => self.close(),
        };
        Ok(self.snapshot())
    }

    /// Apply a phase from the feed.
    pub fn update_phase(&self, phase: WorkspacePhase) {
        self.state_tx.send_modify(|s| s.phase = phase);
        tracing::debug!(environment = %self.id(), %phase, state = self.state().as_str(), "phase updated");
    }

    pub fn subscribe(&self) -> watch::Receiver<EnvSnapshot> {
        self.state_tx.subscribe()
    }

    /// Deliver the current state now and the latest state after each change
    /// until [`Environment::shutdown`].
    pub fn add_state_listener<F>(&self, listener: F) -> JoinHandle<()>
    where
        F: Fn(EnvironmentState) + Send + 'static,
    {
        let mut rx = self.subscribe();
        rx.mark_changed();
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let state = rx.borrow_and_update().state();
                        listener(state);
                    }
                }
            }
        })
    }

    /// Stop all listener tasks.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

impl Drop for Environment {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
