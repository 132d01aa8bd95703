// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace phases, environment states, and the rule that merges them.

use serde::{Deserialize, Serialize};

/// Remote lifecycle phase reported by the control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum WorkspacePhase {
    Unspecified,
    Preparing,
    Imagebuild,
    Pending,
    Creating,
    Initializing,
    Running,
    Interrupted,
    Paused,
    Stopping,
    Stopped,
    /// A phase this client does not know.
    Unknown,
}

impl WorkspacePhase {
    pub const ALL: [WorkspacePhase; 12] = [
        Self::Unspecified,
        Self::Preparing,
        Self::Imagebuild,
        Self::Pending,
        Self::Creating,
        Self::Initializing,
        Self::Running,
        Self::Interrupted,
        Self::Paused,
        Self::Stopping,
        Self::Stopped,
        Self::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unspecified => "unspecified",
            Self::Preparing => "preparing",
            Self::Imagebuild => "imagebuild",
            Self::Pending => "pending",
            Self::Creating => "creating",
            Self::Initializing => "initializing",
            Self::Running => "running",
            Self::Interrupted => "interrupted",
            Self::Paused => "paused",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Unknown => "unknown",
        }
    }

    /// Parse `running`, `RUNNING` or `PHASE_RUNNING`. Anything else is
    /// [`WorkspacePhase::Unknown`].
    pub fn parse(s: &str) -> Self {
        let lower = s.trim().to_ascii_lowercase();
        let name = lower.strip_prefix("phase_").unwrap_or(&lower);
        match name {
            "unspecified" => Self::Unspecified,
            "preparing" => Self::Preparing,
            "imagebuild" => Self::Imagebuild,
            "pending" => Self::Pending,
            "creating" => Self::Creating,
            "initializing" => Self::Initializing,
            "running" => Self::Running,
            "interrupted" => Self::Interrupted,
            "paused" => Self::Paused,
            "stopping" => Self::Stopping,
            "stopped" => Self::Stopped,
            _ => Self::Unknown,
        }
    }
}

impl From<String> for WorkspacePhase {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl std::fmt::Display for WorkspacePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User-facing lifecycle state of an environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentState {
    Unreachable,
    Inactive,
    Active,
    Error,
}

impl EnvironmentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unreachable => "unreachable",
            Self::Inactive => "inactive",
            Self::Active => "active",
            Self::Error => "error",
        }
    }
}

/// Actions offered to the user for an environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvAction {
    Connect,
    Close,
}

impl EnvAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Close => "close",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "connect" => Some(Self::Connect),
            "close" => Some(Self::Close),
            _ => None,
        }
    }
}

/// Fixed phase table used whenever the environment is not active.
pub fn phase_state(phase: WorkspacePhase) -> Option<EnvironmentState> {
    use WorkspacePhase::*;
    match phase {
        Unspecified | Preparing | Imagebuild | Pending | Creating | Initializing => {
            Some(EnvironmentState::Unreachable)
        }
        Running | Paused | Stopping | Stopped => Some(EnvironmentState::Inactive),
        Interrupted => Some(EnvironmentState::Error),
        Unknown => None,
    }
}

/// Last known phase plus local intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EnvSnapshot {
    pub phase: WorkspacePhase,
    pub active: bool,
}

impl Default for EnvSnapshot {
    fn default() -> Self {
        Self { phase: WorkspacePhase::Unspecified, active: false }
    }
}

impl EnvSnapshot {
    pub fn new(phase: WorkspacePhase, active: bool) -> Self {
        Self { phase, active }
    }

    /// Active only when marked active on a running workspace; otherwise the
    /// phase table, with unmapped phases treated as unreachable.
    pub fn state(&self) -> EnvironmentState {
        if self.active && self.phase == WorkspacePhase::Running {
            EnvironmentState::Active
        } else {
            phase_state(self.phase).unwrap_or(EnvironmentState::Unreachable)
        }
    }

    pub fn is_connectable(&self) -> bool {
        self.phase == WorkspacePhase::Running && !self.active
    }

    /// Close stays available in every phase so a stuck activation can be
    /// abandoned.
    pub fn is_closeable(&self) -> bool {
        self.active
    }

    pub fn actions(&self) -> Vec<EnvAction> {
        let mut actions = Vec::with_capacity(2);
        if self.is_connectable() {
            actions.push(EnvAction::Connect);
        }
        if self.is_closeable() {
            actions.push(EnvAction::Close);
        }
        actions
    }

    pub fn offers(&self, action: EnvAction) -> bool {
        match action {
            EnvAction::Connect => self.is_connectable(),
            EnvAction::Close => self.is_closeable(),
        }
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
