// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment registry keyed by unique id.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::connect::ConnectParams;
use crate::environment::state::WorkspacePhase;
use crate::environment::Environment;

#[derive(Default)]
struct Inner {
    environments: IndexMap<String, Arc<Environment>>,
    /// Last phase per workspace id, including workspaces without an
    /// environment yet, so a late environment starts from the known phase.
    phases: HashMap<String, WorkspacePhase>,
}

/// All environments, in creation order, behind one lock.
#[derive(Default)]
pub struct EnvironmentRegistry {
    inner: Mutex<Inner>,
}

impl EnvironmentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the environment for `params.unique_id`, creating it if absent.
    /// The flag is `true` when this call created it.
    pub fn get_or_create(&self, params: &ConnectParams) -> (Arc<Environment>, bool) {
        let mut inner = self.inner.lock();
        if let Some(env) = inner.environments.get(&params.unique_id) {
            return (Arc::clone(env), false);
        }
        let phase =
            inner.phases.get(&params.workspace_id).copied().unwrap_or(WorkspacePhase::Unspecified);
        let env = Arc::new(Environment::with_phase(params.clone(), phase));
        inner.environments.insert(params.unique_id.clone(), Arc::clone(&env));
        tracing::debug!(environment = %params.unique_id, %phase, "environment created");
        (env, true)
    }

    pub fn get(&self, unique_id: &str) -> Option<Arc<Environment>> {
        self.inner.lock().environments.get(unique_id).cloned()
    }

    pub fn list(&self) -> Vec<Arc<Environment>> {
        self.inner.lock().environments.values().cloned().collect()
    }

    /// Route a phase to every environment of `workspace_id`. Returns how many
    /// environments were updated.
    pub fn apply_phase(&self, workspace_id: &str, phase: WorkspacePhase) -> usize {
        let targets: Vec<Arc<Environment>> = {
            let mut inner = self.inner.lock();
            inner.phases.insert(workspace_id.to_owned(), phase);
            inner
                .environments
                .values()
                .filter(|e| e.params().workspace_id == workspace_id)
                .cloned()
                .collect()
        };
        for env in &targets {
            env.update_phase(phase);
        }
        targets.len()
    }

    /// Forget cached phases for workspaces that are neither listed in `keep`
    /// nor backed by an environment. Returns how many entries were dropped.
    pub fn prune_phases(&self, keep: &HashSet<&str>) -> usize {
        let mut inner = self.inner.lock();
        let Inner { environments, phases } = &mut *inner;
        let before = phases.len();
        phases.retain(|ws, _| {
            keep.contains(ws.as_str())
                || environments.values().any(|e| e.params().workspace_id == *ws)
        });
        before - phases.len()
    }

    pub fn cached_phase_count(&self) -> usize {
        self.inner.lock().phases.len()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().environments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
