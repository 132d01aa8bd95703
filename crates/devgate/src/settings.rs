// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host-scoped gateway settings on top of a key/value store.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::error::{ErrorCode, GatewayError};
use crate::host::normalize_host;

/// Key/value persistence for settings.
///
/// Implementations must be safe to call from any task; writes are visible to
/// subsequent reads even when the backing file could not be written.
pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), GatewayError>;
}

/// In-memory store (tests, ephemeral runs).
#[derive(Default)]
pub struct MemorySettingsStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), GatewayError> {
        self.values.lock().insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

/// JSON-file store, rewritten atomically on every `set`.
pub struct FileSettingsStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl FileSettingsStore {
    /// Open the store, starting empty if the file is missing or unreadable.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match crate::persist::load_json::<BTreeMap<String, String>>(&path) {
            Ok(Some(v)) => v,
            Ok(None) => BTreeMap::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), err = %e, "failed to load settings, starting empty");
                BTreeMap::new()
            }
        };
        Self { path, values: Mutex::new(values) }
    }
}

impl SettingsStore for FileSettingsStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), GatewayError> {
        let mut values = self.values.lock();
        values.insert(key.to_owned(), value.to_owned());
        crate::persist::save_json(&self.path, &*values)
            .map_err(|e| ErrorCode::Storage.with(format!("{}: {e}", self.path.display())))
    }
}

/// Settings known to the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKey {
    OrganizationId,
    GitpodHost,
}

impl SettingKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OrganizationId => "ORGANIZATION_ID",
            Self::GitpodHost => "GITPOD_HOST",
        }
    }

    fn store_key(&self) -> String {
        format!("GATEWAY_SETTINGS:{}", self.as_str())
    }
}

/// A change notification: key and new value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingChange {
    pub key: SettingKey,
    pub value: String,
}

/// Typed view over the settings store.
pub struct GatewaySettings {
    store: Arc<dyn SettingsStore>,
    default_host: String,
    change_tx: broadcast::Sender<SettingChange>,
}

impl GatewaySettings {
    pub fn new(store: Arc<dyn SettingsStore>, default_host: &str) -> Self {
        let (change_tx, _) = broadcast::channel(32);
        Self { store, default_host: normalize_host(default_host), change_tx }
    }

    /// Subscribe to setting changes.
    pub fn subscribe(&self) -> broadcast::Receiver<SettingChange> {
        self.change_tx.subscribe()
    }

    /// The preferred host, normalized.
    pub fn host(&self) -> String {
        match self.store.get(&SettingKey::GitpodHost.store_key()) {
            Some(h) if !h.trim().is_empty() => normalize_host(&h),
            _ => self.default_host.clone(),
        }
    }

    pub fn set_host(&self, host: &str) {
        self.update(SettingKey::GitpodHost, &normalize_host(host));
    }

    /// Selected organization; blank reads as none.
    pub fn organization_id(&self) -> Option<String> {
        self.store
            .get(&SettingKey::OrganizationId.store_key())
            .filter(|v| !v.trim().is_empty())
    }

    pub fn set_organization_id(&self, org: Option<&str>) {
        self.update(SettingKey::OrganizationId, org.unwrap_or(""));
    }

    /// Reset host-scoped settings: select `host`, clear the organization.
    pub fn reset(&self, host: &str) {
        tracing::info!(host = %host, "resetting host-scoped settings");
        self.set_host(host);
        self.set_organization_id(None);
    }

    fn update(&self, key: SettingKey, value: &str) {
        tracing::debug!(key = key.as_str(), value, "update setting");
        if let Err(e) = self.store.set(&key.store_key(), value) {
            tracing::warn!(key = key.as_str(), err = %e, "failed to persist setting");
        }
        let _ = self.change_tx.send(SettingChange { key, value: value.to_owned() });
    }
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
