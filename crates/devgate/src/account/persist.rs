// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Account file: encoded accounts, saved atomically.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::account::Account;

/// On-disk layout of the account file.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct PersistedAccounts {
    /// Each entry is an [`Account::encode`] string.
    #[serde(default)]
    pub accounts: Vec<String>,
}

/// Account file location.
#[derive(Debug, Clone)]
pub struct AccountFile {
    path: PathBuf,
}

impl AccountFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load all decodable accounts. Undecodable entries are skipped.
    pub fn load(&self) -> anyhow::Result<Vec<Account>> {
        let Some(persisted) = crate::persist::load_json::<PersistedAccounts>(&self.path)? else {
            return Ok(vec![]);
        };
        let mut accounts = Vec::with_capacity(persisted.accounts.len());
        for encoded in &persisted.accounts {
            match Account::decode(encoded) {
                Ok(a) => accounts.push(a),
                Err(e) => tracing::warn!(err = %e, "skipping undecodable persisted account"),
            }
        }
        Ok(accounts)
    }

    pub fn save(&self, accounts: &[Account]) -> anyhow::Result<()> {
        let persisted = PersistedAccounts {
            accounts: accounts.iter().map(Account::encode).collect::<Result<_, _>>()?,
        };
        crate::persist::save_json(&self.path, &persisted)
    }
}
