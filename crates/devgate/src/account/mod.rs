// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authenticated account records and their persisted encoding.

pub mod persist;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ErrorCode, GatewayError};
use crate::host::normalize_host;

/// An authenticated account on one control-plane host.
///
/// Immutable; re-authentication replaces the whole record. Identity is the
/// host: the account set holds at most one account per host.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    credentials: String,
    id: String,
    name: String,
    host: String,
}

impl Account {
    pub fn new(
        credentials: impl Into<String>,
        id: impl Into<String>,
        name: impl Into<String>,
        host: &str,
    ) -> Self {
        Self {
            credentials: credentials.into(),
            id: id.into(),
            name: name.into(),
            host: normalize_host(host),
        }
    }

    /// Session token used as the bearer for API calls.
    pub fn credentials(&self) -> &str {
        &self.credentials
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn full_name(&self) -> &str {
        &self.name
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Encode to the opaque string stored on disk.
    pub fn encode(&self) -> Result<String, GatewayError> {
        serde_json::to_string(self)
            .map_err(|e| ErrorCode::Internal.with(format!("encode account: {e}")))
    }

    /// Decode from [`Account::encode`] output.
    pub fn decode(encoded: &str) -> Result<Self, GatewayError> {
        let mut account: Self = serde_json::from_str(encoded)
            .map_err(|e| ErrorCode::Storage.with(format!("decode account: {e}")))?;
        account.host = normalize_host(&account.host);
        Ok(account)
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
