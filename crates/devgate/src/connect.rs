// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connect requests: which workspace on which host to open.

use std::collections::HashMap;

use serde::Serialize;
use url::Url;

use crate::error::{ErrorCode, GatewayError};
use crate::host::{host_authority, normalize_host};

/// Identifies one workspace on one host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ConnectParams {
    pub workspace_id: String,
    pub resolved_workspace_id: String,
    pub unique_id: String,
}

impl ConnectParams {
    pub fn new(host: &str, workspace_id: &str, resolved_workspace_id: Option<&str>) -> Self {
        let resolved = resolved_workspace_id.filter(|r| !r.is_empty()).unwrap_or(workspace_id);
        Self {
            workspace_id: workspace_id.to_owned(),
            resolved_workspace_id: resolved.to_owned(),
            unique_id: unique_id(host, workspace_id),
        }
    }
}

/// `"<host-authority>-<workspace id>"`.
pub fn unique_id(host: &str, workspace_id: &str) -> String {
    format!("{}-{workspace_id}", host_authority(host))
}

/// A connect deep link after parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    pub host: String,
    pub params: ConnectParams,
}

/// Parse `<scheme>://gateway/<plugin>/connect?gitpodHost=..&workspaceId=..`.
///
/// `host` is accepted in place of `gitpodHost`; `resolvedWorkspaceId` is
/// optional.
pub fn parse_connect_uri(uri: &Url) -> Result<ConnectRequest, GatewayError> {
    if !uri.path().trim_end_matches('/').ends_with("/connect") {
        return Err(ErrorCode::UnrecognizedDeepLink.with(format!("not a connect link: {uri}")));
    }
    let query: HashMap<String, String> = uri.query_pairs().into_owned().collect();
    let param = |names: &[&str]| {
        names.iter().find_map(|n| query.get(*n)).map(|v| v.trim()).filter(|v| !v.is_empty())
    };

    let host = param(&["gitpodHost", "host"])
        .ok_or_else(|| ErrorCode::UnrecognizedDeepLink.with("connect link has no host"))?;
    let workspace_id = param(&["workspaceId"])
        .ok_or_else(|| ErrorCode::UnrecognizedDeepLink.with("connect link has no workspace id"))?;
    let resolved = param(&["resolvedWorkspaceId"]);

    let host = normalize_host(host);
    let params = ConnectParams::new(&host, workspace_id, resolved);
    Ok(ConnectRequest { host, params })
}
