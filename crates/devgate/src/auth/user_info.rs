// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client for the control plane's authenticated-user endpoint.

use serde::Deserialize;

use crate::error::GatewayError;
use crate::host::host_authority;

const GET_AUTHENTICATED_USER: &str = "gitpod.v1.UserService/GetAuthenticatedUser";

/// Identity returned by the user-info endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserInfo {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct GetAuthenticatedUserResponse {
    user: UserInfo,
}

/// Connect-RPC JSON client for `GetAuthenticatedUser`.
#[derive(Debug, Clone)]
pub struct UserInfoClient {
    http: reqwest::Client,
    api_base: Option<String>,
}

impl UserInfoClient {
    /// `api_base` overrides the derived `https://api.<host>` base URL.
    pub fn new(http: reqwest::Client, api_base: Option<String>) -> Self {
        Self { http, api_base: api_base.map(|b| b.trim_end_matches('/').to_owned()) }
    }

    pub fn endpoint(&self, host: &str) -> String {
        let base = match self.api_base {
            Some(ref b) => b.clone(),
            None => format!("https://api.{}", host_authority(host)),
        };
        format!("{base}/{GET_AUTHENTICATED_USER}")
    }

    pub async fn authenticated_user(
        &self,
        host: &str,
        session_token: &str,
    ) -> Result<UserInfo, GatewayError> {
        let resp = self
            .http
            .post(self.endpoint(host))
            .bearer_auth(session_token)
            .header("Connect-Protocol-Version", "1")
            .json(&serde_json::json!({}))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            return Err(GatewayError::authentication_failed(format!(
                "user info request failed ({status})"
            )));
        }

        let body: GetAuthenticatedUserResponse = resp.json().await.map_err(|e| {
            GatewayError::authentication_failed(format!("invalid user info response: {e}"))
        })?;
        if body.user.id.is_empty() {
            return Err(GatewayError::authentication_failed("user info has no id"));
        }
        Ok(body.user)
    }
}
