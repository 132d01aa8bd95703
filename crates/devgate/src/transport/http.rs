// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP handlers for the control API.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::auth::LoginOutcome;
use crate::environment::state::{EnvAction, WorkspacePhase};
use crate::environment::EnvironmentInfo;
use crate::error::ErrorCode;
use crate::gateway::{Gateway, PhaseUpdate, WorkspaceUpdate, WorkspaceWatch};

// -- Request/Response types ---------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub account_count: usize,
    pub environment_count: usize,
}

/// Current account, without its credential.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccountResponse {
    pub id: String,
    pub name: String,
    pub host: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    /// No organization is selected; workspaces are not watched yet.
    pub needs_organization: bool,
}

#[derive(Debug, Deserialize)]
pub struct OrganizationRequest {
    pub organization_id: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub host: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub logged_in: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LogoutResponse {
    pub logged_out: bool,
}

#[derive(Debug, Deserialize)]
pub struct UriRequest {
    pub uri: String,
}

#[derive(Debug, Deserialize)]
pub struct PhaseRequest {
    pub phase: WorkspacePhase,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PhaseResponse {
    pub updated: usize,
}

// -- Handlers -----------------------------------------------------------------

/// `GET /api/v1/health`
pub async fn health(State(g): State<Arc<Gateway>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "running".to_owned(),
        account_count: g.auth().accounts().len(),
        environment_count: g.environments().len(),
    })
}

/// `GET /api/v1/account`
pub async fn account(State(g): State<Arc<Gateway>>) -> impl IntoResponse {
    match g.auth().current_account() {
        Some(account) => {
            let organization_id = g.context().settings.organization_id();
            Json(AccountResponse {
                id: account.id().to_owned(),
                name: account.full_name().to_owned(),
                host: account.host().to_owned(),
                needs_organization: organization_id.is_none(),
                organization_id,
            })
            .into_response()
        }
        None => ErrorCode::NotLoggedIn.to_http_response("no account is logged in").into_response(),
    }
}

/// `POST /api/v1/organization`: select the organization whose workspaces
/// are watched.
pub async fn select_organization(
    State(g): State<Arc<Gateway>>,
    Json(req): Json<OrganizationRequest>,
) -> impl IntoResponse {
    if g.auth().current_account().is_none() {
        return ErrorCode::NotLoggedIn.to_http_response("no account is logged in").into_response();
    }
    let org = req.organization_id.trim();
    if org.is_empty() {
        return ErrorCode::BadRequest
            .to_http_response("organization_id is required")
            .into_response();
    }
    g.context().settings.set_organization_id(Some(org));
    account(State(g)).await.into_response()
}

/// `GET /api/v1/workspace-watch`
pub async fn workspace_watch(State(g): State<Arc<Gateway>>) -> Json<WorkspaceWatch> {
    Json(g.workspace_watch())
}

/// `POST /api/v1/login`
///
/// Switches to a known account, or starts a browser login and returns the
/// authorization URL that was opened.
pub async fn login(
    State(g): State<Arc<Gateway>>,
    Json(req): Json<LoginRequest>,
) -> impl IntoResponse {
    if req.host.trim().is_empty() {
        return ErrorCode::BadRequest.to_http_response("host is required").into_response();
    }
    match g.auth().login(&req.host) {
        Ok(LoginOutcome::Current | LoginOutcome::Switched) => {
            Json(LoginResponse { logged_in: true, auth_url: None }).into_response()
        }
        Ok(LoginOutcome::Browser(url)) => {
            Json(LoginResponse { logged_in: false, auth_url: Some(url.to_string()) })
                .into_response()
        }
        Err(e) => e.to_http_response().into_response(),
    }
}

/// `POST /api/v1/logout`
pub async fn logout(State(g): State<Arc<Gateway>>) -> impl IntoResponse {
    let logged_out = g.auth().current_account().is_some();
    g.auth().logout();
    Json(LogoutResponse { logged_out })
}

/// `POST /api/v1/uri`: deep-link dispatch.
pub async fn handle_uri(
    State(g): State<Arc<Gateway>>,
    Json(req): Json<UriRequest>,
) -> impl IntoResponse {
    let uri = match Url::parse(req.uri.trim()) {
        Ok(uri) => uri,
        Err(e) => {
            return ErrorCode::BadRequest.to_http_response(format!("invalid uri: {e}")).into_response()
        }
    };
    Json(g.handle_uri(&uri).await).into_response()
}

/// `GET /api/v1/environments`
pub async fn list_environments(State(g): State<Arc<Gateway>>) -> Json<Vec<EnvironmentInfo>> {
    Json(g.environment_infos())
}

/// `POST /api/v1/environments/{id}/actions/{action}`
pub async fn environment_action(
    State(g): State<Arc<Gateway>>,
    Path((id, action)): Path<(String, String)>,
) -> impl IntoResponse {
    let Some(action) = EnvAction::parse(&action) else {
        return ErrorCode::BadRequest
            .to_http_response(format!("unknown action: {action}"))
            .into_response();
    };
    match g.perform_action(&id, action) {
        Ok(info) => Json(info).into_response(),
        Err(e) => e.to_http_response().into_response(),
    }
}

/// `POST /api/v1/workspaces`: workspace-list update for the current host.
pub async fn workspaces(
    State(g): State<Arc<Gateway>>,
    Json(list): Json<Vec<WorkspaceUpdate>>,
) -> impl IntoResponse {
    match g.consume_workspaces(&list) {
        Ok(infos) => Json(infos).into_response(),
        Err(e) => e.to_http_response().into_response(),
    }
}

/// `POST /api/v1/workspaces/{id}/phase`: phase-feed push.
pub async fn workspace_phase(
    State(g): State<Arc<Gateway>>,
    Path(id): Path<String>,
    Json(req): Json<PhaseRequest>,
) -> impl IntoResponse {
    let updated = g.push_phase(&PhaseUpdate { workspace_id: id, phase: req.phase });
    Json(PhaseResponse { updated })
}
