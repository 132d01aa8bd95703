// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP control API for the gateway.

pub mod auth;
pub mod http;

use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::gateway::Gateway;

/// Build the axum `Router` with all control routes.
pub fn build_router(gateway: Arc<Gateway>) -> Router {
    let cors = cors_layer(&gateway.context().config.cors_origins);
    Router::new()
        // Health (no auth)
        .route("/api/v1/health", get(http::health))
        // Accounts
        .route("/api/v1/account", get(http::account))
        .route("/api/v1/organization", post(http::select_organization))
        .route("/api/v1/workspace-watch", get(http::workspace_watch))
        .route("/api/v1/login", post(http::login))
        .route("/api/v1/logout", post(http::logout))
        // Deep links
        .route("/api/v1/uri", post(http::handle_uri))
        // Environments
        .route("/api/v1/environments", get(http::list_environments))
        .route("/api/v1/environments/{id}/actions/{action}", post(http::environment_action))
        // Workspace feed
        .route("/api/v1/workspaces", post(http::workspaces))
        .route("/api/v1/workspaces/{id}/phase", post(http::workspace_phase))
        // Middleware
        .layer(middleware::from_fn_with_state(gateway.clone(), auth::auth_layer))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(gateway)
}

/// CORS limited to the configured origins; none means same-origin only.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o.trim_end_matches('/')).ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}
