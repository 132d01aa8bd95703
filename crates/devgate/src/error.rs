// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes for the gateway core and its HTTP API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Bearer credential is not a three-segment token or lacks a session id.
    MalformedCredential,
    /// Token exchange or user-info fetch failed.
    AuthenticationFailed,
    /// Deep link matched neither the OAuth callback nor a connect request.
    UnrecognizedDeepLink,
    /// Environment was activated while its workspace is not running.
    StaleActivation,
    /// Requested action is not offered in the current environment state.
    InvalidAction,
    EnvironmentNotFound,
    /// No account is current.
    NotLoggedIn,
    Unauthorized,
    BadRequest,
    Storage,
    Internal,
}

impl ErrorCode {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::MalformedCredential => 401,
            Self::AuthenticationFailed => 401,
            Self::UnrecognizedDeepLink => 400,
            Self::StaleActivation => 409,
            Self::InvalidAction => 409,
            Self::EnvironmentNotFound => 404,
            Self::NotLoggedIn => 404,
            Self::Unauthorized => 401,
            Self::BadRequest => 400,
            Self::Storage => 500,
            Self::Internal => 500,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MalformedCredential => "MALFORMED_CREDENTIAL",
            Self::AuthenticationFailed => "AUTHENTICATION_FAILED",
            Self::UnrecognizedDeepLink => "UNRECOGNIZED_DEEP_LINK",
            Self::StaleActivation => "STALE_ACTIVATION",
            Self::InvalidAction => "INVALID_ACTION",
            Self::EnvironmentNotFound => "ENVIRONMENT_NOT_FOUND",
            Self::NotLoggedIn => "NOT_LOGGED_IN",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::BadRequest => "BAD_REQUEST",
            Self::Storage => "STORAGE",
            Self::Internal => "INTERNAL",
        }
    }

    /// Attach a human-readable message to this code.
    pub fn with(self, message: impl Into<String>) -> GatewayError {
        GatewayError { code: self, message: message.into() }
    }

    pub fn to_error_body(&self, message: impl Into<String>) -> ErrorBody {
        ErrorBody { code: self.as_str().to_owned(), message: message.into() }
    }

    pub fn to_http_response(
        &self,
        message: impl Into<String>,
    ) -> (StatusCode, Json<ErrorResponse>) {
        let status =
            StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorResponse { error: self.to_error_body(message) };
        (status, Json(body))
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An [`ErrorCode`] with context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayError {
    pub code: ErrorCode,
    pub message: String,
}

impl GatewayError {
    pub fn malformed_credential(message: impl Into<String>) -> Self {
        ErrorCode::MalformedCredential.with(message)
    }

    pub fn authentication_failed(message: impl Into<String>) -> Self {
        ErrorCode::AuthenticationFailed.with(message)
    }

    pub fn to_http_response(&self) -> (StatusCode, Json<ErrorResponse>) {
        self.code.to_http_response(self.message.clone())
    }
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for GatewayError {}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        let kind = if e.is_timeout() {
            "timed out"
        } else if e.is_connect() {
            "connection failed"
        } else {
            "request failed"
        };
        Self::authentication_failed(format!("{kind}: {e}"))
    }
}

/// Top-level error response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

/// Error body with machine-readable code and human-readable message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
