// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: a mock control plane, a recording UI, and a
//! fully wired gateway harness.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Form, Json, Router};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use url::Url;

use crate::account::persist::AccountFile;
use crate::auth::AuthManager;
use crate::config::GatewayConfig;
use crate::context::AppContext;
use crate::gateway::Gateway;
use crate::settings::MemorySettingsStore;
use crate::ui::HostUi;

/// Build an unsigned JWT (`header.payload.sig`) carrying `claims`.
pub fn make_jwt(claims: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.c2lnbmF0dXJl")
}

/// Assert that an expression returns `Err` whose message contains a substring.
#[macro_export]
macro_rules! assert_err_contains {
    ($expr:expr, $substr:expr) => {{
        let result = $expr;
        let err = result.expect_err(concat!("expected Err for: ", stringify!($expr)));
        let msg = err.to_string();
        assert!(msg.contains($substr), "expected error containing {:?}, got: {msg:?}", $substr);
    }};
}

/// A call made on [`RecordingUi`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiCall {
    ShowWindow,
    ShowEnvironmentsPage,
    ShowOrganizationPage,
    OpenUrl(String),
    SetAutoConnect(String),
    ReportError(String),
}

/// Host UI that records every call.
#[derive(Debug, Default)]
pub struct RecordingUi {
    calls: Mutex<Vec<UiCall>>,
}

impl RecordingUi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<UiCall> {
        self.calls.lock().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    pub fn opened_urls(&self) -> Vec<String> {
        self.filter(|c| match c {
            UiCall::OpenUrl(u) => Some(u.clone()),
            _ => None,
        })
    }

    pub fn auto_connects(&self) -> Vec<String> {
        self.filter(|c| match c {
            UiCall::SetAutoConnect(id) => Some(id.clone()),
            _ => None,
        })
    }

    pub fn errors(&self) -> Vec<String> {
        self.filter(|c| match c {
            UiCall::ReportError(m) => Some(m.clone()),
            _ => None,
        })
    }

    fn filter(&self, f: impl Fn(&UiCall) -> Option<String>) -> Vec<String> {
        self.calls.lock().iter().filter_map(f).collect()
    }

    fn record(&self, call: UiCall) {
        self.calls.lock().push(call);
    }
}

impl HostUi for RecordingUi {
    fn show_window(&self) {
        self.record(UiCall::ShowWindow);
    }

    fn show_environments_page(&self) {
        self.record(UiCall::ShowEnvironmentsPage);
    }

    fn show_organization_page(&self) {
        self.record(UiCall::ShowOrganizationPage);
    }

    fn open_url(&self, url: &str) {
        self.record(UiCall::OpenUrl(url.to_owned()));
    }

    fn set_auto_connect(&self, environment_id: &str) {
        self.record(UiCall::SetAutoConnect(environment_id.to_owned()));
    }

    fn report_error(&self, message: &str) {
        self.record(UiCall::ReportError(message.to_owned()));
    }
}

struct MockState {
    token_status: AtomicU16,
    token_delay_ms: AtomicU64,
    access_token: Mutex<String>,
    token_calls: AtomicU32,
    token_forms: Mutex<Vec<HashMap<String, String>>>,
    user_status: AtomicU16,
    user: Mutex<(String, String)>,
    user_calls: AtomicU32,
    bearers: Mutex<Vec<String>>,
}

/// Control plane stand-in serving the OAuth token endpoint and the
/// authenticated-user RPC on `127.0.0.1:0`.
pub struct MockControlPlane {
    addr: SocketAddr,
    state: Arc<MockState>,
    task: JoinHandle<()>,
}

impl MockControlPlane {
    /// Start the server. Token exchanges succeed with session `session-1`
    /// for user `user-1` until reconfigured.
    pub async fn start() -> anyhow::Result<Self> {
        let state = Arc::new(MockState {
            token_status: AtomicU16::new(200),
            token_delay_ms: AtomicU64::new(0),
            access_token: Mutex::new(make_jwt(&serde_json::json!({ "jti": "session-1" }))),
            token_calls: AtomicU32::new(0),
            token_forms: Mutex::new(vec![]),
            user_status: AtomicU16::new(200),
            user: Mutex::new(("user-1".to_owned(), "Test User".to_owned())),
            user_calls: AtomicU32::new(0),
            bearers: Mutex::new(vec![]),
        });

        let app = Router::new()
            .route("/api/oauth/token", post(token_handler))
            .route("/gitpod.v1.UserService/GetAuthenticatedUser", post(user_handler))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let task = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });
        Ok(Self { addr, state, task })
    }

    /// Host base URL (`http://127.0.0.1:<port>`).
    pub fn host(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn set_token_status(&self, status: u16) {
        self.state.token_status.store(status, Ordering::Relaxed);
    }

    pub fn set_token_delay(&self, delay: Duration) {
        self.state.token_delay_ms.store(delay.as_millis() as u64, Ordering::Relaxed);
    }

    /// Issue JWTs whose `jti` is `session`.
    pub fn set_session(&self, session: &str) {
        *self.state.access_token.lock() = make_jwt(&serde_json::json!({ "jti": session }));
    }

    /// Issue `token` verbatim as the access token.
    pub fn set_access_token(&self, token: &str) {
        *self.state.access_token.lock() = token.to_owned();
    }

    pub fn set_user(&self, id: &str, name: &str) {
        *self.state.user.lock() = (id.to_owned(), name.to_owned());
    }

    pub fn set_user_status(&self, status: u16) {
        self.state.user_status.store(status, Ordering::Relaxed);
    }

    pub fn token_calls(&self) -> u32 {
        self.state.token_calls.load(Ordering::Relaxed)
    }

    pub fn user_calls(&self) -> u32 {
        self.state.user_calls.load(Ordering::Relaxed)
    }

    /// Form bodies received by the token endpoint.
    pub fn token_forms(&self) -> Vec<HashMap<String, String>> {
        self.state.token_forms.lock().clone()
    }

    /// Bearer tokens received by the user-info endpoint.
    pub fn bearers(&self) -> Vec<String> {
        self.state.bearers.lock().clone()
    }
}

impl Drop for MockControlPlane {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn token_handler(
    State(state): State<Arc<MockState>>,
    Form(form): Form<HashMap<String, String>>,
) -> (StatusCode, Json<serde_json::Value>) {
    state.token_calls.fetch_add(1, Ordering::Relaxed);
    state.token_forms.lock().push(form);

    let delay = state.token_delay_ms.load(Ordering::Relaxed);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    let status = StatusCode::from_u16(state.token_status.load(Ordering::Relaxed))
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if !status.is_success() {
        return (status, Json(serde_json::json!({ "error": "invalid_grant" })));
    }
    let access_token = state.access_token.lock().clone();
    (status, Json(serde_json::json!({ "access_token": access_token, "token_type": "Bearer" })))
}

async fn user_handler(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
) -> (StatusCode, Json<serde_json::Value>) {
    state.user_calls.fetch_add(1, Ordering::Relaxed);
    let bearer = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_owned);
    let Some(bearer) = bearer else {
        return (StatusCode::UNAUTHORIZED, Json(serde_json::json!({ "code": "unauthenticated" })));
    };
    state.bearers.lock().push(bearer);

    let status = StatusCode::from_u16(state.user_status.load(Ordering::Relaxed))
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if !status.is_success() {
        return (status, Json(serde_json::json!({ "code": "permission_denied" })));
    }
    let (id, name) = state.user.lock().clone();
    (status, Json(serde_json::json!({ "user": { "id": id, "name": name } })))
}

/// Build the callback deep link the browser would deliver for `auth_url`.
pub fn callback_uri(redirect_uri: &str, auth_url: &str, code: &str) -> anyhow::Result<Url> {
    let auth_url = Url::parse(auth_url)?;
    let state = auth_url
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .ok_or_else(|| anyhow::anyhow!("authorization url has no state: {auth_url}"))?;
    let mut callback = Url::parse(redirect_uri)?;
    callback.query_pairs_mut().append_pair("code", code).append_pair("state", &state);
    Ok(callback)
}

/// Connect deep link for `workspace_id` on `host`.
pub fn connect_uri(host: &str, workspace_id: &str) -> anyhow::Result<Url> {
    let mut uri = Url::parse("devgate://gateway/devgate/connect")?;
    uri.query_pairs_mut().append_pair("gitpodHost", host).append_pair("workspaceId", workspace_id);
    Ok(uri)
}

/// A gateway wired to a [`MockControlPlane`] and a [`RecordingUi`].
pub struct TestGateway {
    pub mock: MockControlPlane,
    pub ui: Arc<RecordingUi>,
    pub ctx: Arc<AppContext>,
    pub auth: Arc<AuthManager>,
    pub gateway: Arc<Gateway>,
}

impl TestGateway {
    pub async fn start() -> anyhow::Result<Self> {
        Self::with_account_file(None).await
    }

    pub async fn with_account_file(account_file: Option<AccountFile>) -> anyhow::Result<Self> {
        let mock = MockControlPlane::start().await?;
        Self::with_mock(mock, account_file)
    }

    pub fn with_mock(
        mock: MockControlPlane,
        account_file: Option<AccountFile>,
    ) -> anyhow::Result<Self> {
        Self::configured(mock, account_file, |_| {})
    }

    /// Like [`TestGateway::with_mock`], letting `configure` adjust the config.
    pub fn configured(
        mock: MockControlPlane,
        account_file: Option<AccountFile>,
        configure: impl FnOnce(&mut GatewayConfig),
    ) -> anyhow::Result<Self> {
        let ui = Arc::new(RecordingUi::new());
        let mut config = GatewayConfig::test(std::env::temp_dir().join("devgate-test"));
        config.api_base = Some(mock.host());
        configure(&mut config);
        let host_ui: Arc<dyn HostUi> = Arc::clone(&ui) as Arc<dyn HostUi>;
        let ctx = AppContext::new(config, Arc::new(MemorySettingsStore::new()), host_ui)?;
        let auth = AuthManager::new(Arc::clone(&ctx), account_file)?;
        let gateway = Gateway::new(Arc::clone(&ctx), Arc::clone(&auth));
        Ok(Self { mock, ui, ctx, auth, gateway })
    }

    /// The mock control plane's host.
    pub fn host(&self) -> String {
        self.mock.host()
    }

    /// Complete a browser login for `host` through the callback deep link.
    pub async fn login(&self, host: &str) -> anyhow::Result<()> {
        let auth_url = self.auth.oauth_login_url(host)?;
        self.complete_browser_login(auth_url.as_str()).await
    }

    /// Deliver the callback for a previously opened authorization URL.
    pub async fn complete_browser_login(&self, auth_url: &str) -> anyhow::Result<()> {
        let callback = callback_uri(&self.ctx.config.redirect_uri, auth_url, "test-code")?;
        if !self.auth.try_handle(&callback).await {
            anyhow::bail!("callback not handled: {callback}");
        }
        Ok(())
    }

    /// The most recent URL opened in the browser.
    pub fn last_opened_url(&self) -> anyhow::Result<String> {
        self.ui.opened_urls().pop().ok_or_else(|| anyhow::anyhow!("no url was opened"))
    }
}
