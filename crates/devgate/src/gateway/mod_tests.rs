// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::*;
use crate::connect::unique_id;
use crate::environment::state::EnvironmentState;
use crate::test_support::{connect_uri, MockControlPlane, TestGateway, UiCall};

fn ws(id: &str, phase: WorkspacePhase) -> WorkspaceUpdate {
    WorkspaceUpdate { id: id.to_owned(), phase: Some(phase), resolved_id: None }
}

#[tokio::test]
async fn pending_connect_replays_once_after_login() -> anyhow::Result<()> {
    let tg = TestGateway::start().await?;
    let env_id = unique_id(&tg.host(), "ws-x");

    let disposition = tg.gateway.handle_uri(&connect_uri(&tg.host(), "ws-x")?).await;
    assert_eq!(
        disposition,
        UriDisposition::Connect { environment_id: env_id.clone(), deferred: true }
    );
    assert!(!tg.gateway.pending().is_empty());
    assert!(tg.gateway.environments().is_empty());

    tg.complete_browser_login(&tg.last_opened_url()?).await?;

    let env = tg.gateway.environments().get(&env_id).ok_or_else(|| anyhow::anyhow!("no env"))?;
    assert!(env.snapshot().active);
    assert_eq!(tg.ui.auto_connects(), vec![env_id]);
    assert!(tg.gateway.pending().is_empty());
    assert_eq!(tg.gateway.environments().len(), 1);
    Ok(())
}

#[tokio::test]
async fn last_connect_request_wins() -> anyhow::Result<()> {
    let tg = TestGateway::start().await?;
    tg.gateway.handle_uri(&connect_uri(&tg.host(), "ws-x")?).await;
    tg.gateway.handle_uri(&connect_uri(&tg.host(), "ws-y")?).await;

    tg.complete_browser_login(&tg.last_opened_url()?).await?;

    let ids: Vec<String> =
        tg.gateway.environments().list().iter().map(|e| e.id().to_owned()).collect();
    assert_eq!(ids, vec![unique_id(&tg.host(), "ws-y")]);
    assert_eq!(tg.ui.auto_connects(), vec![unique_id(&tg.host(), "ws-y")]);
    assert!(tg.gateway.pending().is_empty());
    Ok(())
}

#[tokio::test]
async fn connect_when_logged_in_activates_immediately() -> anyhow::Result<()> {
    let tg = TestGateway::start().await?;
    tg.login(&tg.host()).await?;
    tg.ui.clear();

    let disposition = tg.gateway.handle_uri(&connect_uri(&tg.host(), "ws-1")?).await;
    let env_id = unique_id(&tg.host(), "ws-1");
    assert_eq!(
        disposition,
        UriDisposition::Connect { environment_id: env_id.clone(), deferred: false }
    );
    assert_eq!(
        tg.ui.calls(),
        vec![UiCall::ShowWindow, UiCall::ShowEnvironmentsPage, UiCall::SetAutoConnect(env_id)]
    );
    assert!(tg.gateway.pending().is_empty());
    Ok(())
}

#[tokio::test]
async fn connect_to_known_host_switches_and_activates_once() -> anyhow::Result<()> {
    let tg = TestGateway::start().await?;
    let other = MockControlPlane::start().await?;
    tg.login(&tg.host()).await?;
    tg.login(&other.host()).await?;
    tg.ui.clear();

    let disposition = tg.gateway.handle_uri(&connect_uri(&tg.host(), "ws-1")?).await;
    assert!(matches!(disposition, UriDisposition::Connect { deferred: false, .. }));
    assert_eq!(tg.ui.auto_connects(), vec![unique_id(&tg.host(), "ws-1")]);
    assert_eq!(tg.ctx.settings.host(), tg.host());
    assert!(tg.gateway.pending().is_empty());
    Ok(())
}

#[tokio::test]
async fn unrecognized_link_is_ignored() -> anyhow::Result<()> {
    let tg = TestGateway::start().await?;
    let uri = Url::parse("devgate://gateway/devgate/settings?x=1")?;
    let disposition = tg.gateway.handle_uri(&uri).await;
    assert!(matches!(disposition, UriDisposition::Ignored { .. }));
    assert!(tg.gateway.pending().is_empty());
    assert!(tg.gateway.environments().is_empty());
    assert!(tg.ui.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn callback_is_reported_as_oauth() -> anyhow::Result<()> {
    let tg = TestGateway::start().await?;
    let auth_url = tg.auth.oauth_login_url(&tg.host())?;
    let callback = crate::test_support::callback_uri(
        &tg.ctx.config.redirect_uri,
        auth_url.as_str(),
        "code",
    )?;
    assert_eq!(tg.gateway.handle_uri(&callback).await, UriDisposition::OAuthCallback);
    assert!(tg.auth.current_account().is_some());
    Ok(())
}

#[tokio::test]
async fn failed_login_keeps_pending_request() -> anyhow::Result<()> {
    let tg = TestGateway::start().await?;
    tg.mock.set_token_status(500);
    tg.gateway.handle_uri(&connect_uri(&tg.host(), "ws-x")?).await;
    tg.complete_browser_login(&tg.last_opened_url()?).await?;

    assert!(tg.gateway.environments().is_empty());
    assert_eq!(
        tg.gateway.pending().peek().map(|r| r.params.workspace_id),
        Some("ws-x".to_owned())
    );

    tg.mock.set_token_status(200);
    tg.login(&tg.host()).await?;
    assert!(tg.gateway.pending().is_empty());
    assert_eq!(tg.gateway.environments().len(), 1);
    Ok(())
}

#[tokio::test]
async fn workspace_list_requires_account() -> anyhow::Result<()> {
    let tg = TestGateway::start().await?;
    let err = tg.gateway.consume_workspaces(&[ws("ws-1", WorkspacePhase::Running)]).err();
    assert_eq!(err.map(|e| e.code), Some(ErrorCode::NotLoggedIn));
    Ok(())
}

#[tokio::test]
async fn workspace_list_creates_environments() -> anyhow::Result<()> {
    let tg = TestGateway::start().await?;
    tg.login(&tg.host()).await?;

    let infos = tg.gateway.consume_workspaces(&[
        ws("ws-1", WorkspacePhase::Running),
        ws("ws-2", WorkspacePhase::Interrupted),
    ])?;
    let states: Vec<EnvironmentState> = infos.iter().map(|i| i.state).collect();
    assert_eq!(states, vec![EnvironmentState::Inactive, EnvironmentState::Error]);

    // A second update reuses the same instances.
    tg.gateway.consume_workspaces(&[ws("ws-1", WorkspacePhase::Stopping)])?;
    assert_eq!(tg.gateway.environments().len(), 2);
    Ok(())
}

#[tokio::test]
async fn workspace_list_replays_matching_pending_request() -> anyhow::Result<()> {
    let tg = TestGateway::start().await?;
    tg.login(&tg.host()).await?;
    tg.gateway.pending().hold(ConnectRequest {
        host: tg.host(),
        params: ConnectParams::new(&tg.host(), "ws-2", None),
    });

    tg.gateway.consume_workspaces(&[ws("ws-1", WorkspacePhase::Running)])?;
    assert!(!tg.gateway.pending().is_empty());

    tg.gateway.consume_workspaces(&[ws("ws-2", WorkspacePhase::Running)])?;
    assert!(tg.gateway.pending().is_empty());
    let env = tg
        .gateway
        .environments()
        .get(&unique_id(&tg.host(), "ws-2"))
        .ok_or_else(|| anyhow::anyhow!("no env"))?;
    assert_eq!(env.state(), EnvironmentState::Active);
    Ok(())
}

#[tokio::test]
async fn phase_feed_drives_environment_state() -> anyhow::Result<()> {
    let tg = TestGateway::start().await?;
    tg.login(&tg.host()).await?;
    tg.gateway.consume_workspaces(&[WorkspaceUpdate {
        id: "ws-1".into(),
        phase: None,
        resolved_id: None,
    }])?;
    let env_id = unique_id(&tg.host(), "ws-1");
    let update = |phase| PhaseUpdate { workspace_id: "ws-1".into(), phase };

    tg.gateway.push_phase(&update(WorkspacePhase::Preparing));
    assert_eq!(tg.gateway.environments().get(&env_id).map(|e| e.state()), Some(EnvironmentState::Unreachable));
    tg.gateway.push_phase(&update(WorkspacePhase::Running));
    assert_eq!(tg.gateway.environments().get(&env_id).map(|e| e.state()), Some(EnvironmentState::Inactive));

    let info = tg.gateway.perform_action(&env_id, EnvAction::Connect)?;
    assert_eq!(info.state, EnvironmentState::Active);
    let info = tg.gateway.perform_action(&env_id, EnvAction::Close)?;
    assert_eq!(info.state, EnvironmentState::Inactive);
    assert_eq!(info.phase, WorkspacePhase::Running);
    Ok(())
}

#[tokio::test]
async fn phase_router_applies_broadcast_updates() -> anyhow::Result<()> {
    let tg = TestGateway::start().await?;
    tg.login(&tg.host()).await?;
    tg.gateway.consume_workspaces(&[ws("ws-1", WorkspacePhase::Pending)])?;
    let env = tg
        .gateway
        .environments()
        .get(&unique_id(&tg.host(), "ws-1"))
        .ok_or_else(|| anyhow::anyhow!("no env"))?;
    let mut rx = env.subscribe();

    let shutdown = CancellationToken::new();
    let router = tg.gateway.spawn_phase_router(shutdown.clone());
    tg.gateway
        .phase_sender()
        .send(PhaseUpdate { workspace_id: "ws-1".into(), phase: WorkspacePhase::Running })?;

    tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|s| s.phase == WorkspacePhase::Running))
        .await??;

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(2), router).await??;
    Ok(())
}

#[tokio::test]
async fn perform_action_errors() -> anyhow::Result<()> {
    let tg = TestGateway::start().await?;
    let err = tg.gateway.perform_action("nope", EnvAction::Connect).err();
    assert_eq!(err.map(|e| e.code), Some(ErrorCode::EnvironmentNotFound));

    tg.login(&tg.host()).await?;
    tg.gateway.consume_workspaces(&[ws("ws-1", WorkspacePhase::Stopped)])?;
    let err = tg.gateway.perform_action(&unique_id(&tg.host(), "ws-1"), EnvAction::Connect).err();
    assert_eq!(err.map(|e| e.code), Some(ErrorCode::InvalidAction));
    Ok(())
}

#[tokio::test]
async fn logout_shows_environments_page() -> anyhow::Result<()> {
    let tg = TestGateway::start().await?;
    tg.login(&tg.host()).await?;
    tg.ui.clear();
    tg.auth.logout();
    assert_eq!(tg.ui.calls(), vec![UiCall::ShowWindow, UiCall::ShowEnvironmentsPage]);
    Ok(())
}

#[tokio::test]
async fn pending_request_survives_connect_to_logged_in_host() -> anyhow::Result<()> {
    let tg = TestGateway::start().await?;
    let other = MockControlPlane::start().await?;
    tg.login(&tg.host()).await?;

    let deferred = tg.gateway.handle_uri(&connect_uri(&other.host(), "ws-x")?).await;
    assert!(matches!(deferred, UriDisposition::Connect { deferred: true, .. }));
    let other_auth_url = tg.last_opened_url()?;

    let immediate = tg.gateway.handle_uri(&connect_uri(&tg.host(), "ws-1")?).await;
    assert!(matches!(immediate, UriDisposition::Connect { deferred: false, .. }));
    assert_eq!(
        tg.gateway.pending().peek().map(|r| r.params.unique_id),
        Some(unique_id(&other.host(), "ws-x"))
    );

    tg.complete_browser_login(&other_auth_url).await?;
    assert!(tg.gateway.pending().is_empty());
    assert_eq!(
        tg.ui.auto_connects(),
        vec![unique_id(&tg.host(), "ws-1"), unique_id(&other.host(), "ws-x")]
    );
    Ok(())
}

#[tokio::test]
async fn login_without_organization_shows_organization_page() -> anyhow::Result<()> {
    let tg = TestGateway::start().await?;
    tg.login(&tg.host()).await?;

    assert!(tg.ui.calls().contains(&UiCall::ShowOrganizationPage));
    assert_eq!(tg.gateway.workspace_watch(), WorkspaceWatch::default());
    Ok(())
}

#[tokio::test]
async fn selecting_organization_restarts_workspace_watch() -> anyhow::Result<()> {
    let tg = TestGateway::start().await?;
    let shutdown = CancellationToken::new();
    let watcher = tg.gateway.spawn_settings_watcher(shutdown.clone());
    let mut rx = tg.gateway.subscribe_workspace_watch();
    tg.login(&tg.host()).await?;

    tg.ctx.settings.set_organization_id(Some("org-1"));
    let watch = tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|w| w.generation == 1))
        .await??
        .clone();
    assert_eq!(watch.host, Some(tg.host()));
    assert_eq!(watch.organization_id.as_deref(), Some("org-1"));

    tg.ui.clear();
    tg.gateway.startup();
    assert!(tg.ui.calls().is_empty());
    assert_eq!(tg.gateway.workspace_watch().generation, 2);

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(2), watcher).await??;
    Ok(())
}

#[tokio::test]
async fn workspace_list_prunes_cached_phases() -> anyhow::Result<()> {
    let tg = TestGateway::start().await?;
    tg.login(&tg.host()).await?;
    for ws in ["ws-old", "ws-new"] {
        let update = PhaseUpdate { workspace_id: ws.into(), phase: WorkspacePhase::Running };
        tg.gateway.push_phase(&update);
    }
    assert_eq!(tg.gateway.environments().cached_phase_count(), 2);

    let infos = tg.gateway.consume_workspaces(&[WorkspaceUpdate {
        id: "ws-new".into(),
        phase: None,
        resolved_id: None,
    }])?;
    assert_eq!(infos[0].phase, WorkspacePhase::Running);
    assert_eq!(tg.gateway.environments().cached_phase_count(), 1);
    Ok(())
}
