// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use tokio::sync::mpsc;

use super::Environment;
use crate::connect::ConnectParams;
use crate::environment::state::{EnvAction, EnvironmentState, WorkspacePhase};
use crate::error::ErrorCode;

fn env() -> Environment {
    Environment::new(ConnectParams::new("https://gitpod.io", "ws-1", Some("my-workspace")))
}

async fn next(rx: &mut mpsc::UnboundedReceiver<EnvironmentState>) -> anyhow::Result<EnvironmentState> {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await?
        .ok_or_else(|| anyhow::anyhow!("listener channel closed"))
}

#[test]
fn identity_comes_from_params() {
    let env = env();
    assert_eq!(env.id(), "gitpod.io-ws-1");
    assert_eq!(env.name(), "my-workspace");
    assert_eq!(env.snapshot().phase, WorkspacePhase::Unspecified);
    assert_eq!(env.state(), EnvironmentState::Unreachable);
}

#[test]
fn preparing_then_running_without_activation_is_never_active() {
    let env = env();
    env.update_phase(WorkspacePhase::Preparing);
    assert_eq!(env.state(), EnvironmentState::Unreachable);
    env.update_phase(WorkspacePhase::Running);
    assert_eq!(env.state(), EnvironmentState::Inactive);
}

#[test]
fn running_then_activate_then_close() {
    let env = env();
    env.update_phase(WorkspacePhase::Running);
    assert!(env.mark_active());
    assert_eq!(env.state(), EnvironmentState::Active);

    assert!(env.close());
    let snapshot = env.snapshot();
    assert!(!snapshot.active);
    assert_eq!(snapshot.phase, WorkspacePhase::Running);
    assert_eq!(env.state(), EnvironmentState::Inactive);
}

#[test]
fn early_activation_waits_for_running() {
    let env = env();
    env.update_phase(WorkspacePhase::Creating);
    env.mark_active();
    assert_eq!(env.state(), EnvironmentState::Unreachable);
    assert_eq!(env.actions(), vec![EnvAction::Close]);
    env.update_phase(WorkspacePhase::Running);
    assert_eq!(env.state(), EnvironmentState::Active);
}

#[test]
fn mark_active_twice_is_a_no_op() {
    let env = env();
    assert!(env.mark_active());
    assert!(!env.mark_active());
    assert!(env.close());
    assert!(!env.close());
}

#[test]
fn perform_rejects_unoffered_action() {
    let env = env();
    env.update_phase(WorkspacePhase::Stopped);
    let err = env.perform(EnvAction::Connect).err();
    assert_eq!(err.map(|e| e.code), Some(ErrorCode::InvalidAction));
    assert!(!env.snapshot().active);

    let err = env.perform(EnvAction::Close).err();
    assert_eq!(err.map(|e| e.code), Some(ErrorCode::InvalidAction));
}

#[test]
fn perform_connect_then_close() -> anyhow::Result<()> {
    let env = env();
    env.update_phase(WorkspacePhase::Running);
    let snapshot = env.perform(EnvAction::Connect)?;
    assert_eq!(snapshot.state(), EnvironmentState::Active);
    let snapshot = env.perform(EnvAction::Close)?;
    assert_eq!(snapshot.state(), EnvironmentState::Inactive);
    Ok(())
}

#[tokio::test]
async fn new_listener_receives_current_state() -> anyhow::Result<()> {
    let env = env();
    env.update_phase(WorkspacePhase::Running);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _task = env.add_state_listener(move |state| {
        let _ = tx.send(state);
    });
    assert_eq!(next(&mut rx).await?, EnvironmentState::Inactive);
    Ok(())
}

#[tokio::test]
async fn listener_sees_latest_state_after_changes() -> anyhow::Result<()> {
    let env = env();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _task = env.add_state_listener(move |state| {
        let _ = tx.send(state);
    });
    assert_eq!(next(&mut rx).await?, EnvironmentState::Unreachable);

    env.update_phase(WorkspacePhase::Running);
    env.mark_active();

    // Intermediate states may be coalesced; the last delivery is the latest.
    let mut last = next(&mut rx).await?;
    while last != EnvironmentState::Active {
        last = next(&mut rx).await?;
    }
    assert_eq!(last, EnvironmentState::Active);
    Ok(())
}

#[tokio::test]
async fn shutdown_stops_listener_tasks() -> anyhow::Result<()> {
    let env = env();
    let task = env.add_state_listener(|_| {});
    env.shutdown();
    tokio::time::timeout(Duration::from_secs(2), task).await??;
    Ok(())
}
