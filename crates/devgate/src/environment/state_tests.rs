// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use proptest::prelude::*;

use super::{EnvAction, EnvSnapshot, EnvironmentState, WorkspacePhase};

#[yare::parameterized(
    unspecified = { WorkspacePhase::Unspecified, EnvironmentState::Unreachable },
    preparing = { WorkspacePhase::Preparing, EnvironmentState::Unreachable },
    imagebuild = { WorkspacePhase::Imagebuild, EnvironmentState::Unreachable },
    pending = { WorkspacePhase::Pending, EnvironmentState::Unreachable },
    creating = { WorkspacePhase::Creating, EnvironmentState::Unreachable },
    initializing = { WorkspacePhase::Initializing, EnvironmentState::Unreachable },
    running = { WorkspacePhase::Running, EnvironmentState::Inactive },
    interrupted = { WorkspacePhase::Interrupted, EnvironmentState::Error },
    paused = { WorkspacePhase::Paused, EnvironmentState::Inactive },
    stopping = { WorkspacePhase::Stopping, EnvironmentState::Inactive },
    stopped = { WorkspacePhase::Stopped, EnvironmentState::Inactive },
    unknown = { WorkspacePhase::Unknown, EnvironmentState::Unreachable },
)]
fn inactive_state_follows_phase_table(phase: WorkspacePhase, expected: EnvironmentState) {
    assert_eq!(EnvSnapshot::new(phase, false).state(), expected);
}

#[test]
fn active_requires_running() {
    for phase in WorkspacePhase::ALL {
        let state = EnvSnapshot::new(phase, true).state();
        if phase == WorkspacePhase::Running {
            assert_eq!(state, EnvironmentState::Active);
        } else {
            assert_eq!(state, EnvSnapshot::new(phase, false).state(), "phase {phase}");
        }
    }
}

#[yare::parameterized(
    short = { "running", WorkspacePhase::Running },
    upper = { "STOPPED", WorkspacePhase::Stopped },
    enum_name = { "PHASE_IMAGEBUILD", WorkspacePhase::Imagebuild },
    padded = { " paused ", WorkspacePhase::Paused },
    garbage = { "PHASE_EXPLODED", WorkspacePhase::Unknown },
    empty = { "", WorkspacePhase::Unknown },
)]
fn parse_phase(input: &str, expected: WorkspacePhase) {
    assert_eq!(WorkspacePhase::parse(input), expected);
}

#[test]
fn phase_deserializes_from_either_name() -> anyhow::Result<()> {
    let phases: Vec<WorkspacePhase> =
        serde_json::from_str(r#"["PHASE_RUNNING", "stopping", "bogus"]"#)?;
    assert_eq!(
        phases,
        vec![WorkspacePhase::Running, WorkspacePhase::Stopping, WorkspacePhase::Unknown]
    );
    assert_eq!(serde_json::to_string(&WorkspacePhase::Running)?, r#""running""#);
    Ok(())
}

#[test]
fn actions_follow_intent() {
    assert_eq!(EnvSnapshot::new(WorkspacePhase::Running, false).actions(), vec![EnvAction::Connect]);
    assert_eq!(EnvSnapshot::new(WorkspacePhase::Running, true).actions(), vec![EnvAction::Close]);
    assert_eq!(EnvSnapshot::new(WorkspacePhase::Stopped, true).actions(), vec![EnvAction::Close]);
    assert!(EnvSnapshot::new(WorkspacePhase::Stopped, false).actions().is_empty());
}

#[test]
fn parse_action() {
    assert_eq!(EnvAction::parse("Connect"), Some(EnvAction::Connect));
    assert_eq!(EnvAction::parse("close"), Some(EnvAction::Close));
    assert_eq!(EnvAction::parse("delete"), None);
}

fn any_phase() -> impl Strategy<Value = WorkspacePhase> {
    proptest::sample::select(WorkspacePhase::ALL.to_vec())
}

proptest! {
    #[test]
    fn active_only_when_marked_and_running(phase in any_phase(), active in any::<bool>()) {
        let snapshot = EnvSnapshot::new(phase, active);
        prop_assert_eq!(
            snapshot.state() == EnvironmentState::Active,
            active && phase == WorkspacePhase::Running
        );
        prop_assert_eq!(snapshot.is_connectable(), phase == WorkspacePhase::Running && !active);
        prop_assert_eq!(snapshot.is_closeable(), active);
    }
}
