//! Agent phase lifecycle and state persistence tests.

use chrono::Utc;
use hive::state::StateStore;
use hive::{ActivityType, AgentId, AgentPhase, Error};

use crate::fixtures::{Harness, ScriptedSurface};

#[tokio::test]
async fn test_full_lifecycle_reset_to_mission_completed() {
    let h = Harness::new(&["agent-1"], ScriptedSurface::reliable()).await;
    let id = AgentId::from("agent-1");

    // Fresh registration lands in Reset
    assert_eq!(h.store.get_state(&id).await.unwrap().phase, AgentPhase::Reset);

    h.store
        .set_state(&id, AgentPhase::Onboarding, "operator onboard")
        .await
        .unwrap();
    h.store
        .set_state(&id, AgentPhase::Active, "onboarding complete")
        .await
        .unwrap();
    assert_eq!(h.store.get_state(&id).await.unwrap().phase, AgentPhase::Active);

    // The monitor marks it inactive once activity goes stale
    let t0 = Utc::now();
    h.monitor.sweep_at(t0 + chrono::Duration::seconds(400)).await;
    let record = h.store.get_state(&id).await.unwrap();
    assert_eq!(record.phase, AgentPhase::Inactive);
    assert_eq!(record.inactivity_reason.as_deref(), Some("no_activity"));

    // Genuine engagement pulls it back
    h.store
        .record_activity(&id, ActivityType::StatusUpdate)
        .await
        .unwrap();
    let record = h.store.get_state(&id).await.unwrap();
    assert_eq!(record.phase, AgentPhase::Active);
    assert!(record.inactivity_reason.is_none());

    h.store
        .set_state(&id, AgentPhase::MissionCompleted, "mission done")
        .await
        .unwrap();
    assert_eq!(
        h.store.get_state(&id).await.unwrap().phase,
        AgentPhase::MissionCompleted
    );
}

#[tokio::test]
async fn test_delivery_evidence_does_not_reactivate() {
    let h = Harness::new(&["agent-1"], ScriptedSurface::reliable()).await;
    let id = AgentId::from("agent-1");
    h.activate("agent-1").await;
    h.store
        .set_state(&id, AgentPhase::Inactive, "no_activity")
        .await
        .unwrap();

    // Messaging only proves the pipeline reached the agent
    h.store
        .record_activity(&id, ActivityType::Messaging)
        .await
        .unwrap();
    assert_eq!(
        h.store.get_state(&id).await.unwrap().phase,
        AgentPhase::Inactive
    );
}

#[tokio::test]
async fn test_illegal_transition_rejected_without_mutation() {
    let h = Harness::new(&["agent-1"], ScriptedSurface::reliable()).await;
    let id = AgentId::from("agent-1");

    // Reset cannot jump straight to Active
    let err = h
        .store
        .set_state(&id, AgentPhase::Active, "shortcut")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::TransitionRejected { .. }));
    assert_eq!(h.store.get_state(&id).await.unwrap().phase, AgentPhase::Reset);

    // MissionCompleted is terminal
    h.activate("agent-1").await;
    h.store
        .set_state(&id, AgentPhase::MissionCompleted, "done")
        .await
        .unwrap();
    let err = h
        .store
        .set_state(&id, AgentPhase::Active, "resurrect")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::TransitionRejected { .. }));
}

#[tokio::test]
async fn test_error_recovery_clears_session_verdicts() {
    let h = Harness::new(&["agent-1"], ScriptedSurface::reliable()).await;
    let id = AgentId::from("agent-1");
    h.activate("agent-1").await;

    h.store.mark_injection_unreliable(&id).await.unwrap();
    h.store
        .set_state(&id, AgentPhase::Error, "window vanished")
        .await
        .unwrap();

    // Error is recoverable only through a fresh onboarding, which resets
    // the session's delivery verdict
    h.store
        .set_state(&id, AgentPhase::Onboarding, "operator re-onboard")
        .await
        .unwrap();
    let record = h.store.get_state(&id).await.unwrap();
    assert_eq!(record.phase, AgentPhase::Onboarding);
    assert!(!record.injection_unreliable);
    assert!(record.inactivity_reason.is_none());
}

#[tokio::test]
async fn test_state_survives_save_and_load() {
    let h = Harness::new(&["agent-1", "agent-2"], ScriptedSurface::reliable()).await;
    h.activate("agent-1").await;
    h.store
        .set_state(&AgentId::from("agent-2"), AgentPhase::Onboarding, "test")
        .await
        .unwrap();
    h.store
        .record_activity(&AgentId::from("agent-1"), ActivityType::Task)
        .await
        .unwrap();

    h.store.save(&h.state_path()).await.unwrap();
    let reloaded = StateStore::load(&h.state_path()).unwrap();

    let a1 = reloaded.get_state(&AgentId::from("agent-1")).await.unwrap();
    let a2 = reloaded.get_state(&AgentId::from("agent-2")).await.unwrap();
    assert_eq!(a1.phase, AgentPhase::Active);
    assert_eq!(a2.phase, AgentPhase::Onboarding);

    let original = h.store.get_state(&AgentId::from("agent-1")).await.unwrap();
    assert_eq!(a1.last_active_ts, original.last_active_ts);
}

#[tokio::test]
async fn test_missing_state_file_starts_empty() {
    let h = Harness::new(&[], ScriptedSurface::reliable()).await;
    let store = StateStore::load(&h.state_path()).unwrap();
    assert_eq!(store.agent_count().await, 0);
}
