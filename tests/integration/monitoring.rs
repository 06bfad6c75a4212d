//! Inactivity detection and dashboard reporting over a mixed swarm.

use chrono::Utc;
use hive::dashboard::{Dashboard, DashboardSnapshot};
use hive::monitor::RecommendedAction;
use hive::{ActivityType, AgentId, AgentPhase};

use crate::fixtures::{Harness, ScriptedSurface};

#[tokio::test]
async fn test_mixed_swarm_inactivity_report() {
    let h = Harness::new(&["agent-1", "agent-2", "agent-3"], ScriptedSurface::reliable()).await;
    h.activate("agent-1").await;
    h.activate("agent-2").await;
    // agent-3 stays in Reset

    let t0 = Utc::now();
    // agent-1 stays fresh on both lanes
    h.store
        .record_activity_at(&AgentId::from("agent-1"), ActivityType::Messaging, t0 + chrono::Duration::seconds(350))
        .await
        .unwrap();
    // agent-2 goes silent after t0

    let report = h.monitor.sweep_at(t0 + chrono::Duration::seconds(400)).await;

    let entry = |id: &str| {
        report
            .entries
            .iter()
            .find(|e| e.agent_id == AgentId::from(id))
    };

    assert!(entry("agent-1").is_none(), "fresh agent must not be flagged");

    let stale = entry("agent-2").expect("silent agent flagged");
    assert_eq!(stale.reason, "no_activity");
    assert_eq!(stale.recommended_action, RecommendedAction::None);
    assert_eq!(
        h.store.get_state(&AgentId::from("agent-2")).await.unwrap().phase,
        AgentPhase::Inactive
    );

    let unboarded = entry("agent-3").expect("reset agent flagged");
    assert_eq!(unboarded.reason, "not_onboarded");
    assert_eq!(unboarded.recommended_action, RecommendedAction::Onboard);
}

#[tokio::test]
async fn test_stale_messaging_flagged_without_phase_change() {
    let h = Harness::new(&["agent-1"], ScriptedSurface::reliable()).await;
    h.activate("agent-1").await;
    let id = AgentId::from("agent-1");

    let t0 = Utc::now();
    // Task activity keeps the agent generally fresh while no messages land
    h.store
        .record_activity_at(&id, ActivityType::Task, t0 + chrono::Duration::seconds(150))
        .await
        .unwrap();

    let report = h.monitor.sweep_at(t0 + chrono::Duration::seconds(200)).await;
    assert_eq!(report.entries.len(), 1);
    assert_eq!(report.entries[0].reason, "messaging_inactive");
    assert_eq!(
        report.entries[0].recommended_action,
        RecommendedAction::SendHighPriority
    );
    assert_eq!(h.store.get_state(&id).await.unwrap().phase, AgentPhase::Active);
}

#[tokio::test]
async fn test_dashboard_aggregates_swarm_view() {
    let h = Harness::new(&["agent-1", "agent-2", "agent-3", "agent-4"], ScriptedSurface::reliable())
        .await;
    h.activate("agent-1").await;
    h.activate("agent-2").await;
    h.activate("agent-3").await;
    // agent-4 stays in Reset

    let dashboard = Dashboard::new(h.store.clone(), h.queue.clone(), h.monitor.clone());
    h.monitor.sweep().await;

    let snapshot = dashboard.snapshot().await;
    assert_eq!(snapshot.total_agents, 4);
    assert_eq!(snapshot.active_agents, 3);
    assert!((snapshot.swarm_health - 0.75).abs() < f64::EPSILON);
    assert!(snapshot.failed_messages.is_empty());

    let inactivity = snapshot.inactivity.expect("sweep result attached");
    assert_eq!(inactivity.entries.len(), 1);
    assert_eq!(inactivity.entries[0].agent_id, AgentId::from("agent-4"));
}

#[tokio::test]
async fn test_report_persists_as_json() {
    let h = Harness::new(&["agent-1", "agent-2"], ScriptedSurface::reliable()).await;
    h.activate("agent-1").await;

    let dashboard = Dashboard::new(h.store.clone(), h.queue.clone(), h.monitor.clone());
    h.monitor.sweep().await;

    let reports_dir = h.temp_dir.path().join("reports");
    let path = dashboard.persist_report(&reports_dir).await.unwrap();
    assert!(path.exists());

    let parsed: DashboardSnapshot =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(parsed.total_agents, 2);
    assert_eq!(parsed.active_agents, 1);
    assert!(parsed.inactivity.is_some());
}
