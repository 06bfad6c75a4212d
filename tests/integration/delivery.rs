//! End-to-end delivery tests: dispatch through real channels with a
//! scripted input surface.

use hive::queue::{MessagePriority, MessageStatus};
use hive::{AgentId, Error};

use crate::fixtures::{Harness, ScriptedSurface};

#[tokio::test]
async fn test_injection_delivers_and_records_activity() {
    let h = Harness::new(&["agent-1"], ScriptedSurface::reliable()).await;
    h.activate("agent-1").await;
    let id = AgentId::from("agent-1");

    h.queue
        .enqueue(&h.store, &id, "resume work on module A", MessagePriority::Normal)
        .await
        .unwrap();

    let message = h.dispatcher.dispatch_next(&id).await.unwrap().unwrap();
    assert_eq!(message.status, MessageStatus::Delivered);
    assert_eq!(message.delivery_attempts, 1);
    assert_eq!(h.injection_sequences(), 1);

    // Delivery evidence lands in the state record
    let record = h.store.get_state(&id).await.unwrap();
    assert!(record.last_message_ts >= message.created_ts);
    assert_eq!(h.queue.delivered_count().await, 1);

    // Nothing escalated to the mailbox
    assert!(!h.inbox_path("agent-1").exists());
}

#[tokio::test]
async fn test_injection_retries_then_recovers() {
    // First two injection sequences fail, the third lands
    let h = Harness::new(&["agent-1"], ScriptedSurface::failing_first(2)).await;
    h.activate("agent-1").await;
    let id = AgentId::from("agent-1");

    h.queue
        .enqueue(&h.store, &id, "retry me", MessagePriority::Normal)
        .await
        .unwrap();

    let message = h.dispatcher.dispatch_next(&id).await.unwrap().unwrap();
    assert_eq!(message.status, MessageStatus::Delivered);
    assert_eq!(message.delivery_attempts, 3);

    // A success on the final attempt is not an exhaustion
    assert!(!h.store.get_state(&id).await.unwrap().injection_unreliable);
    assert!(!h.inbox_path("agent-1").exists());
}

#[tokio::test]
async fn test_exhausted_injection_falls_back_to_mailbox() {
    let h = Harness::new(&["agent-1"], ScriptedSurface::broken()).await;
    h.activate("agent-1").await;
    let id = AgentId::from("agent-1");

    h.queue
        .enqueue(&h.store, &id, "critical directive", MessagePriority::Normal)
        .await
        .unwrap();

    let message = h.dispatcher.dispatch_next(&id).await.unwrap().unwrap();
    assert_eq!(message.status, MessageStatus::Delivered);
    assert_eq!(message.delivery_attempts, 3);

    // All retry budget went to injection before escalating
    let surface_calls = h.injection_sequences();
    assert_eq!(surface_calls, 3);

    // The message landed in the inbox file and the agent is flagged
    let inbox = h.read_inbox("agent-1");
    assert!(inbox.contains("critical directive"));
    assert!(inbox.contains("priority=normal"));
    assert!(h.store.get_state(&id).await.unwrap().injection_unreliable);
}

#[tokio::test]
async fn test_unreliable_agent_goes_straight_to_mailbox() {
    let h = Harness::new(&["agent-1"], ScriptedSurface::broken()).await;
    h.activate("agent-1").await;
    let id = AgentId::from("agent-1");

    // First message burns the retry budget and flags the agent
    h.queue
        .enqueue(&h.store, &id, "first", MessagePriority::Normal)
        .await
        .unwrap();
    h.dispatcher.dispatch_next(&id).await.unwrap().unwrap();
    assert_eq!(h.injection_sequences(), 3);

    // Second message skips injection entirely
    h.queue
        .enqueue(&h.store, &id, "second", MessagePriority::Normal)
        .await
        .unwrap();
    let message = h.dispatcher.dispatch_next(&id).await.unwrap().unwrap();
    assert_eq!(message.status, MessageStatus::Delivered);
    assert_eq!(message.delivery_attempts, 0);
    assert_eq!(h.injection_sequences(), 3);

    let inbox = h.read_inbox("agent-1");
    assert!(inbox.contains("first"));
    assert!(inbox.contains("second"));
}

#[tokio::test]
async fn test_unknown_agent_rejected_without_queueing() {
    let h = Harness::new(&["agent-1"], ScriptedSurface::reliable()).await;
    let ghost = AgentId::from("agent-99");

    let err = h
        .queue
        .enqueue(&h.store, &ghost, "hello?", MessagePriority::Normal)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnknownAgent { .. }));

    // The queue is untouched
    assert!(h.queue.pending_agents().await.is_empty());
    assert_eq!(h.queue.pending_count(&ghost).await, 0);
}

#[tokio::test]
async fn test_high_priority_overtakes_normal_backlog() {
    let h = Harness::new(&["agent-1"], ScriptedSurface::reliable()).await;
    let id = AgentId::from("agent-1");
    // Left in Reset: everything routes to the mailbox, whose file shows
    // the delivery order.

    h.queue
        .enqueue(&h.store, &id, "routine update", MessagePriority::Normal)
        .await
        .unwrap();
    h.queue
        .enqueue(&h.store, &id, "drop everything", MessagePriority::High)
        .await
        .unwrap();

    let stats = h.dispatcher.drain_agent(&id).await;
    assert_eq!(stats.delivered, 2);
    assert_eq!(stats.failed, 0);

    let inbox = h.read_inbox("agent-1");
    let high_pos = inbox.find("drop everything").unwrap();
    let normal_pos = inbox.find("routine update").unwrap();
    assert!(high_pos < normal_pos, "HIGH must be delivered first");
}

#[tokio::test]
async fn test_injection_sequences_never_overlap() {
    let agents = ["agent-1", "agent-2", "agent-3", "agent-4"];
    let h = Harness::new(&agents, ScriptedSurface::reliable()).await;
    for agent in &agents {
        h.activate(agent).await;
        h.queue
            .enqueue(
                &h.store,
                &AgentId::from(*agent),
                format!("work for {}", agent),
                MessagePriority::Normal,
            )
            .await
            .unwrap();
    }

    // Per-agent drains run in parallel; the channel lock must still force
    // one focus-click-type-submit sequence at a time.
    let stats = h.dispatcher.tick().await;
    assert_eq!(stats.delivered, 4);
    assert_eq!(h.injection_sequences(), 4);
    assert_eq!(h.max_injection_overlap(), 1);
}
