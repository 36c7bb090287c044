//! Engine-wide properties: dedup idempotence, terminal slow layer,
//! optimistic reconciliation, stale switch discard, total loading function.

mod common;

use std::time::Duration;

use agentsync::connection::{ConnectionPhase, ConnectionState};
use agentsync::loading::{derive_loading_state, LoadingInputs, LoadingState};
use agentsync::models::{
    AgentThinking, Message, MessageRole, MessageStatus, ServerEnvelope, SubAgentStatus,
};
use agentsync::switcher::SwitchPhase;
use agentsync::timeline::MessageTimeline;

use common::*;

fn thinking(thread_id: &str, run_id: &str, thought: &str) -> ServerEnvelope {
    ServerEnvelope::AgentThinking(AgentThinking {
        thread_id: thread_id.to_string(),
        run_id: run_id.to_string(),
        thought: thought.to_string(),
        agent_name: None,
        step_number: Some(2),
        total_steps: Some(5),
    })
}

#[tokio::test]
async fn test_duplicate_delivery_is_idempotent() {
    let mut h = TestHarness::new();
    h.open_thread("t1", vec![]).await;

    let envelopes = vec![
        agent_started("t1", "r1"),
        sub_agent_update("t1", "r1", SubAgentStatus::Running),
        thinking("t1", "r1", "Comparing regions"),
        message_created("t1", "a1", MessageRole::Assistant, "Working on it", None),
        agent_completed("t1", "r1", "Done"),
    ];

    for envelope in &envelopes {
        h.deliver(envelope);
        let once = h.runtime.snapshot();
        let dropped = h.runtime.router_metrics().dropped_count;

        h.deliver(envelope);
        assert_eq!(h.runtime.snapshot(), once, "replaying {} changed state", envelope.kind());
        assert_eq!(h.runtime.router_metrics().dropped_count, dropped + 1);
    }
    assert_eq!(h.runtime.router_metrics().processed_count, envelopes.len() as u64);
}

#[tokio::test]
async fn test_slow_layer_is_terminal() {
    let mut h = TestHarness::new();
    h.open_thread("t1", vec![server_message("t1", "m0", "hi")]).await;

    h.deliver(&agent_started("t1", "r1"));
    h.deliver(&agent_completed("t1", "r1", "Final"));
    let after_slow = h.runtime.snapshot().active_run.unwrap();

    h.deliver(&sub_agent_update("t1", "r1", SubAgentStatus::Retrying));
    h.deliver(&thinking("t1", "r1", "Late thought"));

    let snapshot = h.runtime.snapshot();
    assert_eq!(snapshot.active_run.unwrap(), after_slow);
    assert!(!snapshot.is_processing);
    assert_eq!(snapshot.loading, LoadingState::Ready);
}

#[test]
fn test_optimistic_reconciliation_never_duplicates() {
    let contents = ["hi", "hi", "status?", "hi"];
    // Confirm in several orders, with and without an echoed client id
    let orders: [[usize; 4]; 3] = [[0, 1, 2, 3], [3, 2, 1, 0], [2, 0, 3, 1]];

    for (round, order) in orders.iter().enumerate() {
        let echo = round % 2 == 0;
        let mut timeline =
            MessageTimeline::new("t1", Duration::from_secs(30), Duration::from_secs(30));
        let client_ids: Vec<String> = contents
            .iter()
            .map(|c| timeline.add_optimistic(c).unwrap())
            .collect();

        for (step, &i) in order.iter().enumerate() {
            let server = Message::server(format!("srv-{i}"), "t1", MessageRole::User, contents[i]);
            let echoed = echo.then(|| client_ids[i].as_str());
            timeline.reconcile_server_message(server, echoed);

            assert_eq!(timeline.len(), contents.len());
            let confirmed = timeline
                .messages()
                .iter()
                .filter(|m| m.status == MessageStatus::Confirmed)
                .count();
            assert_eq!(confirmed, step + 1);
            assert_eq!(timeline.pending_count(), contents.len() - step - 1);
        }

        let mut ids: Vec<&str> = timeline.messages().iter().map(|m| m.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), contents.len());
    }
}

#[tokio::test]
async fn test_confirmation_keeps_insertion_position() {
    let mut h = TestHarness::new();
    h.open_thread("t1", vec![]).await;

    let first = h.runtime.send_message("first").await.unwrap();
    h.runtime.send_message("second").await.unwrap();
    h.deliver(&message_created("t1", "a1", MessageRole::Assistant, "reply", None));
    h.deliver(&message_created("t1", "srv-1", MessageRole::User, "first", Some(&first)));

    let ids: Vec<String> = h
        .runtime
        .snapshot()
        .messages
        .into_iter()
        .map(|m| m.id)
        .collect();
    assert_eq!(ids[0], "srv-1");
    assert_eq!(ids[2], "a1");
}

#[tokio::test]
async fn test_latest_switch_wins_when_older_resolves_last() {
    let mut h = TestHarness::new();
    h.fetcher.set_page("a", vec![server_message("a", "a1", "from a")]).await;
    h.fetcher.set_page("b", vec![server_message("b", "b1", "from b")]).await;
    let gate_a = h.fetcher.gate("a").await;

    h.runtime.switch_to("a").unwrap();
    h.runtime.switch_to("b").unwrap();

    // B resolves first
    assert!(h.runtime.process_next_event().await);
    assert_eq!(h.runtime.snapshot().thread_id.as_deref(), Some("b"));

    gate_a.send(()).unwrap();
    assert!(h.runtime.process_next_event().await);

    let snapshot = h.runtime.snapshot();
    assert_eq!(snapshot.thread_id.as_deref(), Some("b"));
    assert_eq!(snapshot.messages[0].id, "b1");
    assert_eq!(snapshot.switch_phase, SwitchPhase::Ready);
}

#[tokio::test]
async fn test_latest_switch_wins_when_older_resolves_first() {
    let mut h = TestHarness::new();
    h.fetcher.set_page("a", vec![server_message("a", "a1", "from a")]).await;
    h.fetcher.set_page("b", vec![server_message("b", "b1", "from b")]).await;
    let gate_b = h.fetcher.gate("b").await;

    h.runtime.switch_to("a").unwrap();
    h.runtime.switch_to("b").unwrap();

    // A resolves first and is discarded
    assert!(h.runtime.process_next_event().await);
    assert!(h.runtime.snapshot().thread_id.is_none());
    assert_eq!(h.runtime.loading_state(), LoadingState::LoadingThread);

    gate_b.send(()).unwrap();
    assert!(h.runtime.process_next_event().await);
    assert_eq!(h.runtime.snapshot().thread_id.as_deref(), Some("b"));
}

#[tokio::test]
async fn test_loading_state_always_matches_its_inputs() {
    let mut h = TestHarness::connecting();
    let check = |h: &TestHarness| {
        let expected = derive_loading_state(&LoadingInputs::capture(
            h.runtime.connection_state(),
            h.runtime.coordinator(),
        ));
        assert_eq!(h.runtime.loading_state(), expected);
        assert!(LoadingState::ALL.contains(&expected));
        expected
    };

    assert_eq!(check(&h), LoadingState::Initializing);

    h.transport.simulate_open().await;
    h.runtime.sync_connection();
    assert_eq!(check(&h), LoadingState::NoThread);

    h.fetcher.set_page("t1", vec![]).await;
    h.runtime.switch_to("t1").unwrap();
    assert_eq!(check(&h), LoadingState::LoadingThread);
    h.runtime.process_next_event().await;
    assert_eq!(check(&h), LoadingState::ThreadReady);

    h.deliver(&agent_started("t1", "r1"));
    assert_eq!(check(&h), LoadingState::Processing);

    h.transport.simulate_drop("gone");
    h.runtime.sync_connection();
    assert_eq!(check(&h), LoadingState::ConnectionFailed);

    h.transport.simulate_give_up(5);
    h.runtime.sync_connection();
    assert_eq!(check(&h), LoadingState::ConnectionFailed);

    h.transport.simulate_open().await;
    h.runtime.sync_connection();
    h.runtime.process_next_event().await;
    h.deliver(&agent_completed("t1", "r1", "Report"));
    assert_eq!(check(&h), LoadingState::Ready);

    assert!(h.runtime.switch_to("not valid!").is_err());
    assert_eq!(check(&h), LoadingState::Ready);
}

#[test]
fn test_loading_function_is_total_over_connection_states() {
    let connecting = ConnectionState::new();
    let mut reconnecting = ConnectionState::new();
    reconnecting.begin_reconnect(Duration::from_secs(1));
    let mut open = ConnectionState::new();
    open.mark_open();

    for state in [&connecting, &reconnecting, &open] {
        for switch in [
            SwitchPhase::Idle,
            SwitchPhase::Validating,
            SwitchPhase::Switching,
            SwitchPhase::Ready,
            SwitchPhase::Failed,
        ] {
            for has_session in [false, true] {
                let inputs = LoadingInputs {
                    connection: state.phase,
                    switch,
                    has_session,
                    session_is_empty: !has_session,
                    is_processing: false,
                };
                let loading = derive_loading_state(&inputs);
                if state.phase != ConnectionPhase::Open {
                    assert!(matches!(
                        loading,
                        LoadingState::Initializing
                            | LoadingState::Connecting
                            | LoadingState::ConnectionFailed
                    ));
                }
            }
        }
    }
}
