//! End-to-end simulation scenarios against scripted oracle and agent doubles.

mod common;

use std::time::Duration;

use common::{harness, test_config};
use mimic::adapters::scripted::{
    three_suvs, AgentReply, ScriptedAgent, ScriptedOracle, ScriptedReply,
};
use mimic::domain::models::{Degradation, PersonaFacet, SessionStatus, StopChannel, StopReason};
use mimic::domain::ports::{AgentError, OracleError, OraclePurpose};
use serde_json::json;
use tokio_util::sync::CancellationToken;

const SEED: &str = "First-time buyer, budget $30k, lives in Denver, wants an SUV";

#[tokio::test]
async fn test_positive_stop_at_step_three() {
    let oracle = ScriptedOracle::new()
        .with_default(OraclePurpose::CritiqueEmotion, ScriptedReply::critic(0.3, 0.0));
    let h = harness(oracle, ScriptedAgent::suv_dealer(), test_config(5));

    let artifact = h.controller.run(SEED, &CancellationToken::new()).await.unwrap();

    assert_eq!(artifact.stop_reason, StopReason::Positive);
    assert_eq!(artifact.steps_used, 3);
    assert_eq!(artifact.turns.len(), 3);
    let stop = artifact.stop_result.unwrap();
    assert_eq!(stop.triggering_channel, StopChannel::Positive);
    assert_eq!(stop.step, 3);

    let positives: Vec<f64> = artifact.turns.iter().map(|t| t.emotion.positive).collect();
    for (got, want) in positives.iter().zip([0.3, 0.57, 0.813]) {
        assert!((got - want).abs() < 1e-9, "expected {want}, got {got}");
    }
    assert!(artifact.turns[..2].iter().all(|t| t.stop.is_none()));
    assert_eq!(artifact.turns[2].stop, Some(stop));
    assert_eq!(h.agent.call_count(), 3);
}

#[tokio::test]
async fn test_strict_judge_exhausts_redrafts_every_turn() {
    let oracle = ScriptedOracle::new()
        .with_default(OraclePurpose::JudgeTurn, ScriptedReply::judge(0.4, "too formal"));
    let h = harness(oracle, ScriptedAgent::suv_dealer(), test_config(2));

    let artifact = h.controller.run(SEED, &CancellationToken::new()).await.unwrap();

    assert_eq!(artifact.stop_reason, StopReason::MaxStepsReached);
    assert_eq!(artifact.steps_used, 2);
    for turn in &artifact.turns {
        assert_eq!(turn.redrafts, 2);
        assert!(!turn.verdict.passes);
        assert!(turn
            .degradations
            .iter()
            .any(|d| matches!(d, Degradation::JudgeRejectedMaxRetries { attempts: 3, .. })));
    }
    assert_eq!(h.oracle.calls(OraclePurpose::DraftTurn), 6);
    assert_eq!(h.oracle.calls(OraclePurpose::JudgeTurn), 6);
}

#[tokio::test]
async fn test_malformed_agent_response_ends_run() {
    let agent = ScriptedAgent::suv_dealer()
        .then(AgentReply::Respond(three_suvs()))
        .then(AgentReply::Fail(AgentError::Malformed("missing response_text".into())));
    let h = harness(ScriptedOracle::new(), agent, test_config(5));

    let artifact = h.controller.run(SEED, &CancellationToken::new()).await.unwrap();

    assert_eq!(artifact.stop_reason, StopReason::AgentUnavailable);
    assert_eq!(artifact.turns.len(), 1);
    assert_eq!(artifact.steps_used, 1);
    assert!(artifact.stop_detail.unwrap().contains("missing response_text"));
    // Malformed payloads are not retried.
    assert_eq!(h.agent.call_count(), 2);

    let session = h
        .controller
        .session_store()
        .get(artifact.run_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.status, SessionStatus::Failed);
}

#[tokio::test]
async fn test_agent_timeout_is_retried() {
    let agent = ScriptedAgent::suv_dealer().then(AgentReply::Fail(AgentError::Timeout));
    let h = harness(ScriptedOracle::new(), agent, test_config(1));

    let artifact = h.controller.run(SEED, &CancellationToken::new()).await.unwrap();

    assert_eq!(artifact.stop_reason, StopReason::MaxStepsReached);
    assert_eq!(artifact.turns.len(), 1);
    assert_eq!(h.agent.call_count(), 2);
    let requests = h.agent.requests();
    assert_eq!(requests[0].message, requests[1].message);
}

#[tokio::test]
async fn test_cancel_mid_step_discards_partial_turn() {
    let agent = ScriptedAgent::suv_dealer()
        .then(AgentReply::Slow(Duration::from_secs(3), three_suvs()));
    let h = harness(ScriptedOracle::new(), agent, test_config(5));

    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let artifact = h.controller.run(SEED, &token).await.unwrap();

    assert_eq!(artifact.stop_reason, StopReason::Cancelled);
    assert!(artifact.turns.is_empty());
    assert_eq!(artifact.steps_used, 0);
    assert_eq!(h.events.event_types().last().map(String::as_str), Some("run_finished"));
}

#[tokio::test]
async fn test_cancel_before_start_returns_empty_artifact() {
    let h = harness(ScriptedOracle::new(), ScriptedAgent::suv_dealer(), test_config(5));
    let token = CancellationToken::new();
    token.cancel();

    let artifact = h.controller.run(SEED, &token).await.unwrap();

    assert_eq!(artifact.stop_reason, StopReason::Cancelled);
    assert!(artifact.turns.is_empty());
    assert_eq!(h.agent.call_count(), 0);
}

#[tokio::test]
async fn test_failing_facet_still_yields_complete_profile() {
    let oracle = ScriptedOracle::new().with_default(
        OraclePurpose::PersonaFacet(PersonaFacet::Intent),
        ScriptedReply::failure(OracleError::Network("connection reset".into())),
    );
    let h = harness(oracle, ScriptedAgent::suv_dealer(), test_config(1));

    let artifact = h.controller.run(SEED, &CancellationToken::new()).await.unwrap();
    let profile = &artifact.persona_profile;

    for facet in PersonaFacet::ALL {
        assert!(!profile.facet(facet).trim().is_empty(), "{facet} is empty");
    }
    assert_eq!(profile.intent, PersonaFacet::Intent.neutral_default());
    assert!(profile
        .degradations
        .iter()
        .any(|d| matches!(d, Degradation::FacetDefaulted { facet: PersonaFacet::Intent, .. })));
    assert_eq!(artifact.stop_reason, StopReason::MaxStepsReached);
}

#[tokio::test]
async fn test_user_stop_action_ends_run() {
    let oracle = ScriptedOracle::new()
        .then(OraclePurpose::DraftTurn, ScriptedReply::draft("Show me SUVs", &[]))
        .then(
            OraclePurpose::DraftTurn,
            ScriptedReply::draft("Thanks, I'm done for today.", &[json!({"type": "stop"})]),
        );
    let h = harness(oracle, ScriptedAgent::suv_dealer(), test_config(5));

    let artifact = h.controller.run(SEED, &CancellationToken::new()).await.unwrap();

    assert_eq!(artifact.stop_reason, StopReason::UserEnded);
    assert_eq!(artifact.steps_used, 2);
    assert!(artifact.stop_result.is_none());
    assert_eq!(h.agent.call_count(), 2);
}

#[tokio::test]
async fn test_threshold_wins_over_user_stop_in_same_step() {
    let oracle = ScriptedOracle::new()
        .with_default(OraclePurpose::CritiqueEmotion, ScriptedReply::critic(1.0, 0.0))
        .with_default(
            OraclePurpose::DraftTurn,
            ScriptedReply::draft("Perfect, I'll take it.", &[json!({"type": "stop"})]),
        );
    let h = harness(oracle, ScriptedAgent::suv_dealer(), test_config(5));

    let artifact = h.controller.run(SEED, &CancellationToken::new()).await.unwrap();

    assert_eq!(artifact.stop_reason, StopReason::Positive);
    assert_eq!(artifact.steps_used, 1);
}

#[tokio::test]
async fn test_actions_reach_agent_ui_context() {
    let oracle = ScriptedOracle::new()
        .then(OraclePurpose::DraftTurn, ScriptedReply::draft("Show me SUVs", &[]))
        .then(
            OraclePurpose::DraftTurn,
            ScriptedReply::draft(
                "Tell me more about the RAV4",
                &[json!({"type": "click_card", "index": 1}), json!({"type": "dance"})],
            ),
        );
    let h = harness(oracle, ScriptedAgent::suv_dealer(), test_config(2));

    let artifact = h.controller.run(SEED, &CancellationToken::new()).await.unwrap();

    let second = &artifact.turns[1];
    assert_eq!(second.actions.len(), 1);
    assert_eq!(second.ui_state.selected_index, Some(1));
    assert!(second.ui_state.detail_open);
    assert!(artifact.turns.iter().all(|t| t.ui_state.invariants_hold()));

    let requests = h.agent.requests();
    assert_eq!(requests[1].ui_context["selected_card"]["title"], "Toyota RAV4");
    assert_eq!(requests[1].meta["step"], 2);
}

#[tokio::test]
async fn test_events_and_session_lifecycle() {
    let h = harness(ScriptedOracle::new(), ScriptedAgent::suv_dealer(), test_config(2));

    let artifact = h.controller.run(SEED, &CancellationToken::new()).await.unwrap();

    assert_eq!(
        h.events.event_types(),
        vec!["run_started", "persona_built", "turn_completed", "turn_completed", "run_finished"]
    );
    let session = h
        .controller
        .session_store()
        .get(artifact.run_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.artifact.as_ref(), Some(&artifact));
}

#[tokio::test]
async fn test_artifact_round_trips_through_json() {
    let h = harness(ScriptedOracle::new(), ScriptedAgent::suv_dealer(), test_config(2));
    let artifact = h.controller.run(SEED, &CancellationToken::new()).await.unwrap();

    let json = artifact.to_json_pretty().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["schema_version"], 1);
    assert_eq!(value["stop_reason"], "max_steps_reached");
    assert_eq!(value["turns"].as_array().unwrap().len(), 2);
}
