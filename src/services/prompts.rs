//! Prompt construction for every oracle purpose.
//!
//! Pure functions from domain values to [`OracleRequest`]s. The wording is
//! not load-bearing; the schemas are, since answers are decoded against them.

use serde_json::json;

use crate::domain::models::{Action, ConversationSummary, PersonaFacet, PersonaProfile, UiState};
use crate::domain::ports::{OraclePurpose, OracleRequest};

const PERSONA_SYSTEM: &str = "You design realistic shopper personas for testing a car-shopping \
assistant. Answer with a single short paragraph in plain prose.";

const DRAFT_SYSTEM: &str = "You role-play a shopper talking to a car recommendation assistant. \
Stay in character at all times. Reply with JSON only.";

const JUDGE_SYSTEM: &str = "You review role-play dialogue. Score how faithfully a drafted \
shopper message matches the persona's background, writing style, interaction style and intent. \
Reply with JSON only.";

const SUMMARY_SYSTEM: &str = "You maintain a running summary of a shopping conversation. Keep \
every fact the shopper has committed to (budget, location, must-haves). Drop small talk first.";

const CRITIC_SYSTEM: &str = "You estimate how a specific shopper feels after reading an \
assistant reply. Reply with JSON only.";

pub fn persona_facet(facet: PersonaFacet, seed: &str) -> OracleRequest {
    let ask = match facet {
        PersonaFacet::FamilyBackground => {
            "Describe this shopper's family and household situation: who they live with, what \
             they use a car for, and any life circumstances that shape the purchase."
        }
        PersonaFacet::WritingStyle => {
            "Describe how this shopper writes chat messages: length, tone, punctuation, typos, \
             slang, emoji use."
        }
        PersonaFacet::InteractionStyle => {
            "Describe how this shopper interacts with a shopping interface and assistant: \
             patience, how they browse cards, use filters, save favorites, and when they give up."
        }
        PersonaFacet::Intent => {
            "State this shopper's concrete shopping goal: what they want, hard constraints \
             (budget, location, mileage) and what would make them satisfied."
        }
    };
    OracleRequest::new(
        OraclePurpose::PersonaFacet(facet),
        PERSONA_SYSTEM,
        format!("Seed description: {seed}\n\n{ask}"),
    )
}

pub fn draft_turn(
    profile: &PersonaProfile,
    summary: &ConversationSummary,
    ui: &UiState,
    last_reply: Option<&str>,
    reminders: &[String],
    max_actions: usize,
) -> OracleRequest {
    let mut prompt = format!(
        "Persona:\n{}\n\nConversation so far:\n{}\n\nScreen state:\n{}\n\n",
        profile.describe(),
        or_none(&summary.text()),
        ui.context_json(),
    );
    match last_reply {
        Some(reply) => prompt.push_str(&format!("The assistant just said:\n{reply}\n\n")),
        None => prompt.push_str("This is the start of the conversation. Open it.\n\n"),
    }
    if !reminders.is_empty() {
        prompt.push_str("A reviewer rejected your previous attempt. Correct it:\n");
        for reminder in reminders {
            prompt.push_str(&format!("- {reminder}\n"));
        }
        prompt.push('\n');
    }
    prompt.push_str(&format!(
        "Write the shopper's next message and up to {max_actions} screen actions. Action types: \
         click_card{{index}}, toggle_filter{{id}}, set_mileage{{value}}, refresh_filters, \
         show_favorites, favorite_card{{index}}, close_detail, scroll, stare, stop. \
         Use stop only when the shopper would leave."
    ));

    OracleRequest::new(OraclePurpose::DraftTurn, DRAFT_SYSTEM, prompt).with_schema(json!({
        "type": "object",
        "required": ["utterance"],
        "properties": {
            "utterance": {"type": "string"},
            "actions": {"type": "array", "items": {"type": "object"}}
        }
    }))
}

pub fn judge_turn(
    profile: &PersonaProfile,
    summary: &ConversationSummary,
    last_reply: Option<&str>,
    utterance: &str,
    actions: &[Action],
) -> OracleRequest {
    let actions_json = serde_json::to_string(actions).unwrap_or_else(|_| "[]".to_string());
    let prompt = format!(
        "Persona:\n{}\n\nConversation so far:\n{}\n\nAssistant's last reply:\n{}\n\n\
         Drafted shopper message:\n{utterance}\n\nDrafted actions: {actions_json}\n\n\
         Score fidelity from 0 to 1. If it falls short, give a one-sentence reminder the \
         writer should follow next time.",
        profile.describe(),
        or_none(&summary.text()),
        last_reply.unwrap_or("(none yet)"),
    );
    OracleRequest::new(OraclePurpose::JudgeTurn, JUDGE_SYSTEM, prompt).with_schema(json!({
        "type": "object",
        "required": ["score", "feedback"],
        "properties": {
            "score": {"type": "number", "minimum": 0, "maximum": 1},
            "feedback": {"type": "string"},
            "reminder": {"type": "string"}
        }
    }))
}

pub fn fuse_summary(
    prior: &ConversationSummary,
    user_text: &str,
    assistant_text: &str,
    actions: &[Action],
    max_chars: usize,
) -> OracleRequest {
    let actions_json = serde_json::to_string(actions).unwrap_or_else(|_| "[]".to_string());
    let prompt = format!(
        "Current summary:\n{}\n\nNew turn:\nShopper: {user_text}\nScreen actions: {actions_json}\n\
         Assistant: {assistant_text}\n\nRewrite the summary to include the new turn. Stay under \
         {max_chars} characters. Return only the summary text.",
        or_none(&prior.text()),
    );
    OracleRequest::new(OraclePurpose::FuseSummary, SUMMARY_SYSTEM, prompt)
}

pub fn critique_emotion(
    assistant_text: &str,
    profile: &PersonaProfile,
    summary: &ConversationSummary,
) -> OracleRequest {
    let prompt = format!(
        "Persona:\n{}\n\nConversation so far:\n{}\n\nAssistant reply:\n{assistant_text}\n\n\
         Give the change in this shopper's satisfaction (positive) and frustration (negative) \
         caused by this reply, each between -1 and 1, and a one-sentence rationale.",
        profile.describe(),
        or_none(&summary.text()),
    );
    OracleRequest::new(OraclePurpose::CritiqueEmotion, CRITIC_SYSTEM, prompt).with_schema(json!({
        "type": "object",
        "required": ["delta_positive", "delta_negative"],
        "properties": {
            "delta_positive": {"type": "number", "minimum": -1, "maximum": 1},
            "delta_negative": {"type": "number", "minimum": -1, "maximum": 1},
            "rationale": {"type": "string"}
        }
    }))
}

fn or_none(text: &str) -> &str {
    if text.trim().is_empty() {
        "(nothing yet)"
    } else {
        text
    }
}
