// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Confirmation controller: for escalated risks, schedules a delayed
//! second snapshot plus a second VLM call, then merges or downgrades the
//! original decision.
//!
//! Modeled as the state machine `Idle -> WaitingSnapshot -> WaitingReply ->
//! Merged`; each arm below is one transition.

use std::path::Path;

use regex::Regex;
use serde::Deserialize;
use tokio::time::sleep;

use crate::config::RuntimeConfig;
use crate::nvr::NvrClient;
use crate::types::{AiDecision, AllowedAction, ConfirmationResult, RiskLevel};
use crate::vlm::{stage_snapshot, VlmClient, VlmRequest};

#[derive(Debug, Deserialize)]
struct ConfirmJson {
    confirmed: bool,
    #[serde(default)]
    risk: Option<String>,
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

pub fn should_confirm(config: &RuntimeConfig, decision: &AiDecision) -> bool {
    config.phase5_enabled && config.phase5_confirm_risks.iter().any(|r| r.eq_ignore_ascii_case(decision.risk.as_str()))
}

/// Runs the full confirmation flow and returns the decision to publish
/// plus a human-readable note to append to the analysis text. Never fails
/// outward: any missing piece degrades to "unconfirmed".
pub async fn confirm(
    config: &RuntimeConfig,
    nvr: &NvrClient,
    vlm: &VlmClient,
    camera: &str,
    event_id: &str,
    initial: &AiDecision,
) -> (AiDecision, String) {
    sleep(config.confirm_delay()).await;

    // Idle -> WaitingSnapshot
    let confirm_event_id = format!("{event_id}-confirm");
    let Some(image) = nvr.fetch_snapshot(&confirm_event_id).await else {
        tracing::warn!(camera, event_id, "confirmation: snapshot unavailable");
        return (initial.clone(), "Confirmation unavailable (no snapshot).".to_string());
    };

    // WaitingSnapshot -> WaitingReply
    let workspace_dir = config.workspace_dir();
    let snapshot_rel = match stage_snapshot(Path::new(&workspace_dir), &confirm_event_id, &image) {
        Ok(rel) => rel,
        Err(e) => {
            tracing::warn!(err = %e, "confirmation: failed to stage snapshot");
            String::new()
        }
    };
    let snapshot_abs = Path::new(&workspace_dir).join(&snapshot_rel).display().to_string();

    let prompt = build_confirm_prompt(initial, &snapshot_abs, &snapshot_rel);
    let reply = vlm
        .analyze(VlmRequest {
            camera,
            event_id,
            image: &image,
            prompt,
            session_suffix: "confirm",
            timeout: config.confirm_timeout(),
        })
        .await;

    let Some(reply) = reply else {
        return (initial.clone(), "Confirmation unavailable (no reply).".to_string());
    };

    match parse_confirm_reply(&reply) {
        Some(result) => merge(initial, result),
        None => (initial.clone(), "Confirmation reply unparseable; keeping initial decision.".to_string()),
    }
}

fn build_confirm_prompt(initial: &AiDecision, snapshot_abs_path: &str, snapshot_rel_path: &str) -> String {
    let initial_json = serde_json::json!({
        "risk": initial.risk.as_str(),
        "type": initial.decision_type,
        "confidence": initial.confidence,
        "action": initial.action.as_str(),
        "reason": initial.reason,
    });
    format!(
        "A fresh snapshot was taken a few seconds after the initial detection, at {snapshot_abs_path}. \
         Reference it in your reply on its own line as \"MEDIA:{snapshot_rel_path}\". The initial decision \
         was: {initial_json}. Does this confirm or change that assessment? Respond with your reasoning, then on \
         its own final line output: CONFIRM_JSON: {{\"confirmed\": true|false, \"risk\": \"...\", \"action\": \"...\", \"reason\": \"...\"}}"
    )
}

/// Finds the last line matching `^confirm_json:\s*(.*)` (case-insensitive),
/// accepting the JSON inline or on the following line.
fn parse_confirm_reply(reply: &str) -> Option<ConfirmationResult> {
    let re = Regex::new(r"(?i)^confirm_json:\s*(.*)$").ok()?;
    let lines: Vec<&str> = reply.lines().collect();
    for (i, line) in lines.iter().enumerate().rev() {
        let Some(caps) = re.captures(line.trim()) else { continue };
        let inline = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
        let json_text = if !inline.is_empty() {
            inline.to_string()
        } else {
            lines.get(i + 1).map(|s| s.trim().to_string()).unwrap_or_default()
        };
        if let Ok(parsed) = serde_json::from_str::<ConfirmJson>(&json_text) {
            return Some(ConfirmationResult {
                confirmed: parsed.confirmed,
                risk: parsed.risk.as_deref().and_then(RiskLevel::parse),
                action: parsed.action.as_deref().map(AllowedAction::parse_or_default),
                reason: parsed.reason,
            });
        }
    }
    None
}

/// Merges a confirmation result into the initial decision:
/// downgrades on explicit non-confirmation, adopts the reply's fields on
/// confirmation when they pass enum validation.
fn merge(initial: &AiDecision, result: ConfirmationResult) -> (AiDecision, String) {
    let mut merged = initial.clone();

    if result.confirmed {
        if let Some(risk) = result.risk {
            merged.risk = risk;
        }
        if let Some(action) = result.action {
            merged.action = action;
        }
        if let Some(reason) = result.reason {
            merged.reason = reason;
        }
        merged.sanitize();
        return (merged, "Confirmed by second pass.".to_string());
    }

    if matches!(merged.risk, RiskLevel::High | RiskLevel::Critical) {
        merged.risk = RiskLevel::Medium;
    }
    if matches!(merged.action, AllowedAction::NotifyAndAlarm | AllowedAction::NotifyAndLight | AllowedAction::NotifyAndSpeaker) {
        merged.action = AllowedAction::NotifyAndSaveClip;
    }
    if let Some(reason) = result.reason {
        merged.reason = reason;
    }
    merged.sanitize();
    (merged, "NOT confirmed by second pass; downgraded.".to_string())
}

#[cfg(test)]
#[path = "confirmation_tests.rs"]
mod tests;
