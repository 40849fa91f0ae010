// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deterministic rule engine: a pure scoring function that may
//! override the VLM's risk verdict and remap the action accordingly.

use crate::types::{AiDecision, AllowedAction, PolicyContext, RiskLevel, TimeOfDay};

const ZONE_KEYWORDS: [&str; 4] = ["terrace", "garage", "entry", "door"];
const STRONG_BEHAVIOR_KEYWORDS: [&str; 6] = ["suspicious", "lurking", "trying", "forcing", "climbing", "breaking"];
const WEAK_BEHAVIOR_KEYWORDS: [&str; 4] = ["reaching", "looking around", "crouching", "hiding"];

/// Scores the event per the cumulative rules below and returns the verdict.
pub fn score(decision: &AiDecision, policy: &PolicyContext) -> i32 {
    let mut score = 0;

    let decision_type = decision.decision_type.to_ascii_lowercase();
    if decision_type == "unknown_person" || decision_type == "other" {
        score += 2;
    }

    if matches!(policy.time_of_day, TimeOfDay::Evening | TimeOfDay::Night) {
        score += 2;
    }

    let zone = policy.camera_zone.to_ascii_lowercase();
    if ZONE_KEYWORDS.iter().any(|kw| zone.contains(kw)) {
        score += 1;
    }

    match policy.home_mode.to_ascii_lowercase().as_str() {
        "away" => score += 3,
        "sleep" => score += 2,
        _ => {}
    }

    if let Some(behavior) = decision.behavior.as_deref().map(str::to_ascii_lowercase) {
        if STRONG_BEHAVIOR_KEYWORDS.iter().any(|kw| behavior.contains(kw)) || behavior.contains("running") {
            score += 3;
        } else if WEAK_BEHAVIOR_KEYWORDS.iter().any(|kw| behavior.contains(kw)) {
            score += 2;
        }
    }

    if decision_type.contains("loitering") {
        score += 2;
    }

    if policy.known_faces_present || decision_type.contains("known") {
        score -= 3;
    }

    if decision_type.contains("delivery") {
        score -= 1;
    }

    if policy.recent_events_count >= 3 {
        score += 1;
    }

    score
}

/// Maps a cumulative score to a risk bucket.
pub fn risk_for_score(score: i32) -> RiskLevel {
    match score {
        s if s <= 2 => RiskLevel::Low,
        s if s <= 4 => RiskLevel::Medium,
        s if s <= 6 => RiskLevel::High,
        _ => RiskLevel::Critical,
    }
}

/// The deterministic action remap applied whenever the rule verdict
/// overrides the VLM's own risk.
pub fn remap_action(risk: RiskLevel) -> AllowedAction {
    match risk {
        RiskLevel::Low => AllowedAction::NotifyOnly,
        RiskLevel::Medium => AllowedAction::NotifyAndSaveClip,
        RiskLevel::High => AllowedAction::NotifyAndLight,
        RiskLevel::Critical => AllowedAction::NotifyAndAlarm,
    }
}

/// Applies the rule engine to `decision` in place: if the scored verdict
/// differs from the VLM's risk, overrides risk and remaps action.
pub fn apply(decision: &mut AiDecision, policy: &PolicyContext) {
    let verdict = risk_for_score(score(decision, policy));
    if verdict != decision.risk {
        decision.risk = verdict;
        decision.action = remap_action(verdict);
    }
}

#[cfg(test)]
#[path = "rules_tests.rs"]
mod tests;
