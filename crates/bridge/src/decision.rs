// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Decision parser and sanitizer: extracts an `AiDecision` from
//! the VLM's free-text reply, trying progressively looser strategies, and
//! normalizes the result into the bounded enumerations the rest of the
//! pipeline depends on.

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::types::{AiDecision, AllowedAction, RiskLevel, Subject};

/// The wire shapes a VLM reply's JSON block may take: flat, or
/// nested under a `risk` object.
#[derive(Debug, Deserialize)]
struct FlatShape {
    risk: Option<String>,
    #[serde(rename = "type")]
    decision_type: Option<String>,
    confidence: Option<f64>,
    action: Option<String>,
    reason: Option<String>,
    behavior: Option<String>,
    subject: Option<Subject>,
}

#[derive(Debug, Deserialize)]
struct StructuredRisk {
    level: Option<String>,
    confidence: Option<f64>,
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StructuredShape {
    risk: StructuredRisk,
    subject: Option<Subject>,
    behavior: Option<String>,
    #[serde(rename = "type")]
    decision_type: Option<String>,
    action: Option<String>,
}

/// Parses a VLM reply into a sanitized `AiDecision` plus the cleaned,
/// human-readable description text (JSON decision block and `MEDIA:`
/// reference lines stripped out), falling back to free-text heuristics
/// and finally to `AiDecision::unavailable()`.
pub fn parse_decision(reply: &str) -> (AiDecision, String) {
    let mut decision = extract_json_block(reply)
        .and_then(|json| decode_value(&json))
        .unwrap_or_else(|| heuristic_decision(reply));
    decision.sanitize();
    (decision, clean_reply_text(reply))
}

/// Strips the JSON decision block — however it was embedded — and any
/// `MEDIA:`-prefixed lines from the VLM's reply, leaving the
/// human-readable description.
fn clean_reply_text(reply: &str) -> String {
    let without_fenced = strip_fenced_blocks(reply);
    let mut kept = Vec::new();
    let mut skip_next = false;
    for line in without_fenced.lines() {
        if skip_next {
            skip_next = false;
            continue;
        }
        let trimmed = line.trim();
        if trimmed.len() >= "json:".len() && trimmed[.."json:".len()].eq_ignore_ascii_case("json:") {
            if trimmed["json:".len()..].trim().is_empty() {
                skip_next = true;
            }
            continue;
        }
        if trimmed.starts_with('{') && trimmed.ends_with('}') && trimmed.contains("\"risk\"") {
            continue;
        }
        if trimmed.starts_with("MEDIA:") {
            continue;
        }
        kept.push(line);
    }
    strip_inline_json(&kept.join("\n")).trim().to_string()
}

fn strip_fenced_blocks(reply: &str) -> String {
    match Regex::new(r"(?s)```(?:json)?\s*\{.*?\}\s*```") {
        Ok(re) => re.replace_all(reply, "").to_string(),
        Err(_) => reply.to_string(),
    }
}

fn strip_inline_json(text: &str) -> String {
    match Regex::new(r#"(?s)\{[^{}]*"risk"\s*:\s*"[^"]*"[^{}]*\}"#) {
        Ok(re) => re.replace_all(text, "").to_string(),
        Err(_) => text.to_string(),
    }
}

/// Tries, in order: a `json:`-prefixed line, a fenced code block, a
/// standalone `{...}` line containing `"risk"`, then a regex search
/// anywhere in the text.
fn extract_json_block(reply: &str) -> Option<Value> {
    if let Some(v) = extract_prefixed_line(reply, "json:") {
        return Some(v);
    }
    if let Some(v) = extract_fenced(reply) {
        return Some(v);
    }
    if let Some(v) = extract_standalone_line(reply) {
        return Some(v);
    }
    extract_regex(reply)
}

fn extract_prefixed_line(reply: &str, prefix: &str) -> Option<Value> {
    let lines: Vec<&str> = reply.lines().collect();
    for (i, line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        if trimmed.len() < prefix.len() || !trimmed[..prefix.len()].eq_ignore_ascii_case(prefix) {
            continue;
        }
        let inline = trimmed[prefix.len()..].trim();
        if !inline.is_empty() {
            if let Ok(v) = serde_json::from_str(inline) {
                return Some(v);
            }
        }
        if let Some(next) = lines.get(i + 1) {
            if let Ok(v) = serde_json::from_str(next.trim()) {
                return Some(v);
            }
        }
    }
    None
}

fn extract_fenced(reply: &str) -> Option<Value> {
    let re = Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").ok()?;
    let caps = re.captures(reply)?;
    serde_json::from_str(caps.get(1)?.as_str()).ok()
}

fn extract_standalone_line(reply: &str) -> Option<Value> {
    reply
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with('{') && line.ends_with('}') && line.contains("\"risk\""))
        .find_map(|line| serde_json::from_str(line).ok())
}

fn extract_regex(reply: &str) -> Option<Value> {
    let re = Regex::new(r#"(?s)\{[^{}]*"risk"\s*:\s*"[^"]*"[^{}]*\}"#).ok()?;
    let m = re.find(reply)?;
    serde_json::from_str(m.as_str()).ok()
}

fn decode_value(value: &Value) -> Option<AiDecision> {
    if value.get("risk").map(|r| r.is_object()).unwrap_or(false) {
        let structured: StructuredShape = serde_json::from_value(value.clone()).ok()?;
        return Some(AiDecision {
            risk: structured.risk.level.as_deref().and_then(RiskLevel::parse).unwrap_or(RiskLevel::Low),
            decision_type: structured.decision_type.unwrap_or_else(|| "other".to_string()),
            confidence: structured.risk.confidence.unwrap_or(0.0),
            action: structured.action.as_deref().map(AllowedAction::parse_or_default).unwrap_or(AllowedAction::NotifyOnly),
            reason: structured.risk.reason.unwrap_or_default(),
            behavior: structured.behavior,
            subject: structured.subject,
        });
    }

    let flat: FlatShape = serde_json::from_value(value.clone()).ok()?;
    Some(AiDecision {
        risk: flat.risk.as_deref().and_then(RiskLevel::parse).unwrap_or(RiskLevel::Low),
        decision_type: flat.decision_type.unwrap_or_else(|| "other".to_string()),
        confidence: flat.confidence.unwrap_or(0.0),
        action: flat.action.as_deref().map(AllowedAction::parse_or_default).unwrap_or(AllowedAction::NotifyOnly),
        reason: flat.reason.unwrap_or_default(),
        behavior: flat.behavior,
        subject: flat.subject,
    })
}

/// Keyword-based fallback used when no JSON block can be parsed.
fn heuristic_decision(reply: &str) -> AiDecision {
    let lower = reply.to_ascii_lowercase();

    let risk = if let Some(pos) = lower.find("threat:") {
        let tail = &lower[pos + "threat:".len()..];
        RiskLevel::parse(tail.split_whitespace().next().unwrap_or("")).unwrap_or(RiskLevel::Low)
    } else {
        RiskLevel::Low
    };

    let decision_type = classify_type(&lower);
    let action = default_action_for(risk);

    AiDecision {
        risk,
        decision_type,
        confidence: 0.5,
        action,
        reason: "heuristic extraction from free text".to_string(),
        behavior: None,
        subject: None,
    }
}

fn classify_type(lower: &str) -> String {
    if lower.contains("delivery") || lower.contains("package") {
        "delivery".to_string()
    } else if lower.contains("known") || lower.contains("familiar") {
        "known_person".to_string()
    } else if lower.contains("loitering") {
        "loitering".to_string()
    } else if lower.contains("vehicle") || lower.contains("car") {
        "vehicle".to_string()
    } else if lower.contains("animal") {
        "animal".to_string()
    } else {
        "person".to_string()
    }
}

/// Maps a risk level to its default action when no structured decision
/// names one (the rule engine's deterministic remap, reused for the fallback path).
pub fn default_action_for(risk: RiskLevel) -> AllowedAction {
    match risk {
        RiskLevel::Low => AllowedAction::NotifyOnly,
        RiskLevel::Medium => AllowedAction::NotifyAndSaveClip,
        RiskLevel::High => AllowedAction::NotifyAndLight,
        RiskLevel::Critical => AllowedAction::NotifyAndAlarm,
    }
}

#[cfg(test)]
#[path = "decision_tests.rs"]
mod tests;
