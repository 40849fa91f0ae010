// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Core data model shared across the pipeline.

use serde::{Deserialize, Serialize};

/// Time-of-day bucket used by the policy context and rule engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDay {
    Day,
    Evening,
    Night,
}

impl TimeOfDay {
    /// Buckets a local hour (0-23) into day (6-17), evening (18-22), night (otherwise).
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            6..=17 => Self::Day,
            18..=22 => Self::Evening,
            _ => Self::Night,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Evening => "evening",
            Self::Night => "night",
        }
    }
}

/// Risk level produced by the VLM or the rule engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

/// The bounded set of side effects the action executor understands.
/// Anything else collapses to `NotifyOnly`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllowedAction {
    NotifyOnly,
    NotifyAndSaveClip,
    NotifyAndLight,
    NotifyAndSpeaker,
    NotifyAndAlarm,
}

impl AllowedAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotifyOnly => "notify_only",
            Self::NotifyAndSaveClip => "notify_and_save_clip",
            Self::NotifyAndLight => "notify_and_light",
            Self::NotifyAndSpeaker => "notify_and_speaker",
            Self::NotifyAndAlarm => "notify_and_alarm",
        }
    }

    /// Parses a raw action string, collapsing anything unrecognized to `NotifyOnly`.
    pub fn parse_or_default(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "notify_only" => Self::NotifyOnly,
            "notify_and_save_clip" => Self::NotifyAndSaveClip,
            "notify_and_light" => Self::NotifyAndLight,
            "notify_and_speaker" => Self::NotifyAndSpeaker,
            "notify_and_alarm" => Self::NotifyAndAlarm,
            _ => Self::NotifyOnly,
        }
    }

    /// Clip saving is a cumulative side effect of save_clip, light and alarm actions.
    pub fn implies_save_clip(&self) -> bool {
        matches!(self, Self::NotifyAndSaveClip | Self::NotifyAndLight | Self::NotifyAndAlarm)
    }
}

/// An inbound NVR event, as derived from the subscribed MQTT topic.
#[derive(Debug, Clone, Deserialize)]
pub struct IncomingEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub camera: String,
    pub label: String,
    pub event_id: String,
}

impl IncomingEvent {
    /// Parses the raw `{type, before, after}` Frigate-shaped wire message into the
    /// flat form the dispatcher consumes. Only `after` fields are read.
    pub fn from_wire(raw: &RawWireEvent) -> Option<Self> {
        let after = raw.after.as_ref()?;
        Some(Self {
            event_type: raw.event_type.clone(),
            camera: after.camera.clone(),
            label: after.label.clone(),
            event_id: after.id.clone(),
        })
    }

    pub fn is_actionable(&self) -> bool {
        self.event_type == "new" && self.label == "person" && !self.event_id.is_empty()
    }
}

/// The raw wire shape published by the NVR: `{type, before, after}`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawWireEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub before: Option<RawWireEventData>,
    #[serde(default)]
    pub after: Option<RawWireEventData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawWireEventData {
    pub id: String,
    pub camera: String,
    #[serde(default)]
    pub label: String,
}

/// Policy context built per event.
#[derive(Debug, Clone)]
pub struct PolicyContext {
    pub time_of_day: TimeOfDay,
    pub home_mode: String,
    pub known_faces_present: bool,
    pub camera_context: String,
    pub camera_zone: String,
    pub recent_events_count: usize,
    pub recent_events_last_ts: Option<i64>,
    /// The disk-backed memory summary text, the second of the two recent-events feeds.
    pub history_summary: String,
}

/// A structured subject description the VLM may return.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Subject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A sanitized AI decision: the single internal shape both wire variants
/// (flat, structured) flatten into.
#[derive(Debug, Clone)]
pub struct AiDecision {
    pub risk: RiskLevel,
    pub decision_type: String,
    pub confidence: f64,
    pub action: AllowedAction,
    pub reason: String,
    pub behavior: Option<String>,
    pub subject: Option<Subject>,
}

impl AiDecision {
    /// The documented fallback decision used whenever nothing can be parsed.
    pub fn unavailable() -> Self {
        Self {
            risk: RiskLevel::Low,
            decision_type: "other".to_string(),
            confidence: 0.0,
            action: AllowedAction::NotifyOnly,
            reason: "AI decision unavailable".to_string(),
            behavior: None,
            subject: None,
        }
    }

    /// Clamps enumerations and confidence in place; idempotent under repeated calls.
    pub fn sanitize(&mut self) {
        if self.risk == RiskLevel::Low {
            self.action = AllowedAction::NotifyOnly;
        }
        self.confidence = sanitize_confidence(self.confidence);
        if self.decision_type.trim().is_empty() {
            self.decision_type = "other".to_string();
        }
        if self.reason.trim().is_empty() {
            self.reason = "AI decision unavailable".to_string();
        }
    }
}

/// Normalizes confidence to `[0, 1]`: values in `(1, 100]` are
/// treated as a percentage, anything outside `[0, 100]` is clamped.
pub fn sanitize_confidence(raw: f64) -> f64 {
    let v = if raw > 1.0 { raw / 100.0 } else { raw };
    v.clamp(0.0, 1.0)
}

/// Result of the second-pass confirmation.
#[derive(Debug, Clone, Default)]
pub struct ConfirmationResult {
    pub confirmed: bool,
    pub risk: Option<RiskLevel>,
    pub action: Option<AllowedAction>,
    pub reason: Option<String>,
}

/// One row of the append-only event history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRow {
    pub timestamp: String,
    pub camera: String,
    pub event_id: String,
    pub risk: RiskLevel,
    pub action: AllowedAction,
    #[serde(rename = "type")]
    pub decision_type: String,
    pub confidence: f64,
}

/// Process-local, in-memory per-camera state.
#[derive(Debug, Clone, Default)]
pub struct PerCameraState {
    pub last_alert_epoch: Option<i64>,
    pub recent_event_epochs: Vec<i64>,
}
