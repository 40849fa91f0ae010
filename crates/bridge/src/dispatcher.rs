// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Top-level event dispatcher: the MQTT callback that filters events,
//! applies cooldown, orchestrates every collaborator, publishes the
//! analysis payload, and appends to history.
//!
//! Failure semantics: any external failure is non-fatal. The dispatcher
//! always falls back to a `notify_only` decision for the piece that
//! failed and still publishes a best-effort structured payload.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rumqttc::AsyncClient;
use serde_json::json;

use crate::action;
use crate::confirmation;
use crate::decision::parse_decision;
use crate::delivery::DeliveryClient;
use crate::ha::HaClient;
use crate::history::HistoryStore;
use crate::messaging::publish_analysis;
use crate::nvr::NvrClient;
use crate::policy_context;
use crate::rules;
use crate::state::BridgeState;
use crate::types::{AiDecision, AllowedAction, IncomingEvent, PolicyContext, RiskLevel};
use crate::vlm::{build_analysis_prompt, stage_snapshot, VlmClient, VlmRequest};

/// The delay before snapshot fetch, giving the NVR time to finalize its
/// frame.
const SNAPSHOT_SETTLE_DELAY: Duration = Duration::from_secs(3);

pub struct Dispatcher {
    pub state: Arc<BridgeState>,
    pub nvr: NvrClient,
    pub ha: HaClient,
    pub vlm: VlmClient,
    pub history: Arc<HistoryStore>,
    pub delivery: DeliveryClient,
    pub mqtt: AsyncClient,
}

impl Dispatcher {
    /// Handles one inbound event end-to-end. Never panics or returns an
    /// error: every failure path is absorbed into a documented fallback.
    pub async fn dispatch(&self, event: IncomingEvent) {
        let config = &self.state.config;
        let now = Utc::now().timestamp();

        let policy = policy_context::build(config, &self.state, &self.history, &self.ha, &event.camera, now).await;

        if config.exclude_known_faces && policy.known_faces_present {
            let decision = known_face_excluded_decision();
            self.publish(&event, &decision, &policy, "", None, "- known face excluded").await;
            self.append_history(&event, &decision).await;
            return;
        }

        if !self.state.accept_and_record(&event.camera, now).await {
            tracing::info!(camera = %event.camera, event_id = %event.event_id, "dispatcher: dropped, within cooldown");
            return;
        }

        tokio::time::sleep(SNAPSHOT_SETTLE_DELAY).await;

        let Some(image) = self.nvr.fetch_snapshot(&event.event_id).await else {
            tracing::warn!(camera = %event.camera, event_id = %event.event_id, "dispatcher: no snapshot, dropping silently");
            return;
        };

        let workspace_dir = config.workspace_dir();
        let snapshot_rel = match stage_snapshot(&std::path::PathBuf::from(&workspace_dir), &event.event_id, &image) {
            Ok(rel) => rel,
            Err(e) => {
                tracing::warn!(err = %e, "dispatcher: failed to stage snapshot");
                String::new()
            }
        };
        let snapshot_abs = std::path::Path::new(&workspace_dir).join(&snapshot_rel).display().to_string();

        self.publish_pending(&event).await;

        let prompt = build_analysis_prompt(&event.camera, &policy.camera_context, &policy.history_summary, &snapshot_abs, &snapshot_rel);
        let reply = self
            .vlm
            .analyze(VlmRequest {
                camera: &event.camera,
                event_id: &event.event_id,
                image: &image,
                prompt,
                session_suffix: "",
                timeout: Duration::from_secs(90),
            })
            .await;

        let (mut decision, mut analysis) = match reply {
            Some(text) => parse_decision(&text),
            None => (AiDecision::unavailable(), String::new()),
        };

        if config.phase3_enabled {
            rules::apply(&mut decision, &policy);
        }

        if confirmation::should_confirm(config, &decision) {
            let (merged, confirm_note) = confirmation::confirm(config, &self.nvr, &self.vlm, &event.camera, &event.event_id, &decision).await;
            decision = merged;
            if !confirm_note.is_empty() {
                analysis = if analysis.is_empty() { confirm_note } else { format!("{analysis}\n\n{confirm_note}") };
            }
        }

        decision.sanitize();
        action::sanitize_action(&mut decision);

        let hour = chrono::Local::now();
        use chrono::Timelike;
        let outcome = action::execute(config, &self.nvr, &self.ha, &event.camera, &event.event_id, &decision, &tts_for(&decision), hour.hour()).await;

        let clip_path = outcome.clip_path.as_deref();

        if decision.risk >= RiskLevel::Medium {
            self.delivery
                .deliver(config, &event.camera, &event.event_id, &decision, &policy, &snapshot_rel, clip_path)
                .await;
        }

        self.append_history(&event, &decision).await;
        self.state.push_recent_event(&event.camera, now).await;

        self.publish(&event, &decision, &policy, &snapshot_rel, clip_path, &analysis).await;
    }

    async fn publish_pending(&self, event: &IncomingEvent) {
        let payload = json!({
            "camera": event.camera,
            "event_id": event.event_id,
            "label": event.label,
            "analysis": "pending",
            "risk": "low",
            "action": "notify_only",
        });
        if let Err(e) = publish_analysis(&self.mqtt, &self.state.config.mqtt_topic_publish, &payload).await {
            tracing::warn!(err = %e, "dispatcher: pending publish failed");
        }
    }

    async fn publish(&self, event: &IncomingEvent, decision: &AiDecision, policy: &PolicyContext, snapshot_rel: &str, clip_url: Option<&str>, note: &str) {
        let payload = build_payload(event, decision, policy, snapshot_rel, clip_url, note);
        if let Err(e) = publish_analysis(&self.mqtt, &self.state.config.mqtt_topic_publish, &payload).await {
            tracing::warn!(err = %e, "dispatcher: final publish failed");
        }
    }

    async fn append_history(&self, event: &IncomingEvent, decision: &AiDecision) {
        if let Err(e) = self.history.append(&event.camera, &event.event_id, decision).await {
            tracing::warn!(err = %e, "dispatcher: history append failed");
        }
    }
}

fn known_face_excluded_decision() -> AiDecision {
    AiDecision {
        risk: RiskLevel::Low,
        decision_type: "known_person".to_string(),
        confidence: 1.0,
        action: AllowedAction::NotifyOnly,
        reason: "known face excluded".to_string(),
        behavior: None,
        subject: None,
    }
}

fn tts_for(decision: &AiDecision) -> String {
    format!("{} risk detected: {}", decision.risk.as_str(), decision.reason)
}

/// Builds the outbound analysis payload: the clean, JSON/MEDIA-stripped
/// human-readable note plus the decision fields, policy-derived labels,
/// and media-decision booleans keyed on risk.
fn build_payload(event: &IncomingEvent, decision: &AiDecision, policy: &PolicyContext, snapshot_rel: &str, clip_url: Option<&str>, note: &str) -> serde_json::Value {
    let (clip_length, monitoring) = match decision.risk {
        RiskLevel::Low => (0, false),
        RiskLevel::Medium => (15, false),
        RiskLevel::High => (30, true),
        RiskLevel::Critical => (60, true),
    };

    json!({
        "camera": event.camera,
        "label": event.label,
        "event_id": event.event_id,
        "analysis": note,
        "risk": decision.risk.as_str(),
        "type": decision.decision_type,
        "confidence": decision.confidence,
        "action": decision.action.as_str(),
        "reason": decision.reason,
        "behavior": decision.behavior,
        "subject_identity": decision.subject.as_ref().and_then(|s| s.identity.clone()),
        "subject_description": decision.subject.as_ref().and_then(|s| s.description.clone()),
        "camera_zone": policy.camera_zone,
        "home_mode": policy.home_mode,
        "time_of_day": policy.time_of_day.as_str(),
        "media_snapshot": !snapshot_rel.is_empty(),
        "media_clip": clip_url.is_some(),
        "media_clip_length": clip_length,
        "media_monitoring": monitoring,
        "tts": tts_for(decision),
        "timestamp": Utc::now().to_rfc3339(),
        "snapshot_path": snapshot_rel,
        "clip_url": clip_url,
    })
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
