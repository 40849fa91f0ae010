// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Action executor: maps an action label to home-automation side effects,
//! honoring quiet hours and the low-risk safety coercion.

use std::path::Path;

use crate::config::RuntimeConfig;
use crate::ha::HaClient;
use crate::nvr::NvrClient;
use crate::types::{AiDecision, AllowedAction, RiskLevel};

/// Coerces the decision's action to a safe default before execution: a
/// low-risk verdict can never trigger anything beyond a notification.
pub fn sanitize_action(decision: &mut AiDecision) {
    if decision.risk == RiskLevel::Low {
        decision.action = AllowedAction::NotifyOnly;
    }
}

/// Whether `hour` falls within the (possibly midnight-wrapping) quiet-hours
/// window `[start, end)` (inclusive start, exclusive end).
pub fn in_quiet_hours(hour: u32, start: u32, end: u32) -> bool {
    if start == end {
        return false;
    }
    if start < end {
        hour >= start && hour < end
    } else {
        hour >= start || hour < end
    }
}

#[derive(Debug, Default)]
pub struct ActionOutcome {
    pub clip_saved: bool,
    pub clip_path: Option<String>,
    pub lights_triggered: bool,
    pub speaker_triggered: bool,
    pub alarm_triggered: bool,
    pub speaker_suppressed_quiet_hours: bool,
}

/// Executes the decision's action, returning which side effects actually
/// ran. Failures of individual HA/NVR calls are logged and non-fatal;
/// transport errors never escape the handler.
pub async fn execute(
    config: &RuntimeConfig,
    nvr: &NvrClient,
    ha: &HaClient,
    camera: &str,
    event_id: &str,
    decision: &AiDecision,
    tts: &str,
    current_hour: u32,
) -> ActionOutcome {
    let mut outcome = ActionOutcome::default();

    if decision.action.implies_save_clip() {
        save_clip(nvr, &config.workspace_dir(), event_id, &mut outcome).await;
    }

    match decision.action {
        AllowedAction::NotifyOnly | AllowedAction::NotifyAndSaveClip => {}
        AllowedAction::NotifyAndLight => {
            trigger_lights(config, ha, camera, &mut outcome).await;
        }
        AllowedAction::NotifyAndSpeaker => {
            trigger_speaker(config, ha, decision.risk, tts, current_hour, &mut outcome).await;
        }
        AllowedAction::NotifyAndAlarm => {
            trigger_alarm(config, ha, camera, decision.risk, tts, current_hour, &mut outcome).await;
        }
    }

    outcome
}

async fn save_clip(nvr: &NvrClient, workspace_dir: &str, event_id: &str, outcome: &mut ActionOutcome) {
    nvr.retain_event(event_id).await;
    let Some(clip) = nvr.fetch_clip(event_id).await else {
        tracing::warn!(event_id, "action: clip unavailable, continuing");
        return;
    };
    match stage_clip(Path::new(workspace_dir), event_id, &clip) {
        Ok(rel) => {
            outcome.clip_saved = true;
            outcome.clip_path = Some(rel);
        }
        Err(e) => tracing::warn!(event_id, err = %e, "action: failed to stage clip"),
    }
}

/// Stages a copy of the fetched clip under the workspace, mirroring
/// `vlm::stage_snapshot`'s pattern, returning the workspace-relative path.
fn stage_clip(workspace_dir: &Path, event_id: &str, clip: &[u8]) -> anyhow::Result<String> {
    let dir = workspace_dir.join("clips");
    std::fs::create_dir_all(&dir)?;
    let file_path = dir.join(format!("{event_id}.mp4"));
    std::fs::write(&file_path, clip)?;
    Ok(format!("clips/{event_id}.mp4"))
}

async fn trigger_lights(config: &RuntimeConfig, ha: &HaClient, camera: &str, outcome: &mut ActionOutcome) {
    let entities = config.camera_lights_for(camera);
    let mut any_ok = false;
    for entity in entities {
        if ha.turn_on_light(&entity).await {
            any_ok = true;
        }
    }
    outcome.lights_triggered = any_ok;
}

async fn trigger_speaker(config: &RuntimeConfig, ha: &HaClient, risk: RiskLevel, tts: &str, hour: u32, outcome: &mut ActionOutcome) {
    if in_quiet_hours(hour, config.quiet_hours_start, config.quiet_hours_end) && risk != RiskLevel::Critical {
        outcome.speaker_suppressed_quiet_hours = true;
        return;
    }
    outcome.speaker_triggered = ha.speak(&config.speakers, tts).await;
}

async fn trigger_alarm(
    config: &RuntimeConfig,
    ha: &HaClient,
    camera: &str,
    risk: RiskLevel,
    tts: &str,
    hour: u32,
    outcome: &mut ActionOutcome,
) {
    outcome.alarm_triggered = ha.turn_on_siren(&config.siren_entity).await;
    trigger_lights(config, ha, camera, outcome).await;
    trigger_speaker(config, ha, risk, tts, hour, outcome).await;
}

#[cfg(test)]
#[path = "action_tests.rs"]
mod tests;
