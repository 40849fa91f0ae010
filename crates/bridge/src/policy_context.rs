// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Policy context builder: queries the home-automation hub, buckets the
//! time of day, and blends the in-memory and disk-backed recent-events
//! feeds into one `PolicyContext` per event.

use chrono::{Local, Timelike};

use crate::config::RuntimeConfig;
use crate::ha::{is_known_faces_present, HaClient};
use crate::history::{summarize_rows, HistoryStore};
use crate::state::BridgeState;
use crate::types::{PolicyContext, TimeOfDay};

/// Builds the `PolicyContext` for `camera`. External lookups (home mode,
/// known-faces sensor, disk history) are individually best-effort: a
/// failure falls back to a documented default rather than failing the
/// whole build.
pub async fn build(
    config: &RuntimeConfig,
    state: &BridgeState,
    history: &HistoryStore,
    ha: &HaClient,
    camera: &str,
    now_epoch: i64,
) -> PolicyContext {
    let home_mode = ha
        .get_state(&config.ha_home_mode_entity)
        .await
        .and_then(|v| v.get("state").and_then(|s| s.as_str()).map(str::to_string))
        .unwrap_or_else(|| "home".to_string());

    let known_faces_present = ha
        .get_state(&config.ha_known_faces_entity)
        .await
        .and_then(|v| v.get("state").and_then(|s| s.as_str()).map(str::to_string));
    let known_faces_present = is_known_faces_present(known_faces_present.as_deref());

    let hour = Local::now().hour();
    let time_of_day = TimeOfDay::from_hour(hour);

    let (recent_events_count, recent_events_last_ts) = state.recent_events(camera, now_epoch).await;

    let history_summary = if config.phase4_enabled {
        let window_minutes = config.event_history_window_seconds / 60;
        match history.recent_rows_for_camera(camera, config.event_history_window_seconds).await {
            Ok(rows) => summarize_rows(&rows, window_minutes),
            Err(e) => {
                tracing::warn!(camera, err = %e, "policy_context: history read failed");
                format!("- none in last {window_minutes} minutes")
            }
        }
    } else {
        "- disabled".to_string()
    };

    PolicyContext {
        time_of_day,
        home_mode,
        known_faces_present,
        camera_context: config.camera_context_for(camera),
        camera_zone: config.camera_zone_for(camera),
        recent_events_count,
        recent_events_last_ts,
        history_summary,
    }
}

#[cfg(test)]
#[path = "policy_context_tests.rs"]
mod tests;
