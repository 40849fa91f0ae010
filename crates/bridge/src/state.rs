// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::config::RuntimeConfig;
use crate::types::PerCameraState;

/// Process-local shared state: the config snapshot, the per-camera
/// cooldown/recent-events map, and the shutdown token. Guarded by a
/// single mutex; the map is small and held only for the duration of a
/// cooldown check or update, never across an await that does I/O.
pub struct BridgeState {
    pub config: RuntimeConfig,
    pub cameras: Mutex<HashMap<String, PerCameraState>>,
    pub shutdown: CancellationToken,
}

impl BridgeState {
    pub fn new(config: RuntimeConfig, shutdown: CancellationToken) -> Arc<Self> {
        Arc::new(Self { config, cameras: Mutex::new(HashMap::new()), shutdown })
    }

    /// Atomically checks and updates cooldown for `camera`: returns `true`
    /// if the event should be accepted (and records `now`
    /// as the new last-alert epoch), `false` if it's within the window
    /// and must be dropped.
    pub async fn accept_and_record(&self, camera: &str, now_epoch: i64) -> bool {
        let mut cameras = self.cameras.lock().await;
        let entry = cameras.entry(camera.to_string()).or_default();
        let cooldown = self.config.cooldown_seconds as i64;
        let accept = match entry.last_alert_epoch {
            Some(last) => now_epoch - last >= cooldown,
            None => true,
        };
        if accept {
            entry.last_alert_epoch = Some(now_epoch);
        }
        accept
    }

    /// Records an accepted event's timestamp into the camera's recent-events
    /// list, pruning anything older than the configured window.
    pub async fn push_recent_event(&self, camera: &str, now_epoch: i64) {
        let mut cameras = self.cameras.lock().await;
        let entry = cameras.entry(camera.to_string()).or_default();
        entry.recent_event_epochs.push(now_epoch);
        let window = self.config.recent_events_window_seconds;
        entry.recent_event_epochs.retain(|ts| now_epoch - ts <= window);
    }

    /// Returns the recent-event count and the latest timestamp for `camera`,
    /// pruning stale entries as a side effect.
    pub async fn recent_events(&self, camera: &str, now_epoch: i64) -> (usize, Option<i64>) {
        let mut cameras = self.cameras.lock().await;
        let entry = cameras.entry(camera.to_string()).or_default();
        let window = self.config.recent_events_window_seconds;
        entry.recent_event_epochs.retain(|ts| now_epoch - ts <= window);
        let last = entry.recent_event_epochs.iter().max().copied();
        (entry.recent_event_epochs.len(), last)
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
