// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;

/// Process-level flags: where to find the runtime config and the optional
/// secrets sidecar. Everything else lives in `RuntimeConfig`.
#[derive(Debug, Clone, clap::Parser)]
pub struct BridgeArgs {
    /// Path to the JSON runtime config file.
    #[arg(long, env = "BRIDGE_CONFIG_PATH", default_value = "config.json")]
    pub config: PathBuf,

    /// Path to an optional `KEY=VALUE` secrets sidecar file.
    #[arg(long, env = "BRIDGE_SECRETS_PATH")]
    pub secrets: Option<PathBuf>,
}

/// Prefix marking a config value as a display-only placeholder that must
/// never overwrite a live secret already held by the process.
pub const MASKED_SECRET_PREFIX: &str = "********";

fn default_mqtt_topic_subscribe() -> String {
    "frigate/events".to_string()
}
fn default_mqtt_topic_publish() -> String {
    "openclaw/frigate/analysis".to_string()
}
fn default_cooldown_seconds() -> u64 {
    30
}
fn default_quiet_hours_start() -> u32 {
    23
}
fn default_quiet_hours_end() -> u32 {
    6
}
fn default_recent_events_window_seconds() -> i64 {
    600
}
fn default_event_history_window_seconds() -> i64 {
    1800
}
fn default_event_history_max_lines() -> usize {
    5000
}
fn default_confirm_delay_seconds() -> u64 {
    4
}
fn default_confirm_timeout_seconds() -> u64 {
    90
}
fn default_confirm_risks() -> Vec<String> {
    vec!["high".to_string(), "critical".to_string()]
}
fn default_whatsapp_min_risk_level() -> String {
    "medium".to_string()
}
fn default_ollama_model() -> String {
    "qwen2.5vl:7b".to_string()
}
fn default_agent_name() -> String {
    "main".to_string()
}
fn default_camera_policy_zone() -> String {
    "entry".to_string()
}
fn default_history_path() -> String {
    "event_history.jsonl".to_string()
}
fn default_true() -> bool {
    true
}

/// Immutable snapshot of hosts, ports, credentials and tunables.
///
/// Deserialized once at startup from the config file named by `BridgeArgs`;
/// reload-on-file-change is left to a process restart (see DESIGN.md).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub mqtt_host: String,
    #[serde(default = "default_mqtt_port")]
    pub mqtt_port: u16,
    #[serde(default)]
    pub mqtt_username: Option<String>,
    #[serde(default)]
    pub mqtt_password: Option<String>,
    #[serde(default = "default_mqtt_topic_subscribe")]
    pub mqtt_topic_subscribe: String,
    #[serde(default = "default_mqtt_topic_publish")]
    pub mqtt_topic_publish: String,
    #[serde(default)]
    pub mqtt_client_id: Option<String>,

    pub frigate_api: String,

    pub ollama_api: String,
    #[serde(default = "default_ollama_model")]
    pub ollama_model: String,
    #[serde(default)]
    pub agent_webhook: Option<String>,
    #[serde(default)]
    pub agent_webhook_fallback: Option<String>,
    #[serde(default)]
    pub agent_token: Option<String>,
    #[serde(default)]
    pub agent_model_fallback: Option<String>,
    #[serde(default = "default_agent_name")]
    pub agent_name: String,
    #[serde(default)]
    pub sessions_dir: Option<String>,
    #[serde(default)]
    pub openclaw_workspace: Option<String>,

    pub ha_url: String,
    #[serde(default)]
    pub ha_token: Option<String>,
    #[serde(default = "default_home_mode_entity")]
    pub ha_home_mode_entity: String,
    #[serde(default = "default_known_faces_entity")]
    pub ha_known_faces_entity: String,

    #[serde(default)]
    pub recipients: Vec<String>,

    #[serde(default)]
    pub camera_context: HashMap<String, String>,
    #[serde(default)]
    pub camera_lights: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub camera_zone: HashMap<String, String>,
    #[serde(default = "default_camera_policy_zone")]
    pub camera_policy_zone_default: String,
    #[serde(default)]
    pub default_lights: Vec<String>,
    #[serde(default)]
    pub speakers: Vec<String>,
    #[serde(default = "default_siren_entity")]
    pub siren_entity: String,

    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: u64,
    #[serde(default = "default_quiet_hours_start")]
    pub quiet_hours_start: u32,
    #[serde(default = "default_quiet_hours_end")]
    pub quiet_hours_end: u32,

    #[serde(default = "default_recent_events_window_seconds")]
    pub recent_events_window_seconds: i64,

    #[serde(default = "default_true")]
    pub phase3_enabled: bool,
    #[serde(default = "default_true")]
    pub phase4_enabled: bool,
    #[serde(default)]
    pub phase5_enabled: bool,
    #[serde(default)]
    pub phase8_enabled: bool,

    #[serde(default = "default_confirm_delay_seconds")]
    pub phase5_confirm_delay_seconds: u64,
    #[serde(default = "default_confirm_timeout_seconds")]
    pub phase5_confirm_timeout_seconds: u64,
    #[serde(default = "default_confirm_risks")]
    pub phase5_confirm_risks: Vec<String>,

    #[serde(default)]
    pub exclude_known_faces: bool,

    #[serde(default)]
    pub delivery_enabled: bool,
    #[serde(default = "default_whatsapp_min_risk_level")]
    pub whatsapp_min_risk_level: String,

    #[serde(default = "default_history_path")]
    pub event_history_path: String,
    #[serde(default = "default_event_history_window_seconds")]
    pub event_history_window_seconds: i64,
    #[serde(default = "default_event_history_max_lines")]
    pub event_history_max_lines: usize,

    #[serde(default)]
    pub snapshot_storage_root: Option<String>,
}

fn default_mqtt_port() -> u16 {
    1883
}
fn default_home_mode_entity() -> String {
    "input_select.home_mode".to_string()
}
fn default_known_faces_entity() -> String {
    "binary_sensor.known_faces".to_string()
}
fn default_siren_entity() -> String {
    "siren.front_door".to_string()
}

impl RuntimeConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_seconds)
    }

    pub fn confirm_delay(&self) -> Duration {
        Duration::from_secs(self.phase5_confirm_delay_seconds)
    }

    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_secs(self.phase5_confirm_timeout_seconds)
    }

    pub fn camera_context_for(&self, camera: &str) -> String {
        self.camera_context.get(camera).cloned().unwrap_or_else(|| "no notes".to_string())
    }

    pub fn camera_zone_for(&self, camera: &str) -> String {
        self.camera_zone.get(camera).cloned().unwrap_or_else(|| self.camera_policy_zone_default.clone())
    }

    pub fn camera_lights_for(&self, camera: &str) -> Vec<String> {
        self.camera_lights.get(camera).cloned().unwrap_or_else(|| self.default_lights.clone())
    }

    pub fn workspace_dir(&self) -> String {
        self.openclaw_workspace.clone().unwrap_or_else(|| ".openclaw/workspace".to_string())
    }

    pub fn sessions_dir(&self) -> String {
        self.sessions_dir.clone().unwrap_or_else(|| ".openclaw/sessions".to_string())
    }

    /// Loads the config file, then overlays the secrets sidecar (if any),
    /// refusing to let a masked placeholder clobber a real secret.
    pub fn load(config_path: &std::path::Path, secrets_path: Option<&std::path::Path>) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(config_path)
            .map_err(|e| anyhow::anyhow!("{}: reading {}: {e}", BridgeError::Config, config_path.display()))?;
        let mut config: Self = serde_json::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("{}: parsing {}: {e}", BridgeError::Config, config_path.display()))?;

        if let Some(path) = secrets_path {
            if let Ok(contents) = std::fs::read_to_string(path) {
                let secrets = parse_secrets_file(&contents);
                apply_secret_overrides(&mut config, &secrets);
            }
        }

        Ok(config)
    }
}

fn parse_secrets_file(contents: &str) -> HashMap<String, String> {
    contents
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            let (key, value) = line.split_once('=')?;
            Some((key.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

pub fn is_masked(value: &str) -> bool {
    value.starts_with(MASKED_SECRET_PREFIX)
}

/// Applies sidecar secret overrides for the three recognized keys. The
/// secrets file is the live credential source, so its values always win
/// when present; a masked config placeholder is therefore never the one
/// that ends up live because it's only ever read as a fallback.
fn apply_secret_overrides(config: &mut RuntimeConfig, secrets: &HashMap<String, String>) {
    if let Some(v) = secrets.get("MQTT_PASSWORD") {
        config.mqtt_password = Some(v.clone());
    }
    if let Some(v) = secrets.get("AGENT_TOKEN") {
        config.agent_token = Some(v.clone());
    }
    if let Some(v) = secrets.get("HA_TOKEN") {
        config.ha_token = Some(v.clone());
    }
}

/// Minimal config used by unit tests across modules. Not part of the
/// public API surface, just a shared fixture.
#[cfg(test)]
pub fn test_config() -> RuntimeConfig {
    serde_json::from_str(
        r#"{
            "mqtt_host": "localhost",
            "frigate_api": "http://frigate.local/api",
            "ollama_api": "http://ollama.local:11434",
            "ha_url": "http://ha.local:8123"
        }"#,
    )
    .unwrap()
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
