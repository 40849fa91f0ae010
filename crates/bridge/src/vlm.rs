// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Vision-language model client: a direct HTTP call to a vision model,
//! falling back to an agent webhook whose reply arrives asynchronously
//! via a polled session transcript.

use std::path::Path;
use std::time::Duration;

use base64::Engine;
use reqwest::Client;
use serde_json::json;

use crate::session_reply;

const DIRECT_TIMEOUT: Duration = Duration::from_secs(300);
const WEBHOOK_POST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct VlmClient {
    direct_client: Client,
    webhook_client: Client,
    ollama_api: String,
    ollama_model: String,
    agent_webhook: Option<String>,
    agent_webhook_fallback: Option<String>,
    agent_token: Option<String>,
    agent_model_fallback: Option<String>,
    agent_name: String,
    sessions_dir: std::path::PathBuf,
}

pub struct VlmRequest<'a> {
    pub camera: &'a str,
    pub event_id: &'a str,
    pub image: &'a [u8],
    pub prompt: String,
    /// Suffix appended to the session key, e.g. "" for the first pass,
    /// "confirm" for the confirmation controller's second pass.
    pub session_suffix: &'a str,
    pub timeout: Duration,
}

impl VlmClient {
    pub fn new(
        ollama_api: impl Into<String>,
        ollama_model: impl Into<String>,
        agent_webhook: Option<String>,
        agent_webhook_fallback: Option<String>,
        agent_token: Option<String>,
        agent_model_fallback: Option<String>,
        agent_name: impl Into<String>,
        sessions_dir: impl Into<std::path::PathBuf>,
    ) -> Self {
        Self {
            direct_client: Client::builder().timeout(DIRECT_TIMEOUT).build().unwrap_or_default(),
            webhook_client: Client::builder().timeout(WEBHOOK_POST_TIMEOUT).build().unwrap_or_default(),
            ollama_api: ollama_api.into(),
            ollama_model: ollama_model.into(),
            agent_webhook,
            agent_webhook_fallback,
            agent_token,
            agent_model_fallback,
            agent_name: agent_name.into(),
            sessions_dir: sessions_dir.into(),
        }
    }

    /// Tries the direct VLM first; on failure falls back to the primary
    /// agent webhook, then the fallback webhook+model with a mutated
    /// session key. Returns the first non-empty reply text.
    pub async fn analyze(&self, req: VlmRequest<'_>) -> Option<String> {
        if let Some(reply) = self.direct_generate(&req.prompt, req.image).await {
            return Some(reply);
        }

        let session_key = session_key_for(req.camera, req.event_id, req.session_suffix, "");
        if let Some(webhook) = self.agent_webhook.clone() {
            if let Some(reply) = self
                .agent_webhook_roundtrip(&webhook, &self.ollama_model, &session_key, &req.prompt, req.timeout)
                .await
            {
                return Some(reply);
            }
        }

        if let Some(fallback_webhook) = self.agent_webhook_fallback.clone() {
            let fallback_model = self.agent_model_fallback.clone().unwrap_or_else(|| self.ollama_model.clone());
            let fallback_key = session_key_for(req.camera, req.event_id, req.session_suffix, ":fallback");
            return self
                .agent_webhook_roundtrip(&fallback_webhook, &fallback_model, &fallback_key, &req.prompt, req.timeout)
                .await;
        }

        None
    }

    async fn direct_generate(&self, prompt: &str, image: &[u8]) -> Option<String> {
        let b64 = base64::engine::general_purpose::STANDARD.encode(image);
        let url = format!("{}/api/generate", self.ollama_api);
        let body = json!({
            "model": self.ollama_model,
            "prompt": prompt,
            "images": [b64],
            "stream": false,
            "options": { "num_predict": 512, "temperature": 0.2 },
        });

        let resp = match self.direct_client.post(&url).json(&body).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(err = %e, "vlm: direct generate request failed");
                return None;
            }
        };
        if !resp.status().is_success() {
            tracing::warn!(status = %resp.status(), "vlm: direct generate non-200");
            return None;
        }
        match resp.json::<serde_json::Value>().await {
            Ok(v) => v.get("response").and_then(|r| r.as_str()).map(str::to_string).filter(|s| !s.trim().is_empty()),
            Err(e) => {
                tracing::warn!(err = %e, "vlm: direct generate bad json");
                None
            }
        }
    }

    async fn agent_webhook_roundtrip(
        &self,
        webhook: &str,
        model: &str,
        session_key: &str,
        message: &str,
        timeout: Duration,
    ) -> Option<String> {
        let timeout_seconds = timeout.as_secs();
        let mut builder = self.webhook_client.post(webhook).json(&json!({
            "message": message,
            "model": model,
            "deliver": false,
            "sessionKey": session_key,
            "timeoutSeconds": timeout_seconds,
        }));
        if let Some(token) = &self.agent_token {
            builder = builder.bearer_auth(token);
        }

        match builder.send().await {
            Ok(resp) if resp.status().is_success() => {}
            Ok(resp) => {
                tracing::warn!(webhook, status = %resp.status(), "vlm: agent webhook non-2xx");
                return None;
            }
            Err(e) => {
                tracing::warn!(webhook, err = %e, "vlm: agent webhook request failed");
                return None;
            }
        }

        session_reply::wait_for_reply(&self.sessions_dir, &self.agent_name, session_key, timeout).await
    }
}

fn session_key_for(camera: &str, event_id: &str, suffix: &str, mutate: &str) -> String {
    if suffix.is_empty() {
        format!("frigate:{camera}:{event_id}{mutate}")
    } else {
        format!("frigate:{camera}:{event_id}:{suffix}{mutate}")
    }
}

/// Stages a copy of the snapshot under the VLM workspace so the agent's
/// image tool can open it by relative path, returning that relative path.
pub fn stage_snapshot(workspace_dir: &Path, event_id: &str, image: &[u8]) -> anyhow::Result<String> {
    let dir = workspace_dir.join("ai-snapshots");
    std::fs::create_dir_all(&dir)?;
    let file_path = dir.join(format!("{event_id}.jpg"));
    std::fs::write(&file_path, image)?;
    Ok(format!("ai-snapshots/{event_id}.jpg"))
}

/// Builds the direct-VLM prompt: scene description plus a single-line
/// JSON decision block prefixed `JSON:`. References the staged snapshot
/// both by its full path, for the agent's image tool, and by its
/// workspace-relative path, prefixed `MEDIA:`, for the webhook fallback.
pub fn build_analysis_prompt(camera: &str, camera_context: &str, history_summary: &str, snapshot_abs_path: &str, snapshot_rel_path: &str) -> String {
    format!(
        "A person was detected by the \"{camera}\" security camera. Context: {camera_context}.\n\
         Recent activity on this camera:\n{history_summary}\n\n\
         The snapshot to analyze is at {snapshot_abs_path}. In your reply, reference it on its own \
         line as \"MEDIA:{snapshot_rel_path}\".\n\n\
         Describe what you see in one or two sentences, then on its own line output a single JSON \
         decision prefixed with \"JSON:\", with keys risk (low|medium|high|critical), type, confidence \
         (0-1), action (notify_only|notify_and_save_clip|notify_and_light|notify_and_speaker|notify_and_alarm), \
         reason, and optionally behavior and subject."
    )
}

#[cfg(test)]
#[path = "vlm_tests.rs"]
mod tests;
