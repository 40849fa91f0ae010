// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Poll-until-deadline adapter over the agent's session-transcript files.
//!
//! The agent webhook does not reply synchronously: it enqueues a
//! conversation and appends its transcript to `{sessions_dir}/{id}.jsonl`,
//! indexed by a sessions-index JSON file keyed
//! `agent:{agent}:{lower(session_key)}`. This module polls both files on a
//! fixed tick until the assistant's reply appears or a deadline elapses,
//! covering the three states named in DESIGN.md: no-index-entry,
//! index-but-no-file, file-without-assistant-reply.

use std::path::Path;
use std::time::{Duration, Instant};

use serde::Deserialize;
use serde_json::Value;
use tokio::time::sleep;

const POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Deserialize)]
struct SessionIndexEntry {
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
}

/// Waits for `agent:{agent_name}:{lower(session_key)}` to appear in the
/// sessions index, then for that session's transcript to contain an
/// assistant reply, up to `timeout`. Returns the stripped reply text.
pub async fn wait_for_reply(
    sessions_dir: &Path,
    agent_name: &str,
    session_key: &str,
    timeout: Duration,
) -> Option<String> {
    let deadline = Instant::now() + timeout;
    let index_path = sessions_dir.join("sessions.json");
    let full_key = format!("agent:{agent_name}:{}", session_key.to_ascii_lowercase());

    let session_id = loop {
        if let Some(id) = read_session_id(&index_path, &full_key) {
            break id;
        }
        if Instant::now() >= deadline {
            tracing::warn!(full_key, "session_reply: no index entry before deadline");
            return None;
        }
        sleep(POLL_INTERVAL).await;
    };

    let transcript_path = sessions_dir.join(format!("{session_id}.jsonl"));
    loop {
        if let Some(reply) = read_last_assistant_reply(&transcript_path) {
            return Some(strip_media_lines(&reply));
        }
        if Instant::now() >= deadline {
            tracing::warn!(session_id, "session_reply: no assistant reply before deadline");
            return None;
        }
        sleep(POLL_INTERVAL).await;
    }
}

fn read_session_id(index_path: &Path, full_key: &str) -> Option<String> {
    let contents = std::fs::read_to_string(index_path).ok()?;
    let index: std::collections::HashMap<String, SessionIndexEntry> = serde_json::from_str(&contents).ok()?;
    index.get(full_key)?.session_id.clone()
}

fn read_last_assistant_reply(transcript_path: &Path) -> Option<String> {
    let contents = std::fs::read_to_string(transcript_path).ok()?;
    let mut last_reply = None;
    for line in contents.lines() {
        let Ok(record) = serde_json::from_str::<Value>(line) else { continue };
        if record.get("type").and_then(Value::as_str) != Some("message") {
            continue;
        }
        let Some(message) = record.get("message") else { continue };
        if message.get("role").and_then(Value::as_str) != Some("assistant") {
            continue;
        }
        let Some(content) = message.get("content").and_then(Value::as_array) else { continue };
        let text: String = content
            .iter()
            .filter(|part| part.get("type").and_then(Value::as_str) == Some("text"))
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n");
        if !text.trim().is_empty() {
            last_reply = Some(text);
        }
    }
    last_reply
}

/// Strips any `MEDIA:`-prefixed lines (the image-tool reference) from a reply.
pub fn strip_media_lines(text: &str) -> String {
    text.lines().filter(|line| !line.trim_start().starts_with("MEDIA:")).collect::<Vec<_>>().join("\n").trim().to_string()
}

#[cfg(test)]
#[path = "session_reply_tests.rs"]
mod tests;
