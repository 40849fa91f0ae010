// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only JSONL event history.
//!
//! A single writer appends one line per accepted decision; on overflow
//! past `history_max_lines` the file is rewritten keeping only the most
//! recent lines. Readers tolerate malformed lines by skipping them.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;

use crate::types::{AiDecision, HistoryRow};

pub struct HistoryStore {
    path: PathBuf,
    max_lines: usize,
    // Append-and-truncate is not atomic; serialize all writers behind one lock.
    write_lock: Mutex<()>,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>, max_lines: usize) -> Arc<Self> {
        Arc::new(Self { path: path.into(), max_lines, write_lock: Mutex::new(()) })
    }

    /// Appends a decided event, then truncates the file to `max_lines` if needed.
    pub async fn append(&self, camera: &str, event_id: &str, decision: &AiDecision) -> anyhow::Result<()> {
        let row = HistoryRow {
            timestamp: Utc::now().to_rfc3339(),
            camera: camera.to_string(),
            event_id: event_id.to_string(),
            risk: decision.risk,
            action: decision.action,
            decision_type: decision.decision_type.clone(),
            confidence: decision.confidence,
        };
        let line = serde_json::to_string(&row)?;

        let _guard = self.write_lock.lock().await;
        let path = self.path.clone();
        let max_lines = self.max_lines;
        tokio::task::spawn_blocking(move || append_and_truncate(&path, &line, max_lines)).await??;
        Ok(())
    }

    /// Reads all valid rows for `camera` within the last `window_seconds`, newest last.
    /// Malformed lines are skipped.
    pub async fn recent_rows_for_camera(&self, camera: &str, window_seconds: i64) -> anyhow::Result<Vec<HistoryRow>> {
        let path = self.path.clone();
        let camera = camera.to_string();
        let rows = tokio::task::spawn_blocking(move || read_rows(&path)).await??;

        let cutoff = Utc::now().timestamp() - window_seconds;
        Ok(rows
            .into_iter()
            .filter(|r| r.camera == camera)
            .filter(|r| {
                chrono::DateTime::parse_from_rfc3339(&r.timestamp)
                    .map(|ts| ts.timestamp() >= cutoff)
                    .unwrap_or(false)
            })
            .collect())
    }
}

fn read_rows(path: &Path) -> anyhow::Result<Vec<HistoryRow>> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    Ok(contents.lines().filter_map(|line| serde_json::from_str(line).ok()).collect())
}

fn append_and_truncate(path: &Path, line: &str, max_lines: usize) -> anyhow::Result<()> {
    {
        let mut file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{line}")?;
    }

    let contents = std::fs::read_to_string(path)?;
    let line_count = contents.lines().count();
    if line_count > max_lines {
        let kept: Vec<&str> = contents.lines().skip(line_count - max_lines).collect();
        let tmp_path = path.with_extension("jsonl.tmp");
        {
            let mut tmp = std::fs::File::create(&tmp_path)?;
            for l in kept {
                writeln!(tmp, "{l}")?;
            }
        }
        std::fs::rename(&tmp_path, path)?;
    }

    Ok(())
}

/// Builds the disk-backed recent-events memory summary text fed into the
/// policy context. Returns `"- disabled"` if the memory feature flag is
/// off, `"- none in last N minutes"` if empty.
pub fn summarize_rows(rows: &[HistoryRow], window_minutes: i64) -> String {
    if rows.is_empty() {
        return format!("- none in last {window_minutes} minutes");
    }
    let high_or_critical =
        rows.iter().filter(|r| matches!(r.risk, crate::types::RiskLevel::High | crate::types::RiskLevel::Critical)).count();
    let Some(last) = rows.last() else {
        return format!("- none in last {window_minutes} minutes");
    };
    format!(
        "- {} event(s) in last {} minutes, last at {} ({} high/critical, latest type: {})",
        rows.len(),
        window_minutes,
        last.timestamp,
        high_or_critical,
        last.decision_type,
    )
}

#[cfg(test)]
#[path = "history_tests.rs"]
mod tests;
