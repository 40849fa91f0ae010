// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP accessor for the NVR: snapshot fetch with thumbnail
//! fallback, event retain, clip download.

use std::time::Duration;

use reqwest::Client;

const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(10);
const CLIP_TIMEOUT: Duration = Duration::from_secs(30);
/// Bodies at or below this size are treated as missing (1000 bytes
/// missing, 1001 bytes valid).
const MIN_VALID_BODY_BYTES: usize = 1000;

pub struct NvrClient {
    base_url: String,
    snapshot_client: Client,
    clip_client: Client,
}

impl NvrClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            snapshot_client: Client::builder().timeout(SNAPSHOT_TIMEOUT).build().unwrap_or_default(),
            clip_client: Client::builder().timeout(CLIP_TIMEOUT).build().unwrap_or_default(),
        }
    }

    /// Tries `snapshot.jpg`, falling back to `thumbnail.jpg` on non-200 or a
    /// too-small body. Returns `None` if both attempts fail.
    pub async fn fetch_snapshot(&self, event_id: &str) -> Option<Vec<u8>> {
        let primary = format!("{}/events/{event_id}/snapshot.jpg", self.base_url);
        if let Some(bytes) = self.fetch_valid_body(&primary).await {
            return Some(bytes);
        }
        let fallback = format!("{}/events/{event_id}/thumbnail.jpg", self.base_url);
        self.fetch_valid_body(&fallback).await
    }

    async fn fetch_valid_body(&self, url: &str) -> Option<Vec<u8>> {
        let resp = match self.snapshot_client.get(url).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(url, err = %e, "nvr: snapshot request failed");
                return None;
            }
        };
        if !resp.status().is_success() {
            tracing::warn!(url, status = %resp.status(), "nvr: snapshot non-200");
            return None;
        }
        match resp.bytes().await {
            Ok(bytes) if bytes.len() > MIN_VALID_BODY_BYTES => Some(bytes.to_vec()),
            Ok(bytes) => {
                tracing::warn!(url, len = bytes.len(), "nvr: snapshot body too small");
                None
            }
            Err(e) => {
                tracing::warn!(url, err = %e, "nvr: snapshot body read failed");
                None
            }
        }
    }

    /// Asks the NVR to retain clip footage for this event. Non-fatal on failure.
    pub async fn retain_event(&self, event_id: &str) -> bool {
        let url = format!("{}/events/{event_id}/retain", self.base_url);
        match self.snapshot_client.post(&url).send().await {
            Ok(resp) => {
                let ok = resp.status().as_u16() == 200 || resp.status().as_u16() == 201;
                if !ok {
                    tracing::warn!(url, status = %resp.status(), "nvr: retain non-2xx");
                }
                ok
            }
            Err(e) => {
                tracing::warn!(url, err = %e, "nvr: retain request failed");
                false
            }
        }
    }

    /// Downloads the clip for this event with a longer timeout.
    pub async fn fetch_clip(&self, event_id: &str) -> Option<Vec<u8>> {
        let url = format!("{}/events/{event_id}/clip.mp4", self.base_url);
        let resp = match self.clip_client.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(url, err = %e, "nvr: clip request failed");
                return None;
            }
        };
        if !resp.status().is_success() {
            tracing::warn!(url, status = %resp.status(), "nvr: clip non-200");
            return None;
        }
        match resp.bytes().await {
            Ok(bytes) if bytes.len() > MIN_VALID_BODY_BYTES => Some(bytes.to_vec()),
            Ok(bytes) => {
                tracing::warn!(url, len = bytes.len(), "nvr: clip body too small");
                None
            }
            Err(e) => {
                tracing::warn!(url, err = %e, "nvr: clip body read failed");
                None
            }
        }
    }
}

#[cfg(test)]
#[path = "nvr_tests.rs"]
mod tests;
