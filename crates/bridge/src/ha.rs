// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP accessor for the home-automation hub: entity
//! state reads and service invocation with one retry.

use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

const HA_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HaClient {
    base_url: String,
    token: Option<String>,
    client: Client,
}

impl HaClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self { base_url: base_url.into(), token, client: Client::builder().timeout(HA_TIMEOUT).build().unwrap_or_default() }
    }

    fn apply_auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Reads `{state, attributes}` for an entity. Returns `None` on any
    /// transport failure or non-200 (callers apply their own defaults).
    pub async fn get_state(&self, entity_id: &str) -> Option<Value> {
        let url = format!("{}/api/states/{entity_id}", self.base_url);
        let resp = self.apply_auth(self.client.get(&url)).send().await.ok()?;
        if !resp.status().is_success() {
            tracing::warn!(entity_id, status = %resp.status(), "ha: get_state non-200");
            return None;
        }
        resp.json::<Value>().await.ok()
    }

    /// Invokes `{domain}.{service}` with the given JSON body, retrying
    /// once on transport failure.
    pub async fn call_service(&self, domain: &str, service: &str, body: &Value) -> bool {
        let url = format!("{}/api/services/{domain}/{service}", self.base_url);
        for attempt in 0..2 {
            match self.apply_auth(self.client.post(&url)).json(body).send().await {
                Ok(resp) if resp.status().is_success() => return true,
                Ok(resp) => {
                    tracing::warn!(url, status = %resp.status(), attempt, "ha: service call non-2xx");
                }
                Err(e) => {
                    tracing::warn!(url, err = %e, attempt, "ha: service call failed");
                }
            }
        }
        false
    }

    pub async fn turn_on_light(&self, entity_id: &str) -> bool {
        self.call_service("light", "turn_on", &serde_json::json!({ "entity_id": entity_id })).await
    }

    pub async fn turn_on_siren(&self, entity_id: &str) -> bool {
        self.call_service("siren", "turn_on", &serde_json::json!({ "entity_id": entity_id })).await
    }

    pub async fn speak(&self, target_entities: &[String], message: &str) -> bool {
        self.call_service(
            "notify",
            "alexa_media",
            &serde_json::json!({ "message": message, "target": target_entities }),
        )
        .await
    }
}

/// Interprets an HA entity state string as "known faces present".
pub fn is_known_faces_present(state: Option<&str>) -> bool {
    matches!(state.map(str::to_ascii_lowercase).as_deref(), Some("on" | "true" | "home" | "detected"))
}

#[cfg(test)]
#[path = "ha_tests.rs"]
mod tests;
