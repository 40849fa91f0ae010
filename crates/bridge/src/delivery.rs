// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Delivery client: posts a forward-verbatim alert to the agent webhook,
//! one request per recipient, for relay over an external messenger
//! channel.

use std::time::Duration;

use reqwest::Client;
use serde_json::json;

use crate::config::RuntimeConfig;
use crate::types::{AiDecision, PolicyContext, RiskLevel};

const FORWARD_VERBATIM_INSTRUCTION: &str =
    "Forward the following message verbatim to the recipient. Do not rewrite, summarize, or add commentary.";
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(60);

pub struct DeliveryClient {
    client: Client,
    webhook: Option<String>,
    token: Option<String>,
}

impl DeliveryClient {
    pub fn new(webhook: Option<String>, token: Option<String>) -> Self {
        Self { client: Client::builder().timeout(DELIVERY_TIMEOUT).build().unwrap_or_default(), webhook, token }
    }

    /// Sends the alert to every configured recipient, honoring the global
    /// enable flag and the minimum-risk threshold (applied uniformly here,
    /// at the client boundary, not per recipient).
    pub async fn deliver(&self, config: &RuntimeConfig, camera: &str, event_id: &str, decision: &AiDecision, policy: &PolicyContext, snapshot_rel: &str, clip_rel: Option<&str>) {
        if !config.delivery_enabled {
            return;
        }
        let Some(min_risk) = RiskLevel::parse(&config.whatsapp_min_risk_level) else {
            tracing::warn!("delivery: invalid whatsapp_min_risk_level, skipping");
            return;
        };
        if decision.risk < min_risk {
            return;
        }
        let Some(webhook) = self.webhook.clone() else {
            return;
        };

        let message = build_message(camera, decision, policy, snapshot_rel, clip_rel);
        for recipient in &config.recipients {
            let session_key = format!("frigate-deliver:{camera}:{event_id}:{recipient}");
            let mut builder = self.client.post(&webhook).json(&json!({
                "message": message,
                "deliver": true,
                "channel": "whatsapp",
                "to": recipient,
                "sessionKey": session_key,
                "timeoutSeconds": DELIVERY_TIMEOUT.as_secs(),
            }));
            if let Some(token) = &self.token {
                builder = builder.bearer_auth(token);
            }
            if let Err(e) = builder.send().await {
                tracing::warn!(recipient, err = %e, "delivery: post failed");
            }
        }
    }
}

/// Builds the bounded multi-section alert body: severity icon, metadata,
/// subject, behavior, risk, context, action, media summary, escalation
/// hints — beginning with the forward-verbatim instruction and a `MEDIA:`
/// reference.
fn build_message(camera: &str, decision: &AiDecision, policy: &PolicyContext, snapshot_rel: &str, clip_rel: Option<&str>) -> String {
    let icon = match decision.risk {
        RiskLevel::Low => "🟢",
        RiskLevel::Medium => "🟡",
        RiskLevel::High => "🟠",
        RiskLevel::Critical => "🔴",
    };

    let mut sections = vec![
        FORWARD_VERBATIM_INSTRUCTION.to_string(),
        format!("MEDIA:{snapshot_rel}"),
        format!("{icon} *{}* — {}", decision.risk.as_str().to_uppercase(), camera),
        format!("Type: {}", decision.decision_type),
    ];

    if let Some(subject) = &decision.subject {
        if let Some(identity) = &subject.identity {
            sections.push(format!("Subject: {identity}"));
        }
        if let Some(description) = &subject.description {
            sections.push(format!("Description: {description}"));
        }
    }
    if let Some(behavior) = &decision.behavior {
        sections.push(format!("Behavior: {behavior}"));
    }

    sections.push(format!("Context: {} ({})", policy.camera_context, policy.camera_zone));
    sections.push(format!("Home mode: {}, time: {}", policy.home_mode, policy.time_of_day.as_str()));
    sections.push(format!("Action: {}", decision.action.as_str()));
    sections.push(format!("Reason: {}", decision.reason));

    if let Some(clip) = clip_rel {
        sections.push(format!("MEDIA:{clip}"));
    }

    if matches!(decision.risk, RiskLevel::High | RiskLevel::Critical) {
        sections.push("Escalation: consider checking live feed now.".to_string());
    }

    sections.join("\n")
}

#[cfg(test)]
#[path = "delivery_tests.rs"]
mod tests;
