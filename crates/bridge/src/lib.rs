// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! frigate-bridge: turns NVR person-detection events into risk-scored
//! security alerts, via a VLM, a deterministic rule engine, an optional
//! confirmation pass, and an action executor, publishing the result back
//! to MQTT for home automation.

pub mod action;
pub mod config;
pub mod confirmation;
pub mod decision;
pub mod delivery;
pub mod dispatcher;
pub mod error;
pub mod ha;
pub mod history;
pub mod messaging;
pub mod nvr;
pub mod policy_context;
pub mod rules;
pub mod session_reply;
pub mod state;
pub mod types;
pub mod vlm;

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::{BridgeArgs, RuntimeConfig};
use crate::delivery::DeliveryClient;
use crate::dispatcher::Dispatcher;
use crate::ha::HaClient;
use crate::history::HistoryStore;
use crate::nvr::NvrClient;
use crate::state::BridgeState;
use crate::vlm::VlmClient;

/// Runs the bridge until shutdown: connects to MQTT, wires up every
/// collaborator, and dispatches inbound events until the process is
/// asked to stop.
pub async fn run(args: BridgeArgs) -> anyhow::Result<()> {
    let config = RuntimeConfig::load(&args.config, args.secrets.as_deref())?;
    let shutdown = CancellationToken::new();
    let state = BridgeState::new(config.clone(), shutdown.clone());

    let history = HistoryStore::new(config.event_history_path.clone(), config.event_history_max_lines);
    let nvr = NvrClient::new(config.frigate_api.clone());
    let ha = HaClient::new(config.ha_url.clone(), config.ha_token.clone());
    let vlm = VlmClient::new(
        config.ollama_api.clone(),
        config.ollama_model.clone(),
        config.agent_webhook.clone(),
        config.agent_webhook_fallback.clone(),
        config.agent_token.clone(),
        config.agent_model_fallback.clone(),
        config.agent_name.clone(),
        config.sessions_dir(),
    );
    let delivery = DeliveryClient::new(config.agent_webhook.clone(), config.agent_token.clone());

    let (mqtt_client, eventloop) = messaging::connect(&config);
    let dispatcher = Arc::new(Dispatcher { state: Arc::clone(&state), nvr, ha, vlm, history, delivery, mqtt: mqtt_client.clone() });

    let (event_tx, mut event_rx) = mpsc::channel(256);
    let sub_config = config.clone();
    let sub_shutdown = shutdown.clone();
    tokio::spawn(async move {
        messaging::run_subscriber(mqtt_client, eventloop, &sub_config, event_tx, sub_shutdown).await;
    });

    tracing::info!(topic = %config.mqtt_topic_subscribe, "frigate-bridge listening");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!("frigate-bridge shutting down");
                return Ok(());
            }
            event = event_rx.recv() => {
                match event {
                    Some(event) => {
                        let dispatcher = Arc::clone(&dispatcher);
                        tokio::spawn(async move { dispatcher.dispatch(event).await });
                    }
                    None => {
                        tracing::warn!("frigate-bridge: event channel closed");
                        return Ok(());
                    }
                }
            }
        }
    }
}
