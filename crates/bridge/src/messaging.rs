// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! MQTT publish/subscribe wrapper built on `rumqttc`. Auto-reconnects
//! with backoff bounded to `[1s, 30s]`, mirroring the original bridge's
//! `reconnect_delay_set(min_delay=1, max_delay=30)`.

use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::RuntimeConfig;
use crate::types::{IncomingEvent, RawWireEvent};

const MIN_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

pub fn connect(config: &RuntimeConfig) -> (AsyncClient, EventLoop) {
    let client_id = config.mqtt_client_id.clone().unwrap_or_else(|| "frigate-bridge".to_string());
    let mut options = MqttOptions::new(client_id, config.mqtt_host.clone(), config.mqtt_port);
    options.set_keep_alive(Duration::from_secs(30));
    options.set_clean_session(true);
    if let (Some(user), Some(pass)) = (&config.mqtt_username, &config.mqtt_password) {
        options.set_credentials(user, pass);
    }
    AsyncClient::new(options, 64)
}

/// Subscribes to the inbound topic and forwards parsed, actionable events
/// onto `event_tx` until `shutdown` fires. Reconnects are handled
/// internally by `rumqttc`'s event loop; on a connection error we back off
/// ourselves before polling again, bounded to `[1s, 30s]`.
pub async fn run_subscriber(
    client: AsyncClient,
    mut eventloop: EventLoop,
    config: &RuntimeConfig,
    event_tx: mpsc::Sender<IncomingEvent>,
    shutdown: CancellationToken,
) {
    if let Err(e) = client.subscribe(&config.mqtt_topic_subscribe, QoS::AtLeastOnce).await {
        tracing::warn!(err = %e, "messaging: initial subscribe failed");
    }

    let mut backoff = MIN_BACKOFF;
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!("messaging: subscriber shutting down");
                return;
            }
            result = eventloop.poll() => {
                match result {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        backoff = MIN_BACKOFF;
                        handle_publish(&publish.payload, &event_tx).await;
                    }
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        backoff = MIN_BACKOFF;
                        tracing::info!("messaging: connected");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(err = %e, backoff_secs = backoff.as_secs(), "messaging: connection error, backing off");
                        tokio::time::sleep(backoff).await;
                        backoff = (backoff * 2).min(MAX_BACKOFF);
                    }
                }
            }
        }
    }
}

async fn handle_publish(payload: &[u8], event_tx: &mpsc::Sender<IncomingEvent>) {
    let raw: RawWireEvent = match serde_json::from_slice(payload) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!(err = %e, "messaging: malformed inbound payload");
            return;
        }
    };
    let Some(event) = IncomingEvent::from_wire(&raw) else {
        return;
    };
    if !event.is_actionable() {
        return;
    }
    if event_tx.send(event).await.is_err() {
        tracing::warn!("messaging: dispatcher channel closed");
    }
}

/// Publishes the outbound analysis payload at QoS 1, retained.
pub async fn publish_analysis(client: &AsyncClient, topic: &str, payload: &serde_json::Value) -> anyhow::Result<()> {
    let body = serde_json::to_vec(payload)?;
    client.publish(topic, QoS::AtLeastOnce, true, body).await?;
    Ok(())
}

#[cfg(test)]
#[path = "messaging_tests.rs"]
mod tests;
