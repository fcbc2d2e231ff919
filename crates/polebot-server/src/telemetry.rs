//! Relay for live robot telemetry.
//!
//! Only the most recent message is kept. Robots publish over `POST
//! /api/telemetry` or the `/ws/publish` socket; viewers on `/ws` get the
//! latest message on a fixed tick whether or not it changed.

use std::{sync::Arc, time::Duration};

use axum::{
    Json,
    extract::{
        State,
        rejection::JsonRejection,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::Response,
};
use polebot_core::now_ms;
use polebot_protocol::{ApiResponse, TelemetryEnvelope, TelemetryFrame, TelemetryPublish};
use tokio::{sync::watch, time};
use tracing::{debug, warn};

use crate::{AppState, api::json_body, error::ApiError};

const DEFAULT_ROBOT_ID: &str = "robot";

#[derive(Clone)]
pub struct TelemetryHub {
    latest: Arc<watch::Sender<Option<TelemetryEnvelope>>>,
    interval: Duration,
}

impl TelemetryHub {
    pub fn new(interval: Duration) -> Self {
        let (sender, _) = watch::channel(None);
        Self { latest: Arc::new(sender), interval }
    }

    pub fn publish(&self, robot_id: Option<String>, payload: serde_json::Value) -> TelemetryEnvelope {
        let robot_id = robot_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ROBOT_ID.to_string());
        let envelope = TelemetryEnvelope::new(robot_id, payload, now_ms());
        self.latest.send_replace(Some(envelope.clone()));
        envelope
    }

    pub fn frame(&self) -> TelemetryFrame {
        TelemetryFrame { data: self.latest.borrow().clone() }
    }
}

pub async fn latest(State(state): State<AppState>) -> Json<ApiResponse<TelemetryFrame>> {
    Json(ApiResponse::ok(state.telemetry.frame()))
}

pub async fn publish(
    State(state): State<AppState>,
    payload: Result<Json<TelemetryPublish>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<TelemetryEnvelope>>), ApiError> {
    let request = json_body(payload)?;
    let envelope = state.telemetry.publish(request.robot_id, request.payload);
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(envelope))))
}

pub async fn viewer_socket(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let hub = state.telemetry.clone();
    ws.on_upgrade(move |socket| stream_latest(socket, hub))
}

pub async fn publisher_socket(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let hub = state.telemetry.clone();
    ws.on_upgrade(move |socket| accept_publications(socket, hub))
}

async fn stream_latest(mut socket: WebSocket, hub: TelemetryHub) {
    debug!("telemetry viewer connected");
    let mut ticker = time::interval(hub.interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let text = match serde_json::to_string(&hub.frame()) {
                    Ok(text) => text,
                    Err(err) => {
                        warn!(error = %err, "failed to encode telemetry frame");
                        break;
                    }
                };
                if socket.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
    debug!("telemetry viewer disconnected");
}

async fn accept_publications(mut socket: WebSocket, hub: TelemetryHub) {
    debug!("telemetry publisher connected");
    while let Some(Ok(message)) = socket.recv().await {
        match message {
            Message::Text(text) => match serde_json::from_str::<TelemetryPublish>(text.as_str()) {
                Ok(request) => {
                    let envelope = hub.publish(request.robot_id, request.payload);
                    debug!(robot_id = %envelope.robot_id, "telemetry received");
                }
                Err(err) => warn!(error = %err, "ignoring malformed telemetry message"),
            },
            Message::Close(_) => break,
            _ => {}
        }
    }
    debug!("telemetry publisher disconnected");
}
