// Copyright (c) 2024-2026 Voxline Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! Bridges a telephony media-stream WebSocket (Twilio-shaped: `start` /
//! `media` / `stop` events, base64 µ-law@8kHz payloads) to the same
//! `VoiceSession` orchestrator the browser adapter drives.
//!
//! Unlike the browser transport, the wire protocol here is carrier-owned:
//! there is no channel to push arbitrary JSON control events back down to
//! the phone network, only media and mark frames. `send_message` is
//! therefore a sink for logging/observability, never delivered over the
//! wire.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use voxline_codec::{base64_mulaw_to_pcm16, pcm16_to_base64_mulaw};
use voxline_core::{Agent, Call, CallDirection, ControlMessage, SessionHandle, TransportSink};

use crate::SessionFactory;

const TELEPHONY_SAMPLE_RATE: u32 = 8000;
const SESSION_SAMPLE_RATE: u32 = 16000;

/// Resolves a carrier-assigned call SID to the call/agent this engine
/// already knows about. A real deployment backs this with the call table
/// populated when the outbound/inbound call was first dialed.
#[async_trait]
pub trait CallResolver: Send + Sync {
    async fn resolve(&self, external_call_sid: &str) -> anyhow::Result<ResolvedCall>;
}

pub struct ResolvedCall {
    pub call_id: String,
    pub agent: Option<Agent>,
}

#[derive(Clone)]
pub struct TelephonyGatewayState {
    pub session_factory: SessionFactory,
    pub call_resolver: Arc<dyn CallResolver>,
}

#[derive(Debug, Deserialize)]
struct TwilioFrame {
    event: String,
    #[serde(default)]
    start: Option<TwilioStart>,
    #[serde(default)]
    media: Option<TwilioMedia>,
}

#[derive(Debug, Deserialize)]
struct TwilioStart {
    #[serde(rename = "streamSid")]
    stream_sid: String,
    #[serde(rename = "callSid")]
    call_sid: String,
}

#[derive(Debug, Deserialize)]
struct TwilioMedia {
    payload: String,
}

pub async fn telephony_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<TelephonyGatewayState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_telephony_socket(socket, state))
}

struct TwilioTransport {
    tx: mpsc::UnboundedSender<Message>,
    stream_sid: String,
}

#[async_trait]
impl TransportSink for TwilioTransport {
    async fn send_audio(&self, pcm: bytes::Bytes) {
        match pcm16_to_base64_mulaw(&pcm, SESSION_SAMPLE_RATE, TELEPHONY_SAMPLE_RATE) {
            Ok(payload) => {
                let frame = json!({
                    "event": "media",
                    "streamSid": self.stream_sid,
                    "media": { "payload": payload },
                });
                let _ = self.tx.send(Message::Text(frame.to_string()));
            }
            Err(e) => warn!(error = %e, "failed to encode outbound telephony audio"),
        }
    }

    async fn send_message(&self, message: ControlMessage) {
        debug!(?message, "control message suppressed on telephony transport");
    }
}

pub async fn handle_telephony_socket(socket: WebSocket, state: TelephonyGatewayState) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                break;
            }
        }
    });

    let mut handle: Option<SessionHandle> = None;

    while let Some(msg) = stream.next().await {
        let text = match msg {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => continue,
        };
        let frame: TwilioFrame = match serde_json::from_str(&text) {
            Ok(f) => f,
            Err(e) => {
                debug!(error = %e, "ignoring unrecognized telephony frame");
                continue;
            }
        };

        match frame.event.as_str() {
            "start" => {
                let Some(start) = frame.start else { continue };
                let resolved = match state.call_resolver.resolve(&start.call_sid).await {
                    Ok(r) => r,
                    Err(e) => {
                        warn!(error = %e, call_sid = %start.call_sid, "failed to resolve telephony call");
                        break;
                    }
                };
                let transport: Arc<dyn TransportSink> = Arc::new(TwilioTransport {
                    tx: tx.clone(),
                    stream_sid: start.stream_sid,
                });
                let call = Call::new(resolved.call_id, resolved.agent.as_ref().map(|a| a.id.clone()).unwrap_or_default(), CallDirection::Inbound);
                handle = Some((state.session_factory)(call, resolved.agent, transport).await);
            }
            "media" => {
                let (Some(session), Some(media)) = (handle.as_ref(), frame.media) else { continue };
                match base64_mulaw_to_pcm16(&media.payload, TELEPHONY_SAMPLE_RATE, SESSION_SAMPLE_RATE) {
                    Ok(pcm) => session.session.handle_audio(&pcm),
                    Err(e) => debug!(error = %e, "dropping malformed telephony media frame"),
                }
            }
            "stop" => break,
            _ => {}
        }
    }

    if let Some(handle) = handle {
        handle.session.notify_transport_closed("twilio_disconnect");
        let _ = handle.task.await;
    }
    writer.abort();
}
