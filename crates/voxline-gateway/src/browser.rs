// Copyright (c) 2024-2026 Voxline Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! Bridges a browser WebSocket connection to the internal
//! `VoiceSession` orchestrator.
//!
//! Binary frames carry raw PCM16 audio straight through. Text frames carry
//! JSON control frames — currently just base64-wrapped audio and an
//! explicit end-of-call marker, since the browser's `MediaRecorder` API
//! sometimes can't emit binary frames directly depending on codec choice.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use base64::{engine::general_purpose::STANDARD, Engine};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::debug;

use voxline_core::{Call, CallDirection, ControlMessage, TransportSink};

use crate::SessionFactory;

#[derive(Clone)]
pub struct BrowserGatewayState {
    pub session_factory: SessionFactory,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BrowserFrame {
    Audio { data: String },
    End,
}

pub async fn browser_ws_handler(ws: WebSocketUpgrade, State(state): State<BrowserGatewayState>) -> Response {
    ws.on_upgrade(move |socket| handle_browser_socket(socket, state))
}

struct BrowserTransport {
    tx: mpsc::UnboundedSender<Message>,
}

#[async_trait::async_trait]
impl TransportSink for BrowserTransport {
    async fn send_audio(&self, pcm: bytes::Bytes) {
        let _ = self.tx.send(Message::Binary(pcm.to_vec()));
    }

    async fn send_message(&self, message: ControlMessage) {
        if let Ok(text) = serde_json::to_string(&message) {
            let _ = self.tx.send(Message::Text(text));
        }
    }
}

pub async fn handle_browser_socket(socket: WebSocket, state: BrowserGatewayState) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                break;
            }
        }
    });

    let transport: Arc<dyn TransportSink> = Arc::new(BrowserTransport { tx });
    let call = Call::new(uuid::Uuid::new_v4().to_string(), "default", CallDirection::Browser);
    let handle = (state.session_factory)(call, None, transport).await;

    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Binary(pcm)) => handle.session.handle_audio(&pcm),
            Ok(Message::Text(text)) => match serde_json::from_str::<BrowserFrame>(&text) {
                Ok(BrowserFrame::Audio { data }) => {
                    if let Ok(pcm) = STANDARD.decode(&data) {
                        handle.session.handle_audio(&pcm);
                    }
                }
                Ok(BrowserFrame::End) => break,
                Err(e) => debug!(error = %e, "ignoring unrecognized browser control frame"),
            },
            Ok(Message::Close(_)) => break,
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Err(e) => {
                debug!(error = %e, "browser WebSocket recv error");
                break;
            }
        }
    }

    handle.session.notify_transport_closed("browser_disconnect");
    let _ = handle.task.await;
    writer.abort();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    enum Parsed {
        Audio(String),
        End,
    }

    fn parse(text: &str) -> Parsed {
        match serde_json::from_str::<BrowserFrame>(text).unwrap() {
            BrowserFrame::Audio { data } => Parsed::Audio(data),
            BrowserFrame::End => Parsed::End,
        }
    }

    #[test]
    fn parses_audio_frame() {
        assert_eq!(
            parse(r#"{"type":"audio","data":"AAA="}"#),
            Parsed::Audio("AAA=".to_string())
        );
    }

    #[test]
    fn parses_end_frame() {
        assert_eq!(parse(r#"{"type":"end"}"#), Parsed::End);
    }
}
