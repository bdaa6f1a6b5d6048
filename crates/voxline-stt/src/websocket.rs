// Copyright (c) 2024-2026 Voxline Contributors
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use crate::TranscriptSink;

/// Generic streaming-recognizer driver over a JSON-control-message websocket
/// (the shape used by Deepgram-style APIs: binary frames carry raw audio,
/// text frames carry `{type: "Results", ...}` transcripts).
pub struct WebSocketSttClient {
    url: String,
    api_key: Option<String>,
    language: String,
    endpointing_ms: u32,
    sink: Arc<dyn TranscriptSink>,
    connected: Arc<AtomicBool>,
    audio_tx: Option<mpsc::UnboundedSender<Vec<u8>>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl WebSocketSttClient {
    pub fn new(
        url: impl Into<String>,
        api_key: Option<String>,
        language: impl Into<String>,
        endpointing_ms: u32,
        sink: Arc<dyn TranscriptSink>,
    ) -> Self {
        Self {
            url: url.into(),
            api_key,
            language: language.into(),
            endpointing_ms,
            sink,
            connected: Arc::new(AtomicBool::new(false)),
            audio_tx: None,
            task: None,
        }
    }
}

#[async_trait]
impl crate::SttClient for WebSocketSttClient {
    async fn connect(&mut self) -> anyhow::Result<()> {
        let mut url = url::Url::parse(&self.url)?;
        url.query_pairs_mut()
            .append_pair("language", &self.language)
            .append_pair("interim_results", "true")
            .append_pair("vad_events", "true")
            .append_pair("endpointing", &self.endpointing_ms.to_string());

        let mut request = url.as_str().into_client_request()?;
        if let Some(key) = &self.api_key {
            request
                .headers_mut()
                .insert("Authorization", format!("Token {key}").parse()?);
        }

        let (ws_stream, _) = tokio_tungstenite::connect_async(request).await?;
        let (mut write, mut read) = ws_stream.split();

        let (audio_tx, mut audio_rx) = mpsc::unbounded_channel::<Vec<u8>>();
        self.audio_tx = Some(audio_tx);
        self.connected.store(true, Ordering::SeqCst);

        let connected = self.connected.clone();
        let sink = self.sink.clone();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    frame = audio_rx.recv() => {
                        match frame {
                            Some(bytes) => {
                                if write.send(Message::Binary(bytes)).await.is_err() {
                                    break;
                                }
                            }
                            None => break,
                        }
                    }
                    msg = read.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                if let Some((t, is_final)) = parse_transcript_message(&text) {
                                    if !t.is_empty() {
                                        sink.on_transcript(t, is_final).await;
                                    }
                                }
                            }
                            Some(Ok(Message::Close(_))) | None => break,
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                warn!(error = %e, "STT websocket error, ending receive loop");
                                break;
                            }
                        }
                    }
                }
            }
            connected.store(false, Ordering::SeqCst);
            debug!("STT receive loop ended");
        });
        self.task = Some(task);

        Ok(())
    }

    fn send_audio(&self, frame: &[u8]) {
        if !self.is_connected() {
            return;
        }
        if let Some(tx) = &self.audio_tx {
            let _ = tx.send(frame.to_vec());
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&mut self) {
        if let Some(tx) = &self.audio_tx {
            // Best-effort graceful termination message understood by
            // Deepgram-style APIs; the subsequent drop tears the socket down.
            let _ = tx.send(json!({"type": "CloseStream"}).to_string().into_bytes());
        }
        self.audio_tx = None;
        self.connected.store(false, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Parses a recognizer's `Results`-shaped JSON message into `(text, is_final)`.
fn parse_transcript_message(text: &str) -> Option<(String, bool)> {
    let v: serde_json::Value = serde_json::from_str(text).ok()?;
    let alt = &v["channel"]["alternatives"][0];
    let transcript = alt["transcript"].as_str()?.to_string();
    let is_final = v["is_final"].as_bool().unwrap_or(false);
    Some((transcript, is_final))
}

use tokio_tungstenite::tungstenite::client::IntoClientRequest;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_interim_and_final_transcripts() {
        let interim = r#"{"is_final":false,"channel":{"alternatives":[{"transcript":"hel"}]}}"#;
        assert_eq!(
            parse_transcript_message(interim),
            Some(("hel".to_string(), false))
        );

        let fin = r#"{"is_final":true,"channel":{"alternatives":[{"transcript":"hello"}]}}"#;
        assert_eq!(
            parse_transcript_message(fin),
            Some(("hello".to_string(), true))
        );
    }

    #[test]
    fn malformed_message_returns_none() {
        assert_eq!(parse_transcript_message("not json"), None);
        assert_eq!(parse_transcript_message("{}"), None);
    }
}
