// Copyright (c) 2024-2026 Voxline Contributors
//
// SPDX-License-Identifier: Apache-2.0
mod mock;
mod websocket;

pub use mock::MockSttClient;
pub use websocket::WebSocketSttClient;

use std::sync::Arc;

use async_trait::async_trait;

/// Implemented by the session orchestrator. The STT client holds a handle to
/// this interface rather than the session holding a handle back into the
/// client's receive loop — avoids an ownership cycle between the two (the
/// session owns the client downward, observes it upward through this trait).
#[async_trait]
pub trait TranscriptSink: Send + Sync {
    /// Invoked only for non-empty transcripts. `is_final` is true when the
    /// recognizer declares the utterance complete.
    async fn on_transcript(&self, text: String, is_final: bool);
}

/// A streaming speech recognizer. One instance is scoped to a single call:
/// `connect` opens the recognizer, `send_audio` forwards PCM16@16kHz frames
/// non-blockingly, `close` tears the connection down gracefully.
///
/// Failure model: any transport error terminates the receive loop internally
/// and flips `is_connected` to false. There is no automatic reconnect inside
/// a session — once degraded, the call continues without STT until it ends.
#[async_trait]
pub trait SttClient: Send + Sync {
    async fn connect(&mut self) -> anyhow::Result<()>;

    /// Non-blocking: silently drops the frame if not connected.
    fn send_audio(&self, frame: &[u8]);

    fn is_connected(&self) -> bool;

    /// Sends a graceful termination message, then tears down the transport.
    async fn close(&mut self);
}

pub fn sink_from_fn<F>(f: F) -> Arc<dyn TranscriptSink>
where
    F: Fn(String, bool) + Send + Sync + 'static,
{
    struct FnSink<F>(F);
    #[async_trait]
    impl<F: Fn(String, bool) + Send + Sync> TranscriptSink for FnSink<F> {
        async fn on_transcript(&self, text: String, is_final: bool) {
            (self.0)(text, is_final)
        }
    }
    Arc::new(FnSink(f))
}
