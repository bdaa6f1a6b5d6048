// Copyright (c) 2024-2026 Voxline Contributors
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::TranscriptSink;

/// Test double: `connect()` always succeeds (unless `fail_connect` is set),
/// `send_audio` is a no-op, and transcripts are delivered by feeding them
/// through `feed()` from the test driving the session.
pub struct MockSttClient {
    sink: Arc<dyn TranscriptSink>,
    connected: Arc<AtomicBool>,
    fail_connect: bool,
    feed_rx: Option<mpsc::UnboundedReceiver<(String, bool)>>,
    feed_tx: mpsc::UnboundedSender<(String, bool)>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl MockSttClient {
    pub fn new(sink: Arc<dyn TranscriptSink>) -> Self {
        let (feed_tx, feed_rx) = mpsc::unbounded_channel();
        Self {
            sink,
            connected: Arc::new(AtomicBool::new(false)),
            fail_connect: false,
            feed_rx: Some(feed_rx),
            feed_tx,
            task: None,
        }
    }

    pub fn failing(sink: Arc<dyn TranscriptSink>) -> Self {
        let mut c = Self::new(sink);
        c.fail_connect = true;
        c
    }

    /// Handle usable from a test to push a transcript as if the recognizer
    /// had produced it.
    pub fn feeder(&self) -> mpsc::UnboundedSender<(String, bool)> {
        self.feed_tx.clone()
    }
}

#[async_trait]
impl crate::SttClient for MockSttClient {
    async fn connect(&mut self) -> anyhow::Result<()> {
        if self.fail_connect {
            anyhow::bail!("mock STT connect failure");
        }
        self.connected.store(true, Ordering::SeqCst);
        let mut rx = self.feed_rx.take().expect("connect called twice");
        let sink = self.sink.clone();
        let connected = self.connected.clone();
        self.task = Some(tokio::spawn(async move {
            while let Some((text, is_final)) = rx.recv().await {
                if connected.load(Ordering::SeqCst) && !text.is_empty() {
                    sink.on_transcript(text, is_final).await;
                }
            }
        }));
        Ok(())
    }

    fn send_audio(&self, _frame: &[u8]) {
        // Mock: audio frames are not forwarded anywhere; tests drive
        // transcripts directly via `feeder()`.
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&mut self) {
        self.connected.store(false, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
