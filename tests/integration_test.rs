// Copyright (c) 2024-2026 Voxline Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! Multi-module scenarios that exercise the full session orchestrator end to
//! end: an assembled `SessionDeps` driven by a mocked STT feed, a scripted
//! LLM provider, and a recording transport. Per-module unit tests already
//! cover codec round-trips, sentence segmentation, and webhook retry/mapping
//! in isolation — these confirm the modules still behave correctly wired
//! together through `start_session`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use voxline_core::{
    start_session, Agent, Call, CallDirection, ControlMessage, InMemoryTranscriptSink, RagContext,
    SessionDeps, TransportSink,
};
use voxline_model::{
    CompletionRequest, ConversationMessage, MockProvider, MockStep, ModelProvider, ProviderEventStream, Role,
};
use voxline_stt::MockSttClient;
use voxline_tools::{InMemoryFunctionCallLogStore, ReqwestWebhookTransport, ToolRegistry};
use voxline_tts::{AudioChunkStream, MockTtsProvider, TtsClient, TtsProvider};
use voxline_vectorstore::{InMemoryVectorStore, VectorRecord, VectorStore};

struct RecordingTransport {
    tx: mpsc::UnboundedSender<ControlMessage>,
    audio_chunks: AtomicUsize,
}

impl RecordingTransport {
    fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ControlMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx, audio_chunks: AtomicUsize::new(0) }), rx)
    }
}

#[async_trait]
impl TransportSink for RecordingTransport {
    async fn send_audio(&self, _pcm: Bytes) {
        self.audio_chunks.fetch_add(1, Ordering::SeqCst);
    }
    async fn send_message(&self, message: ControlMessage) {
        let _ = self.tx.send(message);
    }
}

fn feed_stt(
    sink: Arc<dyn voxline_stt::TranscriptSink>,
) -> (Box<dyn voxline_stt::SttClient>, mpsc::UnboundedSender<(String, bool)>) {
    let client = MockSttClient::new(sink);
    let feeder = client.feeder();
    (Box::new(client) as Box<dyn voxline_stt::SttClient>, feeder)
}

fn base_tools() -> Arc<ToolRegistry> {
    Arc::new(ToolRegistry::new(
        Vec::new(),
        Arc::new(InMemoryFunctionCallLogStore::new()),
        Arc::new(ReqwestWebhookTransport::default()),
    ))
}

/// Scenario 1 — greeting, no tools, no barge-in.
#[tokio::test]
async fn greeting_with_no_tools_produces_one_streamed_and_one_final_transcript() {
    let provider = MockProvider::new("mock", vec![MockStep::Text("Hello.")]);
    let tts = Arc::new(TtsClient::new(vec![Arc::new(MockTtsProvider::new(
        "mock",
        vec![Bytes::from_static(b"pcm-bytes")],
    ))]));
    let deps = SessionDeps {
        llm_provider: Arc::new(provider),
        tts,
        tools: base_tools(),
        rag: None,
        transcripts: Arc::new(InMemoryTranscriptSink::new()),
    };

    let (transport, mut rx) = RecordingTransport::new();
    let mut agent = Agent::default_agent();
    agent.system_prompt = "You are terse.".to_string();
    agent.tools_enabled = vec![];
    let call = Call::new("call-greeting", &agent.id, CallDirection::Browser);

    let feeder_slot: Arc<StdMutex<Option<mpsc::UnboundedSender<(String, bool)>>>> = Arc::new(StdMutex::new(None));
    let slot = feeder_slot.clone();
    let handle = start_session(
        call,
        Some(agent),
        deps,
        move |sink| {
            let (client, feeder) = feed_stt(sink);
            *slot.lock().unwrap() = Some(feeder);
            client
        },
        transport.clone(),
    )
    .await;

    assert!(matches!(rx.recv().await.unwrap(), ControlMessage::SessionStarted { .. }));

    let feeder = feeder_slot.lock().unwrap().clone().unwrap();
    feeder.send(("Hi".to_string(), true)).unwrap();

    assert!(matches!(rx.recv().await.unwrap(), ControlMessage::Transcript { role, .. } if role == "user"));

    let streamed = rx.recv().await.unwrap();
    assert!(matches!(&streamed, ControlMessage::Transcript { content, is_final: false, .. } if content == "Hello."));

    let finalized = rx.recv().await.unwrap();
    match finalized {
        ControlMessage::Transcript { role, content, is_final: true } => {
            assert_eq!(role, "assistant");
            assert_eq!(content, "Hello.");
        }
        other => panic!("expected final assistant transcript, got {other:?}"),
    }

    handle.session.notify_transport_closed("browser_disconnect");
    let ended = rx.recv().await.unwrap();
    match ended {
        ControlMessage::SessionEnded { reason, .. } => assert_eq!(reason, "browser_disconnect"),
        other => panic!("expected session_ended, got {other:?}"),
    }
    handle.task.await.unwrap();

    assert!(transport.audio_chunks.load(Ordering::SeqCst) > 0);
}

/// A TTS provider whose chunks arrive with a delay, so a barge-in test has a
/// window to interrupt mid-stream instead of racing a synchronous mock.
struct DelayedTtsProvider {
    name: String,
    chunk_count: usize,
    delay: Duration,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl TtsProvider for DelayedTtsProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn synthesize(&self, _text: &str, _voice_id: &str) -> anyhow::Result<AudioChunkStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.delay;
        let count = self.chunk_count;
        Ok(Box::pin(async_stream::stream! {
            for _ in 0..count {
                tokio::time::sleep(delay).await;
                yield Ok(Bytes::from_static(b"chunk"));
            }
        }))
    }
}

/// Scenario 2 — barge-in mid-sentence.
#[tokio::test]
async fn barge_in_aborts_remaining_sentences_and_carries_the_interrupting_text_into_the_next_turn() {
    let provider = MockProvider::new(
        "mock",
        vec![MockStep::Text("Thank you for calling. How can I help you today?")],
    );
    let synth_calls = Arc::new(AtomicUsize::new(0));
    let tts = Arc::new(TtsClient::new(vec![Arc::new(DelayedTtsProvider {
        name: "slow".to_string(),
        chunk_count: 2,
        delay: Duration::from_millis(30),
        calls: synth_calls.clone(),
    })]));
    let deps = SessionDeps {
        llm_provider: Arc::new(provider),
        tts,
        tools: base_tools(),
        rag: None,
        transcripts: Arc::new(InMemoryTranscriptSink::new()),
    };

    let (transport, mut rx) = RecordingTransport::new();
    let agent = Agent::default_agent();
    let call = Call::new("call-bargein", &agent.id, CallDirection::Browser);

    let feeder_slot: Arc<StdMutex<Option<mpsc::UnboundedSender<(String, bool)>>>> = Arc::new(StdMutex::new(None));
    let slot = feeder_slot.clone();
    let handle = start_session(
        call,
        Some(agent),
        deps,
        move |sink| {
            let (client, feeder) = feed_stt(sink);
            *slot.lock().unwrap() = Some(feeder);
            client
        },
        transport.clone(),
    )
    .await;

    assert!(matches!(rx.recv().await.unwrap(), ControlMessage::SessionStarted { .. }));

    let feeder = feeder_slot.lock().unwrap().clone().unwrap();
    feeder.send(("Hi".to_string(), true)).unwrap();

    assert!(matches!(rx.recv().await.unwrap(), ControlMessage::Transcript { role, .. } if role == "user"));
    assert!(matches!(rx.recv().await.unwrap(), ControlMessage::Transcript { is_final: false, .. }));

    // The assistant's first sentence is already queued for synthesis at this
    // point; interrupt before the second sentence starts.
    feeder.send(("Stop".to_string(), true)).unwrap();

    let turn_one_final = rx.recv().await.unwrap();
    match turn_one_final {
        ControlMessage::Transcript { role, content, is_final: true } => {
            assert_eq!(role, "assistant");
            assert_eq!(content, "Thank you for calling. How can I help you today?");
        }
        other => panic!("expected turn 1's full produced text, got {other:?}"),
    }

    // Only the first sentence was ever handed to the synthesizer — the
    // interrupt flag stopped the consumer before it reached the second.
    assert_eq!(synth_calls.load(Ordering::SeqCst), 1);

    let next_user_turn = rx.recv().await.unwrap();
    match next_user_turn {
        ControlMessage::Transcript { role, content, is_final: true } => {
            assert_eq!(role, "user");
            assert_eq!(content, "Stop");
        }
        other => panic!("expected the interrupting utterance to open the next turn, got {other:?}"),
    }

    handle.session.notify_transport_closed("browser_disconnect");
    handle.task.await.unwrap();
}

/// Captures the exact conversation handed to the model on its next call,
/// then delegates to a plain `MockProvider` for the scripted response.
struct SpyProvider {
    name: String,
    script: Vec<MockStep>,
    last_request: Arc<StdMutex<Option<Vec<ConversationMessage>>>>,
}

#[async_trait]
impl ModelProvider for SpyProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn stream(&self, req: CompletionRequest) -> anyhow::Result<ProviderEventStream> {
        *self.last_request.lock().unwrap() = Some(req.messages.clone());
        let inner = MockProvider::new(self.name.clone(), self.script.clone());
        inner.stream(CompletionRequest::new(req.model, req.messages)).await
    }
}

/// Scenario 6 — RAG injection.
#[tokio::test]
async fn rag_context_is_injected_as_a_system_message_immediately_before_the_user_turn() {
    let store = InMemoryVectorStore::new();
    store
        .upsert(
            vec![
                VectorRecord {
                    id: "c1".into(),
                    embedding: vec![1.0, 0.0],
                    text: "Pricing is $10/mo".into(),
                    metadata: serde_json::json!({}),
                },
                VectorRecord {
                    id: "c2".into(),
                    embedding: vec![0.9, 0.1],
                    text: "Annual plans get 2 months free".into(),
                    metadata: serde_json::json!({}),
                },
            ],
            "kb-1",
        )
        .await
        .unwrap();

    struct FixedEmbedder;
    #[async_trait]
    impl voxline_core::Embedder for FixedEmbedder {
        async fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }
    }

    let rag = RagContext {
        embedder: Arc::new(FixedEmbedder),
        vector_store: Arc::new(store),
        namespace: "kb-1".to_string(),
        top_k: 5,
    };

    let last_request = Arc::new(StdMutex::new(None));
    let provider = SpyProvider {
        name: "mock".to_string(),
        script: vec![MockStep::Text("It's ten dollars a month.")],
        last_request: last_request.clone(),
    };
    let tts = Arc::new(TtsClient::new(vec![Arc::new(MockTtsProvider::new("mock", vec![]))]));
    let deps = SessionDeps {
        llm_provider: Arc::new(provider),
        tts,
        tools: base_tools(),
        rag: Some(rag),
        transcripts: Arc::new(InMemoryTranscriptSink::new()),
    };

    let (transport, mut rx) = RecordingTransport::new();
    let agent = Agent::default_agent();
    let call = Call::new("call-rag", &agent.id, CallDirection::Browser);

    let feeder_slot: Arc<StdMutex<Option<mpsc::UnboundedSender<(String, bool)>>>> = Arc::new(StdMutex::new(None));
    let slot = feeder_slot.clone();
    let handle = start_session(
        call,
        Some(agent),
        deps,
        move |sink| {
            let (client, feeder) = feed_stt(sink);
            *slot.lock().unwrap() = Some(feeder);
            client
        },
        transport,
    )
    .await;

    assert!(matches!(rx.recv().await.unwrap(), ControlMessage::SessionStarted { .. }));

    let feeder = feeder_slot.lock().unwrap().clone().unwrap();
    feeder.send(("How much?".to_string(), true)).unwrap();

    assert!(matches!(rx.recv().await.unwrap(), ControlMessage::Transcript { role, .. } if role == "user"));
    assert!(matches!(rx.recv().await.unwrap(), ControlMessage::Transcript { is_final: false, .. }));
    assert!(matches!(rx.recv().await.unwrap(), ControlMessage::Transcript { is_final: true, .. }));

    let messages = last_request.lock().unwrap().clone().unwrap();
    assert_eq!(messages.last().unwrap().role, Role::User);
    assert_eq!(messages.last().unwrap().content, "How much?");

    let system_before_user = &messages[messages.len() - 2];
    assert_eq!(system_before_user.role, Role::System);
    assert!(system_before_user.content.contains("Pricing is $10/mo"));
    assert!(system_before_user.content.contains("Annual plans get 2 months free"));
    assert!(system_before_user.content.contains("\n\n---\n\n"));

    handle.session.notify_transport_closed("browser_disconnect");
    handle.task.await.unwrap();
}
