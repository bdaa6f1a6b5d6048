// Copyright (c) 2024-2026 Voxline Contributors
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn, Instrument};

use voxline_model::{stream_completion, CompletionRequest, ConversationMessage, LlmEvent, ModelProvider, Role};
use voxline_stt::{SttClient, TranscriptSink};
use voxline_tools::{RecentMessage, ToolRegistry};
use voxline_tts::TtsClient;

use crate::domain::{Agent, Call, CallStatus, TranscriptEntry, TranscriptRole};
use crate::events::ControlMessage;
use crate::persistence::TranscriptEntrySink;
use crate::rag::{retrieve_context, RagContext};
use crate::transport::TransportSink;

/// Superstates of the per-call state machine. `Init` never appears as a
/// live value — by the time `start_session` returns a handle the session
/// is already past it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Loading,
    Listening,
    Thinking,
    Speaking,
    Ended,
}

/// Filler text spoken while a custom tool with `speak_during_execution` is
/// running. The data model only carries a boolean flag, not custom copy, so
/// this one phrase stands in for all of them — recorded as a deliberate
/// simplification in `DESIGN.md`.
const FILLER_SPEECH: &str = "One moment please...";

/// How long to hold the TTS consumer's interrupt flag after a tool finishes
/// so any in-flight filler-speech chunk stops before the next sentence is
/// queued, without lingering long enough to eat into the tool's own reply.
const FILLER_INTERRUPT_SETTLE: Duration = Duration::from_millis(150);

enum ControlSignal {
    TransportClosed(String),
}

/// Bridges the STT client's callback-shaped `TranscriptSink` into a plain
/// channel the orchestrator's single-owner run loop can `select!` over —
/// the orchestrator never hands STT an `Arc` back to itself, so there is no
/// ownership cycle between the two (the concrete realization of the
/// interface the session "implements": here, the channel's sender IS the
/// session's inbound transcript port).
struct ChannelTranscriptSink {
    tx: mpsc::UnboundedSender<(String, bool)>,
}

#[async_trait]
impl TranscriptSink for ChannelTranscriptSink {
    async fn on_transcript(&self, text: String, is_final: bool) {
        let _ = self.tx.send((text, is_final));
    }
}

/// Handle a transport adapter holds onto a running session: feed audio in,
/// signal transport close.
pub struct VoiceSession {
    stt: Arc<Mutex<Box<dyn SttClient>>>,
    control_tx: mpsc::UnboundedSender<ControlSignal>,
}

impl VoiceSession {
    /// Non-blocking: if the STT mutex is momentarily held by the connect
    /// step or a concurrent frame, the frame is dropped silently rather
    /// than backing up the transport's read loop.
    pub fn handle_audio(&self, frame: &[u8]) {
        if let Ok(guard) = self.stt.try_lock() {
            guard.send_audio(frame);
        }
    }

    /// `reason` is adapter-specific (e.g. `"browser_disconnect"`,
    /// `"twilio_disconnect"`) — each transport knows what its own close
    /// means and supplies it rather than the orchestrator guessing one
    /// generic reason for every wire protocol.
    pub fn notify_transport_closed(&self, reason: &str) {
        let _ = self.control_tx.send(ControlSignal::TransportClosed(reason.to_string()));
    }
}

pub struct SessionHandle {
    pub session: Arc<VoiceSession>,
    pub task: tokio::task::JoinHandle<()>,
}

/// Everything a session needs besides the call/agent/transport it's wired
/// to for one specific call.
pub struct SessionDeps {
    pub llm_provider: Arc<dyn ModelProvider>,
    pub tts: Arc<TtsClient>,
    pub tools: Arc<ToolRegistry>,
    pub rag: Option<RagContext>,
    pub transcripts: Arc<dyn TranscriptEntrySink>,
}

/// Starts a session for `call`, snapshotting `agent` (or the default agent
/// if none resolved). `stt_factory` builds the recognizer from the
/// session's transcript sink — it runs synchronously, before the session
/// task is spawned, so callers that need a handle into the concrete STT
/// client (tests using `MockSttClient::feeder`) can stash one out of the
/// closure.
pub async fn start_session(
    call: Call,
    agent: Option<Agent>,
    deps: SessionDeps,
    stt_factory: impl FnOnce(Arc<dyn TranscriptSink>) -> Box<dyn SttClient>,
    transport: Arc<dyn TransportSink>,
) -> SessionHandle {
    let (transcript_tx, transcript_rx) = mpsc::unbounded_channel();
    let sink: Arc<dyn TranscriptSink> = Arc::new(ChannelTranscriptSink { tx: transcript_tx });
    let stt_client = stt_factory(sink);
    let stt = Arc::new(Mutex::new(stt_client));

    let (control_tx, control_rx) = mpsc::unbounded_channel();
    let session = Arc::new(VoiceSession {
        stt: stt.clone(),
        control_tx,
    });

    let span = tracing::info_span!("call", call_id = %call.id);
    let task = tokio::spawn(
        run_loop(call, agent, deps, stt, transcript_rx, control_rx, transport).instrument(span),
    );

    SessionHandle { session, task }
}

async fn run_loop(
    mut call: Call,
    agent: Option<Agent>,
    deps: SessionDeps,
    stt: Arc<Mutex<Box<dyn SttClient>>>,
    mut transcript_rx: mpsc::UnboundedReceiver<(String, bool)>,
    mut control_rx: mpsc::UnboundedReceiver<ControlSignal>,
    transport: Arc<dyn TransportSink>,
) {
    let agent = agent.unwrap_or_else(Agent::default_agent);
    let mut conversation = vec![ConversationMessage::system(agent.system_prompt.clone())];
    call.status = CallStatus::InProgress;

    {
        let mut guard = stt.lock().await;
        if let Err(e) = guard.connect().await {
            warn!(error = %e, "STT failed to connect; session aborting");
            transport
                .send_message(ControlMessage::Error {
                    message: format!("failed to start listening: {e}"),
                })
                .await;
            call.end(CallStatus::Failed, "stt_connect_failed");
            return;
        }
    }

    transport
        .send_message(ControlMessage::SessionStarted { agent: agent.id.clone() })
        .await;
    info!("session started");

    let interrupt_tts = Arc::new(AtomicBool::new(false));
    let (turn_done_tx, mut turn_done_rx) = mpsc::unbounded_channel::<TurnResult>();
    let mut turn_active = false;
    let mut pending_user_text: Option<String> = None;

    loop {
        tokio::select! {
            biased;

            Some(signal) = control_rx.recv() => {
                match signal {
                    ControlSignal::TransportClosed(reason) => {
                        interrupt_tts.store(true, Ordering::SeqCst);
                        if turn_active {
                            if let Some(result) = turn_done_rx.recv().await {
                                conversation = result.conversation;
                            }
                        }
                        end_session(&mut call, &stt, &transport, reason).await;
                        return;
                    }
                }
            }

            Some((text, is_final)) = transcript_rx.recv() => {
                if !is_final || text.is_empty() {
                    continue;
                }
                if turn_active {
                    // Barge-in: interrupt the in-flight turn; its own
                    // wind-down persists whatever was already produced.
                    interrupt_tts.store(true, Ordering::SeqCst);
                    pending_user_text = Some(text);
                    continue;
                }
                turn_active = true;
                spawn_turn(
                    &mut conversation,
                    text,
                    &call.id,
                    &agent,
                    &deps,
                    interrupt_tts.clone(),
                    transport.clone(),
                    turn_done_tx.clone(),
                );
            }

            Some(result) = turn_done_rx.recv(), if turn_active => {
                turn_active = false;
                interrupt_tts.store(false, Ordering::SeqCst);
                match result.outcome {
                    TurnOutcome::Ended { reason } => {
                        conversation = result.conversation;
                        end_session(&mut call, &stt, &transport, reason).await;
                        return;
                    }
                    TurnOutcome::Continued => {
                        conversation = result.conversation;
                    }
                }
                if let Some(text) = pending_user_text.take() {
                    turn_active = true;
                    spawn_turn(
                        &mut conversation,
                        text,
                        &call.id,
                        &agent,
                        &deps,
                        interrupt_tts.clone(),
                        transport.clone(),
                        turn_done_tx.clone(),
                    );
                }
            }
        }
    }
}

async fn end_session(
    call: &mut Call,
    stt: &Arc<Mutex<Box<dyn SttClient>>>,
    transport: &Arc<dyn TransportSink>,
    reason: impl Into<String>,
) {
    let reason = reason.into();
    call.end(CallStatus::Completed, reason.clone());
    stt.lock().await.close().await;
    transport
        .send_message(ControlMessage::SessionEnded {
            reason,
            duration: call.duration_seconds.unwrap_or(0),
        })
        .await;
    info!("session ended");
}

struct TurnResult {
    conversation: Vec<ConversationMessage>,
    outcome: TurnOutcome,
}

enum TurnOutcome {
    Continued,
    Ended { reason: String },
}

fn spawn_turn(
    conversation: &mut Vec<ConversationMessage>,
    user_text: String,
    call_id: &str,
    agent: &Agent,
    deps: &SessionDeps,
    interrupt_tts: Arc<AtomicBool>,
    transport: Arc<dyn TransportSink>,
    done_tx: mpsc::UnboundedSender<TurnResult>,
) {
    conversation.push(ConversationMessage::user(user_text.clone()));
    let conversation = conversation.clone();
    let call_id = call_id.to_string();
    let agent = agent.clone();
    let llm_provider = deps.llm_provider.clone();
    let tts = deps.tts.clone();
    let tools = deps.tools.clone();
    let rag = deps.rag.clone();
    let transcripts = deps.transcripts.clone();

    tokio::spawn(async move {
        transcripts
            .record(TranscriptEntry::new(&call_id, TranscriptRole::User, &user_text))
            .await;
        transport
            .send_message(ControlMessage::Transcript {
                role: "user".to_string(),
                content: user_text,
                is_final: true,
            })
            .await;

        let result = run_turn(
            conversation,
            call_id,
            agent,
            llm_provider,
            tools,
            tts,
            rag,
            transcripts,
            interrupt_tts,
            transport,
        )
        .await;
        let _ = done_tx.send(result);
    });
}

#[allow(clippy::too_many_arguments)]
async fn run_turn(
    mut conversation: Vec<ConversationMessage>,
    call_id: String,
    agent: Agent,
    llm_provider: Arc<dyn ModelProvider>,
    tools: Arc<ToolRegistry>,
    tts: Arc<TtsClient>,
    rag: Option<RagContext>,
    transcripts: Arc<dyn TranscriptEntrySink>,
    interrupt_tts: Arc<AtomicBool>,
    transport: Arc<dyn TransportSink>,
) -> TurnResult {
    if let Some(rag) = &rag {
        if let Some(user_text) = conversation.last().map(|m| m.content.clone()) {
            match retrieve_context(rag, &user_text).await {
                Ok(Some(context)) => {
                    let insert_at = conversation.len().saturating_sub(1);
                    conversation.insert(insert_at, ConversationMessage::system(context));
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "RAG retrieval failed; continuing without context"),
            }
        }
    }

    let tool_defs = tools.definitions_for(&agent.tools_enabled);
    let request = CompletionRequest::new(agent.llm_model.clone(), conversation.clone()).with_tools(tool_defs);
    let mut llm_stream = stream_completion(llm_provider, request).await;

    let (tts_tx, tts_rx) = mpsc::channel::<String>(16);
    let tts_handle = spawn_tts_consumer(tts, agent.voice_id.clone(), tts_rx, interrupt_tts.clone(), transport.clone());

    let mut full_response = String::new();
    let mut sentence_buffer = String::new();
    let mut ended: Option<String> = None;

    while let Some(event) = llm_stream.next().await {
        match event {
            LlmEvent::TextDelta(delta) => {
                full_response.push_str(&delta);
                sentence_buffer.push_str(&delta);
                transport
                    .send_message(ControlMessage::Transcript {
                        role: "assistant".to_string(),
                        content: delta,
                        is_final: false,
                    })
                    .await;
                for sentence in extract_complete_sentences(&mut sentence_buffer) {
                    if tts_tx.send(sentence).await.is_err() {
                        break;
                    }
                }
            }
            LlmEvent::ToolCall { name, arguments } => {
                let trimmed = sentence_buffer.trim().to_string();
                if !trimmed.is_empty() {
                    let _ = tts_tx.send(std::mem::take(&mut sentence_buffer)).await;
                } else {
                    sentence_buffer.clear();
                }

                let speaking_filler = tools.wants_filler_speech(&name);
                if speaking_filler {
                    let _ = tts_tx.send(FILLER_SPEECH.to_string()).await;
                }

                let recents = recent_messages(&conversation);
                let result = tools.execute(&call_id, &name, arguments.clone(), &recents).await;

                if speaking_filler {
                    interrupt_tts.store(true, Ordering::SeqCst);
                    tokio::time::sleep(FILLER_INTERRUPT_SETTLE).await;
                    interrupt_tts.store(false, Ordering::SeqCst);
                }

                transport
                    .send_message(ControlMessage::ToolCall {
                        name: name.clone(),
                        arguments,
                        result: result.clone(),
                    })
                    .await;

                if result.get("action").and_then(Value::as_str) == Some("end_call") {
                    let reason = result
                        .get("reason")
                        .and_then(Value::as_str)
                        .unwrap_or("unspecified")
                        .to_string();
                    ended = Some(reason);
                    break;
                }

                if let Some(speak_failure) = result.get("_speak_on_failure").and_then(Value::as_str) {
                    let _ = tts_tx.send(speak_failure.to_string()).await;
                }

                conversation.push(ConversationMessage::assistant(format!("[Called {name}]")));
                conversation.push(ConversationMessage::user(format!("Tool result: {result}")));
            }
            LlmEvent::Done => {
                if !sentence_buffer.trim().is_empty() {
                    let _ = tts_tx.send(std::mem::take(&mut sentence_buffer)).await;
                }
                break;
            }
        }
    }

    drop(tts_tx);
    let _ = tts_handle.await;

    if !full_response.is_empty() {
        transcripts
            .record(TranscriptEntry::new(&call_id, TranscriptRole::Assistant, &full_response))
            .await;
        conversation.push(ConversationMessage::assistant(full_response.clone()));
        transport
            .send_message(ControlMessage::Transcript {
                role: "assistant".to_string(),
                content: full_response,
                is_final: true,
            })
            .await;
    }

    TurnResult {
        conversation,
        outcome: match ended {
            Some(reason) => TurnOutcome::Ended { reason },
            None => TurnOutcome::Continued,
        },
    }
}

fn spawn_tts_consumer(
    tts: Arc<TtsClient>,
    voice_id: String,
    mut rx: mpsc::Receiver<String>,
    interrupt_tts: Arc<AtomicBool>,
    transport: Arc<dyn TransportSink>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(sentence) = rx.recv().await {
            if interrupt_tts.load(Ordering::SeqCst) {
                break;
            }
            let mut chunks = tts.synthesize(&sentence, &voice_id).await;
            while let Some(chunk) = chunks.next().await {
                match chunk {
                    Ok(bytes) => {
                        transport.send_audio(bytes).await;
                        if interrupt_tts.load(Ordering::SeqCst) {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "TTS chunk delivery failed");
                        break;
                    }
                }
            }
            if interrupt_tts.load(Ordering::SeqCst) {
                break;
            }
        }
    })
}

fn recent_messages(conversation: &[ConversationMessage]) -> Vec<RecentMessage> {
    conversation
        .iter()
        .filter(|m| matches!(m.role, Role::User | Role::Assistant))
        .map(|m| RecentMessage {
            role: match m.role {
                Role::User => "user".to_string(),
                Role::Assistant => "assistant".to_string(),
                _ => unreachable!(),
            },
            content: m.content.clone(),
        })
        .collect()
}

/// Extracts sentences whose terminator (`.`, `!`, `?`, `:`) is followed by
/// whitespace still inside the buffer. A terminator at the literal end of
/// the buffer is NOT treated as complete — more text may still be coming in
/// the next delta (`"3."` followed by `"14"` must not split as `"3."` +
/// `"14"`). The true tail is flushed unconditionally when the LLM stream
/// reaches `done`.
fn extract_complete_sentences(buffer: &mut String) -> Vec<String> {
    let chars: Vec<(usize, char)> = buffer.char_indices().collect();
    let mut boundaries = Vec::new();
    for i in 0..chars.len() {
        let (byte_idx, c) = chars[i];
        if matches!(c, '.' | '!' | '?' | ':') {
            if let Some((_, next)) = chars.get(i + 1) {
                if next.is_whitespace() {
                    boundaries.push(byte_idx + c.len_utf8());
                }
            }
        }
    }
    if boundaries.is_empty() {
        return Vec::new();
    }
    let mut sentences = Vec::new();
    let mut start = 0;
    for end in boundaries {
        sentences.push(buffer[start..end].trim().to_string());
        start = end;
    }
    let remainder = buffer[start..].to_string();
    *buffer = remainder;
    sentences.into_iter().filter(|s| !s.is_empty()).collect()
}
