// Copyright (c) 2024-2026 Voxline Contributors
//
// SPDX-License-Identifier: Apache-2.0
pub mod domain;
pub mod error;
pub mod events;
pub mod persistence;
pub mod rag;
pub mod session;
pub mod transport;

pub use domain::{Agent, Call, CallDirection, CallStatus, TranscriptEntry, TranscriptRole};
pub use error::SessionError;
pub use events::ControlMessage;
pub use persistence::{InMemoryTranscriptSink, TranscriptEntrySink};
pub use rag::{retrieve_context, Embedder, RagContext, RestEmbedder};
pub use session::{start_session, SessionDeps, SessionHandle, SessionState, VoiceSession};
pub use transport::TransportSink;
