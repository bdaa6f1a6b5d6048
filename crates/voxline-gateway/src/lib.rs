// Copyright (c) 2024-2026 Voxline Contributors
//
// SPDX-License-Identifier: Apache-2.0
pub mod browser;
pub mod sfu;
pub mod telephony;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use voxline_core::{Agent, Call, SessionHandle, TransportSink};

/// Builds and starts a session for a newly-accepted transport connection.
/// Supplied by the binary wiring STT/LLM/TTS/tool dependencies together —
/// the gateway itself never constructs a `SessionDeps`.
pub type SessionFactory = Arc<
    dyn Fn(Call, Option<Agent>, Arc<dyn TransportSink>) -> Pin<Box<dyn Future<Output = SessionHandle> + Send>>
        + Send
        + Sync,
>;

pub use browser::{browser_ws_handler, BrowserGatewayState};
pub use sfu::{RoomManager, RoomToken, SfuConfig};
pub use telephony::{telephony_ws_handler, CallResolver, ResolvedCall, TelephonyGatewayState};
