// Copyright (c) 2024-2026 Voxline Contributors
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use bytes::Bytes;

use crate::events::ControlMessage;

/// The uniform surface a transport adapter (browser, telephony, SFU) gives
/// the session: outbound audio and outbound control messages. Implemented
/// by each adapter in `voxline-gateway`; the session never knows which
/// concrete transport it is talking to.
#[async_trait]
pub trait TransportSink: Send + Sync {
    async fn send_audio(&self, pcm: Bytes);
    async fn send_message(&self, message: ControlMessage);
}
