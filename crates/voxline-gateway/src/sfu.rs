// Copyright (c) 2024-2026 Voxline Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! Thin room-lifecycle integration for the SFU transport path.
//!
//! The SFU path does not drive `VoiceSession` — the room's own STT/LLM/TTS
//! binding replaces C2–C4 entirely, so there is nothing here for this crate
//! to bridge. What a caller needs instead is a signed access token for the
//! room and a way to create/list rooms tagged with `{agent_id, call_id}`
//! metadata, so an external agent worker can pick the call up. Everything
//! beyond that (media transport, the worker itself) is out of scope.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::json;

pub struct SfuConfig {
    pub rest_base_url: String,
    pub api_key: String,
    pub api_secret: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct RoomGrant {
    iss: String,
    sub: String,
    exp: u64,
    video: VideoGrant,
}

#[derive(Debug, Serialize, Deserialize)]
struct VideoGrant {
    room: String,
    #[serde(rename = "roomJoin")]
    room_join: bool,
    #[serde(rename = "canPublish")]
    can_publish: bool,
    #[serde(rename = "canSubscribe")]
    can_subscribe: bool,
}

pub struct RoomToken {
    pub room_name: String,
    pub jwt: String,
}

pub struct RoomManager {
    config: SfuConfig,
    client: reqwest::Client,
}

impl RoomManager {
    pub fn new(config: SfuConfig) -> Self {
        Self { config, client: reqwest::Client::new() }
    }

    /// Mints a room access token valid for `ttl`, scoped to one identity.
    /// Grant shape matches the room-server convention of a `video` claim
    /// carrying room name and publish/subscribe permissions.
    pub fn mint_token(&self, room_name: &str, identity: &str, ttl: Duration) -> anyhow::Result<RoomToken> {
        let exp = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() + ttl.as_secs();
        let grant = RoomGrant {
            iss: self.config.api_key.clone(),
            sub: identity.to_string(),
            exp,
            video: VideoGrant {
                room: room_name.to_string(),
                room_join: true,
                can_publish: true,
                can_subscribe: true,
            },
        };
        let jwt = encode(
            &Header::default(),
            &grant,
            &EncodingKey::from_secret(self.config.api_secret.as_bytes()),
        )?;
        Ok(RoomToken { room_name: room_name.to_string(), jwt })
    }

    /// Creates a room tagged with `{agent_id, call_id}` metadata so the
    /// external agent worker that joins can resolve which engine-side agent
    /// configuration and call record it belongs to.
    pub async fn create_room(&self, room_name: &str, agent_id: &str, call_id: &str) -> anyhow::Result<()> {
        let metadata = json!({ "agent_id": agent_id, "call_id": call_id }).to_string();
        self.client
            .post(format!("{}/twirp/livekit.RoomService/CreateRoom", self.config.rest_base_url))
            .bearer_auth(&self.config.api_key)
            .json(&json!({ "name": room_name, "metadata": metadata }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    pub async fn list_rooms(&self) -> anyhow::Result<Vec<String>> {
        let resp: serde_json::Value = self
            .client
            .post(format!("{}/twirp/livekit.RoomService/ListRooms", self.config.rest_base_url))
            .bearer_auth(&self.config.api_key)
            .json(&json!({}))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let names = resp["rooms"]
            .as_array()
            .map(|rooms| {
                rooms
                    .iter()
                    .filter_map(|r| r["name"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        Ok(names)
    }
}
