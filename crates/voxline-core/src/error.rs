// Copyright (c) 2024-2026 Voxline Contributors
//
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

/// One variant per distinguishable session-level failure, in the same
/// `thiserror` style the rest of the workspace uses for its own typed
/// errors (one enum per crate boundary, `anyhow::Result` everywhere else).
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to connect STT recognizer: {0}")]
    SttConnectFailed(String),

    #[error("no agent configured and no default available")]
    NoAgent,
}
