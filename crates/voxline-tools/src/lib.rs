// Copyright (c) 2024-2026 Voxline Contributors
//
// SPDX-License-Identifier: Apache-2.0
pub mod builtin;
pub mod jsonpath;
pub mod registry;
pub mod types;
pub mod webhook;

pub use jsonpath::eval_dotted_path;
pub use registry::{FunctionCallLogStore, InMemoryFunctionCallLogStore, ToolRegistry};
pub use types::{
    CustomFunction, FunctionCallLog, FunctionCallStatus, HttpMethod, PayloadMode, RecentMessage,
};
pub use webhook::{execute_custom_function, ReqwestWebhookTransport, WebhookTransport};
