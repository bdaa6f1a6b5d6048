// Copyright (c) 2024-2026 Voxline Contributors
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;

use voxline_config::LlmConfig;

use crate::anthropic::AnthropicProvider;
use crate::google::GoogleProvider;
use crate::openai_compat::OpenAiCompatProvider;
use crate::ModelProvider;

/// Select a provider purely from the model name prefix. Kept data-driven
/// (one match arm per family) per the design note that provider selection
/// should be a simple dispatch table, not a branching decision tree spread
/// across the codebase.
pub fn provider_for_model(model: &str, config: &LlmConfig) -> Arc<dyn ModelProvider> {
    if model.starts_with("claude") {
        Arc::new(AnthropicProvider::new(
            config.anthropic_api_key.clone(),
            config.anthropic_base_url.clone(),
        ))
    } else if model.starts_with("deepseek") {
        Arc::new(OpenAiCompatProvider::deepseek(config.deepseek_api_key.clone()))
    } else if model.starts_with("gemini") {
        Arc::new(GoogleProvider::new(config.google_api_key.clone()))
    } else if model.starts_with("llama") || model.starts_with("mixtral") {
        Arc::new(OpenAiCompatProvider::groq(config.groq_api_key.clone()))
    } else {
        Arc::new(OpenAiCompatProvider::openai(
            config.openai_api_key.clone(),
            config.openai_base_url.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> LlmConfig {
        LlmConfig::default()
    }

    #[test]
    fn claude_prefix_selects_anthropic() {
        assert_eq!(provider_for_model("claude-3-5-sonnet-20241022", &cfg()).name(), "anthropic");
    }

    #[test]
    fn deepseek_prefix_selects_deepseek() {
        assert_eq!(provider_for_model("deepseek-chat", &cfg()).name(), "deepseek");
    }

    #[test]
    fn gemini_prefix_selects_google() {
        assert_eq!(provider_for_model("gemini-1.5-pro", &cfg()).name(), "google");
    }

    #[test]
    fn llama_prefix_selects_groq() {
        assert_eq!(provider_for_model("llama-3.1-70b-versatile", &cfg()).name(), "groq");
    }

    #[test]
    fn mixtral_prefix_selects_groq() {
        assert_eq!(provider_for_model("mixtral-8x7b-32768", &cfg()).name(), "groq");
    }

    #[test]
    fn unrecognized_prefix_falls_back_to_openai() {
        assert_eq!(provider_for_model("gpt-4o-mini", &cfg()).name(), "openai");
        assert_eq!(provider_for_model("some-custom-model", &cfg()).name(), "openai");
    }
}
