//! Connection parameters handed to backends.

use bon::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Wire flavour of an OpenAI-compatible chat endpoint.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ApiType {
    #[default]
    #[serde(alias = "open_ai")]
    OpenAi,
    Azure,
}

/// Connection parameters for a conventional (non-memory) participant.
#[derive(Debug, Clone, Builder, Serialize, Deserialize, PartialEq)]
pub struct LlmConfig {
    #[builder(into)]
    pub model: String,
    #[builder(into)]
    pub api_key: Option<String>,
    #[builder(into)]
    pub base_url: Option<String>,
    #[builder(default)]
    #[serde(default)]
    pub api_type: ApiType,
    #[builder(into)]
    pub api_version: Option<String>,
    pub seed: Option<u64>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub timeout_secs: Option<u64>,
}

/// Backend family behind a memory-augmented participant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EndpointType {
    OpenAi,
    Azure,
    LmStudio,
}

/// Prompt format used when talking to a raw completions endpoint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PromptWrapper {
    ChatMl,
}

/// Memory instructions template.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MemoryPreset {
    MemgptChat,
    Minimal,
}

/// Connection parameters for a memory-augmented participant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryLlmConfig {
    /// `None` lets a local server use whatever model it has loaded.
    pub model: Option<String>,
    pub context_window: usize,
    pub preset: MemoryPreset,
    pub model_wrapper: Option<PromptWrapper>,
    pub endpoint_type: EndpointType,
    pub endpoint: String,
    pub api_key: Option<String>,
    pub api_version: Option<String>,
    pub seed: Option<u64>,
    pub timeout_secs: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn builder_fills_defaults() {
        let config = LlmConfig::builder()
            .model("gpt-4")
            .api_key("sk-test")
            .seed(42)
            .build();
        assert_eq!(config.model, "gpt-4");
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.api_type, ApiType::OpenAi);
        assert!(config.base_url.is_none());
    }

    #[test]
    fn enums_parse_from_config_strings() {
        assert_eq!(ApiType::from_str("azure").unwrap(), ApiType::Azure);
        assert_eq!(EndpointType::from_str("lmstudio").unwrap(), EndpointType::LmStudio);
        assert_eq!(PromptWrapper::from_str("chatml").unwrap(), PromptWrapper::ChatMl);
        assert_eq!(
            MemoryPreset::from_str("memgpt_chat").unwrap(),
            MemoryPreset::MemgptChat
        );
        assert!(MemoryPreset::from_str("unknown").is_err());
    }
}
