//! JSON config lists (`[{"model": ..., "api_key": ...}, ...]`).
//!
//! A list is read from an environment variable holding either the JSON
//! itself or the name of a file containing it.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::llm::{ApiType, LlmConfig};
use crate::error::ColloquyError;

/// Environment variable conventionally holding a config list.
pub const CONFIG_LIST_VAR: &str = "OAI_CONFIG_LIST";

/// One endpoint candidate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfigEntry {
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default, alias = "api_base")]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_type: Option<ApiType>,
    #[serde(default)]
    pub api_version: Option<String>,
}

impl ConfigEntry {
    pub fn to_llm_config(&self) -> LlmConfig {
        LlmConfig {
            model: self.model.clone(),
            api_key: self.api_key.clone(),
            base_url: self.base_url.clone(),
            api_type: self.api_type.unwrap_or_default(),
            api_version: self.api_version.clone(),
            seed: None,
            temperature: None,
            max_tokens: None,
            timeout_secs: None,
        }
    }
}

/// Ordered list of endpoint candidates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigList {
    entries: Vec<ConfigEntry>,
}

impl ConfigList {
    pub fn from_json(json: &str) -> Result<Self, ColloquyError> {
        let entries: Vec<ConfigEntry> = serde_json::from_str(json)?;
        Ok(Self { entries })
    }

    /// Resolve a raw value: inline JSON if it parses, otherwise a file name
    /// relative to `file_location`.
    pub fn from_value(value: &str, file_location: &Path) -> Result<Self, ColloquyError> {
        if let Ok(list) = Self::from_json(value) {
            return Ok(list);
        }
        let path = file_location.join(value.trim());
        let raw = std::fs::read_to_string(&path).map_err(|e| {
            ColloquyError::Configuration(format!(
                "config list is neither JSON nor a readable file ({}): {e}",
                path.display()
            ))
        })?;
        Self::from_json(&raw)
    }

    /// Keep only entries whose model is in `models`. An empty filter keeps all.
    pub fn filter_models(self, models: &[&str]) -> Self {
        if models.is_empty() {
            return self;
        }
        let entries = self
            .entries
            .into_iter()
            .filter(|e| models.contains(&e.model.as_str()))
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[ConfigEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The first entry as an [`LlmConfig`].
    pub fn first(&self) -> Result<LlmConfig, ColloquyError> {
        self.entries
            .first()
            .map(ConfigEntry::to_llm_config)
            .ok_or_else(|| ColloquyError::Configuration("config list has no usable entries".into()))
    }
}
