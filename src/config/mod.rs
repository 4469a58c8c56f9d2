//! Configuration system (layered: code > env > config file).
//!
//! [`ColloquyConfig`] is plain data. It is assembled once at start-up and
//! passed explicitly to whatever builds participants; nothing reads the
//! environment after that.

pub mod config_list;
pub mod llm;

pub use config_list::{ConfigEntry, ConfigList, CONFIG_LIST_VAR};
pub use llm::{ApiType, EndpointType, LlmConfig, MemoryLlmConfig, MemoryPreset, PromptWrapper};

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::ColloquyError;
use crate::models;

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_LOCAL_ENDPOINT: &str = "http://localhost:1234";

/// Which family of endpoints participants talk to.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BackendKind {
    #[default]
    OpenAi,
    Azure,
    Local,
}

/// Start-up configuration for colloquy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ColloquyConfig {
    pub backend: BackendKind,
    pub model: String,
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub azure_api_key: Option<String>,
    pub azure_api_version: Option<String>,
    pub azure_endpoint: Option<String>,
    pub local_endpoint: String,
    pub local_context_window: usize,
    pub local_model_wrapper: Option<PromptWrapper>,
    /// Inline JSON or file name of a config list; overrides the OpenAI key/model pair.
    pub config_list: Option<String>,
    pub seed: Option<u64>,
    pub temperature: Option<f64>,
    pub timeout_secs: Option<u64>,
    pub memory_preset: MemoryPreset,
    pub memory_dir: Option<PathBuf>,
}

impl Default for ColloquyConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::OpenAi,
            model: "gpt-4".to_string(),
            openai_api_key: None,
            openai_base_url: None,
            azure_api_key: None,
            azure_api_version: None,
            azure_endpoint: None,
            local_endpoint: DEFAULT_LOCAL_ENDPOINT.to_string(),
            local_context_window: models::DEFAULT_CONTEXT_WINDOW,
            local_model_wrapper: Some(PromptWrapper::ChatMl),
            config_list: None,
            seed: Some(42),
            temperature: None,
            timeout_secs: None,
            memory_preset: MemoryPreset::MemgptChat,
            memory_dir: None,
        }
    }
}

impl ColloquyConfig {
    /// Load from environment variables (and `.env` if present) over defaults.
    pub fn from_env() -> Result<Self, ColloquyError> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load a TOML file, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self, ColloquyError> {
        let _ = dotenvy::dotenv();
        let raw = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml(&raw)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load the default config file when it exists, environment otherwise.
    pub fn discover() -> Result<Self, ColloquyError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Self::from_env(),
        }
    }

    pub fn from_toml(raw: &str) -> Result<Self, ColloquyError> {
        Ok(toml::from_str(raw)?)
    }

    /// `<config dir>/colloquy/config.toml`, when a home directory is known.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "colloquy")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Apply environment overrides read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ColloquyError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(backend) = get("COLLOQUY_BACKEND") {
            self.backend = BackendKind::from_str(backend.trim()).map_err(|_| {
                ColloquyError::Configuration(format!(
                    "unknown COLLOQUY_BACKEND '{backend}' (expected openai, azure or local)"
                ))
            })?;
        }
        if let Some(model) = get("COLLOQUY_MODEL") {
            self.model = model;
        }
        // OAI_OPENAI_KEY_VAR wins over the conventional OPENAI_API_KEY.
        if let Some(key) = get("OAI_OPENAI_KEY_VAR").or_else(|| get("OPENAI_API_KEY")) {
            self.openai_api_key = Some(key);
        }
        if let Some(url) = get("OPENAI_BASE_URL") {
            self.openai_base_url = Some(url);
        }
        if let Some(key) = get("AZURE_OPENAI_KEY") {
            self.azure_api_key = Some(key);
        }
        if let Some(version) = get("AZURE_OPENAI_VERSION") {
            self.azure_api_version = Some(version);
        }
        if let Some(endpoint) = get("AZURE_OPENAI_ENDPOINT") {
            self.azure_endpoint = Some(endpoint);
        }
        if let Some(endpoint) = get("LOCAL_LLM_ENDPOINT") {
            self.local_endpoint = endpoint;
        }
        if let Some(list) = get(CONFIG_LIST_VAR) {
            self.config_list = Some(list);
        }
        if let Some(dir) = get("COLLOQUY_MEMORY_DIR") {
            self.memory_dir = Some(PathBuf::from(dir));
        }
        Ok(())
    }

    /// Connection parameters for conventional participants.
    pub fn llm_config(&self) -> Result<LlmConfig, ColloquyError> {
        let mut config = match self.backend {
            BackendKind::OpenAi => match &self.config_list {
                Some(raw) => ConfigList::from_value(raw, Path::new("."))?
                    .filter_models(&[self.model.as_str()])
                    .first()?,
                None => {
                    let api_key = self.openai_api_key.clone().ok_or_else(|| {
                        ColloquyError::missing(["OAI_OPENAI_KEY_VAR", "OPENAI_API_KEY"])
                    })?;
                    LlmConfig::builder()
                        .model(self.model.clone())
                        .api_key(api_key)
                        .maybe_base_url(self.openai_base_url.clone())
                        .build()
                }
            },
            BackendKind::Azure => {
                let (api_key, api_version, endpoint) = self.azure_credentials()?;
                LlmConfig::builder()
                    .model(self.model.clone())
                    .api_key(api_key)
                    .api_type(ApiType::Azure)
                    .api_version(api_version)
                    .base_url(endpoint)
                    .build()
            }
            // Local servers ignore model and key.
            BackendKind::Local => LlmConfig::builder()
                .model("NULL")
                .api_key("NULL")
                .base_url(format!("{}/v1", self.local_endpoint.trim_end_matches('/')))
                .build(),
        };
        config.seed = self.seed;
        config.temperature = self.temperature;
        config.timeout_secs = self.timeout_secs;
        Ok(config)
    }

    /// Connection parameters for memory-augmented participants.
    pub fn memory_llm_config(&self) -> Result<MemoryLlmConfig, ColloquyError> {
        let config = match self.backend {
            BackendKind::OpenAi => {
                let missing = || ColloquyError::missing(["OAI_OPENAI_KEY_VAR", "OPENAI_API_KEY"]);
                // An explicit key wins; otherwise borrow the config-list entry.
                let (api_key, base_url, endpoint_type, api_version) =
                    match (&self.openai_api_key, &self.config_list) {
                        (Some(key), _) => {
                            (key.clone(), self.openai_base_url.clone(), EndpointType::OpenAi, None)
                        }
                        (None, Some(_)) => {
                            let entry = self.llm_config()?;
                            let endpoint_type = match entry.api_type {
                                ApiType::OpenAi => EndpointType::OpenAi,
                                ApiType::Azure => EndpointType::Azure,
                            };
                            let api_key = entry.api_key.ok_or_else(missing)?;
                            (api_key, entry.base_url, endpoint_type, entry.api_version)
                        }
                        (None, None) => return Err(missing()),
                    };
                MemoryLlmConfig {
                    model: Some(self.model.clone()),
                    context_window: models::context_window_or_default(&self.model),
                    preset: self.memory_preset,
                    model_wrapper: None,
                    endpoint_type,
                    endpoint: base_url.unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
                    api_key: Some(api_key),
                    api_version,
                    seed: self.seed,
                    timeout_secs: self.timeout_secs,
                }
            }
            BackendKind::Azure => {
                let (api_key, api_version, endpoint) = self.azure_credentials()?;
                MemoryLlmConfig {
                    model: Some(self.model.clone()),
                    context_window: models::context_window_or_default(&self.model),
                    preset: self.memory_preset,
                    model_wrapper: None,
                    endpoint_type: EndpointType::Azure,
                    endpoint,
                    api_key: Some(api_key),
                    api_version: Some(api_version),
                    seed: self.seed,
                    timeout_secs: self.timeout_secs,
                }
            }
            BackendKind::Local => MemoryLlmConfig {
                model: None,
                context_window: self.local_context_window,
                preset: self.memory_preset,
                model_wrapper: self.local_model_wrapper,
                endpoint_type: EndpointType::LmStudio,
                endpoint: self.local_endpoint.clone(),
                api_key: None,
                api_version: None,
                seed: self.seed,
                timeout_secs: self.timeout_secs,
            },
        };
        Ok(config)
    }

    /// Directory where memory-augmented participants persist their state.
    pub fn memory_dir(&self) -> PathBuf {
        self.memory_dir.clone().unwrap_or_else(default_memory_dir)
    }

    fn azure_credentials(&self) -> Result<(String, String, String), ColloquyError> {
        match (
            &self.azure_api_key,
            &self.azure_api_version,
            &self.azure_endpoint,
        ) {
            (Some(key), Some(version), Some(endpoint)) => {
                Ok((key.clone(), version.clone(), endpoint.clone()))
            }
            (key, version, endpoint) => {
                let missing = [
                    ("AZURE_OPENAI_KEY", key.is_none()),
                    ("AZURE_OPENAI_VERSION", version.is_none()),
                    ("AZURE_OPENAI_ENDPOINT", endpoint.is_none()),
                ]
                .into_iter()
                .filter(|(_, absent)| *absent)
                .map(|(name, _)| name);
                Err(ColloquyError::missing(missing))
            }
        }
    }
}

pub(crate) fn default_memory_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "colloquy")
        .map(|dirs| dirs.data_dir().join("agents"))
        .unwrap_or_else(|| PathBuf::from(".colloquy/agents"))
}
