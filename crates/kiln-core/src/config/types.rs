use crate::errors::PipelineError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct KilnConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub storage: Option<StorageConfig>,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Inline API keys; every key becomes one client in the rotation pool.
    #[serde(default)]
    pub api_keys: Vec<String>,
    /// Environment variable holding one key, or several separated by commas.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            model: default_model(),
            api_keys: Vec::new(),
            api_key_env: Some("KILN_API_KEY".to_string()),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl LlmConfig {
    /// All configured API keys: inline keys first, then keys from the
    /// environment variable (comma-separated).
    pub fn resolve_api_keys(&self) -> Result<Vec<String>, PipelineError> {
        let mut keys = self.api_keys.clone();
        if let Some(env_var) = &self.api_key_env {
            if let Ok(value) = std::env::var(env_var) {
                keys.extend(
                    value
                        .split(',')
                        .map(|key| key.trim().to_string())
                        .filter(|key| !key.is_empty()),
                );
            }
        }
        if keys.is_empty() {
            return Err(PipelineError::ConfigError(
                "No API key found. Set llm.api_keys or the llm.api_key_env variable".to_string(),
            ));
        }
        Ok(keys)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default = "default_python_bin")]
    pub python_bin: String,
    /// Wall-clock deadline for every spawned process, installs and code alike.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            python_bin: default_python_bin(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
}

impl StorageConfig {
    pub fn resolve_api_key(&self) -> Result<String, PipelineError> {
        self.api_key
            .clone()
            .or_else(|| {
                self.api_key_env
                    .as_ref()
                    .and_then(|env_var| std::env::var(env_var).ok())
            })
            .ok_or_else(|| {
                PipelineError::ConfigError(
                    "No storage API key found. Set storage.api_key or storage.api_key_env"
                        .to_string(),
                )
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WorkspaceConfig {
    /// Persistent workspace root. Unset means one fresh temporary workspace
    /// per pipeline invocation.
    #[serde(default)]
    pub root: Option<PathBuf>,
}

impl KilnConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.llm.model.trim().is_empty() {
            return Err(PipelineError::ConfigError("llm.model must not be empty".to_string()));
        }
        if self.llm.api_base.trim().is_empty() {
            return Err(PipelineError::ConfigError("llm.api_base must not be empty".to_string()));
        }
        if self.execution.timeout_secs == 0 {
            return Err(PipelineError::ConfigError(
                "execution.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if let Some(storage) = &self.storage {
            if storage.endpoint.trim().is_empty() || storage.bucket.trim().is_empty() {
                return Err(PipelineError::ConfigError(
                    "storage.endpoint and storage.bucket must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}

fn default_api_base() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_model() -> String {
    "qwen/qwen-2.5-72b-instruct:free".to_string()
}

fn default_temperature() -> f32 {
    0.0
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_python_bin() -> String {
    "python3".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}
