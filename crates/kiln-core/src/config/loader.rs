use crate::config::types::KilnConfig;
use crate::errors::PipelineError;
use std::path::Path;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads and validates a YAML configuration file.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<KilnConfig, PipelineError> {
        let path = path.as_ref();
        let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
            PipelineError::ConfigError(format!("Could not read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<KilnConfig, PipelineError> {
        let config: KilnConfig = serde_yaml::from_str(contents)
            .map_err(|e| PipelineError::ConfigError(format!("Invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_yaml() {
        let config = ConfigLoader::from_yaml("llm:\n  api_keys: [test-key]\n").unwrap();
        assert_eq!(config.llm.api_keys, vec!["test-key"]);
        assert_eq!(config.llm.model, "qwen/qwen-2.5-72b-instruct:free");
    }

    #[test]
    fn test_full_yaml() {
        let yaml = r#"
llm:
  api_base: https://openrouter.ai/api/v1
  model: qwen/qwen-2.5-coder-32b-instruct:free
  api_keys: [k1, k2]
  temperature: 0.2
  max_tokens: 2048
execution:
  python_bin: python3
  timeout_secs: 60
storage:
  endpoint: https://proj.supabase.co
  bucket: artifacts
  api_key_env: KILN_STORAGE_KEY
workspace:
  root: /var/lib/kiln
"#;
        let config = ConfigLoader::from_yaml(yaml).unwrap();
        assert_eq!(config.llm.api_keys.len(), 2);
        assert_eq!(config.execution.timeout_secs, 60);
        assert_eq!(config.storage.unwrap().bucket, "artifacts");
        assert_eq!(
            config.workspace.root.unwrap().to_string_lossy(),
            "/var/lib/kiln"
        );
    }

    #[test]
    fn test_invalid_yaml_is_rejected() {
        assert!(ConfigLoader::from_yaml("llm: [not, a, map]").is_err());
    }

    #[tokio::test]
    async fn test_missing_file_is_rejected() {
        let result = ConfigLoader::from_file("/does/not/exist.yaml").await;
        assert!(matches!(result, Err(PipelineError::ConfigError(_))));
    }
}
