use std::fs;
use std::path::Path;
use serde::{Deserialize, Serialize};
use anyhow::{Result, Context};
use log::warn;

/// Main configuration structure for intent_bridge
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Intent resolver (LLM) settings
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Template document store settings
    #[serde(default)]
    pub templates: TemplatesConfig,

    /// External API invoker settings
    #[serde(default)]
    pub invoker: InvokerConfig,

    /// Output settings
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Model to use
    #[serde(default = "default_model")]
    pub model: String,

    /// Temperature setting
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// OpenAI-compatible API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplatesConfig {
    /// Text file describing the available endpoints
    #[serde(default = "default_documents")]
    pub documents: String,

    /// Chunk size in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Characters shared by neighbouring chunks
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokerConfig {
    /// Environment variable holding the bearer token
    #[serde(default = "default_bearer_token_env")]
    pub bearer_token_env: String,

    /// Endpoint routed through the create-task path
    #[serde(default = "default_create_task_url")]
    pub create_task_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output format ("json", "plain")
    #[serde(default = "default_output_format")]
    pub format: String,
}

// Default value functions
fn default_model() -> String { "llama3-8b-8192".to_string() }
fn default_temperature() -> f32 { 0.0 }
fn default_base_url() -> String { "https://api.groq.com/openai/v1".to_string() }
fn default_api_key_env() -> String { "GROQ_API_KEY".to_string() }
fn default_documents() -> String { "data/api.txt".to_string() }
fn default_chunk_size() -> usize { 10_000 }
fn default_chunk_overlap() -> usize { 2_000 }
fn default_bearer_token_env() -> String { "BearerToken".to_string() }
fn default_create_task_url() -> String {
    "https://amt-gcp-dev.soham.ai/inventory-task/v1/create_task".to_string()
}
fn default_output_format() -> String { "json".to_string() }

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: default_temperature(),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
        }
    }
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            documents: default_documents(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self {
            bearer_token_env: default_bearer_token_env(),
            create_task_url: default_create_task_url(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: default_output_format(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Load configuration from command line argument or default locations
    pub fn load(config_path: &Option<String>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::from_file(shellexpand::tilde(path).as_ref());
        }

        let default_paths = [
            "intent_bridge.toml",
            ".intent_bridge.toml",
            "~/.config/intent_bridge/config.toml",
        ];

        for path in default_paths {
            let expanded_path = shellexpand::tilde(path);
            if Path::new(expanded_path.as_ref()).exists() {
                match Self::from_file(expanded_path.as_ref()) {
                    Ok(config) => return Ok(config),
                    Err(e) => warn!("Failed to load config from {}: {:#}", path, e),
                }
            }
        }

        Ok(Self::default())
    }

    /// Command-line overrides take precedence over the file
    pub fn merge_with_args(&mut self, documents: Option<String>, format: Option<String>) {
        if let Some(documents) = documents {
            self.templates.documents = documents;
        }
        if let Some(format) = format {
            self.output.format = format;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.resolver.model, "llama3-8b-8192");
        assert_eq!(config.resolver.temperature, 0.0);
        assert_eq!(config.templates.chunk_size, 10_000);
        assert_eq!(config.templates.chunk_overlap, 2_000);
        assert_eq!(config.invoker.bearer_token_env, "BearerToken");
        assert_eq!(config.output.format, "json");
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config = Config::from_toml(
            r#"
            [resolver]
            model = "llama-3.1-8b-instant"

            [invoker]
            create_task_url = "https://tasks.example.com/create"
            "#,
        )
        .unwrap();

        assert_eq!(config.resolver.model, "llama-3.1-8b-instant");
        assert_eq!(config.resolver.api_key_env, "GROQ_API_KEY");
        assert_eq!(config.invoker.create_task_url, "https://tasks.example.com/create");
        assert_eq!(config.templates.documents, "data/api.txt");
    }

    #[test]
    fn test_args_override_file() {
        let mut config = Config::default();
        config.merge_with_args(Some("docs/endpoints.txt".to_string()), None);
        assert_eq!(config.templates.documents, "docs/endpoints.txt");
        assert_eq!(config.output.format, "json");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = Config::from_file("/nonexistent/intent_bridge.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
