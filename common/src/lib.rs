/*!
common/src/lib.rs

Shared configuration types for MacroLens.

This file provides:
- Config data structures (deserialized from TOML)
- An async loader for a TOML config file, with default + override merging
- Per-step resolution of the model endpoint settings
*/

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// HTTP server section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address Rocket binds to (e.g. "127.0.0.1" or "0.0.0.0")
    pub bind: String,
    pub port: u16,
    /// Directory holding the browser front-end (index.html)
    pub static_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8000,
            static_dir: "macrolens/static".to_string(),
        }
    }
}

/// Remote model endpoint settings. Every field is optional so that a
/// per-step section only needs to name what it overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RemoteLlmConfig {
    pub api_url: Option<String>,
    /// Name of the environment variable holding the API key
    pub api_key_env: Option<String>,
    pub model: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub max_tokens: Option<usize>,
    pub temperature: Option<f32>,
}

impl RemoteLlmConfig {
    /// Fill every unset field from `fallback`.
    pub fn or(&self, fallback: &RemoteLlmConfig) -> RemoteLlmConfig {
        RemoteLlmConfig {
            api_url: self.api_url.clone().or_else(|| fallback.api_url.clone()),
            api_key_env: self.api_key_env.clone().or_else(|| fallback.api_key_env.clone()),
            model: self.model.clone().or_else(|| fallback.model.clone()),
            timeout_seconds: self.timeout_seconds.or(fallback.timeout_seconds),
            max_tokens: self.max_tokens.or(fallback.max_tokens),
            temperature: self.temperature.or(fallback.temperature),
        }
    }
}

/// The three prompt steps of the analysis pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    Scout,
    Verification,
    Analysis,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Scout => "scout",
            Step::Verification => "verification",
            Step::Analysis => "analysis",
        };
        f.write_str(name)
    }
}

/// LLM top-level config: adapter choice, shared endpoint, per-step overrides
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub adapter: String, // "gemini", "openai"
    // Fallback: single remote config shared by all steps
    pub remote: RemoteLlmConfig,
    // Step-specific overrides
    pub scout: Option<RemoteLlmConfig>,
    pub verification: Option<RemoteLlmConfig>,
    pub analysis: Option<RemoteLlmConfig>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            adapter: "gemini".to_string(),
            remote: RemoteLlmConfig::default(),
            scout: None,
            verification: None,
            analysis: None,
        }
    }
}

impl LlmConfig {
    /// Resolved settings for one step: the step section first, then `remote`.
    pub fn step(&self, step: Step) -> RemoteLlmConfig {
        let specific = match step {
            Step::Scout => self.scout.as_ref(),
            Step::Verification => self.verification.as_ref(),
            Step::Analysis => self.analysis.as_ref(),
        };
        match specific {
            Some(cfg) => cfg.or(&self.remote),
            None => self.remote.clone(),
        }
    }
}

/// Pipeline behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Run the verification step between scout and analysis
    pub verification: bool,
    /// Let the scout use the provider-side search tool
    pub search: bool,
    /// Market or region the scout should cover
    pub focus: String,
    /// How many ranked news items the scout should return
    pub news_count: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            verification: true,
            search: true,
            focus: "global financial markets".to_string(),
            news_count: 10,
        }
    }
}

/// Export settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub download_filename: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            download_filename: "financial_analysis_output.json".to_string(),
        }
    }
}

/// Top-level application configuration (deserialized from config.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub pipeline: PipelineConfig,
    pub output: OutputConfig,
}

impl Config {
    /// Load configuration from a TOML file asynchronously.
    ///
    /// Example:
    ///   let cfg = Config::from_file("config.toml").await?;
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = tokio::fs::read_to_string(path.as_ref())
            .await
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let cfg: Config = toml::from_str(&data).context("Failed to parse TOML configuration")?;
        Ok(cfg)
    }

    /// Load configuration with an optional default file and an optional override file.
    /// If both are present, they are merged (override takes precedence).
    pub async fn load_with_defaults(default_path: Option<&Path>, override_path: Option<&Path>) -> Result<Self> {
        let mut config_value = toml::Value::Table(toml::map::Map::new());

        for (label, path) in [("default", default_path), ("override", override_path)] {
            let Some(path) = path else { continue };
            if !path.exists() {
                continue;
            }
            let data = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {} config: {}", label, path.display()))?;
            let val: toml::Value = toml::from_str(&data)
                .with_context(|| format!("Failed to parse {} configuration: {}", label, path.display()))?;
            merge_toml(&mut config_value, val);
        }

        let cfg: Config = config_value.try_into().context("Failed to parse merged configuration")?;
        Ok(cfg)
    }
}

fn merge_toml(a: &mut toml::Value, b: toml::Value) {
    match (a, b) {
        (toml::Value::Table(a_map), toml::Value::Table(b_map)) => {
            for (k, v) in b_map {
                if let Some(a_val) = a_map.get_mut(&k) {
                    merge_toml(a_val, v);
                } else {
                    a_map.insert(k, v);
                }
            }
        }
        (a_val, b_val) => *a_val = b_val,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_from_string() {
        let toml = r#"
            [server]
            port = 9000

            [llm]
            adapter = "openai"

            [llm.remote]
            model = "gpt-4o-mini"
            api_key_env = "OPENAI_API_KEY"

            [llm.analysis]
            model = "gpt-4o"
            max_tokens = 4096

            [pipeline]
            verification = false
        "#;

        let cfg: Config = toml::from_str(toml).expect("parse config");
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.server.bind, "127.0.0.1");
        assert_eq!(cfg.llm.adapter, "openai");
        assert!(!cfg.pipeline.verification);
        assert!(cfg.pipeline.search);
        assert_eq!(cfg.output.download_filename, "financial_analysis_output.json");

        let analysis = cfg.llm.step(Step::Analysis);
        assert_eq!(analysis.model.as_deref(), Some("gpt-4o"));
        assert_eq!(analysis.max_tokens, Some(4096));
        assert_eq!(analysis.api_key_env.as_deref(), Some("OPENAI_API_KEY"));

        let scout = cfg.llm.step(Step::Scout);
        assert_eq!(scout.model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(scout.max_tokens, None);
    }

    #[test]
    fn empty_document_uses_defaults() {
        let cfg: Config = toml::from_str("").expect("parse empty config");
        assert_eq!(cfg.llm.adapter, "gemini");
        assert_eq!(cfg.pipeline.news_count, 10);
        assert!(cfg.pipeline.verification);
    }

    #[test]
    fn merge_replaces_scalars_and_merges_tables() {
        let mut base: toml::Value = toml::from_str(
            r#"
            [server]
            bind = "0.0.0.0"
            port = 8000
            "#,
        )
        .unwrap();
        let over: toml::Value = toml::from_str(
            r#"
            [server]
            port = 9100
            "#,
        )
        .unwrap();

        merge_toml(&mut base, over);
        let server = base.get("server").unwrap();
        assert_eq!(server.get("bind").and_then(|v| v.as_str()), Some("0.0.0.0"));
        assert_eq!(server.get("port").and_then(|v| v.as_integer()), Some(9100));
    }

    #[tokio::test]
    async fn load_with_defaults_applies_override() {
        let dir = tempfile::tempdir().expect("tempdir");
        let default_path = dir.path().join("config.default.toml");
        let override_path = dir.path().join("config.toml");

        tokio::fs::write(
            &default_path,
            r#"
            [llm.remote]
            model = "gemini-2.5-flash"
            api_key_env = "GEMINI_API_KEY"

            [pipeline]
            focus = "global financial markets"
            "#,
        )
        .await
        .unwrap();
        tokio::fs::write(
            &override_path,
            r#"
            [llm.remote]
            model = "gemini-2.5-pro"

            [pipeline]
            focus = "euro area"
            "#,
        )
        .await
        .unwrap();

        let cfg = Config::load_with_defaults(Some(&default_path), Some(&override_path))
            .await
            .expect("load config");
        assert_eq!(cfg.llm.remote.model.as_deref(), Some("gemini-2.5-pro"));
        assert_eq!(cfg.llm.remote.api_key_env.as_deref(), Some("GEMINI_API_KEY"));
        assert_eq!(cfg.pipeline.focus, "euro area");
    }

    #[tokio::test]
    async fn missing_files_are_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let absent = dir.path().join("nope.toml");
        let cfg = Config::load_with_defaults(Some(&absent), None).await.expect("load");
        assert_eq!(cfg.server.port, 8000);
    }

    #[tokio::test]
    async fn from_file_reports_parse_errors() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.toml");
        tokio::fs::write(&path, "[server\nport = ").await.unwrap();
        let err = Config::from_file(&path).await.unwrap_err();
        assert!(err.to_string().contains("Failed to parse TOML configuration"));
    }
}
