use crate::constants::{self, DEFAULT_CALLS_PER_SECOND, DEFAULT_QUERY, MAX_PAGE_SIZE, REGISTRY_BASE_URL};
use crate::error::{OutreachError, Result};
use crate::pipeline::pipeline::DEFAULT_MIN_BODY_CHARS;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "trial_outreach.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub registry: RegistryConfig,
    pub ledger: LedgerConfig,
    pub generator: GeneratorConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub base_url: String,
    /// Condition keywords, each run as its own pass against the shared ledger.
    pub queries: Vec<String>,
    pub fields: Vec<String>,
    pub page_size: usize,
    pub calls_per_second: f64,
    pub timeout_seconds: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: REGISTRY_BASE_URL.to_string(),
            queries: vec![DEFAULT_QUERY.to_string()],
            fields: constants::default_fields(),
            page_size: MAX_PAGE_SIZE,
            calls_per_second: DEFAULT_CALLS_PER_SECOND,
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub path: PathBuf,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/outreach_ledger.db"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorKind {
    Template,
    Chat,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub kind: GeneratorKind,
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub api_version: String,
    pub deployment: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_seconds: u64,
    pub min_body_chars: usize,
    pub sender_signature: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            kind: GeneratorKind::Template,
            endpoint: None,
            api_key: None,
            api_version: "2024-02-01".to_string(),
            deployment: None,
            temperature: 0.7,
            max_tokens: 800,
            timeout_seconds: 60,
            min_body_chars: DEFAULT_MIN_BODY_CHARS,
            sender_signature: "The Patient Recruitment Team".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("output"),
        }
    }
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Comma-separated list, blanks dropped.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

impl Config {
    /// Load `path` (or `trial_outreach.toml` when present), then apply
    /// environment overrides. A missing default file is not an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv::dotenv().ok();

        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_PATH))?
            }
            None => Config::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            OutreachError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn apply_env(&mut self) {
        if let Some(queries) = env_nonempty("OUTREACH_QUERIES") {
            self.registry.queries = split_list(&queries);
        }
        if let Some(rate) = env_nonempty("OUTREACH_CALLS_PER_SECOND").and_then(|v| v.parse().ok()) {
            self.registry.calls_per_second = rate;
        }
        if let Some(path) = env_nonempty("OUTREACH_LEDGER_PATH") {
            self.ledger.path = PathBuf::from(path);
        }
        if let Some(dir) = env_nonempty("OUTREACH_OUTPUT_DIR") {
            self.output.dir = PathBuf::from(dir);
        }
        if let Some(key) = env_nonempty("AZURE_OPENAI_KEY") {
            self.generator.api_key = Some(key);
        }
        if let Some(endpoint) = env_nonempty("AZURE_OPENAI_ENDPOINT") {
            self.generator.endpoint = Some(endpoint);
        }
        if let Some(version) = env_nonempty("AZURE_OPENAI_VERSION") {
            self.generator.api_version = version;
        }
        if let Some(deployment) = env_nonempty("AZURE_OPENAI_DEPLOYMENT") {
            self.generator.deployment = Some(deployment);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.registry.page_size == 0 || self.registry.page_size > MAX_PAGE_SIZE {
            return Err(OutreachError::Config(format!(
                "registry.page_size must be between 1 and {}, got {}",
                MAX_PAGE_SIZE, self.registry.page_size
            )));
        }
        if self.registry.fields.is_empty() {
            return Err(OutreachError::Config("registry.fields must not be empty".into()));
        }
        if self.registry.queries.is_empty() {
            return Err(OutreachError::Config("registry.queries must not be empty".into()));
        }
        if self.registry.queries.iter().any(|q| q.trim().is_empty()) {
            return Err(OutreachError::Config("registry.queries must not contain blank entries".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.registry.base_url, REGISTRY_BASE_URL);
        assert_eq!(config.registry.page_size, 50);
        assert_eq!(config.generator.kind, GeneratorKind::Template);
        assert_eq!(config.registry.queries, vec![DEFAULT_QUERY.to_string()]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::from_toml(
            r#"
            [registry]
            queries = ["Crohn Disease", "Ulcerative Colitis"]
            calls_per_second = 1.5

            [generator]
            kind = "chat"
            deployment = "gpt-4o"
            "#,
        )
        .unwrap();
        assert_eq!(config.registry.queries, vec!["Crohn Disease", "Ulcerative Colitis"]);
        assert_eq!(config.registry.calls_per_second, 1.5);
        assert_eq!(config.registry.page_size, 50);
        assert_eq!(config.generator.kind, GeneratorKind::Chat);
        assert_eq!(config.generator.deployment.as_deref(), Some("gpt-4o"));
        assert_eq!(config.generator.max_tokens, 800);
    }

    #[test]
    fn oversized_page_is_rejected() {
        let config = Config::from_toml("[registry]\npage_size = 500").unwrap();
        assert!(matches!(config.validate(), Err(OutreachError::Config(_))));
    }

    #[test]
    fn env_overrides_file_values() {
        std::env::set_var("OUTREACH_LEDGER_PATH", "/tmp/outreach-test-ledger.db");
        let mut config = Config::from_toml("[ledger]\npath = \"elsewhere.db\"").unwrap();
        config.apply_env();
        std::env::remove_var("OUTREACH_LEDGER_PATH");
        assert_eq!(config.ledger.path, PathBuf::from("/tmp/outreach-test-ledger.db"));
    }

    #[test]
    fn query_list_comes_from_env_as_comma_list() {
        std::env::set_var("OUTREACH_QUERIES", "Crohn Disease, Celiac Disease,,");
        let mut config = Config::default();
        config.apply_env();
        std::env::remove_var("OUTREACH_QUERIES");
        assert_eq!(config.registry.queries, vec!["Crohn Disease", "Celiac Disease"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn blank_query_is_rejected() {
        let config = Config::from_toml("[registry]\nqueries = [\"Crohn Disease\", \" \"]").unwrap();
        assert!(matches!(config.validate(), Err(OutreachError::Config(_))));
    }
}
