//! Configuration loading for Genorisk.
//! Reads genorisk.toml from the current directory or the path in GENORISK_CONFIG.
//! API keys never live in the file; they come from the environment (or `.env`).

use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub research: ResearchConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(skip)]
    pub secrets: Secrets,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String { "0.0.0.0:8000".to_string() }

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    /// Model (or alias) used by `chat_with_model` when the caller names none.
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    /// Model (or alias) used to summarise research reports.
    #[serde(default = "default_summary_model")]
    pub summary_model: String,
}

fn default_llm_base_url()  -> String { genorisk_llm::backend::NVIDIA_NIM_BASE_URL.to_string() }
fn default_chat_model()    -> String { "deepseek".to_string() }
fn default_summary_model() -> String { "palmyra".to_string() }

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            chat_model: default_chat_model(),
            summary_model: default_summary_model(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResearchConfig {
    #[serde(default = "default_gwas_base_url")]
    pub gwas_base_url: String,
    #[serde(default = "default_max_studies")]
    pub max_studies: usize,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
}

fn default_gwas_base_url()    -> String { genorisk_research::gwas::GWAS_CATALOG_BASE_URL.to_string() }
fn default_max_studies()      -> usize  { 50 }
fn default_max_results()      -> usize  { 50 }
fn default_request_delay_ms() -> u64    { 300 }

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            gwas_base_url: default_gwas_base_url(),
            max_studies: default_max_studies(),
            max_results: default_max_results(),
            request_delay_ms: default_request_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoringConfig {
    /// Precompiled weight table (CSV or JSON) used when a risk request names
    /// conditions instead of supplying variant profiles.
    #[serde(default)]
    pub reference_weights: Option<String>,
    /// Field delimiter of patient genotype files: "," or "tab".
    #[serde(default = "default_genotype_delimiter")]
    pub genotype_delimiter: String,
}

fn default_genotype_delimiter() -> String { ",".to_string() }

impl Default for ScoringConfig {
    fn default() -> Self {
        Self { reference_weights: None, genotype_delimiter: default_genotype_delimiter() }
    }
}

impl ScoringConfig {
    pub fn delimiter(&self) -> anyhow::Result<u8> {
        match self.genotype_delimiter.as_str() {
            "tab" | "\t" => Ok(b'\t'),
            s if s.len() == 1 => Ok(s.as_bytes()[0]),
            other => anyhow::bail!("genotype_delimiter must be a single character or \"tab\", got {other:?}"),
        }
    }
}

/// Credentials read from the environment.
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    pub nvidia_api_key: Option<SecretString>,
    pub google_search_api_key: Option<SecretString>,
    pub google_custom_search_cx: Option<String>,
}

impl Secrets {
    pub fn from_env() -> Self {
        Self {
            nvidia_api_key: env_var("NVIDIA_API_KEY").map(SecretString::from),
            google_search_api_key: env_var("GOOGLE_SEARCH_API_KEY").map(SecretString::from),
            google_custom_search_cx: env_var("GOOGLE_CUSTOM_SEARCH_CX"),
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}


impl Config {
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.scoring.delimiter()?;
        Ok(config)
    }

    /// Load configuration from genorisk.toml.
    /// Checks GENORISK_CONFIG env var first, then current directory. A missing
    /// file falls back to defaults. GENORISK_BIND overrides the bind address.
    pub fn load() -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();

        let path = std::env::var("GENORISK_CONFIG")
            .unwrap_or_else(|_| "genorisk.toml".to_string());

        let mut config = if Path::new(&path).exists() {
            let content = std::fs::read_to_string(&path)?;
            Self::from_toml_str(&content)
                .map_err(|e| anyhow::anyhow!("Invalid config file {path}: {e}"))?
        } else {
            tracing::warn!(
                "Config file not found: {path}. Using defaults; \
                 copy genorisk.example.toml to genorisk.toml to customise."
            );
            Self::default()
        };

        if let Some(bind) = env_var("GENORISK_BIND") {
            config.server.bind = bind;
        }
        config.secrets = Secrets::from_env();
        Ok(config)
    }
}
