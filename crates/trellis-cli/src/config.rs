//! Layered configuration.
//!
//! Resolution order, weakest first: built-in defaults, the TOML config file
//! (`~/.config/trellis/config.toml` unless overridden), environment
//! variables (via clap's `env` fallbacks), command-line flags. The resolved
//! result is one explicit [`AppConfig`] threaded through every command — no
//! ambient globals.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use trellis_llm::{ExtractorConfig, HttpConfig};
use trellis_surrealdb::StoreConfig;

use crate::cli::Cli;

/// Which language-model provider to wire in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// No model: structural extraction and full-text search only.
    #[default]
    None,
    /// OpenAI-compatible HTTP service.
    Openai,
    /// Deterministic in-process mock, for offline use and tests.
    Mock,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    store: StoreSection,
    llm: LlmSection,
    index: IndexSection,
    search: SearchSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct StoreSection {
    uri: Option<String>,
    username: Option<String>,
    password: Option<String>,
    namespace: String,
    database: String,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            uri: None,
            username: None,
            password: None,
            namespace: "trellis".to_string(),
            database: "graph".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct LlmSection {
    provider: LlmProvider,
    base_url: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    embedding_model: Option<String>,
    embedding_dimensions: Option<usize>,
    timeout_secs: u64,
    batch_size: usize,
    max_attempts: u32,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: LlmProvider::None,
            base_url: None,
            api_key: None,
            model: None,
            embedding_model: None,
            embedding_dimensions: None,
            timeout_secs: 60,
            batch_size: 5,
            max_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct IndexSection {
    max_file_size: u64,
    extensions: Option<Vec<String>>,
    parallelism: Option<usize>,
}

impl Default for IndexSection {
    fn default() -> Self {
        Self {
            max_file_size: 10 * 1024 * 1024,
            extensions: None,
            parallelism: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct SearchSection {
    channel_k: usize,
    context_window: usize,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            channel_k: 20,
            context_window: 20,
        }
    }
}

/// Fully resolved application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub llm_provider: LlmProvider,
    pub llm_http: HttpConfig,
    pub extractor: ExtractorConfig,
    pub max_file_size: u64,
    pub extensions: Option<Vec<String>>,
    pub parallelism: Option<usize>,
    pub channel_k: usize,
    pub context_window: usize,
}

impl AppConfig {
    /// Merge the config file with CLI/env overrides.
    pub fn load(cli: &Cli) -> Result<Self> {
        let path = cli
            .config
            .clone()
            .or_else(|| dirs::config_dir().map(|d| d.join("trellis").join("config.toml")));

        let file = match path {
            Some(path) if path.exists() => {
                let text = std::fs::read_to_string(&path)
                    .with_context(|| format!("reading config file {}", path.display()))?;
                toml::from_str::<FileConfig>(&text)
                    .with_context(|| format!("parsing config file {}", path.display()))?
            }
            _ => FileConfig::default(),
        };

        let default_uri = || {
            dirs::data_dir()
                .map(|d| format!("rocksdb://{}", d.join("trellis").join("graph").display()))
                .unwrap_or_else(|| "mem://".to_string())
        };

        let store = StoreConfig {
            uri: cli
                .db_uri
                .clone()
                .or(file.store.uri)
                .unwrap_or_else(default_uri),
            username: cli.db_user.clone().or(file.store.username),
            password: cli.db_pass.clone().or(file.store.password),
            namespace: cli
                .namespace
                .clone()
                .unwrap_or(file.store.namespace),
            database: cli.database.clone().unwrap_or(file.store.database),
        };

        let mut llm_http = HttpConfig {
            timeout: Duration::from_secs(file.llm.timeout_secs),
            ..HttpConfig::default()
        };
        if let Some(base_url) = file.llm.base_url {
            llm_http.base_url = base_url;
        }
        if let Some(api_key) = file.llm.api_key {
            llm_http.api_key = api_key;
        }
        if let Some(model) = file.llm.model {
            llm_http.model = model;
        }
        if let Some(embedding_model) = file.llm.embedding_model {
            llm_http.embedding_model = embedding_model;
        }
        if let Some(dimensions) = file.llm.embedding_dimensions {
            llm_http.embedding_dimensions = dimensions;
        }

        Ok(Self {
            store,
            llm_provider: file.llm.provider,
            llm_http,
            extractor: ExtractorConfig {
                batch_size: file.llm.batch_size,
                max_attempts: file.llm.max_attempts,
                ..ExtractorConfig::default()
            },
            max_file_size: file.index.max_file_size,
            extensions: file.index.extensions,
            parallelism: file.index.parallelism,
            channel_k: file.search.channel_k,
            context_window: file.search.context_window,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("trellis").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_resolve_without_a_config_file() {
        let cli = cli(&["--config", "/nonexistent/config.toml", "stats"]);
        let config = AppConfig::load(&cli).unwrap();

        assert_eq!(config.store.namespace, "trellis");
        assert_eq!(config.llm_provider, LlmProvider::None);
        assert_eq!(config.extractor.batch_size, 5);
    }

    #[test]
    fn cli_flags_override_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[store]\nuri = \"mem://\"\nnamespace = \"from-file\"\n\n[llm]\nprovider = \"mock\"\nbatch_size = 2\n",
        )
        .unwrap();

        let cli = cli(&[
            "--config",
            path.to_str().unwrap(),
            "--namespace",
            "from-flag",
            "stats",
        ]);
        let config = AppConfig::load(&cli).unwrap();

        assert_eq!(config.store.uri, "mem://");
        assert_eq!(config.store.namespace, "from-flag");
        assert_eq!(config.llm_provider, LlmProvider::Mock);
        assert_eq!(config.extractor.batch_size, 2);
    }
}
