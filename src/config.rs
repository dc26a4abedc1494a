use clap::Parser;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

/// Document store holding configs and query responses.
#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub connection_string: String,
    pub pool_size: usize,
}

/// Database the generated SQL runs against.
#[derive(Debug, Deserialize, Clone)]
pub struct ReportingConfig {
    pub connection_string: String,
    pub pool_size: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    pub backend: String, // "remote" or "ollama"
    pub model: String,
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub temperature: f32,
    pub timeout_secs: u64,
}

/// Where table and column descriptions come from.
#[derive(Debug, Deserialize, Clone)]
pub struct MetadataConfig {
    pub host: Option<String>,
    pub token: Option<String>,
    pub accept_invalid_certs: bool,
    pub timeout_secs: u64,
    /// Glossary export with `parent,name,description` rows. When set it
    /// replaces the glossary service.
    pub dictionary_csv: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    pub max_entries: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct QueryConfig {
    /// Answer pipeline failures with an empty 200 instead of an error status.
    pub degrade_on_failure: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub json: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub web: WebConfig,
    pub store: StoreConfig,
    pub reporting: ReportingConfig,
    pub llm: LlmConfig,
    pub metadata: MetadataConfig,
    pub cache: CacheConfig,
    pub query: QueryConfig,
    pub logging: LoggingConfig,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Path of the document store database
    #[arg(long)]
    pub store: Option<String>,
}

impl AppConfig {
    pub fn new(args: &CliArgs) -> Result<Self, ConfigError> {
        let defaults = AppConfig::default();

        // Start with default configuration
        let mut config_builder = Config::builder()
            .set_default("web.host", defaults.web.host)?
            .set_default("web.port", defaults.web.port)?
            .set_default("store.connection_string", defaults.store.connection_string)?
            .set_default("store.pool_size", defaults.store.pool_size as u64)?
            .set_default(
                "reporting.connection_string",
                defaults.reporting.connection_string,
            )?
            .set_default("reporting.pool_size", defaults.reporting.pool_size as u64)?
            .set_default("llm.backend", defaults.llm.backend)?
            .set_default("llm.model", defaults.llm.model)?
            .set_default("llm.temperature", defaults.llm.temperature as f64)?
            .set_default("llm.timeout_secs", defaults.llm.timeout_secs)?
            .set_default(
                "metadata.accept_invalid_certs",
                defaults.metadata.accept_invalid_certs,
            )?
            .set_default("metadata.timeout_secs", defaults.metadata.timeout_secs)?
            .set_default("cache.ttl_secs", defaults.cache.ttl_secs)?
            .set_default("cache.max_entries", defaults.cache.max_entries as u64)?
            .set_default("query.degrade_on_failure", defaults.query.degrade_on_failure)?
            .set_default("logging.json", defaults.logging.json)?;

        // Add configuration from file if specified
        if let Some(config_path) = &args.config {
            config_builder = config_builder.add_source(File::from(config_path.as_path()));
        } else {
            // Check for config in default locations
            let default_locations = vec![
                "config.toml",
                "config/config.toml",
                "/etc/tafsiri/config.toml",
            ];

            for location in default_locations {
                if Path::new(location).exists() {
                    config_builder =
                        config_builder.add_source(File::new(location, config::FileFormat::Toml));
                    break;
                }
            }
        }

        // TAFSIRI__LLM__API_KEY -> llm.api_key
        config_builder = config_builder.add_source(
            Environment::with_prefix("TAFSIRI")
                .separator("__")
                .try_parsing(true),
        );

        // Build the config
        let mut config: AppConfig = config_builder.build()?.try_deserialize()?;

        config.apply_legacy_env(|key| std::env::var(key).ok());

        // Override with command line args if provided
        if let Some(host) = &args.host {
            config.web.host = host.clone();
        }
        if let Some(port) = args.port {
            config.web.port = port;
        }
        if let Some(store) = &args.store {
            config.store.connection_string = store.clone();
        }

        Ok(config)
    }

    /// Fills unset keys from the variable names older deployments export.
    fn apply_legacy_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.llm.api_key.is_none() {
            self.llm.api_key = lookup("OPENAI_KEY");
        }
        if self.metadata.host.is_none() {
            self.metadata.host = lookup("OM_HOST");
        }
        if self.metadata.token.is_none() {
            self.metadata.token = lookup("OM_JWT");
        }

        let defaults = AppConfig::default();
        if self.reporting.connection_string == defaults.reporting.connection_string {
            if let Some(reporting_db) = lookup("REPORTING_DB") {
                self.reporting.connection_string = reporting_db;
            }
        }
        if self.store.connection_string == defaults.store.connection_string {
            if let Some(database_name) = lookup("DATABASE_NAME") {
                self.store.connection_string = database_name;
            }
        }
    }
}

// Default implementation
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            web: WebConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
            },
            store: StoreConfig {
                connection_string: "tafsiri.duckdb".to_string(),
                pool_size: 5,
            },
            reporting: ReportingConfig {
                connection_string: "reporting.duckdb".to_string(),
                pool_size: 5,
            },
            llm: LlmConfig {
                backend: "remote".to_string(),
                model: "gpt-4o".to_string(),
                api_key: None,
                api_url: None,
                temperature: 0.0,
                timeout_secs: 60,
            },
            metadata: MetadataConfig {
                host: None,
                token: None,
                accept_invalid_certs: false,
                timeout_secs: 30,
                dictionary_csv: None,
            },
            cache: CacheConfig {
                ttl_secs: 3600,
                max_entries: 64,
            },
            query: QueryConfig {
                degrade_on_failure: false,
            },
            logging: LoggingConfig { json: false },
        }
    }
}
