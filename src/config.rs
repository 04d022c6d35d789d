//! Loader configuration.
//!
//! [`LoaderConfig`] can be loaded from `config/config.toml` (section `[loader]`)
//! or from `RELATIONS_LOADER__*` environment variables using
//! `LoaderConfig::load()`. The default configuration issues exactly one query per
//! entity class per flush.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

const CONFIG_FILE: &str = "config/config.toml";
const ENV_PREFIX: &str = "RELATIONS_LOADER";

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Upper bound on identifier values (or composite groups) per batched query.
    ///
    /// `None` keeps the whole pending set in a single query. Set this when the
    /// storage backend limits bind parameters per statement.
    #[serde(default)]
    pub max_batch_size: Option<usize>,
}

impl LoaderConfig {
    /// Load the loader configuration from `config/config.toml`, falling back to env vars.
    pub fn load() -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

        let settings = match builder.build() {
            Ok(cfg) => cfg,
            Err(err) => {
                if std::path::Path::new(CONFIG_FILE).exists() {
                    log::warn!(
                        "failed to load {}, falling back to environment: {}",
                        CONFIG_FILE,
                        err
                    );
                }
                Config::builder()
                    .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
                    .build()
                    .map_err(|env_err| {
                        ConfigError::Message(format!(
                            "Failed to load configuration from file and env: {}, then env-only error: {}",
                            err, env_err
                        ))
                    })?
            }
        };

        // A missing section is not an error: the defaults apply.
        match settings.get::<LoaderConfig>("loader") {
            Ok(cfg) => Ok(cfg.normalized()),
            Err(ConfigError::NotFound(_)) => Ok(LoaderConfig::default()),
            Err(e) => Err(ConfigError::Message(format!(
                "Loader configuration could not be loaded from file or environment: {}",
                e
            ))),
        }
    }

    /// Build a configuration with a fixed batch size.
    pub fn with_max_batch_size(max_batch_size: usize) -> Self {
        Self {
            max_batch_size: Some(max_batch_size),
        }
        .normalized()
    }

    // A zero batch size would never make progress.
    fn normalized(mut self) -> Self {
        if self.max_batch_size == Some(0) {
            self.max_batch_size = None;
        }
        self
    }
}
