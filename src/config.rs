use config::{Config, ConfigError, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use etcetera::base_strategy::{BaseStrategy, choose_base_strategy};

use crate::dispatch::{
    DEFAULT_API_PROBE_CALLS, DEFAULT_CHUNK_CALLS, DEFAULT_LOGGING_CHUNK_CALLS, DispatchOptions,
};
use crate::record::DEFAULT_OUTPUT;
use crate::stats::PercentageScope;
use crate::store::SEARCH_RESULTS_LIMIT;
use crate::trace::ApiVariant;

/// Prefix of the environment variables layered over the config file.
pub const ENV_PREFIX: &str = "TRACESTATS";

/// Overrides the config file location.
pub const CONFIG_PATH_VAR: &str = "TRACESTATS_CONFIG_PATH";

/// Example configuration written by `tracestats config init`
pub const CONFIG_EXAMPLE: &str = include_str!("../config.example.toml");

/// User configuration for parsing and store queries.
///
/// ```toml
/// apitrace = "/opt/apitrace/bin/apitrace"
/// threads = 8
/// chunk-calls = 500000
/// skip-apis = ["D3D8", "EGL"]
/// store-path = "~/traces/store.json"
/// percentage-scope = "corpus"
/// ```
///
/// Config file location:
/// - Linux: `$XDG_CONFIG_HOME/tracestats/config.toml` or `~/.config/tracestats/config.toml`
/// - macOS: `$XDG_CONFIG_HOME/tracestats/config.toml` or `~/.config/tracestats/config.toml`
/// - Windows: `%APPDATA%\tracestats\config.toml`
///
/// Every key can be overridden with a `TRACESTATS_` environment variable,
/// e.g. `TRACESTATS_CHUNK_CALLS=100000` or `TRACESTATS_SKIP_APIS=D3D8,EGL`.
/// Command-line flags override both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TracestatsConfig {
    /// Dump tool to run; searched for on `PATH` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apitrace: Option<PathBuf>,

    /// Worker threads per trace; all available cores when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threads: Option<usize>,

    pub chunk_calls: u64,

    pub api_probe_calls: u64,

    pub logging_chunk_calls: u64,

    /// Kill a dump subprocess that runs longer than this
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    #[serde(default)]
    pub skip_apis: Vec<ApiVariant>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_path: Option<PathBuf>,

    pub percentage_scope: PercentageScope,

    pub search_limit: usize,

    pub output: PathBuf,
}

impl Default for TracestatsConfig {
    fn default() -> Self {
        Self {
            apitrace: None,
            threads: None,
            chunk_calls: DEFAULT_CHUNK_CALLS,
            api_probe_calls: DEFAULT_API_PROBE_CALLS,
            logging_chunk_calls: DEFAULT_LOGGING_CHUNK_CALLS,
            timeout_secs: None,
            skip_apis: Vec::new(),
            store_path: None,
            percentage_scope: PercentageScope::default(),
            search_limit: SEARCH_RESULTS_LIMIT,
            output: PathBuf::from(DEFAULT_OUTPUT),
        }
    }
}

impl TracestatsConfig {
    /// Load configuration from the config file and environment variables.
    ///
    /// Sources are layered in this order (later sources override earlier ones):
    /// 1. Default values
    /// 2. Config file (see struct documentation for platform-specific paths)
    /// 3. Environment variables (TRACESTATS_*)
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path();
        Self::load_from(path.as_deref(), environment())
    }

    /// Load with an explicit file and environment source.
    pub fn load_from(
        config_path: Option<&Path>,
        env: config::Environment,
    ) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let mut builder = Config::builder()
            .set_default("chunk-calls", defaults.chunk_calls)?
            .set_default("api-probe-calls", defaults.api_probe_calls)?
            .set_default("logging-chunk-calls", defaults.logging_chunk_calls)?
            .set_default("skip-apis", Vec::<String>::new())?
            .set_default("percentage-scope", defaults.percentage_scope.to_string())?
            .set_default("search-limit", defaults.search_limit as u64)?
            .set_default("output", defaults.output.to_string_lossy().into_owned())?;

        if let Some(path) = config_path
            && path.exists()
        {
            builder = builder.add_source(File::from(path));
        }

        builder = builder.add_source(env);

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.threads == Some(0) {
            return Err(ConfigError::Message("threads must be at least 1".into()));
        }
        if self.chunk_calls == 0 {
            return Err(ConfigError::Message("chunk-calls must be at least 1".into()));
        }
        if self.api_probe_calls == 0 {
            return Err(ConfigError::Message(
                "api-probe-calls must be at least 1".into(),
            ));
        }
        if self.search_limit == 0 {
            return Err(ConfigError::Message("search-limit must be at least 1".into()));
        }
        if self.timeout_secs == Some(0) {
            return Err(ConfigError::Message(
                "timeout-secs must be at least 1 when set".into(),
            ));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub fn dispatch_options(&self) -> DispatchOptions {
        DispatchOptions {
            threads: self.threads.unwrap_or_else(default_threads),
            chunk_calls: self.chunk_calls,
            api_probe_calls: self.api_probe_calls,
            logging_chunk_calls: self.logging_chunk_calls,
            skip_apis: self.skip_apis.iter().cloned().collect(),
        }
    }

    /// The configured store, or `store.json` in the platform data directory.
    pub fn store_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = &self.store_path {
            return Ok(path.clone());
        }
        let strategy = choose_base_strategy().map_err(|e| {
            ConfigError::Message(format!("Could not determine data directory: {e}"))
        })?;
        Ok(strategy.data_dir().join("tracestats").join("store.json"))
    }

    /// Effective values rendered as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Message(format!("Failed to serialize config: {e}")))
    }
}

fn default_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// `TRACESTATS_CHUNK_CALLS` maps to `chunk-calls`; lists are comma-separated.
pub fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .convert_case(config::Case::Kebab)
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("skip-apis")
}

/// Where the config file lives, if a location can be determined.
pub fn config_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_PATH_VAR) {
        return Some(PathBuf::from(path));
    }

    // choose_base_strategy uses:
    // - XDG on Linux (respects XDG_CONFIG_HOME, falls back to ~/.config)
    // - XDG on macOS (~/.config instead of ~/Library/Application Support)
    // - Windows conventions on Windows (%APPDATA%)
    let strategy = choose_base_strategy().ok()?;
    Some(strategy.config_dir().join("tracestats").join("config.toml"))
}
