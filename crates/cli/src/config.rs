//! CLI configuration.
//!
//! Values resolve in layers, later layers winning: built-in defaults, the
//! TOML file, then [`Overrides`] collected by `clap` from environment
//! variables and flags.

use std::path::{Path, PathBuf};

use proxy::{ClientName, ProxyEndpoint};
use serde::Deserialize;

/// File read when `--config` is not given. Its absence is not an error.
pub const DEFAULT_CONFIG_FILE: &str = "staticip.toml";

/// Errors raised while resolving configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid base_url '{0}': expected an http(s) URL")]
    InvalidBaseUrl(String),

    #[error("client_name must not be empty")]
    EmptyClientName,

    #[error("invalid function_url '{0}': expected an http(s) URL")]
    InvalidFunctionUrl(String),
}

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Resolved configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    pub base_url: String,
    pub client_name: String,
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub log_level: String,
    pub log_format: LogFormat,
    /// OTLP gRPC collector; spans are exported only when set.
    pub otlp_endpoint: Option<String>,
    /// Static IP the `check` command expects the proxy to report.
    pub expected_ip: Option<String>,
    /// Hosted relay function probed by `check`, if one is deployed.
    pub function_url: Option<String>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            base_url: ProxyEndpoint::DEFAULT.to_string(),
            client_name: ClientName::DEFAULT.to_string(),
            log_level: "warn".to_string(),
            log_format: LogFormat::Pretty,
            otlp_endpoint: None,
            expected_ip: None,
            function_url: None,
        }
    }
}

/// Values supplied on the command line or through the environment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    pub base_url: Option<String>,
    pub client_name: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub otlp_endpoint: Option<String>,
    pub function_url: Option<String>,
}

impl CliConfig {
    /// Resolves the configuration.
    ///
    /// `file` is the explicit `--config` path. Without one,
    /// [`DEFAULT_CONFIG_FILE`] is read if it exists.
    pub fn resolve(file: Option<&Path>, overrides: Overrides) -> Result<Self, ConfigError> {
        let mut config = match file {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply(overrides);
        config.validate()?;
        Ok(config)
    }

    /// Reads a TOML file; keys it omits keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn apply(&mut self, overrides: Overrides) {
        if let Some(base_url) = overrides.base_url {
            self.base_url = base_url;
        }
        if let Some(client_name) = overrides.client_name {
            self.client_name = client_name;
        }
        if let Some(log_level) = overrides.log_level {
            self.log_level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.log_format = log_format;
        }
        if let Some(endpoint) = overrides.otlp_endpoint.filter(|e| !e.trim().is_empty()) {
            self.otlp_endpoint = Some(endpoint);
        }
        if let Some(url) = overrides.function_url.filter(|u| !u.trim().is_empty()) {
            self.function_url = Some(url);
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.endpoint()?;
        self.client_name()?;
        self.function_endpoint()?;
        Ok(())
    }

    /// The proxy base URL.
    pub fn endpoint(&self) -> Result<ProxyEndpoint, ConfigError> {
        ProxyEndpoint::new(&self.base_url)
            .ok_or_else(|| ConfigError::InvalidBaseUrl(self.base_url.clone()))
    }

    /// The hosted relay function's URL, when configured.
    pub fn function_endpoint(&self) -> Result<Option<ProxyEndpoint>, ConfigError> {
        self.function_url
            .as_deref()
            .map(|url| {
                ProxyEndpoint::new(url)
                    .ok_or_else(|| ConfigError::InvalidFunctionUrl(url.to_string()))
            })
            .transpose()
    }

    /// The `User-Agent` sent to the proxy.
    pub fn client_name(&self) -> Result<ClientName, ConfigError> {
        ClientName::new(self.client_name.clone()).ok_or(ConfigError::EmptyClientName)
    }
}
