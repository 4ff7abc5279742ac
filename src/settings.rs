use config::{Config, ConfigError};
use serde::Deserialize;
use std::env;

use crate::auth::{AuthOption, Options};

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// Provider used when none is given on the command line (e.g. "azure")
    #[serde(default)]
    pub provider: Option<String>,

    /// Scopes requested for the cloud access token (provider default when empty)
    #[serde(default)]
    pub scopes: Vec<String>,

    /// Allow credential sources that invoke local CLIs such as `az`
    #[serde(default)]
    pub allow_shell_out: bool,

    /// Upper bound in seconds for a whole credential exchange (default: 30)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            provider: None,
            scopes: Vec::new(),
            allow_shell_out: false,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Settings {
    /// Load settings from config files and the environment
    ///
    /// Sources, later ones taking precedence:
    /// 1. `$ARTIFACT_AUTH_CONFIG_DIR/default.{toml,yaml,yml}` (optional)
    /// 2. `$ARTIFACT_AUTH_CONFIG_DIR/local.{toml,yaml,yml}` (optional)
    /// 3. `ARTIFACT_AUTH__*` environment variables (e.g. `ARTIFACT_AUTH__TIMEOUT_SECS=10`)
    pub fn new() -> Result<Self, ConfigError> {
        let config_dir = env::var("ARTIFACT_AUTH_CONFIG_DIR").unwrap_or_else(|_| "config".into());

        let mut builder = Config::builder();
        for name in ["default", "local"] {
            let path = format!("{}/{}", config_dir, name);
            tracing::debug!("Looking for optional config file: {}.{{toml,yaml,yml}}", path);
            builder = builder.add_source(config::File::with_name(&path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("ARTIFACT_AUTH")
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("scopes")
                .try_parsing(true),
        );

        let settings: Settings = builder.build()?.try_deserialize()?;

        if settings.timeout_secs == 0 {
            return Err(ConfigError::Message(
                "timeout_secs must be greater than zero".to_string(),
            ));
        }

        Ok(settings)
    }

    /// Convert to provider options
    pub fn options(&self) -> Options {
        let mut opts = Vec::new();
        if !self.scopes.is_empty() {
            opts.push(AuthOption::Scopes(self.scopes.clone()));
        }
        if self.allow_shell_out {
            opts.push(AuthOption::AllowShellOut);
        }
        Options::apply(opts)
    }
}
