// Configuration module entry point
// Loads application configuration from an optional TOML file and the environment

mod types;

pub use types::{AppConfig, Config, LoggingConfig, ViewsConfig};

/// Prefix of environment overrides, e.g. `TRELLIS_APP__ENV=production`
pub const ENV_PREFIX: &str = "TRELLIS";

/// Default config file name (without extension)
pub const DEFAULT_CONFIG_FILE: &str = "trellis";

impl Config {
    /// Load configuration from specified file path (without extension).
    /// A missing file is not an error; defaults and the environment apply.
    pub fn load_from(config_path: &str) -> Result<Self, ::config::ConfigError> {
        let settings = defaults(::config::Config::builder())?
            .add_source(::config::File::with_name(config_path).required(false))
            .add_source(environment())
            .build()?;

        settings.try_deserialize()
    }

    /// Load `trellis.toml` from the working directory
    pub fn load() -> Result<Self, ::config::ConfigError> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Parse configuration from TOML text, environment overrides included
    pub fn from_toml_str(source: &str) -> Result<Self, ::config::ConfigError> {
        let settings = defaults(::config::Config::builder())?
            .add_source(::config::File::from_str(source, ::config::FileFormat::Toml))
            .add_source(environment())
            .build()?;

        settings.try_deserialize()
    }
}

fn environment() -> ::config::Environment {
    ::config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
}

fn defaults(
    builder: ::config::ConfigBuilder<::config::builder::DefaultState>,
) -> Result<::config::ConfigBuilder<::config::builder::DefaultState>, ::config::ConfigError> {
    builder
        .set_default("app.env", "development")?
        .set_default("app.x_powered_by", true)?
        .set_default("app.json_spaces", 0)?
        .set_default("logging.level", "info")?
        .set_default("logging.access_log", false)?
        .set_default("logging.access_log_format", "combined")?
        .set_default("views.engine", "mustache")
}
