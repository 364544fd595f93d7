// Configuration types module
// Defines the data structures loaded from the config file and environment

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Main configuration structure
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub views: ViewsConfig,
    /// Free-form application settings copied verbatim
    #[serde(default)]
    pub settings: HashMap<String, Value>,
}

/// Application behaviour
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    /// `development` shows error details in 500 bodies, `production` hides them
    #[serde(default = "default_env")]
    pub env: String,
    #[serde(default = "default_x_powered_by")]
    pub x_powered_by: bool,
    /// Indent width for JSON responses, 0 for compact
    #[serde(default)]
    pub json_spaces: u32,
}

#[allow(clippy::missing_const_for_fn)]
fn default_env() -> String {
    "development".to_string()
}

#[allow(clippy::missing_const_for_fn)]
fn default_x_powered_by() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            env: default_env(),
            x_powered_by: default_x_powered_by(),
            json_spaces: 0,
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `trellis=debug`
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub access_log: bool,
    /// Access log format: `combined`, `common`, `json`, or a custom pattern
    /// with `$variables`
    #[serde(default = "default_access_log_format")]
    pub access_log_format: String,
}

#[allow(clippy::missing_const_for_fn)]
fn default_log_level() -> String {
    "info".to_string()
}

fn default_access_log_format() -> String {
    "combined".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            access_log: false,
            access_log_format: default_access_log_format(),
        }
    }
}

/// Template rendering configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ViewsConfig {
    /// Extension of the engine used for `render`
    #[serde(default = "default_view_engine")]
    pub engine: String,
    /// Views directory; falls back to `TRELLIS_VIEWS`, then the working directory
    #[serde(default)]
    pub dir: Option<String>,
    /// Default render options when a handler passes none
    #[serde(default)]
    pub options: Option<Value>,
}

fn default_view_engine() -> String {
    "mustache".to_string()
}

impl Default for ViewsConfig {
    fn default() -> Self {
        Self {
            engine: default_view_engine(),
            dir: None,
            options: None,
        }
    }
}
