//! Configuration schema definitions.
//!
//! ```toml
//! [bot]
//! prefix = "!"
//! error_channel = "1234567890"
//!
//! [permissions]
//! stats = ["moderator", "admin"]
//!
//! [reactor]
//! default_expiration_secs = 300
//!
//! [logging]
//! level = "debug"
//!
//! [commands.tip]
//! source = "https://example.com/tips.txt"
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use hexbot_core::ChannelId;
use hexbot_framework::{DEFAULT_PREFIX, PermissionStore, ReactorConfig, RouterConfig};

use super::error::{ConfigError, ConfigResult};

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HexbotConfig {
    /// Command routing settings.
    #[serde(default)]
    pub bot: BotConfig,

    /// Roles allowed to run each command, overriding the command's own
    /// requirement. An empty list makes the command public.
    #[serde(default)]
    pub permissions: BTreeMap<String, Vec<String>>,

    /// Reaction watcher settings.
    #[serde(default)]
    pub reactor: ReactorSettings,

    /// Outbound network settings used by commands.
    #[serde(default)]
    pub network: NetworkConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Free-form per-command settings, keyed by command name.
    #[serde(default)]
    pub commands: BTreeMap<String, serde_json::Value>,
}

impl HexbotConfig {
    /// Router settings derived from `[bot]`.
    pub fn router_config(&self) -> RouterConfig {
        RouterConfig {
            prefix: self.bot.prefix.clone(),
            error_channel: self.bot.error_channel.clone().map(ChannelId::new),
            ignore_bots: self.bot.ignore_bots,
        }
    }

    /// Watch registry settings derived from `[reactor]`.
    pub fn reactor_config(&self) -> ReactorConfig {
        ReactorConfig {
            default_ttl: Duration::from_secs(self.reactor.default_expiration_secs),
            sweep_interval: Duration::from_secs(self.reactor.sweep_interval_secs),
            wildcard: self.reactor.wildcard.clone(),
        }
    }

    /// The `[permissions]` table as a permission store.
    pub fn permission_store(&self) -> PermissionStore {
        PermissionStore::from_table(
            self.permissions
                .iter()
                .map(|(command, roles)| (command.clone(), roles.clone())),
        )
    }

    /// Deserializes `commands.<name>` into `T`.
    ///
    /// Returns `Ok(None)` if the command has no settings table.
    pub fn command_settings<T: DeserializeOwned>(&self, name: &str) -> ConfigResult<Option<T>> {
        let Some(value) = self.commands.get(name) else {
            return Ok(None);
        };
        serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|e| ConfigError::CommandSettings {
                command: name.to_string(),
                reason: e.to_string(),
            })
    }
}

// =============================================================================
// [bot]
// =============================================================================

/// Command routing settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotConfig {
    /// Prefix that marks a message as a command.
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Channel id that receives handler error reports.
    #[serde(default)]
    pub error_channel: Option<String>,

    /// Ignore messages from bot accounts.
    #[serde(default = "default_true")]
    pub ignore_bots: bool,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            error_channel: None,
            ignore_bots: true,
        }
    }
}

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

fn default_true() -> bool {
    true
}

// =============================================================================
// [reactor]
// =============================================================================

/// Reaction watcher settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactorSettings {
    /// Lifetime of a watcher registered without an explicit expiration.
    #[serde(default = "default_expiration_secs")]
    pub default_expiration_secs: u64,

    /// How often expired watchers and rate-limit windows are pruned.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Trigger that matches any emoji.
    #[serde(default = "default_wildcard")]
    pub wildcard: String,
}

impl Default for ReactorSettings {
    fn default() -> Self {
        Self {
            default_expiration_secs: default_expiration_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            wildcard: default_wildcard(),
        }
    }
}

fn default_expiration_secs() -> u64 {
    300
}

fn default_sweep_interval_secs() -> u64 {
    30
}

fn default_wildcard() -> String {
    "*".to_string()
}

// =============================================================================
// [network]
// =============================================================================

/// Outbound network settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Upper bound on any single outbound request, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl NetworkConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    10
}

// =============================================================================
// [logging]
// =============================================================================

/// Log verbosity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log line layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature.
    Json,
}

/// Where log lines go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    Stdout,
    /// Default, so stdout stays free for gateways that use it.
    #[default]
    Stderr,
    File,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanEventConfig {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub enter: bool,
    #[serde(default)]
    pub exit: bool,
    #[serde(default)]
    pub close: bool,
}

/// Logging settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub output: LogOutput,

    /// Log file for `output = "file"`.
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    /// Per-target levels, e.g. `hexbot_framework = "debug"`.
    #[serde(default)]
    pub filters: BTreeMap<String, LogLevel>,

    #[serde(default)]
    pub thread_ids: bool,

    /// Include source file and line.
    #[serde(default)]
    pub file_location: bool,

    #[serde(default)]
    pub span_events: SpanEventConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct TipSettings {
        source: String,
    }

    #[test]
    fn test_defaults() {
        let config = HexbotConfig::default();
        assert_eq!(config.bot.prefix, "!");
        assert!(config.bot.ignore_bots);
        assert_eq!(config.reactor.default_expiration_secs, 300);
        assert_eq!(config.network.timeout(), Duration::from_secs(10));
        assert_eq!(config.logging.output, LogOutput::Stderr);
    }

    #[test]
    fn test_derived_framework_settings() {
        let mut config = HexbotConfig::default();
        config.bot.prefix = "?".into();
        config.bot.error_channel = Some("errors".into());
        config.reactor.default_expiration_secs = 60;
        config
            .permissions
            .insert("stats".into(), vec!["moderator".into()]);

        let router = config.router_config();
        assert_eq!(router.prefix, "?");
        assert_eq!(router.error_channel, Some(ChannelId::from("errors")));

        assert_eq!(config.reactor_config().default_ttl, Duration::from_secs(60));
        assert!(config.permission_store().overrides("stats"));
    }

    #[test]
    fn test_command_settings() {
        let mut config = HexbotConfig::default();
        config.commands.insert(
            "tip".into(),
            serde_json::json!({ "source": "tips.txt" }),
        );
        config
            .commands
            .insert("bad".into(), serde_json::json!({ "source": 5 }));

        let tip: Option<TipSettings> = config.command_settings("tip").unwrap();
        assert_eq!(tip.unwrap().source, "tips.txt");

        let missing: Option<TipSettings> = config.command_settings("ping").unwrap();
        assert!(missing.is_none());

        assert!(matches!(
            config.command_settings::<TipSettings>("bad"),
            Err(ConfigError::CommandSettings { .. })
        ));
    }
}
