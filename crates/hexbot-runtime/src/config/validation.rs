//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{HexbotConfig, LogFormat, LogOutput, LoggingConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &HexbotConfig) -> ConfigResult<()> {
    validate_bot(config)?;
    validate_permissions(config)?;
    validate_reactor(config)?;

    if config.network.timeout_secs == 0 {
        return Err(ConfigError::validation(
            "network.timeout_secs must be greater than 0",
        ));
    }

    validate_logging(&config.logging)?;
    Ok(())
}

fn validate_bot(config: &HexbotConfig) -> ConfigResult<()> {
    let prefix = &config.bot.prefix;
    if prefix.trim().is_empty() {
        return Err(ConfigError::validation("bot.prefix must not be empty"));
    }
    if prefix.chars().any(char::is_whitespace) {
        return Err(ConfigError::validation(format!(
            "bot.prefix must not contain whitespace: {prefix:?}"
        )));
    }
    if config
        .bot
        .error_channel
        .as_deref()
        .is_some_and(|c| c.trim().is_empty())
    {
        return Err(ConfigError::validation(
            "bot.error_channel must not be empty when set",
        ));
    }
    Ok(())
}

fn validate_permissions(config: &HexbotConfig) -> ConfigResult<()> {
    for (command, roles) in &config.permissions {
        if roles.iter().any(|r| r.trim().is_empty()) {
            return Err(ConfigError::validation(format!(
                "permissions.{command} contains an empty role id"
            )));
        }
    }
    Ok(())
}

fn validate_reactor(config: &HexbotConfig) -> ConfigResult<()> {
    let reactor = &config.reactor;
    if reactor.default_expiration_secs == 0 {
        return Err(ConfigError::validation(
            "reactor.default_expiration_secs must be greater than 0",
        ));
    }
    if reactor.sweep_interval_secs == 0 {
        return Err(ConfigError::validation(
            "reactor.sweep_interval_secs must be greater than 0",
        ));
    }
    if reactor.wildcard.is_empty() {
        return Err(ConfigError::validation("reactor.wildcard must not be empty"));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::validation(
            "logging.file_path is required when logging.output is \"file\"",
        ));
    }
    if logging.format == LogFormat::Json && !cfg!(feature = "json-log") {
        return Err(ConfigError::validation(
            "logging.format \"json\" requires the json-log feature",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&HexbotConfig::default()).is_ok());
    }

    #[test]
    fn test_rejects_blank_prefix() {
        for prefix in ["", "   ", "! "] {
            let mut config = HexbotConfig::default();
            config.bot.prefix = prefix.into();
            assert!(
                matches!(validate_config(&config), Err(ConfigError::Validation { .. })),
                "prefix {prefix:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_rejects_zero_intervals() {
        let mut config = HexbotConfig::default();
        config.reactor.sweep_interval_secs = 0;
        assert!(validate_config(&config).is_err());

        let mut config = HexbotConfig::default();
        config.reactor.default_expiration_secs = 0;
        assert!(validate_config(&config).is_err());

        let mut config = HexbotConfig::default();
        config.network.timeout_secs = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_rejects_empty_wildcard() {
        let mut config = HexbotConfig::default();
        config.reactor.wildcard = String::new();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_file_output_needs_path() {
        let mut config = HexbotConfig::default();
        config.logging.output = LogOutput::File;
        assert!(validate_config(&config).is_err());

        config.logging.file_path = Some("hexbot.log".into());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_rejects_empty_role_id() {
        let mut config = HexbotConfig::default();
        config
            .permissions
            .insert("stats".into(), vec!["moderator".into(), " ".into()]);
        assert!(validate_config(&config).is_err());
    }
}
