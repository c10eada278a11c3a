//! Configuration validation.

use asena_framework::HandlerPrefix;

use super::error::{ConfigError, ConfigResult};
use super::schema::{AsenaConfig, BotSettings, ConnectionConfig, LogOutput, LoggingConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &AsenaConfig) -> ConfigResult<()> {
    validate_bot(&config.bot)?;
    validate_connection(&config.connection)?;
    validate_logging(&config.logging)?;
    Ok(())
}

fn validate_bot(bot: &BotSettings) -> ConfigResult<()> {
    HandlerPrefix::new(bot.handlers.as_str())?;

    for number in &bot.sudo {
        if number.is_empty() || !number.chars().all(|c| c.is_ascii_digit()) {
            return Err(ConfigError::validation(format!(
                "sudo entry '{number}' must contain digits only"
            )));
        }
    }

    if bot.call_reject_message.is_some() && !bot.reject_calls {
        tracing::warn!("call_reject_message is set but reject_calls is disabled");
    }
    Ok(())
}

fn validate_connection(connection: &ConnectionConfig) -> ConfigResult<()> {
    validate_url(&connection.url)?;

    if connection.reconnect_delay_ms == 0 {
        return Err(ConfigError::validation(
            "reconnect delay must be greater than 0",
        ));
    }
    if connection.api_timeout_secs == 0 {
        return Err(ConfigError::validation("API timeout must be greater than 0"));
    }
    if connection.event_buffer == 0 {
        return Err(ConfigError::validation("event buffer must be greater than 0"));
    }
    Ok(())
}

fn validate_url(url: &str) -> ConfigResult<()> {
    let Some((scheme, rest)) = url.split_once("://") else {
        return Err(ConfigError::invalid_url(url, "missing scheme"));
    };
    if !matches!(scheme, "ws" | "wss") {
        return Err(ConfigError::invalid_url(
            url,
            format!("expected ws or wss, got {scheme}"),
        ));
    }
    if rest.is_empty() || rest.starts_with('/') {
        return Err(ConfigError::invalid_url(url, "missing host"));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::validation(
            "logging.file_path is required when output is 'file'",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&AsenaConfig::default()).is_ok());
    }

    #[test]
    fn test_invalid_handlers() {
        let mut config = AsenaConfig::default();
        config.bot.handlers = "^[.,!".into();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::InvalidHandlers(_))
        ));
    }

    #[test]
    fn test_sudo_must_be_digits() {
        let mut config = AsenaConfig::default();
        config.bot.sudo = vec!["+1 555".into()];
        assert!(validate_config(&config).is_err());

        config.bot.sudo = vec!["15551234567".into()];
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_url_scheme() {
        for bad in ["http://localhost:8765", "localhost:8765", "ws://"] {
            let mut config = AsenaConfig::default();
            config.connection.url = bad.into();
            assert!(
                matches!(validate_config(&config), Err(ConfigError::InvalidUrl { .. })),
                "{bad} should be rejected"
            );
        }
        let mut config = AsenaConfig::default();
        config.connection.url = "wss://bridge.example/ws".into();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_zero_reconnect_delay() {
        let mut config = AsenaConfig::default();
        config.connection.reconnect_delay_ms = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_file_output_needs_path() {
        let mut config = AsenaConfig::default();
        config.logging.output = LogOutput::File;
        assert!(validate_config(&config).is_err());
    }
}
