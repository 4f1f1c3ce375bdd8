use crate::config::types::{Config, OutputConfig, RetrievalConfig, UserAgentConfig};
use crate::ConfigError;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_retrieval_config(&config.retrieval)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates retrieval engine configuration
fn validate_retrieval_config(config: &RetrievalConfig) -> Result<(), ConfigError> {
    if config.save_location.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "save-location cannot be empty".to_string(),
        ));
    }

    if config.valid_suffixes.is_empty() {
        return Err(ConfigError::Validation(
            "valid-suffixes must list at least one suffix".to_string(),
        ));
    }

    for suffix in &config.valid_suffixes {
        validate_suffix(suffix)?;
    }

    if config.max_retrieval_size == 0 {
        return Err(ConfigError::Validation(
            "max-retrieval-size must be >= 1".to_string(),
        ));
    }

    if config.max_concurrent_fetches < 1 || config.max_concurrent_fetches > 256 {
        return Err(ConfigError::Validation(format!(
            "max-concurrent-fetches must be between 1 and 256, got {}",
            config.max_concurrent_fetches
        )));
    }

    Ok(())
}

/// Suffixes are compared case-sensitively against the text after the last dot,
/// so anything with a dot or an upper-case letter could never match.
fn validate_suffix(suffix: &str) -> Result<(), ConfigError> {
    if suffix.is_empty() {
        return Err(ConfigError::InvalidSuffix(
            "Suffix cannot be empty".to_string(),
        ));
    }

    if suffix.contains('.') {
        return Err(ConfigError::InvalidSuffix(format!(
            "Suffix '{}' must not contain a dot",
            suffix
        )));
    }

    if suffix.chars().any(|c| c.is_uppercase()) {
        return Err(ConfigError::InvalidSuffix(format!(
            "Suffix '{}' must be lower-case",
            suffix
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.name.is_empty() {
        return Err(ConfigError::Validation(
            "user-agent name cannot be empty".to_string(),
        ));
    }

    if !config
        .name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ConfigError::Validation(format!(
            "user-agent name must contain only alphanumeric characters, '-' and '_', got '{}'",
            config.name
        )));
    }

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if let Some(path) = &config.database_path {
        if path.is_empty() {
            return Err(ConfigError::Validation(
                "database-path cannot be empty when set".to_string(),
            ));
        }
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact-email cannot be empty".to_string(),
        ));
    }

    let Some((local, domain)) = email.split_once('@') else {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    };

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
