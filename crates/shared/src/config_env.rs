use std::env;

use crate::config::ConfigError;

/// Source of configuration values keyed by variable name.
pub(crate) type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

pub(crate) fn process_env(key: &str) -> Option<String> {
    env::var(key).ok()
}

pub(crate) fn require_env(lookup: EnvLookup<'_>, key: &str) -> Result<String, ConfigError> {
    optional_trimmed_env(lookup, key).ok_or_else(|| ConfigError::MissingVar(key.to_string()))
}

pub(crate) fn optional_trimmed_env(lookup: EnvLookup<'_>, key: &str) -> Option<String> {
    lookup(key).and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

pub(crate) fn http_url_env(
    lookup: EnvLookup<'_>,
    key: &str,
    default: &str,
) -> Result<String, ConfigError> {
    let value = optional_trimmed_env(lookup, key).unwrap_or_else(|| default.to_string());
    if !value.starts_with("http://") && !value.starts_with("https://") {
        return Err(ConfigError::InvalidConfiguration(format!(
            "{key} must start with http:// or https://"
        )));
    }

    Ok(value)
}
