use std::time::Duration;

use crate::core::config::data::Config;
use crate::core::config::io::ConfigError;
use crate::core::session::RequestDefaults;
use crate::utils::url::normalize_base_url;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 2048;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Overrides `base_url` from the config file when set.
pub const API_URL_ENV: &str = "CHATLINE_API_URL";

impl Config {
    /// Backend URL, preferring `CHATLINE_API_URL` over the config file.
    pub fn effective_base_url(&self) -> String {
        let from_env = std::env::var(API_URL_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty());
        self.base_url_with_override(from_env.as_deref())
    }

    pub(crate) fn base_url_with_override(&self, override_url: Option<&str>) -> String {
        let url = override_url
            .or(self.base_url.as_deref())
            .unwrap_or(DEFAULT_BASE_URL);
        normalize_base_url(url.trim())
    }

    pub fn model(&self) -> &str {
        self.default_model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    /// Values applied to a send that leaves them unset. A configured
    /// temperature of `0.0` is kept as is.
    pub fn request_defaults(&self) -> RequestDefaults {
        RequestDefaults {
            model: Some(self.model().to_string()),
            temperature: Some(self.temperature.unwrap_or(DEFAULT_TEMPERATURE)),
            max_tokens: Some(self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(
            self.connect_timeout_secs
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
        )
    }
}

/// Keys accepted by `chatline set` and `chatline unset`.
pub const SETTING_KEYS: &[&str] = &[
    "base-url",
    "default-model",
    "temperature",
    "max-tokens",
    "connect-timeout",
];

impl Config {
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: key.to_string(),
                reason: "value cannot be empty".to_string(),
            });
        }

        match key {
            "base-url" => {
                if !value.starts_with("http://") && !value.starts_with("https://") {
                    return Err(ConfigError::InvalidValue {
                        key: key.to_string(),
                        reason: "expected an http:// or https:// URL".to_string(),
                    });
                }
                self.base_url = Some(normalize_base_url(value));
            }
            "default-model" => self.default_model = Some(value.to_string()),
            "temperature" => {
                let temperature = parse_number::<f32>(key, value)?;
                if !(0.0..=2.0).contains(&temperature) {
                    return Err(ConfigError::InvalidValue {
                        key: key.to_string(),
                        reason: "must be between 0 and 2".to_string(),
                    });
                }
                self.temperature = Some(temperature);
            }
            "max-tokens" => self.max_tokens = Some(parse_positive(key, value)?),
            "connect-timeout" => self.connect_timeout_secs = Some(parse_positive(key, value)?),
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    pub fn unset_value(&mut self, key: &str) -> Result<(), ConfigError> {
        match key {
            "base-url" => self.base_url = None,
            "default-model" => self.default_model = None,
            "temperature" => self.temperature = None,
            "max-tokens" => self.max_tokens = None,
            "connect-timeout" => self.connect_timeout_secs = None,
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse::<T>().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        reason: format!("'{value}' is not a number"),
    })
}

fn parse_positive<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    let number = parse_number::<T>(key, value)?;
    if number <= T::default() {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(number)
}
