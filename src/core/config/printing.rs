use crate::core::config::data::Config;
use crate::core::config::defaults::{
    DEFAULT_BASE_URL, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_MAX_TOKENS, DEFAULT_MODEL,
    DEFAULT_TEMPERATURE,
};

fn print_entry<T: std::fmt::Display>(key: &str, value: Option<T>, default: impl std::fmt::Display) {
    match value {
        Some(value) => println!("  {key}: {value}"),
        None => println!("  {key}: {default} (default)"),
    }
}

impl Config {
    pub fn print_all(&self) {
        println!("Current configuration:");
        print_entry("base-url", self.base_url.as_deref(), DEFAULT_BASE_URL);
        print_entry(
            "default-model",
            self.default_model.as_deref(),
            DEFAULT_MODEL,
        );
        print_entry("temperature", self.temperature, DEFAULT_TEMPERATURE);
        print_entry("max-tokens", self.max_tokens, DEFAULT_MAX_TOKENS);
        print_entry(
            "connect-timeout",
            self.connect_timeout_secs,
            DEFAULT_CONNECT_TIMEOUT_SECS,
        );
    }
}
