// Banking Workshop - Configuration
//
// Everything comes from environment variables (an optional `.env` file is loaded first).
//
// | Variable          | Default               |
// |-------------------|-----------------------|
// | REDIS_HOST        | localhost             |
// | REDIS_PORT        | 6379                  |
// | REDIS_PASSWORD    | (none)                |
// | REDIS_SSL         | false                 |
// | API_HOST          | 0.0.0.0               |
// | API_PORT          | 8000                  |
// | STREAM_KEY        | transactions:stream   |
// | CONSUMER_GROUP    | processor             |
// | CONSUMER_NAME     | processor-1           |
// | ORDERED_LIST_CAP  | 1000                  |
// | STREAM_MAXLEN     | 10000                 |
// | UI_DIR            | ui                    |

use std::env;
use std::fmt::Display;
use std::str::FromStr;

use tracing::warn;

use crate::keys;

/// Redis connection settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub use_ssl: bool,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            password: None,
            use_ssl: false,
        }
    }
}

impl RedisConfig {
    pub fn from_env() -> Self {
        Self {
            host: env::var("REDIS_HOST").unwrap_or_else(|_| "localhost".into()),
            port: parse_or("REDIS_PORT", 6379),
            password: env::var("REDIS_PASSWORD").ok().filter(|p| !p.is_empty()),
            use_ssl: env::var("REDIS_SSL")
                .map(|v| is_truthy(&v))
                .unwrap_or(false),
        }
    }

    /// Connection URL, `rediss://` when TLS is enabled
    pub fn url(&self) -> String {
        let scheme = if self.use_ssl { "rediss" } else { "redis" };

        match &self.password {
            Some(password) => format!("{}://:{}@{}:{}", scheme, password, self.host, self.port),
            None => format!("{}://{}:{}", scheme, self.host, self.port),
        }
    }
}

/// Full application configuration shared by the server, processor and dashboard
#[derive(Debug, Clone)]
pub struct Config {
    pub redis: RedisConfig,
    pub api_host: String,
    pub api_port: u16,
    pub stream_key: String,
    pub consumer_group: String,
    pub consumer_name: String,
    pub ordered_list_cap: usize,
    pub stream_maxlen: usize,
    pub ui_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redis: RedisConfig::default(),
            api_host: "0.0.0.0".to_string(),
            api_port: 8000,
            stream_key: keys::TRANSACTION_STREAM.to_string(),
            consumer_group: "processor".to_string(),
            consumer_name: "processor-1".to_string(),
            ordered_list_cap: 1000,
            stream_maxlen: 10_000,
            ui_dir: "ui".to_string(),
        }
    }
}

impl Config {
    /// Load `.env` (if present) and read every setting from the environment
    pub fn from_env() -> Self {
        // Missing .env is the normal case
        let _ = dotenvy::dotenv();

        let defaults = Self::default();

        Self {
            redis: RedisConfig::from_env(),
            api_host: env::var("API_HOST").unwrap_or(defaults.api_host),
            api_port: parse_or("API_PORT", defaults.api_port),
            stream_key: env::var("STREAM_KEY").unwrap_or(defaults.stream_key),
            consumer_group: env::var("CONSUMER_GROUP").unwrap_or(defaults.consumer_group),
            consumer_name: env::var("CONSUMER_NAME").unwrap_or(defaults.consumer_name),
            ordered_list_cap: parse_or("ORDERED_LIST_CAP", defaults.ordered_list_cap).max(1),
            stream_maxlen: parse_or("STREAM_MAXLEN", defaults.stream_maxlen),
            ui_dir: env::var("UI_DIR").unwrap_or(defaults.ui_dir),
        }
    }

    pub fn api_address(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}

fn parse_or<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|e| {
            warn!("Invalid {key} value {raw:?}: {e}, using default {default}");
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_url() {
        let config = RedisConfig::default();
        assert_eq!(config.url(), "redis://localhost:6379");
    }

    #[test]
    fn test_tls_url_with_password() {
        let config = RedisConfig {
            host: "cache.example.net".to_string(),
            port: 10000,
            password: Some("s3cret".to_string()),
            use_ssl: true,
        };

        assert_eq!(config.url(), "rediss://:s3cret@cache.example.net:10000");
    }

    #[test]
    fn test_truthy_values() {
        assert!(is_truthy("true"));
        assert!(is_truthy("TRUE"));
        assert!(is_truthy("1"));
        assert!(is_truthy(" yes "));
        assert!(!is_truthy("false"));
        assert!(!is_truthy("0"));
        assert!(!is_truthy(""));
    }

    #[test]
    fn test_parse_or_falls_back_on_garbage() {
        env::set_var("BANKING_WORKSHOP_TEST_PORT", "not-a-port");
        assert_eq!(parse_or("BANKING_WORKSHOP_TEST_PORT", 8000u16), 8000);

        env::set_var("BANKING_WORKSHOP_TEST_PORT", "9100");
        assert_eq!(parse_or("BANKING_WORKSHOP_TEST_PORT", 8000u16), 9100);

        env::remove_var("BANKING_WORKSHOP_TEST_PORT");
        assert_eq!(parse_or("BANKING_WORKSHOP_TEST_PORT", 8000u16), 8000);
    }

    #[test]
    fn test_default_api_address() {
        assert_eq!(Config::default().api_address(), "0.0.0.0:8000");
    }
}
