use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    /// 未设置时使用内存存储
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub server_host: String,
    pub server_port: u16,
    pub api_base_uri: String,
    pub rate_limit_window_secs: u64,
    pub rate_limit_requests: usize,
    /// 0 表示不限制
    pub rate_limit_max_keys: usize,
    pub rate_limit_trust_proxy_headers: bool,
    pub rate_limit_exempt_paths: Vec<String>,
    pub dispatch_interval_secs: u64,
    pub algorithm_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            database_max_connections: 10,
            server_host: "0.0.0.0".into(),
            server_port: 3000,
            api_base_uri: "/api/v1".into(),
            rate_limit_window_secs: 60,
            rate_limit_requests: 100,
            rate_limit_max_keys: 0,
            rate_limit_trust_proxy_headers: false,
            rate_limit_exempt_paths: vec!["/health".into(), "/favicon.ico".into()],
            dispatch_interval_secs: 60,
            algorithm_timeout_secs: 300,
        }
    }
}

fn var(key: &'static str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match var(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

fn parse_bool_or(key: &'static str, default: bool) -> Result<bool, ConfigError> {
    match var(key) {
        Some(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid { key, value }),
        },
        None => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let defaults = Config::default();
        let rate_limit_exempt_paths = match var("RATE_LIMIT_EXEMPT_PATHS") {
            Some(paths) => paths
                .split(',')
                .map(str::trim)
                .filter(|path| !path.is_empty())
                .map(String::from)
                .collect(),
            None => defaults.rate_limit_exempt_paths,
        };

        let config = Config {
            database_url: var("DATABASE_URL"),
            database_max_connections: parse_or(
                "DATABASE_MAX_CONNECTIONS",
                defaults.database_max_connections,
            )?,
            server_host: var("SERVER_HOST").unwrap_or(defaults.server_host),
            server_port: parse_or("SERVER_PORT", defaults.server_port)?,
            api_base_uri: var("API_BASE_URI").unwrap_or(defaults.api_base_uri),
            rate_limit_window_secs: parse_or("RATE_LIMIT_WINDOW", defaults.rate_limit_window_secs)?,
            rate_limit_requests: parse_or("RATE_LIMIT_REQUESTS", defaults.rate_limit_requests)?,
            rate_limit_max_keys: parse_or("RATE_LIMIT_MAX_KEYS", defaults.rate_limit_max_keys)?,
            rate_limit_trust_proxy_headers: parse_bool_or(
                "RATE_LIMIT_TRUST_PROXY_HEADERS",
                defaults.rate_limit_trust_proxy_headers,
            )?,
            rate_limit_exempt_paths,
            dispatch_interval_secs: parse_or(
                "DISPATCH_INTERVAL_SECS",
                defaults.dispatch_interval_secs,
            )?,
            algorithm_timeout_secs: parse_or(
                "ALGORITHM_TIMEOUT_SECS",
                defaults.algorithm_timeout_secs,
            )?,
        };

        if config.rate_limit_window_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "RATE_LIMIT_WINDOW",
                value: "0".into(),
            });
        }
        if config.rate_limit_requests == 0 {
            return Err(ConfigError::Invalid {
                key: "RATE_LIMIT_REQUESTS",
                value: "0".into(),
            });
        }

        Ok(config)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn dispatch_interval(&self) -> Duration {
        Duration::from_secs(self.dispatch_interval_secs)
    }

    pub fn algorithm_timeout(&self) -> Duration {
        Duration::from_secs(self.algorithm_timeout_secs)
    }

    /// 不参与限流的路径前缀
    pub fn is_rate_limit_exempt(&self, path: &str) -> bool {
        self.rate_limit_exempt_paths
            .iter()
            .any(|prefix| path == prefix || path.starts_with(&format!("{}/", prefix)))
    }
}
