//! 应用运行配置加载。
//!
//! - 环境变量：轮询间隔、连接 TTL、串口等待与超时等（`AppConfig`）
//! - 设备描述文件：YAML / JSON（`load_devices`）

mod devices;

pub use devices::{DeviceFormat, load_devices, parse_devices};

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {reason}")]
    Parse { path: String, reason: String },
}

/// 应用运行配置。
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub devices_file: PathBuf,
    pub poll_interval_ms: u64,
    pub connection_ttl_seconds: u64,
    pub settle_delay_ms: u64,
    pub response_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub verify_response_crc: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            devices_file: PathBuf::from("plc-config.yml"),
            poll_interval_ms: 10_000,
            connection_ttl_seconds: 300,
            settle_delay_ms: 50,
            response_timeout_ms: 1_000,
            connect_timeout_ms: 5_000,
            verify_response_crc: false,
        }
    }
}

impl AppConfig {
    /// 从环境变量读取配置；未设置的项取默认值。
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let devices_file = read_optional("PLC_DEVICES_FILE")
            .map(PathBuf::from)
            .unwrap_or(defaults.devices_file);
        let poll_interval_ms =
            read_u64_with_default("PLC_POLL_INTERVAL_MS", defaults.poll_interval_ms)?;
        let connection_ttl_seconds =
            read_u64_with_default("PLC_CONNECTION_TTL_SECONDS", defaults.connection_ttl_seconds)?;
        let settle_delay_ms =
            read_u64_with_default("PLC_SETTLE_DELAY_MS", defaults.settle_delay_ms)?;
        let response_timeout_ms =
            read_u64_with_default("PLC_RESPONSE_TIMEOUT_MS", defaults.response_timeout_ms)?;
        let connect_timeout_ms =
            read_u64_with_default("PLC_CONNECT_TIMEOUT_MS", defaults.connect_timeout_ms)?;
        let verify_response_crc =
            read_bool_with_default("PLC_VERIFY_RESPONSE_CRC", defaults.verify_response_crc);

        if poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "PLC_POLL_INTERVAL_MS".to_string(),
                "0".to_string(),
            ));
        }
        if response_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "PLC_RESPONSE_TIMEOUT_MS".to_string(),
                "0".to_string(),
            ));
        }

        Ok(Self {
            devices_file,
            poll_interval_ms,
            connection_ttl_seconds,
            settle_delay_ms,
            response_timeout_ms,
            connect_timeout_ms,
            verify_response_crc,
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn connection_ttl(&self) -> Duration {
        Duration::from_secs(self.connection_ttl_seconds)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

fn read_u64_with_default(key: &str, default: u64) -> Result<u64, ConfigError> {
    let value = match env::var(key) {
        Ok(value) if !value.trim().is_empty() => value,
        _ => return Ok(default),
    };
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => None,
    }
}

fn read_bool_with_default(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(value) => matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "on"),
        Err(_) => default,
    }
}
