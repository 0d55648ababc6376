//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `station.toml`.
//!     loads configuration from file or falls back to defaults.
//!
//! ```text
//!     the prototype hardware build kept the sensor handle, timer and
//!     elevation as ambient statics; here everything lives in one struct
//!     built at startup and passed by reference.
//! ```
//!
//! structure:
//!     - TimeSyncConfig: NTP server and optional socket timeout.
//!     - SamplingConfig: tick interval and station elevation.
//!     - ServerConfig: listen port and accept strategy.
//!     - UploadConfig: aggregation service credentials.
//!     - StorageConfig: reading log path.
//!
//! ==============================================================================

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct NodeConfig {
    #[serde(default)]
    pub time_sync: TimeSyncConfig,
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub hardware: HardwareConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HardwareConfig {
    /// BMP085 I2C address
    pub i2c_address: u8,
    /// status LED pin
    pub led_gpio_pin: u8,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            i2c_address: 0x77,
            led_gpio_pin: 13,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TimeSyncConfig {
    pub server: String,
    /// Absent means the receive blocks forever, matching the original
    /// prototype. A hung time server then stalls startup until the watchdog
    /// steps in.
    pub timeout_seconds: Option<u64>,
}

impl TimeSyncConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_seconds.map(Duration::from_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SamplingConfig {
    pub interval_seconds: u64,
    /// Station elevation above sea level, used for the sea-level pressure
    /// correction.
    pub elevation_meters: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    #[serde(default)]
    pub strategy: AcceptStrategy,
}

/// How the request server schedules connections. The wire contract is the
/// same either way; `sequential` matches the original one-at-a-time loop.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AcceptStrategy {
    #[default]
    Sequential,
    Pooled,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct UploadConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub station_id: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub log_path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub show_sensor_data: bool,
}

impl NodeConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;

        let config: NodeConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config: {}", e))?;

        Ok(config)
    }

    /// Load with default fallback
    pub fn load_or_default() -> Self {
        let paths = [
            PathBuf::from("config").join("station.toml"),
            PathBuf::from("..").join("config").join("station.toml"),
        ];

        for path in &paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(config) => {
                        println!("[CONFIG] Loaded from {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        println!("[CONFIG] Warning: Failed to load {}: {}", path.display(), e);
                    }
                }
            }
        }

        println!("[CONFIG] Warning: No config file found - using defaults");
        Self::default()
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        println!("┌─────────────────────────────────────────┐");
        println!("│          STATION CONFIGURATION          │");
        println!("├─────────────────────────────────────────┤");
        println!("│ Time server: {}", self.time_sync.server);
        println!("│ Sample interval: {}s", self.sampling.interval_seconds);
        println!("│ Elevation: {}m", self.sampling.elevation_meters);
        println!("│ Listen port: {}", self.server.port);
        println!("│ Upload: {}", if self.upload.enabled { "enabled" } else { "disabled" });
        println!("│ Log level: {}", self.logging.level);
        println!("└─────────────────────────────────────────┘");
    }
}

impl Default for TimeSyncConfig {
    fn default() -> Self {
        Self {
            server: "pool.ntp.org".to_string(),
            timeout_seconds: None,
        }
    }
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 15,
            elevation_meters: 263.0,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 80,
            strategy: AcceptStrategy::Sequential,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            log_path: PathBuf::from("sensor.log"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            show_sensor_data: true,
        }
    }
}
