//! Configuration for RF60x-IO
//!
//! Loaded from a TOML file; every field beyond the sensor port has a
//! default matching the RF60x-SP factory settings.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub sensor: SensorConfig,
    #[serde(default)]
    pub acquisition: AcquisitionConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Sensor connection and calibration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SensorConfig {
    /// Serial port path (e.g., "/dev/ttyUSB0" or "COM3")
    pub port: String,
    /// Baud rate; RF60x-SP configures 921600
    #[serde(default = "default_baud")]
    pub baud_rate: u32,
    /// Device address on the bus (0..=127)
    #[serde(default = "default_address")]
    pub address: u8,
    /// Measuring range in millimetres; scales every raw value
    #[serde(default = "default_range")]
    pub range_mm: f64,
}

/// Acquisition mode settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AcquisitionConfig {
    /// Output CSV path
    #[serde(default = "default_csv")]
    pub csv_path: String,
    /// Sleep between polls when no bytes are pending
    #[serde(default = "default_poll_us")]
    pub poll_interval_us: u64,
    /// Minimum gap between decode-noise log summaries
    #[serde(default = "default_window")]
    pub diagnostic_window_secs: u64,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        AcquisitionConfig {
            csv_path: default_csv(),
            poll_interval_us: default_poll_us(),
            diagnostic_window_secs: default_window(),
        }
    }
}

/// Bridge mode settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BridgeConfig {
    #[serde(default = "default_poll_us")]
    pub poll_interval_us: u64,
    #[serde(default)]
    pub endpoints: Vec<EndpointConfig>,
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            poll_interval_us: default_poll_us(),
            endpoints: Vec::new(),
            routes: Vec::new(),
        }
    }
}

/// One named serial endpoint in the bridge
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointConfig {
    pub name: String,
    pub port: String,
    #[serde(default = "default_baud")]
    pub baud_rate: u32,
}

/// One source-to-sinks route in the bridge
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    pub source: String,
    pub sinks: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_level(),
        }
    }
}

fn default_baud() -> u32 {
    921600
}

fn default_address() -> u8 {
    1
}

fn default_range() -> f64 {
    250.0
}

fn default_csv() -> String {
    "rf60x_data.csv".to_string()
}

fn default_poll_us() -> u64 {
    1000
}

fn default_window() -> u64 {
    2
}

fn default_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Default configuration for a single sensor on /dev/ttyUSB0
    pub fn defaults() -> Self {
        AppConfig {
            sensor: SensorConfig {
                port: "/dev/ttyUSB0".to_string(),
                baud_rate: default_baud(),
                address: default_address(),
                range_mm: default_range(),
            },
            acquisition: AcquisitionConfig::default(),
            bridge: BridgeConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::defaults();
        assert_eq!(config.sensor.baud_rate, 921600);
        assert_eq!(config.sensor.address, 1);
        assert_eq!(config.sensor.range_mm, 250.0);
        assert_eq!(config.acquisition.poll_interval_us, 1000);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_minimal_toml() {
        let config: AppConfig = toml::from_str(
            r#"
[sensor]
port = "COM3"
"#,
        )
        .unwrap();

        assert_eq!(config.sensor.port, "COM3");
        assert_eq!(config.sensor.baud_rate, 921600);
        assert!(config.bridge.routes.is_empty());
    }

    #[test]
    fn test_logging_level_from_toml() {
        let config: AppConfig = toml::from_str(
            r#"
[sensor]
port = "COM3"

[logging]
level = "debug"
"#,
        )
        .unwrap();

        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_bridge_toml() {
        let config: AppConfig = toml::from_str(
            r#"
[sensor]
port = "COM3"
range_mm = 125.0

[bridge]
poll_interval_us = 500

[[bridge.endpoints]]
name = "sensor"
port = "COM3"

[[bridge.endpoints]]
name = "vendor"
port = "COM4"
baud_rate = 115200

[[bridge.routes]]
source = "sensor"
sinks = ["vendor"]

[[bridge.routes]]
source = "vendor"
sinks = ["sensor"]
"#,
        )
        .unwrap();

        assert_eq!(config.sensor.range_mm, 125.0);
        assert_eq!(config.bridge.endpoints.len(), 2);
        assert_eq!(config.bridge.endpoints[1].baud_rate, 115200);
        assert_eq!(config.bridge.routes.len(), 2);
        assert_eq!(config.bridge.routes[0].sinks, vec!["vendor"]);
    }
}
