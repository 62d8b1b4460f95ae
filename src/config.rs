use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde_derive::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct AppConfig {
    pub log_file: Option<PathBuf>,
    pub scan: ScanConfig,
    pub display: DisplayConfig,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::de::from_str(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct ScanConfig {
    /// Advertised names treated as skimmer indicators. Matching is exact.
    pub skimmer_names: HashSet<String>,
    pub scan_duration_seconds: Option<u64>,
    pub scan_interval_seconds: Option<u64>,
    pub skimmer_alert_duration_seconds: Option<u64>,
}

impl ScanConfig {
    pub fn scan_duration(&self) -> Duration {
        Duration::from_secs(self.scan_duration_seconds.unwrap_or(10))
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_seconds.unwrap_or(5))
    }

    pub fn skimmer_alert_duration(&self) -> Duration {
        Duration::from_secs(self.skimmer_alert_duration_seconds.unwrap_or(5))
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct DisplayConfig {
    pub spi_port: Option<u8>,
    pub spi_device: Option<u8>,
    pub spi_speed_hz: Option<u32>,
    /// GPIO line offsets on `gpio_chip`.
    pub dc_pin: u32,
    pub reset_pin: u32,
    pub gpio_chip: Option<PathBuf>,
}

impl DisplayConfig {
    pub fn spidev_path(&self) -> String {
        format!(
            "/dev/spidev{}.{}",
            self.spi_port.unwrap_or(0),
            self.spi_device.unwrap_or(0)
        )
    }

    pub fn spi_speed_hz(&self) -> u32 {
        self.spi_speed_hz.unwrap_or(8_000_000)
    }

    pub fn gpio_chip(&self) -> PathBuf {
        self.gpio_chip
            .clone()
            .unwrap_or_else(|| PathBuf::from("/dev/gpiochip0"))
    }
}
