//! Configuration for the MR-Box peripheral board driver
//!
//! Loads configuration from a TOML file with the parameters needed to reach
//! and operate the board.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Top-level driver configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BoardConfig {
    pub connection: ConnectionConfig,
    pub zstage: ZStageConfig,
    pub leds: LedConfig,
}

/// Serial connection configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConnectionConfig {
    /// Serial port path (e.g., "/dev/ttyUSB0"). When absent, the driver
    /// discovers the board by its reported device name.
    pub port: Option<String>,
    /// Baud rate for serial communication
    pub baud_rate: u32,
    /// Default deadline for one request/response transaction
    pub request_timeout_ms: u64,
    /// Delay between opening the port and the first probe command, giving
    /// boards that reset on open time to boot
    pub settle_delay_ms: u64,
}

impl ConnectionConfig {
    /// Request deadline as a `Duration`
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Post-open settle delay as a `Duration`
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// Z-stage positions used by `up()` / `down()`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ZStageConfig {
    /// Stage position considered "up" (raised)
    pub up_position: f32,
    /// Stage position considered "down" (lowered)
    pub down_position: f32,
}

/// LED wiring and initialization
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LedConfig {
    /// PWM-capable pins driving the two indicator LEDs
    pub pins: [u8; 2],
    /// Brightness applied to each LED at connect time (0.0 to 1.0)
    pub initial_brightness: f32,
}

impl BoardConfig {
    /// Load configuration from TOML file
    ///
    /// # Example
    /// ```no_run
    /// use mrbox_io::config::BoardConfig;
    ///
    /// let config = BoardConfig::from_file("mrbox.toml")?;
    /// # Ok::<(), mrbox_io::Error>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: BoardConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Default configuration for the MR-Box peripheral board
    ///
    /// Baud rate and timing values match the board firmware. Deployments
    /// with a fixed port assignment should use a TOML configuration file.
    pub fn board_defaults() -> Self {
        Self {
            connection: ConnectionConfig {
                port: None,
                baud_rate: 57600,
                request_timeout_ms: 5000,
                settle_delay_ms: 2500,
            },
            zstage: ZStageConfig {
                up_position: 15.0,
                down_position: 0.0,
            },
            leds: LedConfig {
                pins: [5, 6],
                initial_brightness: 0.1,
            },
        }
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self::board_defaults()
    }
}
