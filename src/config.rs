//! Configuration and constants
//!
//! `BinConfig` is the configuration surface the orchestration layer sets:
//! bin width, the time-of-day bins are aligned to, and how long each worn
//! sample is assumed to cover. The sample duration has no default; the
//! caller declares it.

use chrono::{Duration, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default bin width for dashboard summaries (minutes)
pub const DEFAULT_BIN_WIDTH_MINUTES: i64 = 60;

/// Wearing-detection percentage band edges (left-closed, lowest included)
pub const WEARING_BAND_EDGES: [f64; 6] = [0.0, 1.0, 50.0, 75.0, 100.0, 101.0];

/// Labels for the bands between consecutive `WEARING_BAND_EDGES`
pub const WEARING_BAND_LABELS: [&str; 5] = ["0%", "1-49%", "50-74%", "75-99%", "100%"];

/// Chart colors per wearing band, for the rendering layer
pub const WEARING_BAND_COLORS: [&str; 5] = ["#ff4136", "#ff7f50", "#ffe066", "#b6e63e", "#2ecc40"];

/// Binning parameters for `aggregate`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BinConfig {
    bin_width: Duration,
    origin: NaiveTime,
    worn_sample_duration: Duration,
}

impl BinConfig {
    /// Create a validated configuration
    pub fn new(
        bin_width: Duration,
        origin: NaiveTime,
        worn_sample_duration: Duration,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            bin_width,
            origin,
            worn_sample_duration,
        };
        config.validate()?;
        Ok(config)
    }

    /// Hourly bins aligned to midnight
    pub fn hourly(worn_sample_duration: Duration) -> Result<Self, ConfigError> {
        Self::new(
            Duration::minutes(DEFAULT_BIN_WIDTH_MINUTES),
            NaiveTime::MIN,
            worn_sample_duration,
        )
    }

    /// Parse a JSON config file
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let file: BinConfigFile = serde_json::from_str(json)
            .map_err(|e| ConfigError::InvalidConfiguration(e.to_string()))?;
        file.try_into()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bin_width <= Duration::zero() {
            return Err(ConfigError::InvalidConfiguration(format!(
                "bin_width must be positive, got {}s",
                self.bin_width.num_seconds()
            )));
        }
        if self.worn_sample_duration <= Duration::zero() {
            return Err(ConfigError::InvalidConfiguration(format!(
                "worn_sample_duration must be positive, got {}s",
                self.worn_sample_duration.num_seconds()
            )));
        }
        Ok(())
    }

    pub fn bin_width(&self) -> Duration {
        self.bin_width
    }

    pub fn origin(&self) -> NaiveTime {
        self.origin
    }

    pub fn worn_sample_duration(&self) -> Duration {
        self.worn_sample_duration
    }

    pub fn bin_width_hours(&self) -> f64 {
        duration_hours(self.bin_width)
    }

    pub fn worn_sample_hours(&self) -> f64 {
        duration_hours(self.worn_sample_duration)
    }
}

/// On-disk form of `BinConfig`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinConfigFile {
    #[serde(default = "default_bin_width_minutes")]
    pub bin_width_minutes: i64,
    /// `HH:MM` or `HH:MM:SS`
    #[serde(default = "default_origin")]
    pub origin: String,
    pub worn_sample_seconds: i64,
}

fn default_bin_width_minutes() -> i64 {
    DEFAULT_BIN_WIDTH_MINUTES
}

fn default_origin() -> String {
    "00:00".to_string()
}

impl TryFrom<BinConfigFile> for BinConfig {
    type Error = ConfigError;

    fn try_from(file: BinConfigFile) -> Result<Self, Self::Error> {
        let origin = parse_origin(&file.origin)?;
        let bin_width = Duration::try_minutes(file.bin_width_minutes).ok_or_else(|| {
            ConfigError::InvalidConfiguration("bin_width_minutes out of range".to_string())
        })?;
        let worn_sample_duration = Duration::try_seconds(file.worn_sample_seconds)
            .ok_or_else(|| {
                ConfigError::InvalidConfiguration("worn_sample_seconds out of range".to_string())
            })?;
        BinConfig::new(bin_width, origin, worn_sample_duration)
    }
}

impl From<&BinConfig> for BinConfigFile {
    fn from(config: &BinConfig) -> Self {
        Self {
            bin_width_minutes: config.bin_width.num_minutes(),
            origin: config.origin.format("%H:%M:%S").to_string(),
            worn_sample_seconds: config.worn_sample_duration.num_seconds(),
        }
    }
}

/// Parse an origin time-of-day (`HH:MM` or `HH:MM:SS`)
pub fn parse_origin(text: &str) -> Result<NaiveTime, ConfigError> {
    let text = text.trim();
    NaiveTime::parse_from_str(text, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
        .map_err(|_| ConfigError::InvalidConfiguration(format!("invalid origin '{}'", text)))
}

pub(crate) fn duration_hours(d: Duration) -> f64 {
    total_nanos(d) as f64 / 3_600_000_000_000.0
}

/// Exact length of `d` in nanoseconds; never overflows
pub(crate) fn total_nanos(d: Duration) -> i128 {
    let secs = d.num_seconds();
    let sub = (d - Duration::seconds(secs)).num_nanoseconds().unwrap_or(0);
    secs as i128 * 1_000_000_000 + sub as i128
}
