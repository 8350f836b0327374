//! Monitor settings, read from `RADAR_*` environment variables.

use std::env;
use std::error::Error;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use mr24fdb1::{AssemblerConfig, BodySignThresholds};

/// Everything the monitor needs to open the radar and interpret its reports.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    /// Serial device, `RADAR_PORT`.
    pub port: String,
    /// `RADAR_BAUD`.
    pub baud: u32,
    /// Serial read timeout, `RADAR_TIMEOUT_MS`.
    pub timeout: Duration,
    /// Delay between polls of the port, `RADAR_POLL_MS`.
    pub poll_interval: Duration,
    /// `RADAR_MOVE_MIN` / `RADAR_MOVE_MAX`.
    pub thresholds: BodySignThresholds,
    /// `RADAR_VERIFY_CRC`, on unless set to `false` or `0`.
    pub verify_checksum: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyAMA10".to_string(),
            baud: mr24fdb1::DEFAULT_BAUD,
            timeout: Duration::from_millis(100),
            poll_interval: Duration::from_millis(50),
            thresholds: BodySignThresholds::default(),
            verify_checksum: true,
        }
    }
}

impl MonitorConfig {
    pub fn from_env() -> Result<Self, Box<dyn Error>> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup. Unset keys keep their default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Box<dyn Error>> {
        let defaults = Self::default();
        let thresholds = BodySignThresholds {
            move_min: parse(&lookup, "RADAR_MOVE_MIN", defaults.thresholds.move_min)?,
            move_max: parse(&lookup, "RADAR_MOVE_MAX", defaults.thresholds.move_max)?,
        };
        if !(thresholds.move_min < thresholds.move_max) {
            return Err(format!(
                "RADAR_MOVE_MIN ({}) must be below RADAR_MOVE_MAX ({})",
                thresholds.move_min, thresholds.move_max
            )
            .into());
        }
        let verify_checksum = match lookup("RADAR_VERIFY_CRC").as_deref().map(str::trim) {
            None => defaults.verify_checksum,
            Some("1") | Some("true") | Some("yes") => true,
            Some("0") | Some("false") | Some("no") => false,
            Some(other) => return Err(format!("RADAR_VERIFY_CRC: expected true or false, got {other:?}").into()),
        };

        Ok(Self {
            port: lookup("RADAR_PORT").unwrap_or(defaults.port),
            baud: parse(&lookup, "RADAR_BAUD", defaults.baud)?,
            timeout: Duration::from_millis(parse(&lookup, "RADAR_TIMEOUT_MS", defaults.timeout.as_millis() as u64)?),
            poll_interval: Duration::from_millis(parse(
                &lookup,
                "RADAR_POLL_MS",
                defaults.poll_interval.as_millis() as u64,
            )?),
            thresholds,
            verify_checksum,
        })
    }

    pub fn assembler_config(&self) -> AssemblerConfig {
        AssemblerConfig { verify_checksum: self.verify_checksum, ..AssemblerConfig::default() }
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, Box<dyn Error>>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e| format!("{key}: cannot parse {raw:?}: {e}").into()),
    }
}
