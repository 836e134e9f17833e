//! Device configuration and provisioning blob decoding
//!
//! Credentials and tunables are never compiled into the core. The
//! provisioning side encodes a [`DeviceConfig`] with `postcard`; the
//! firmware hands the blob to [`DeviceConfig::decode`] at boot.

use embassy_time::Duration;
use log::error;
use serde::{Deserialize, Serialize};

use crate::app_state::{AppError, FromTruncated};

pub const DEFAULT_SAMPLE_INTERVAL_MS: u32 = 2_000;
pub const DEFAULT_DEBOUNCE_WINDOW_MS: u32 = 200;
/// 30 minutes
pub const DEFAULT_SLEEP_TIMER_SECS: u32 = 30 * 60;
pub const DEFAULT_MAX_RETRY: u8 = 5;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u32 = 60;

#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeviceConfig<'a> {
    #[serde(borrow)]
    pub internet: InternetConfig<'a>,
    pub timing: TimingConfig,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct InternetConfig<'a> {
    pub ssid: &'a str,
    pub password: &'a str,
}

impl InternetConfig<'_> {
    /// Station mode needs at least a network name.
    pub fn is_provisioned(&self) -> bool {
        !self.ssid.is_empty()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingConfig {
    pub sample_interval_ms: u32,
    pub debounce_window_ms: u32,
    pub sleep_timer_secs: u32,
    pub max_retry: u8,
    /// Wall-clock bound on the boot-time connect wait
    pub connect_timeout_secs: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: DEFAULT_SAMPLE_INTERVAL_MS,
            debounce_window_ms: DEFAULT_DEBOUNCE_WINDOW_MS,
            sleep_timer_secs: DEFAULT_SLEEP_TIMER_SECS,
            max_retry: DEFAULT_MAX_RETRY,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

impl TimingConfig {
    pub const fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms as u64)
    }

    pub const fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_window_ms as u64)
    }

    pub const fn sleep_timer(&self) -> Duration {
        Duration::from_secs(self.sleep_timer_secs as u64)
    }

    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs as u64)
    }
}

impl<'a> DeviceConfig<'a> {
    /// Decode a provisioning blob. Strings borrow from `bytes`.
    pub fn decode(bytes: &'a [u8]) -> Result<Self, AppError> {
        postcard::from_bytes(bytes).map_err(|e| {
            error!("Provisioning blob rejected: {:?}", e);
            AppError::Config(heapless::String::from_truncated(
                "provisioning blob is not a valid device config",
            ))
        })
    }

    /// Encode into `buf`, returning the used prefix.
    pub fn encode<'b>(&self, buf: &'b mut [u8]) -> Result<&'b mut [u8], AppError> {
        postcard::to_slice(self, buf).map_err(|e| {
            error!("Device config does not fit the buffer: {:?}", e);
            AppError::Config(heapless::String::from_truncated(
                "device config does not fit the buffer",
            ))
        })
    }
}
