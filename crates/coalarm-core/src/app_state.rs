//! Application-wide run state and error types for coalarm

use thiserror_no_std::Error;

use crate::connectivity::ConnectivityError;
use crate::sensors::SensorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppRunState {
    Booting,
    WifiConnecting,
    WifiConnected,
    /// Connectivity failed for this wake cycle; sampling continues
    Offline,
    EnteringSleep,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Hardware initialization failed: {0}")]
    HardwareInit(heapless::String<64>),
    #[error("Configuration error: {0}")]
    Config(heapless::String<64>),
    #[error("Sensor fault: {0}")]
    Sensor(SensorError),
    #[error("Connectivity failure: {0}")]
    Connectivity(ConnectivityError),
}

impl From<SensorError> for AppError {
    fn from(value: SensorError) -> Self {
        Self::Sensor(value)
    }
}

impl From<ConnectivityError> for AppError {
    fn from(value: ConnectivityError) -> Self {
        Self::Connectivity(value)
    }
}

/// Builds a bounded string, cutting the input at capacity instead of failing.
pub trait FromTruncated<T> {
    fn from_truncated(value: T) -> Self;
}

impl<'a, const N: usize> FromTruncated<&'a str> for heapless::String<N> {
    fn from_truncated(value: &'a str) -> Self {
        let mut out = heapless::String::<N>::new();
        for ch in value.chars() {
            if out.push(ch).is_err() {
                break;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncated_string_keeps_prefix() {
        let s: heapless::String<4> = heapless::String::from_truncated("sensor");
        assert_eq!(s.as_str(), "sens");
    }

    #[test]
    fn truncated_string_fits_short_input() {
        let s: heapless::String<64> = heapless::String::from_truncated("adc");
        assert_eq!(s.as_str(), "adc");
    }
}
