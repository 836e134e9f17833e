//! ESP32-S3 firmware-specific modules for coalarm
//!
//! This crate contains the code that only builds for the target: the ADC
//! channel, GPIO line setup, the esp-radio station link, RTC deep sleep and
//! the provisioning blob. Everything else lives in `coalarm_core`.

#![no_std]

extern crate alloc;

pub mod app_state;
pub mod provisioning;
pub mod sleep;
pub mod wifi;
