//! Hardware-independent core library for coalarm
//!
//! This crate contains all platform-agnostic logic for the carbon monoxide
//! monitor: sensor sampling and calibration, indicator classification,
//! button debouncing, the sleep transition, the Wi-Fi connection state
//! machine and the control loop that ties them together.
//!
//! It is `#![no_std]` so it compiles on both the ESP32-S3 target and
//! desktop hosts (for the simulator and tests). Hardware is reached only
//! through `embedded-hal` pins and the small traits defined here.

#![no_std]

pub mod app;
pub mod app_state;
pub mod config;
pub mod connectivity;
pub mod debounce;
pub mod heater;
pub mod indicator;
pub mod power;
pub mod sensors;
