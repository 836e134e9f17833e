//! Firmware-specific application state extensions
//!
//! Re-exports the hardware-independent app state from `coalarm_core` and
//! adds the ESP32-S3 board wiring.

mod hardware;

pub use hardware::*;

// Re-export all shared app state types from coalarm-core
pub use coalarm_core::app_state::*;
