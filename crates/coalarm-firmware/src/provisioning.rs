//! Provisioning blob written by the build script

use coalarm_core::app_state::AppError;
use coalarm_core::config::DeviceConfig;

static BLOB: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/provisioning.bin"));

/// Decode the device configuration baked into this image.
pub fn device_config() -> Result<DeviceConfig<'static>, AppError> {
    DeviceConfig::decode(BLOB)
}
