//! Encodes the provisioning blob the firmware reads at boot.
//!
//! Values come from a `.env` file or the build environment:
//! `WIFI_SSID`, `WIFI_PASSWORD` and the optional timing overrides
//! `SAMPLE_INTERVAL_MS`, `DEBOUNCE_WINDOW_MS`, `SLEEP_TIMER_SECS`,
//! `MAX_RETRY` and `CONNECT_TIMEOUT_SECS`.

use std::env;
use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use coalarm_core::config::{DeviceConfig, InternetConfig, TimingConfig};

const VARS: [&str; 7] = [
    "WIFI_SSID",
    "WIFI_PASSWORD",
    "SAMPLE_INTERVAL_MS",
    "DEBOUNCE_WINDOW_MS",
    "SLEEP_TIMER_SECS",
    "MAX_RETRY",
    "CONNECT_TIMEOUT_SECS",
];

fn main() -> Result<(), Box<dyn Error>> {
    if let Ok(path) = dotenvy::dotenv() {
        println!("cargo:rerun-if-changed={}", path.display());
    }
    for var in VARS {
        println!("cargo:rerun-if-env-changed={var}");
    }

    let ssid = env::var("WIFI_SSID").unwrap_or_default();
    let password = env::var("WIFI_PASSWORD").unwrap_or_default();
    if ssid.is_empty() {
        println!("cargo:warning=WIFI_SSID not set, the device will run offline");
    }

    let defaults = TimingConfig::default();
    let config = DeviceConfig {
        internet: InternetConfig {
            ssid: &ssid,
            password: &password,
        },
        timing: TimingConfig {
            sample_interval_ms: var_or("SAMPLE_INTERVAL_MS", defaults.sample_interval_ms)?,
            debounce_window_ms: var_or("DEBOUNCE_WINDOW_MS", defaults.debounce_window_ms)?,
            sleep_timer_secs: var_or("SLEEP_TIMER_SECS", defaults.sleep_timer_secs)?,
            max_retry: var_or("MAX_RETRY", defaults.max_retry)?,
            connect_timeout_secs: var_or("CONNECT_TIMEOUT_SECS", defaults.connect_timeout_secs)?,
        },
    };

    let blob = postcard::to_stdvec(&config)?;
    let out = PathBuf::from(env::var("OUT_DIR")?).join("provisioning.bin");
    fs::write(out, blob)?;
    Ok(())
}

fn var_or<T>(name: &str, default: T) -> Result<T, Box<dyn Error>>
where
    T: FromStr,
    T::Err: Error + 'static,
{
    match env::var(name) {
        Ok(value) => Ok(value.trim().parse()?),
        Err(_) => Ok(default),
    }
}
