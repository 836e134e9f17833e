//! esp-radio station link
//!
//! Connect outcomes reach the control loop through the link-event channel:
//! the driver's `StaDisconnected` handler reports failed or lost
//! associations, and the DHCP watcher reports acquired addresses.

use alloc::string::String;

use coalarm_core::config::InternetConfig;
use coalarm_core::connectivity::{LinkError, LinkEvent, LinkEvents, WifiLink};
use embassy_net::{Runner, Stack};
use embassy_time::{Duration, with_timeout};
use esp_radio::wifi::event::{self, EventExt};
use esp_radio::wifi::{ClientConfig, ModeConfig, WifiController, WifiDevice};
use log::{debug, info, warn};

/// Upper bound on the radio stop call during teardown.
const STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// Owns the Wi-Fi controller until teardown drops it.
pub struct EspWifiLink {
    controller: Option<WifiController<'static>>,
}

impl EspWifiLink {
    pub fn new(controller: WifiController<'static>) -> Self {
        Self {
            controller: Some(controller),
        }
    }
}

impl WifiLink for EspWifiLink {
    async fn start(&mut self, credentials: &InternetConfig<'_>) -> Result<(), LinkError> {
        let controller = self.controller.as_mut().ok_or(LinkError::Start)?;

        let config = ModeConfig::Client(
            ClientConfig::default()
                .with_ssid(String::from(credentials.ssid))
                .with_password(String::from(credentials.password)),
        );
        controller.set_config(&config).map_err(|e| {
            warn!("Wi-Fi set_config error: {:?}", e);
            LinkError::Config
        })?;

        controller.start_async().await.map_err(|e| {
            warn!("Wi-Fi start error: {:?}", e);
            LinkError::Start
        })?;
        info!("Wi-Fi station started");
        Ok(())
    }

    fn connect(&mut self) -> Result<(), LinkError> {
        let controller = self.controller.as_mut().ok_or(LinkError::Connect)?;
        controller.connect().map_err(|e| {
            warn!("Wi-Fi connect error: {:?}", e);
            LinkError::Connect
        })
    }

    async fn shutdown(&mut self) -> Result<(), LinkError> {
        let Some(mut controller) = self.controller.take() else {
            return Ok(());
        };

        let stopped = match with_timeout(STOP_TIMEOUT, controller.stop_async()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                warn!("Wi-Fi stop error: {:?}", e);
                Err(LinkError::Stop)
            }
            Err(_) => {
                warn!("Wi-Fi stop timed out");
                Err(LinkError::Stop)
            }
        };
        // Dropping the controller deinitialises the driver
        drop(controller);
        stopped
    }
}

/// Route driver disconnect events into `events`. Install once, before the
/// first connect attempt.
pub fn install_event_handlers(events: &'static LinkEvents) {
    event::StaDisconnected::update_handler(move |event| {
        debug!("Wi-Fi disconnected, reason {}", event.reason());
        if events.try_send(LinkEvent::Disconnected).is_err() {
            warn!("Link event channel full, disconnect dropped");
        }
    });
}

#[embassy_executor::task]
pub async fn net_task(mut runner: Runner<'static, WifiDevice<'static>>) {
    runner.run().await
}

/// Report every DHCP lease as [`LinkEvent::AddressAcquired`].
#[embassy_executor::task]
pub async fn address_watch_task(stack: Stack<'static>, events: &'static LinkEvents) {
    loop {
        stack.wait_config_up().await;
        if let Some(config) = stack.config_v4() {
            info!("DHCP address {}", config.address);
        }
        events.send(LinkEvent::AddressAcquired).await;

        stack.wait_config_down().await;
        debug!("DHCP address released");
    }
}
