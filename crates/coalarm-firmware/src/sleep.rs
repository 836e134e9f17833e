//! RTC deep sleep and wake-cause mapping

use coalarm_core::power::{DeepSleep, WakeCause, WakeLevel, WakeSources};
use esp_hal::gpio::RtcPinWithResistors;
use esp_hal::rtc_cntl::sleep::{Ext0WakeupSource, TimerWakeupSource, WakeupLevel};
use esp_hal::rtc_cntl::{Rtc, SleepSource, wakeup_cause};
use log::{info, warn};

/// Read once at boot.
pub fn boot_wake_cause() -> WakeCause {
    let source = wakeup_cause();
    info!("RTC wakeup source {:?}", source);
    match source {
        SleepSource::Ext0 => WakeCause::Button,
        SleepSource::Timer => WakeCause::Timer,
        _ => WakeCause::Other,
    }
}

/// Deep sleep with the button on ext0 and the RTC timer armed.
pub struct EspDeepSleep<P> {
    rtc: Rtc<'static>,
    button: Option<P>,
}

impl<P: RtcPinWithResistors> EspDeepSleep<P> {
    pub fn new(rtc: Rtc<'static>, button: P) -> Self {
        Self {
            rtc,
            button: Some(button),
        }
    }
}

impl<P: RtcPinWithResistors> DeepSleep for EspDeepSleep<P> {
    fn sleep(&mut self, sources: &WakeSources) -> ! {
        let timer = TimerWakeupSource::new(core::time::Duration::from_millis(
            sources.timer.as_millis(),
        ));
        let level = match sources.button_level {
            WakeLevel::Low => WakeupLevel::Low,
            WakeLevel::High => WakeupLevel::High,
        };

        match self.button.take() {
            Some(pin) => {
                let button = Ext0WakeupSource::new(pin, level);
                self.rtc.sleep_deep(&[&timer, &button])
            }
            None => {
                warn!("Button wake pin unavailable, arming timer only");
                self.rtc.sleep_deep(&[&timer])
            }
        }
    }
}
