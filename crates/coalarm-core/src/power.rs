//! Power state machine: AWAKE -> ENTERING_SLEEP -> (power off) -> boot
//!
//! Once an accepted button edge has been observed the transition cannot be
//! cancelled. The sequence blanks the indicator and heater, tears down the
//! radio, arms both wake sources and halts. Execution resumes at boot, not
//! after the halt call.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Instant};
use embedded_hal::digital::OutputPin;
use log::{info, warn};

use crate::connectivity::{ConnectivityManager, WifiLink};
use crate::heater::HeaterController;
use crate::indicator::IndicatorController;

/// Raised by the button path, carrying the accepted edge's timestamp.
pub type SleepSignal = Signal<CriticalSectionRawMutex, Instant>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    Awake,
    EnteringSleep,
}

/// Why the device is running, read once at boot.
///
/// Button and timer wakes currently take the same re-initialisation path
/// as a normal power-on; the cause is only reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeCause {
    Button,
    Timer,
    /// Power-on, reset, or a source that was not armed
    Other,
}

impl WakeCause {
    pub fn report(self) {
        match self {
            Self::Button => info!("Wake cause: button"),
            Self::Timer => info!("Wake cause: sleep timer"),
            Self::Other => info!("Wake cause: normal boot"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeLevel {
    Low,
    High,
}

/// The two wake sources armed before halting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WakeSources {
    /// External-pin wake on the button's active level
    pub button_level: WakeLevel,
    pub timer: Duration,
}

/// Low-power subsystem. `sleep` arms the sources and never returns.
pub trait DeepSleep {
    fn sleep(&mut self, sources: &WakeSources) -> !;
}

pub struct PowerStateMachine {
    state: PowerState,
    sources: WakeSources,
}

impl PowerStateMachine {
    /// The button is pulled down, so its active (pressed) level is high.
    pub const fn new(timer: Duration) -> Self {
        Self {
            state: PowerState::Awake,
            sources: WakeSources {
                button_level: WakeLevel::High,
                timer,
            },
        }
    }

    pub const fn state(&self) -> PowerState {
        self.state
    }

    pub const fn wake_sources(&self) -> WakeSources {
        self.sources
    }

    /// AWAKE -> ENTERING_SLEEP. Returns `false` if already entering.
    pub fn begin(&mut self) -> bool {
        match self.state {
            PowerState::Awake => {
                self.state = PowerState::EnteringSleep;
                true
            }
            PowerState::EnteringSleep => false,
        }
    }

    /// Run the teardown and halt.
    ///
    /// Lines are blanked synchronously before anything else, so they are
    /// inactive strictly before the low-power call.
    pub async fn enter_sleep<P, H, L, S>(
        &mut self,
        indicator: &mut IndicatorController<P>,
        heater: &mut HeaterController<H>,
        connectivity: &mut ConnectivityManager<'_>,
        link: &mut L,
        sleeper: &mut S,
    ) -> !
    where
        P: OutputPin,
        H: OutputPin,
        L: WifiLink,
        S: DeepSleep,
    {
        self.begin();
        info!("Entering sleep");

        if let Err(e) = indicator.clear() {
            warn!("Indicator clear failed before sleep: {:?}", e);
        }
        if let Err(e) = heater.off() {
            warn!("Heater off failed before sleep: {:?}", e);
        }

        connectivity.shutdown(link).await;

        let sources = self.sources;
        info!(
            "Arming wake sources: button {:?}, timer {} s",
            sources.button_level,
            sources.timer.as_secs()
        );
        sleeper.sleep(&sources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_is_one_way() {
        let mut power = PowerStateMachine::new(Duration::from_secs(1800));
        assert_eq!(power.state(), PowerState::Awake);

        assert!(power.begin());
        assert_eq!(power.state(), PowerState::EnteringSleep);

        assert!(!power.begin());
        assert_eq!(power.state(), PowerState::EnteringSleep);
    }

    #[test]
    fn wake_sources_pair_button_level_with_timer() {
        let power = PowerStateMachine::new(Duration::from_secs(1800));
        let sources = power.wake_sources();

        assert_eq!(sources.button_level, WakeLevel::High);
        assert_eq!(sources.timer, Duration::from_secs(30 * 60));
    }
}
