//! Main control loop
//!
//! One execution context samples, updates the indicator and heater, then
//! waits for the next cycle. The wait, and the boot-time connect, race
//! against the sleep request raised by the button path; whichever wins
//! decides whether the loop continues or the device powers down.

use embassy_futures::select::{Either, Either3, select, select3};
use embassy_time::{Instant, Timer};
use embedded_hal::digital::OutputPin;
use log::{info, warn};

use crate::app_state::{AppError, AppRunState, FromTruncated};
use crate::config::DeviceConfig;
use crate::connectivity::{ConnectivityManager, LinkEvents, WifiLink};
use crate::heater::{HeaterController, HeaterPhase, HeaterSchedule};
use crate::indicator::{IndicatorController, IndicatorState};
use crate::power::{DeepSleep, PowerStateMachine, SleepSignal, WakeCause};
use crate::sensors::{AnalogChannel, CalibrationProfile, SampleReading, SensorError, SensorSampler};

/// Board resources the loop takes ownership of.
pub struct Hardware<A, P, H, L, S> {
    pub adc: A,
    /// Red, yellow, green, in `INDICATOR_LINES` order
    pub indicator_lines: [P; 3],
    pub heater_line: H,
    pub link: L,
    pub sleeper: S,
}

/// What the loop does after a wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Sleep,
}

/// Outcome of one sampling cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleReport {
    pub reading: Result<SampleReading, SensorError>,
    pub indicator: IndicatorState,
    pub heater: Option<HeaterPhase>,
}

pub struct App<'a, A, P, H, L, S> {
    sampler: SensorSampler<A>,
    indicator: IndicatorController<P>,
    heater: HeaterController<H>,
    connectivity: ConnectivityManager<'a>,
    link: L,
    power: PowerStateMachine,
    sleeper: S,
    sleep_requests: &'a SleepSignal,
    config: DeviceConfig<'a>,
    run_state: AppRunState,
}

impl<'a, A, P, H, L, S> App<'a, A, P, H, L, S>
where
    A: AnalogChannel,
    P: OutputPin,
    H: OutputPin,
    L: WifiLink,
    S: DeepSleep,
{
    /// Wire the hardware into the components. Pin failures here are fatal.
    pub fn new(
        hardware: Hardware<A, P, H, L, S>,
        config: DeviceConfig<'a>,
        profile: CalibrationProfile,
        schedule: HeaterSchedule,
        link_events: &'a LinkEvents,
        sleep_requests: &'a SleepSignal,
    ) -> Result<Self, AppError> {
        let indicator = IndicatorController::new(hardware.indicator_lines).map_err(|e| {
            log::error!("Indicator line setup failed: {:?}", e);
            AppError::HardwareInit(heapless::String::from_truncated("indicator lines"))
        })?;
        let heater = HeaterController::new(hardware.heater_line, schedule).map_err(|e| {
            log::error!("Heater line setup failed: {:?}", e);
            AppError::HardwareInit(heapless::String::from_truncated("heater line"))
        })?;

        let timing = config.timing;
        Ok(Self {
            sampler: SensorSampler::new(hardware.adc, profile),
            indicator,
            heater,
            connectivity: ConnectivityManager::new(
                config.internet,
                timing.max_retry,
                timing.connect_timeout(),
                link_events,
            ),
            link: hardware.link,
            power: PowerStateMachine::new(timing.sleep_timer()),
            sleeper: hardware.sleeper,
            sleep_requests,
            config,
            run_state: AppRunState::Booting,
        })
    }

    pub const fn run_state(&self) -> AppRunState {
        self.run_state
    }

    pub const fn connectivity(&self) -> &ConnectivityManager<'a> {
        &self.connectivity
    }

    pub const fn indicator_state(&self) -> IndicatorState {
        self.indicator.state()
    }

    /// Boot sequence: report the wake cause, start the heater, and bring
    /// the link up. Every wake cause takes this same path.
    pub async fn boot(&mut self, wake: WakeCause, now: Instant) -> Flow {
        wake.report();

        if let Err(e) = self.heater.start(now) {
            warn!("Heater start failed: {:?}", e);
        }

        self.run_state = AppRunState::WifiConnecting;
        let connect = self.connectivity.connect(&mut self.link);
        match select(connect, self.sleep_requests.wait()).await {
            Either::First(Ok(())) => {
                self.run_state = AppRunState::WifiConnected;
                Flow::Continue
            }
            Either::First(Err(e)) => {
                warn!("Running offline: {}", e);
                self.run_state = AppRunState::Offline;
                Flow::Continue
            }
            Either::Second(at) => {
                info!("Sleep requested during connect ({} ms)", at.as_millis());
                Flow::Sleep
            }
        }
    }

    /// One sampling cycle. Sensor faults blank the indicator and are logged;
    /// they never stop the loop.
    pub fn step(&mut self, now: Instant) -> CycleReport {
        let heater = match self.heater.update(now) {
            Ok(phase) => Some(phase),
            Err(e) => {
                warn!("Heater update failed: {:?}", e);
                None
            }
        };

        let reading = self.sampler.sample();
        let shown = match reading {
            Ok(sample) => self.indicator.update(sample.ppm),
            Err(fault) => {
                warn!("Sensor fault: {}", fault);
                self.indicator
                    .apply(IndicatorState::Off)
                    .map(|()| IndicatorState::Off)
            }
        };

        let indicator = match shown {
            Ok(state) => state,
            Err(e) => {
                warn!("Indicator write failed: {:?}", e);
                self.indicator.state()
            }
        };

        if let Ok(sample) = reading {
            info!(
                "CO {} ppm (raw {}, {} mV, heater {:?}) -> {}",
                sample.ppm,
                sample.raw,
                sample.millivolts,
                heater,
                indicator.label()
            );
        }

        CycleReport {
            reading,
            indicator,
            heater,
        }
    }

    /// Wait out the sample interval. Link events arriving meanwhile are
    /// handled in place; a sleep request ends the wait early.
    pub async fn wait_next(&mut self) -> Flow {
        let deadline = Instant::now() + self.config.timing.sample_interval();
        let events = self.connectivity.events();

        loop {
            match select3(
                Timer::at(deadline),
                self.sleep_requests.wait(),
                events.receive(),
            )
            .await
            {
                Either3::First(()) => return Flow::Continue,
                Either3::Second(at) => {
                    info!("Sleep requested ({} ms)", at.as_millis());
                    return Flow::Sleep;
                }
                Either3::Third(event) => {
                    self.connectivity.handle_event(&mut self.link, event);
                }
            }
        }
    }

    /// Tear down and halt. Never returns.
    pub async fn enter_sleep(&mut self) -> ! {
        self.run_state = AppRunState::EnteringSleep;
        self.power
            .enter_sleep(
                &mut self.indicator,
                &mut self.heater,
                &mut self.connectivity,
                &mut self.link,
                &mut self.sleeper,
            )
            .await
    }

    /// Boot, then sample until a sleep request arrives.
    pub async fn run(mut self, wake: WakeCause) -> ! {
        if self.boot(wake, Instant::now()).await == Flow::Sleep {
            self.enter_sleep().await
        }

        loop {
            self.step(Instant::now());
            if self.wait_next().await == Flow::Sleep {
                self.enter_sleep().await
            }
        }
    }
}
