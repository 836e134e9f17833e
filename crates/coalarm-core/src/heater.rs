//! MQ-7 heater cycle
//!
//! The sensor's heater alternates between 5 V for 60 s and 1.4 V for 90 s.
//! An external MOSFET switches the supply; its gate line is active during
//! the high phase. Readings taken near the end of the low phase are the
//! ones the sensor is specified for.

use embassy_time::{Duration, Instant};
use embedded_hal::digital::OutputPin;
use log::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaterPhase {
    /// 5 V burn-off
    High,
    /// 1.4 V measurement phase
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaterSchedule {
    pub high: Duration,
    pub low: Duration,
}

pub const MQ7_HEATER_SCHEDULE: HeaterSchedule = HeaterSchedule {
    high: Duration::from_secs(60),
    low: Duration::from_secs(90),
};

impl HeaterSchedule {
    pub fn period(&self) -> Duration {
        self.high + self.low
    }

    /// Phase at `elapsed` since the cycle started.
    pub fn phase_at(&self, elapsed: Duration) -> HeaterPhase {
        let period = self.period().as_ticks();
        if period == 0 {
            return HeaterPhase::High;
        }

        if elapsed.as_ticks() % period < self.high.as_ticks() {
            HeaterPhase::High
        } else {
            HeaterPhase::Low
        }
    }
}

pub struct HeaterController<P> {
    pin: P,
    schedule: HeaterSchedule,
    started: Instant,
    phase: Option<HeaterPhase>,
}

impl<P: OutputPin> HeaterController<P> {
    pub fn new(mut pin: P, schedule: HeaterSchedule) -> Result<Self, P::Error> {
        pin.set_low()?;
        Ok(Self {
            pin,
            schedule,
            started: Instant::from_ticks(0),
            phase: None,
        })
    }

    /// Restart the cycle at `now` with the high phase.
    pub fn start(&mut self, now: Instant) -> Result<HeaterPhase, P::Error> {
        self.started = now;
        self.phase = None;
        self.update(now)
    }

    pub const fn phase(&self) -> Option<HeaterPhase> {
        self.phase
    }

    /// Drive the gate for the phase at `now`.
    pub fn update(&mut self, now: Instant) -> Result<HeaterPhase, P::Error> {
        let phase = self
            .schedule
            .phase_at(now.saturating_duration_since(self.started));

        if self.phase != Some(phase) {
            match phase {
                HeaterPhase::High => self.pin.set_high()?,
                HeaterPhase::Low => self.pin.set_low()?,
            }
            info!("Heater phase {:?}", phase);
            self.phase = Some(phase);
        }
        Ok(phase)
    }

    /// Release the gate. The next `update` re-asserts the schedule.
    pub fn off(&mut self) -> Result<(), P::Error> {
        self.pin.set_low()?;
        self.phase = None;
        Ok(())
    }
}
