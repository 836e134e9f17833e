#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::convert::Infallible;
use std::rc::Rc;

use coalarm_core::config::InternetConfig;
use coalarm_core::connectivity::{LinkError, LinkEvent, LinkEvents, WifiLink};
use coalarm_core::power::{DeepSleep, WakeSources};
use coalarm_core::sensors::{AnalogChannel, SensorError};
use embedded_hal::digital::{ErrorType, OutputPin};

pub const RED: usize = 0;
pub const YELLOW: usize = 1;
pub const GREEN: usize = 2;
pub const HEATER: usize = 3;

/// Levels of every board line, shared between the pins and the assertions.
#[derive(Debug, Default)]
pub struct LineBus {
    pub levels: [bool; 4],
    pub toggles: [u32; 4],
    /// Highest number of indicator lines ever high at once
    pub peak_active: usize,
}

impl LineBus {
    pub fn indicator_levels(&self) -> [bool; 3] {
        [self.levels[RED], self.levels[YELLOW], self.levels[GREEN]]
    }

    pub fn total_indicator_toggles(&self) -> u32 {
        self.toggles[RED] + self.toggles[YELLOW] + self.toggles[GREEN]
    }
}

pub type SharedBus = Rc<RefCell<LineBus>>;

pub struct MockPin {
    index: usize,
    bus: SharedBus,
}

impl ErrorType for MockPin {
    type Error = Infallible;
}

impl MockPin {
    fn write(&mut self, high: bool) {
        let mut bus = self.bus.borrow_mut();
        if bus.levels[self.index] != high {
            bus.toggles[self.index] += 1;
        }
        bus.levels[self.index] = high;

        let active = bus.indicator_levels().iter().filter(|l| **l).count();
        bus.peak_active = bus.peak_active.max(active);
    }
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.write(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.write(true);
        Ok(())
    }
}

pub fn board_lines() -> (SharedBus, [MockPin; 3], MockPin) {
    let bus = SharedBus::default();
    let pin = |index| MockPin {
        index,
        bus: bus.clone(),
    };
    let indicator = [pin(RED), pin(YELLOW), pin(GREEN)];
    let heater = pin(HEATER);
    (bus, indicator, heater)
}

/// Replays raw codes; the last one repeats once the script runs out.
pub struct ScriptedAdc {
    codes: VecDeque<Result<u16, SensorError>>,
    last: Result<u16, SensorError>,
}

impl ScriptedAdc {
    pub fn new(codes: &[Result<u16, SensorError>]) -> Self {
        Self {
            codes: codes.iter().copied().collect(),
            last: Ok(0),
        }
    }
}

impl AnalogChannel for ScriptedAdc {
    fn read_raw(&mut self) -> Result<u16, SensorError> {
        if let Some(next) = self.codes.pop_front() {
            self.last = next;
        }
        self.last
    }
}

/// Result of one connect attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    /// Association fails, the radio reports a disconnect
    Drop,
    /// Association succeeds and DHCP hands out an address
    Lease,
    /// Request rejected synchronously
    Reject,
    /// Nothing ever comes back
    Silent,
}

#[derive(Debug, Default)]
pub struct LinkLog {
    pub starts: u32,
    pub connects: u32,
    pub shutdowns: u32,
    pub ssid: String,
}

pub struct ScriptedLink<'a> {
    events: &'a LinkEvents,
    script: VecDeque<Attempt>,
    pub log: Rc<RefCell<LinkLog>>,
}

impl<'a> ScriptedLink<'a> {
    pub fn new(events: &'a LinkEvents, script: &[Attempt]) -> Self {
        Self {
            events,
            script: script.iter().copied().collect(),
            log: Rc::default(),
        }
    }
}

impl WifiLink for ScriptedLink<'_> {
    async fn start(&mut self, credentials: &InternetConfig<'_>) -> Result<(), LinkError> {
        let mut log = self.log.borrow_mut();
        log.starts += 1;
        log.ssid = credentials.ssid.to_string();
        Ok(())
    }

    fn connect(&mut self) -> Result<(), LinkError> {
        self.log.borrow_mut().connects += 1;
        match self.script.pop_front().unwrap_or(Attempt::Drop) {
            Attempt::Drop => {
                self.events
                    .try_send(LinkEvent::Disconnected)
                    .expect("event channel full");
                Ok(())
            }
            Attempt::Lease => {
                self.events
                    .try_send(LinkEvent::AddressAcquired)
                    .expect("event channel full");
                Ok(())
            }
            Attempt::Reject => Err(LinkError::Connect),
            Attempt::Silent => Ok(()),
        }
    }

    async fn shutdown(&mut self) -> Result<(), LinkError> {
        self.log.borrow_mut().shutdowns += 1;
        Ok(())
    }
}

/// What the board looked like at the moment the halt call was issued.
#[derive(Debug, Clone)]
pub struct HaltRecord {
    pub sources: WakeSources,
    pub indicator_levels: [bool; 3],
    pub heater_level: bool,
    pub link_shutdowns: u32,
}

pub const HALT_MESSAGE: &str = "halted for deep sleep";

/// Records the board state and unwinds instead of powering down.
pub struct RecordingSleep {
    bus: SharedBus,
    link_log: Rc<RefCell<LinkLog>>,
    pub halted: Rc<RefCell<Option<HaltRecord>>>,
}

impl RecordingSleep {
    pub fn new(bus: SharedBus, link_log: Rc<RefCell<LinkLog>>) -> Self {
        Self {
            bus,
            link_log,
            halted: Rc::default(),
        }
    }
}

impl DeepSleep for RecordingSleep {
    fn sleep(&mut self, sources: &WakeSources) -> ! {
        let bus = self.bus.borrow();
        *self.halted.borrow_mut() = Some(HaltRecord {
            sources: *sources,
            indicator_levels: bus.indicator_levels(),
            heater_level: bus.levels[HEATER],
            link_shutdowns: self.link_log.borrow().shutdowns,
        });
        drop(bus);
        panic!("{}", HALT_MESSAGE);
    }
}

pub fn credentials() -> InternetConfig<'static> {
    InternetConfig {
        ssid: "workshop",
        password: "correct horse",
    }
}
