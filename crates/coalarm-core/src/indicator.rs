//! Three-line visual indicator for CO concentration
//!
//! Maps a concentration estimate to exactly one of the RED / YELLOW / GREEN
//! lines, or to none of them (OFF) for faults and before power-down.

use embedded_hal::digital::OutputPin;

/// Concentrations strictly above this are RED
pub const RED_THRESHOLD_PPM: f32 = 100.0;
/// Concentrations strictly above this (and not RED) are YELLOW
pub const YELLOW_THRESHOLD_PPM: f32 = 50.0;

/// Indicator state. Exactly one of these is displayed at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorState {
    Red,
    Yellow,
    Green,
    /// All lines inactive
    Off,
}

impl IndicatorState {
    /// Classify a concentration estimate.
    ///
    /// Branch order decides ties: exactly 100 ppm is YELLOW and exactly
    /// 50 ppm is GREEN. Non-finite or negative input has no meaningful
    /// level and falls back to OFF.
    pub fn classify(ppm: f32) -> Self {
        if !ppm.is_finite() || ppm < 0.0 {
            return Self::Off;
        }

        if ppm > RED_THRESHOLD_PPM {
            Self::Red
        } else if ppm > YELLOW_THRESHOLD_PPM {
            Self::Yellow
        } else {
            Self::Green
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Red => "RED",
            Self::Yellow => "YELLOW",
            Self::Green => "GREEN",
            Self::Off => "OFF",
        }
    }
}

/// Output stage of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineDrive {
    PushPull,
    OpenDrain,
}

/// Bias applied to a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineBias {
    None,
    PullUp,
    PullDown,
}

/// One row of the indicator line table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndicatorLine {
    pub state: IndicatorState,
    pub drive: LineDrive,
    pub bias: LineBias,
    /// LED lit when the pin is driven high
    pub active_high: bool,
}

/// Line table, in the order the controller takes its pins.
pub const INDICATOR_LINES: [IndicatorLine; 3] = [
    IndicatorLine {
        state: IndicatorState::Red,
        drive: LineDrive::PushPull,
        bias: LineBias::None,
        active_high: true,
    },
    IndicatorLine {
        state: IndicatorState::Yellow,
        drive: LineDrive::PushPull,
        bias: LineBias::None,
        active_high: true,
    },
    IndicatorLine {
        state: IndicatorState::Green,
        drive: LineDrive::PushPull,
        bias: LineBias::None,
        active_high: true,
    },
];

/// Owns the three indicator pins and enforces the one-active-line rule.
///
/// Every write first releases the lines that must be inactive and only
/// then asserts the selected one, so two lines are never active together.
pub struct IndicatorController<P> {
    lines: [P; 3],
    state: IndicatorState,
}

impl<P: OutputPin> IndicatorController<P> {
    /// Take the pins in [`INDICATOR_LINES`] order and blank them.
    pub fn new(lines: [P; 3]) -> Result<Self, P::Error> {
        let mut controller = Self {
            lines,
            state: IndicatorState::Off,
        };
        controller.apply(IndicatorState::Off)?;
        Ok(controller)
    }

    pub const fn state(&self) -> IndicatorState {
        self.state
    }

    /// Classify `ppm` and show it. Calling again with the same value only
    /// re-asserts the current levels.
    pub fn update(&mut self, ppm: f32) -> Result<IndicatorState, P::Error> {
        let state = IndicatorState::classify(ppm);
        self.apply(state)?;
        Ok(state)
    }

    /// Force every line inactive.
    pub fn clear(&mut self) -> Result<(), P::Error> {
        self.apply(IndicatorState::Off)
    }

    pub fn apply(&mut self, state: IndicatorState) -> Result<(), P::Error> {
        for (line, pin) in INDICATOR_LINES.iter().zip(self.lines.iter_mut()) {
            if line.state != state {
                drive(pin, line, false)?;
            }
        }

        for (line, pin) in INDICATOR_LINES.iter().zip(self.lines.iter_mut()) {
            if line.state == state {
                drive(pin, line, true)?;
            }
        }

        if state != self.state {
            log::debug!("Indicator {} -> {}", self.state.label(), state.label());
        }
        self.state = state;
        Ok(())
    }
}

fn drive<P: OutputPin>(pin: &mut P, line: &IndicatorLine, active: bool) -> Result<(), P::Error> {
    if active == line.active_high {
        pin.set_high()
    } else {
        pin.set_low()
    }
}
