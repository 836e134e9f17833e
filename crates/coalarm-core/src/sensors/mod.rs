//! Gas sensor sampling
//!
//! The sampler reads one raw ADC code per cycle, applies the
//! [`CalibrationProfile`] to obtain a voltage, and derives the CO
//! concentration from the sensor's resistance curve.

mod mq7;

pub use mq7::*;

use thiserror_no_std::Error;

/// Sensor faults. All of them are recovered locally by the control loop,
/// which blanks the indicator and keeps sampling.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum SensorError {
    #[error("ADC read failed on {channel}")]
    ReadFailed { channel: &'static str },
    #[error("raw code {raw} exceeds the {max} full-scale code")]
    CodeOutOfRange { raw: u16, max: u16 },
    #[error("derived voltage {millivolts} mV is not positive")]
    NonPositiveVoltage { millivolts: f32 },
    #[error("concentration is not finite (ratio {ratio})")]
    NonFinite { ratio: f32 },
}

/// A single analog input channel producing raw conversion codes.
pub trait AnalogChannel {
    /// Perform one conversion. Implementations must not cache between calls.
    fn read_raw(&mut self) -> Result<u16, SensorError>;
}

impl<T: AnalogChannel + ?Sized> AnalogChannel for &mut T {
    fn read_raw(&mut self) -> Result<u16, SensorError> {
        (**self).read_raw()
    }
}

/// One sampling cycle's result. Not retained across cycles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleReading {
    pub raw: u16,
    pub millivolts: f32,
    pub ppm: f32,
}

/// Reads the configured channel and converts it with an immutable profile.
pub struct SensorSampler<A> {
    channel: A,
    profile: CalibrationProfile,
}

impl<A: AnalogChannel> SensorSampler<A> {
    pub const fn new(channel: A, profile: CalibrationProfile) -> Self {
        Self { channel, profile }
    }

    pub const fn profile(&self) -> &CalibrationProfile {
        &self.profile
    }

    /// Take one reading.
    ///
    /// A zero code, a voltage at or above the supply, or any other input
    /// that would make the resistance curve divide by zero or go non-finite
    /// is reported as a [`SensorError`] rather than trapping.
    pub fn sample(&mut self) -> Result<SampleReading, SensorError> {
        let raw = self.channel.read_raw()?;
        let max = self.profile.max_code();
        if raw > max {
            return Err(SensorError::CodeOutOfRange { raw, max });
        }

        let millivolts = self.profile.raw_to_millivolts(raw);
        let derived = self.profile.derive(millivolts)?;

        Ok(SampleReading {
            raw,
            millivolts,
            ppm: derived.ppm,
        })
    }
}
