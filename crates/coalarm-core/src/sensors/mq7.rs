use crate::sensors::SensorError;

/// Scale of the MQ-7 CO curve: `ppm = PPM_SCALE * (RS / RO) ^ PPM_EXPONENT`
pub const PPM_SCALE: f32 = 100.0;
pub const PPM_EXPONENT: f32 = -1.4;

/// ADC input attenuation. Widens the measurable range above the reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attenuation {
    Db0,
    Db2p5,
    Db6,
    Db11,
}

impl Attenuation {
    /// Full-scale input relative to the ADC reference voltage
    pub const fn gain(self) -> f32 {
        match self {
            Self::Db0 => 1.0,
            Self::Db2p5 => 1.34,
            Self::Db6 => 2.0,
            Self::Db11 => 3.55,
        }
    }
}

/// Fixed parameters mapping a raw code to a voltage and the voltage to a
/// concentration. Immutable once the sampler owns it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationProfile {
    /// Sensor supply (VC), volts
    pub supply_volts: f32,
    /// Load resistance (RL), kilo-ohms
    pub load_kohm: f32,
    /// Sensor resistance in clean air (RO), kilo-ohms
    pub clean_air_kohm: f32,
    pub adc_bits: u8,
    pub attenuation: Attenuation,
    /// ADC reference voltage, millivolts
    pub reference_mv: f32,
}

/// Default profile for the MQ-7 breakout on a 12-bit ESP32-S3 channel.
pub const MQ7_PROFILE: CalibrationProfile = CalibrationProfile {
    supply_volts: 5.0,
    load_kohm: 10.0,
    clean_air_kohm: 10.0,
    adc_bits: 12,
    attenuation: Attenuation::Db11,
    reference_mv: 1100.0,
};

/// Intermediate values of the resistance curve, kept for logging.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Derivation {
    pub sensor_kohm: f32,
    pub ratio: f32,
    pub ppm: f32,
}

impl CalibrationProfile {
    /// Largest code the converter can produce (4095 for 12 bits).
    pub const fn max_code(&self) -> u16 {
        let bits = if self.adc_bits > 16 { 16 } else { self.adc_bits };
        ((1u32 << bits) - 1) as u16
    }

    pub fn full_scale_mv(&self) -> f32 {
        self.reference_mv * self.attenuation.gain()
    }

    pub fn raw_to_millivolts(&self, raw: u16) -> f32 {
        raw as f32 * self.full_scale_mv() / self.max_code() as f32
    }

    /// Apply the resistance curve to a derived voltage.
    ///
    /// `RS = (VC / V - 1) * RL`, `ratio = RS / RO`,
    /// `ppm = 100 * ratio ^ -1.4`. The voltage must be strictly positive;
    /// NaN is rejected by the same check.
    pub fn derive(&self, millivolts: f32) -> Result<Derivation, SensorError> {
        if !(millivolts > 0.0) {
            return Err(SensorError::NonPositiveVoltage { millivolts });
        }

        let volts = millivolts / 1000.0;
        let sensor_kohm = (self.supply_volts / volts - 1.0) * self.load_kohm;
        let ratio = sensor_kohm / self.clean_air_kohm;
        let ppm = PPM_SCALE * libm::powf(ratio, PPM_EXPONENT);

        if !ppm.is_finite() {
            return Err(SensorError::NonFinite { ratio });
        }

        Ok(Derivation {
            sensor_kohm,
            ratio,
            ppm,
        })
    }
}
