//! Board wiring for the ESP32-S3 CO monitor
//!
//! | Line            | GPIO | Notes                                  |
//! |-----------------|------|----------------------------------------|
//! | MQ-7 analog out | 1    | ADC1 channel 0, 11 dB attenuation      |
//! | Red LED         | 5    |                                        |
//! | Yellow LED      | 6    |                                        |
//! | Green LED       | 7    |                                        |
//! | Heater MOSFET   | 8    | high = 5 V phase                       |
//! | Button          | 4    | pulled down, RTC capable for ext0 wake |

use coalarm_core::indicator::{INDICATOR_LINES, IndicatorLine, LineBias, LineDrive};
use coalarm_core::sensors::{self, AnalogChannel, SensorError};
use esp_hal::Blocking;
use esp_hal::analog::adc::{Adc, AdcConfig, AdcPin, Attenuation};
use esp_hal::gpio::{AnyPin, DriveMode, Input, InputConfig, Level, Output, OutputConfig, Pull};
use embassy_time::{Duration, Instant};
use esp_hal::peripherals::{ADC1, GPIO1};
use log::info;

/// How long a conversion may stay pending before the read is reported as failed.
const ADC_READ_TIMEOUT: Duration = Duration::from_millis(5);

pub type SensorAdc = Adc<'static, ADC1<'static>, Blocking>;
pub type SensorAdcPin = AdcPin<GPIO1<'static>, ADC1<'static>>;

/// One-shot conversions on the sensor's ADC1 channel.
pub struct McuAdc {
    adc: SensorAdc,
    pin: SensorAdcPin,
}

impl McuAdc {
    pub fn new(adc1: ADC1<'static>, pin: GPIO1<'static>, attenuation: sensors::Attenuation) -> Self {
        let mut config = AdcConfig::new();
        let pin = config.enable_pin(pin, hal_attenuation(attenuation));
        let adc = Adc::new(adc1, config);
        info!("Sensor ADC ready on GPIO1 ({:?})", attenuation);
        Self { adc, pin }
    }
}

impl AnalogChannel for McuAdc {
    fn read_raw(&mut self) -> Result<u16, SensorError> {
        let deadline = Instant::now() + ADC_READ_TIMEOUT;
        loop {
            if let Ok(raw) = self.adc.read_oneshot(&mut self.pin) {
                return Ok(raw);
            }
            if Instant::now() >= deadline {
                return Err(SensorError::ReadFailed { channel: "GPIO1" });
            }
        }
    }
}

fn hal_attenuation(attenuation: sensors::Attenuation) -> Attenuation {
    match attenuation {
        sensors::Attenuation::Db0 => Attenuation::_0dB,
        sensors::Attenuation::Db2p5 => Attenuation::_2p5dB,
        sensors::Attenuation::Db6 => Attenuation::_6dB,
        sensors::Attenuation::Db11 => Attenuation::_11dB,
    }
}

/// Build the indicator outputs from the line table, each starting inactive.
///
/// `pins` must be given in [`INDICATOR_LINES`] order.
pub fn indicator_outputs(pins: [AnyPin<'static>; 3]) -> [Output<'static>; 3] {
    let [red, yellow, green] = pins;
    let [red_line, yellow_line, green_line] = INDICATOR_LINES;
    [
        line_output(red, &red_line),
        line_output(yellow, &yellow_line),
        line_output(green, &green_line),
    ]
}

fn line_output(pin: AnyPin<'static>, line: &IndicatorLine) -> Output<'static> {
    let drive = match line.drive {
        LineDrive::PushPull => DriveMode::PushPull,
        LineDrive::OpenDrain => DriveMode::OpenDrain,
    };
    let pull = match line.bias {
        LineBias::None => Pull::None,
        LineBias::PullUp => Pull::Up,
        LineBias::PullDown => Pull::Down,
    };
    let inactive = if line.active_high {
        Level::Low
    } else {
        Level::High
    };

    Output::new(
        pin,
        inactive,
        OutputConfig::default().with_drive_mode(drive).with_pull(pull),
    )
}

/// MOSFET gate for the heater supply, starting in the low phase.
pub fn heater_output(pin: AnyPin<'static>) -> Output<'static> {
    Output::new(pin, Level::Low, OutputConfig::default())
}

/// The button idles low and reads high while pressed.
pub fn button_input(pin: AnyPin<'static>) -> Input<'static> {
    Input::new(pin, InputConfig::default().with_pull(Pull::Down))
}
