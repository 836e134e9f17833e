//! Desktop simulator for the coalarm CO monitor.
//!
//! Runs the real control loop from `coalarm_core` on an embassy executor
//! thread against simulated hardware, and shows the indicator and heater
//! lines in an SDL2 window via `embedded-graphics-simulator`.
//!
//! # Key bindings
//!
//! | Key         | Action                     |
//! |-------------|----------------------------|
//! | Space/Enter | Press the button (sleep)   |
//! | Q / Esc     | Quit                       |
//!
//! Holding a key repeats edges, which the debouncer filters.
//!
//! # Environment
//!
//! | Variable           | Default     | Meaning                                 |
//! |--------------------|-------------|-----------------------------------------|
//! | `SIM_SSID`         | `simulated` | SSID handed to the link; empty = none   |
//! | `SIM_WIFI_FAILURES`| `2`         | Connect attempts that fail before a lease |
//! | `SIM_INTERVAL_MS`  | `1000`      | Sample interval                         |

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration as StdDuration, Instant as StdInstant};

use embassy_executor::Executor;
use embassy_time::Instant;
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::mono_font::ascii::FONT_6X10;
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{Circle, PrimitiveStyle, Rectangle};
use embedded_graphics::text::Text;
use embedded_graphics_simulator::{
    OutputSettingsBuilder, SimulatorDisplay, SimulatorEvent, Window, sdl2::Keycode,
};
use embedded_hal::digital::{ErrorType, OutputPin};
use log::{info, warn};
use static_cell::StaticCell;

use coalarm_core::app::{App, Hardware};
use coalarm_core::config::{DeviceConfig, InternetConfig, TimingConfig};
use coalarm_core::connectivity::{LinkError, LinkEvent, LinkEvents, WifiLink};
use coalarm_core::debounce::ButtonDebouncer;
use coalarm_core::heater::MQ7_HEATER_SCHEDULE;
use coalarm_core::power::{DeepSleep, SleepSignal, WakeCause, WakeSources};
use coalarm_core::sensors::{
    AnalogChannel, CalibrationProfile, MQ7_PROFILE, PPM_EXPONENT, PPM_SCALE, SensorError,
};

// ---------------------------------------------------------------------------
// Window constants
// ---------------------------------------------------------------------------

const PANEL_WIDTH_PX: u32 = 200;
const PANEL_HEIGHT_PX: u32 = 90;
const WINDOW_SCALE: u32 = 3;
const FRAME_DURATION: StdDuration = StdDuration::from_millis(33);

/// Seconds for the synthetic gas curve to go from clean air to its peak and back.
const CURVE_PERIOD_SECS: f32 = 120.0;

const RED: usize = 0;
const YELLOW: usize = 1;
const GREEN: usize = 2;
const HEATER: usize = 3;

// ---------------------------------------------------------------------------
// Shared channels
// ---------------------------------------------------------------------------

static LINK_EVENTS: LinkEvents = LinkEvents::new();
static SLEEP_REQUESTS: SleepSignal = SleepSignal::new();
static BUTTON: StaticCell<ButtonDebouncer<'static>> = StaticCell::new();
static EXECUTOR: StaticCell<Executor> = StaticCell::new();

// ---------------------------------------------------------------------------
// Simulated hardware
// ---------------------------------------------------------------------------

/// Line levels written by the control loop and drawn by the window.
type Panel = Arc<Mutex<[bool; 4]>>;

struct PanelPin {
    index: usize,
    panel: Panel,
}

impl ErrorType for PanelPin {
    type Error = core::convert::Infallible;
}

impl PanelPin {
    fn write(&mut self, high: bool) {
        self.panel.lock().unwrap_or_else(PoisonError::into_inner)[self.index] = high;
    }
}

impl OutputPin for PanelPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.write(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.write(true);
        Ok(())
    }
}

/// Generates raw codes for a CO level that rises and falls over time.
struct MockGasChannel {
    profile: CalibrationProfile,
    started: StdInstant,
}

impl MockGasChannel {
    fn new(profile: CalibrationProfile) -> Self {
        Self {
            profile,
            started: StdInstant::now(),
        }
    }

    /// 10 ppm in clean air up to about 250 ppm at the peak.
    fn ppm_at(&self, secs: f32) -> f32 {
        let phase = (secs / CURVE_PERIOD_SECS) * core::f32::consts::TAU;
        10.0 + 120.0 * (1.0 - phase.cos())
    }

    /// Invert the resistance curve back to a converter code.
    fn code_for(&self, ppm: f32) -> u16 {
        let p = &self.profile;
        let ratio = (ppm / PPM_SCALE).powf(1.0 / PPM_EXPONENT);
        let sensor_kohm = ratio * p.clean_air_kohm;
        let volts = p.supply_volts * p.load_kohm / (sensor_kohm + p.load_kohm);
        let code = volts * 1000.0 / p.full_scale_mv() * p.max_code() as f32;
        code.clamp(0.0, p.max_code() as f32) as u16
    }
}

impl AnalogChannel for MockGasChannel {
    fn read_raw(&mut self) -> Result<u16, SensorError> {
        let ppm = self.ppm_at(self.started.elapsed().as_secs_f32());
        Ok(self.code_for(ppm))
    }
}

/// Station link that drops a fixed number of attempts, then leases an address.
struct SimLink {
    failures_left: u32,
}

impl WifiLink for SimLink {
    async fn start(&mut self, credentials: &InternetConfig<'_>) -> Result<(), LinkError> {
        info!("[sim] radio up, joining \"{}\"", credentials.ssid);
        Ok(())
    }

    fn connect(&mut self) -> Result<(), LinkError> {
        let event = if self.failures_left > 0 {
            self.failures_left -= 1;
            LinkEvent::Disconnected
        } else {
            LinkEvent::AddressAcquired
        };
        LINK_EVENTS.try_send(event).map_err(|_| LinkError::Connect)
    }

    async fn shutdown(&mut self) -> Result<(), LinkError> {
        info!("[sim] radio off");
        Ok(())
    }
}

/// Stands in for the RTC: reports the armed sources and ends the process.
struct SimSleep;

impl DeepSleep for SimSleep {
    fn sleep(&mut self, sources: &WakeSources) -> ! {
        info!(
            "[sim] deep sleep: button wake on {:?}, timer {} s. Exiting.",
            sources.button_level,
            sources.timer.as_secs()
        );
        std::process::exit(0)
    }
}

type SimApp = App<'static, MockGasChannel, PanelPin, PanelPin, SimLink, SimSleep>;

#[embassy_executor::task]
async fn control_loop(app: SimApp) {
    app.run(WakeCause::Other).await
}

/// Runs the embassy executor on the calling thread. Never returns.
fn control_thread(app: SimApp) {
    let executor = EXECUTOR.init(Executor::new());
    executor.run(|spawner| {
        if let Err(e) = spawner.spawn(control_loop(app)) {
            log::error!("Control loop spawn failed: {:?}", e);
        }
    })
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(value) => value.parse().unwrap_or_else(|_| {
            warn!("Ignoring unparsable {}={:?}", name, value);
            default
        }),
        Err(_) => default,
    }
}

fn device_config() -> DeviceConfig<'static> {
    let ssid: &'static str = env_or("SIM_SSID", String::from("simulated")).leak();
    DeviceConfig {
        internet: InternetConfig {
            ssid,
            password: "simulated",
        },
        timing: TimingConfig {
            sample_interval_ms: env_or("SIM_INTERVAL_MS", 1_000),
            ..TimingConfig::default()
        },
    }
}

/// The keyboard button, filtered with the configured debounce window.
fn button_debouncer(config: &DeviceConfig<'_>) -> ButtonDebouncer<'static> {
    ButtonDebouncer::new(config.timing.debounce_window(), &SLEEP_REQUESTS)
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn draw_panel(display: &mut SimulatorDisplay<Rgb565>, levels: [bool; 4]) {
    let _ = display.clear(Rgb565::BLACK);

    let leds = [
        (RED, Rgb565::RED, "CO HIGH"),
        (YELLOW, Rgb565::YELLOW, "CO WARN"),
        (GREEN, Rgb565::GREEN, "OK"),
    ];
    let label = MonoTextStyle::new(&FONT_6X10, Rgb565::WHITE);

    for (slot, (index, color, name)) in leds.into_iter().enumerate() {
        let x = 20 + slot as i32 * 60;
        let fill = if levels[index] { color } else { Rgb565::CSS_DIM_GRAY };
        let _ = Circle::new(Point::new(x, 12), 36)
            .into_styled(PrimitiveStyle::with_fill(fill))
            .draw(display);
        let _ = Text::new(name, Point::new(x - 2, 62), label).draw(display);
    }

    let heater = if levels[HEATER] {
        Rgb565::CSS_ORANGE
    } else {
        Rgb565::CSS_DIM_GRAY
    };
    let _ = Rectangle::new(Point::new(20, 74), Size::new(8, 8))
        .into_styled(PrimitiveStyle::with_fill(heater))
        .draw(display);
    let _ = Text::new("heater 5V", Point::new(32, 82), label).draw(display);
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!("Starting coalarm simulator");
    info!("Keys: Space/Enter=Button  Q=Quit");

    let config = device_config();
    let button = BUTTON.init(button_debouncer(&config));

    let panel: Panel = Arc::default();
    let pin = |index| PanelPin {
        index,
        panel: panel.clone(),
    };
    let hardware = Hardware {
        adc: MockGasChannel::new(MQ7_PROFILE),
        indicator_lines: [pin(RED), pin(YELLOW), pin(GREEN)],
        heater_line: pin(HEATER),
        link: SimLink {
            failures_left: env_or("SIM_WIFI_FAILURES", 2),
        },
        sleeper: SimSleep,
    };

    let app = match App::new(
        hardware,
        config,
        MQ7_PROFILE,
        MQ7_HEATER_SCHEDULE,
        &LINK_EVENTS,
        &SLEEP_REQUESTS,
    ) {
        Ok(app) => app,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    };

    std::thread::spawn(move || control_thread(app));

    let mut display =
        SimulatorDisplay::<Rgb565>::new(Size::new(PANEL_WIDTH_PX, PANEL_HEIGHT_PX));
    let output_settings = OutputSettingsBuilder::new().scale(WINDOW_SCALE).build();
    let mut window = Window::new("coalarm Simulator", &output_settings);

    // The SDL window is lazily initialized on the first `update()` call.
    // We must call `update()` once before `events()` or it will panic.
    draw_panel(&mut display, [false; 4]);
    window.update(&display);

    'running: loop {
        let frame_start = StdInstant::now();

        for event in window.events() {
            match event {
                SimulatorEvent::Quit => break 'running,
                SimulatorEvent::KeyDown { keycode, .. } => match keycode {
                    Keycode::Q | Keycode::Escape => break 'running,
                    Keycode::Space | Keycode::Return => {
                        button.on_edge(Instant::now());
                    }
                    _ => {}
                },
                _ => {}
            }
        }

        let levels = *panel.lock().unwrap_or_else(PoisonError::into_inner);
        draw_panel(&mut display, levels);
        window.update(&display);

        let elapsed = frame_start.elapsed();
        if elapsed < FRAME_DURATION {
            std::thread::sleep(FRAME_DURATION - elapsed);
        }
    }

    info!("Simulator exiting");
}
