#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

use coalarm_core::app::{App, Hardware};
use coalarm_core::app_state::{AppError, FromTruncated};
use coalarm_core::connectivity::LinkEvents;
use coalarm_core::debounce::ButtonDebouncer;
use coalarm_core::heater::MQ7_HEATER_SCHEDULE;
use coalarm_core::power::SleepSignal;
use coalarm_core::sensors::MQ7_PROFILE;
use coalarm_firmware::app_state::{McuAdc, button_input, heater_output, indicator_outputs};
use coalarm_firmware::provisioning;
use coalarm_firmware::sleep::{EspDeepSleep, boot_wake_cause};
use coalarm_firmware::wifi::{self, EspWifiLink};
use embassy_executor::Spawner;
use embassy_net::StackResources;
use esp_hal::clock::CpuClock;
use esp_hal::gpio::{Input, Pin};
use esp_hal::rng::Rng;
use esp_hal::rtc_cntl::Rtc;
use esp_hal::timer::timg::TimerGroup;
use log::info;
use static_cell::StaticCell;

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    rtt_target::rprintln!("PANIC: {}", info);
    loop {}
}

extern crate alloc;

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

static LINK_EVENTS: LinkEvents = LinkEvents::new();
static SLEEP_REQUESTS: SleepSignal = SleepSignal::new();

static RADIO: StaticCell<esp_radio::Controller<'static>> = StaticCell::new();
static NET_RESOURCES: StaticCell<StackResources<3>> = StaticCell::new();
static BUTTON: StaticCell<ButtonDebouncer<'static>> = StaticCell::new();

#[embassy_executor::task]
async fn button_task(mut button: Input<'static>, debouncer: &'static ButtonDebouncer<'static>) {
    debouncer.watch(&mut button).await
}

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    rtt_target::rtt_init_log!();

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    let wake = boot_wake_cause();

    esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: 73744);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    info!("Embassy initialized!");

    let device = match provisioning::device_config() {
        Ok(device) => device,
        Err(e) => panic!("{}", e),
    };

    // SAFETY: the alias is only handed to the ext0 wake source inside
    // `EspDeepSleep::sleep`. That runs on the control loop after teardown,
    // right before the halt; the button task is never polled again once the
    // control loop stops yielding, so the input driver and ext0 never touch
    // the pad at the same time.
    let wake_pin = unsafe { peripherals.GPIO4.clone_unchecked() };
    let button = button_input(peripherals.GPIO4.degrade());
    let debouncer = BUTTON.init(ButtonDebouncer::new(
        device.timing.debounce_window(),
        &SLEEP_REQUESTS,
    ));
    spawner
        .spawn(button_task(button, debouncer))
        .expect("button_task spawn");

    let radio = match esp_radio::init() {
        Ok(radio) => RADIO.init(radio),
        Err(e) => panic!("{}", hardware_init("radio", e)),
    };
    let (controller, interfaces) =
        match esp_radio::wifi::new(radio, peripherals.WIFI, Default::default()) {
            Ok(parts) => parts,
            Err(e) => panic!("{}", hardware_init("wifi", e)),
        };

    let rng = Rng::new();
    let seed = (rng.random() as u64) << 32 | rng.random() as u64;
    let (stack, runner) = embassy_net::new(
        interfaces.sta,
        embassy_net::Config::dhcpv4(Default::default()),
        NET_RESOURCES.init(StackResources::new()),
        seed,
    );

    wifi::install_event_handlers(&LINK_EVENTS);
    spawner
        .spawn(wifi::net_task(runner))
        .expect("net_task spawn");
    spawner
        .spawn(wifi::address_watch_task(stack, &LINK_EVENTS))
        .expect("address_watch_task spawn");

    let hardware = Hardware {
        adc: McuAdc::new(peripherals.ADC1, peripherals.GPIO1, MQ7_PROFILE.attenuation),
        indicator_lines: indicator_outputs([
            peripherals.GPIO5.degrade(),
            peripherals.GPIO6.degrade(),
            peripherals.GPIO7.degrade(),
        ]),
        heater_line: heater_output(peripherals.GPIO8.degrade()),
        link: EspWifiLink::new(controller),
        sleeper: EspDeepSleep::new(Rtc::new(peripherals.LPWR), wake_pin),
    };

    let app = match App::new(
        hardware,
        device,
        MQ7_PROFILE,
        MQ7_HEATER_SCHEDULE,
        &LINK_EVENTS,
        &SLEEP_REQUESTS,
    ) {
        Ok(app) => app,
        Err(e) => panic!("{}", e),
    };

    app.run(wake).await
}

fn hardware_init(what: &str, error: impl core::fmt::Debug) -> AppError {
    log::error!("{} init failed: {:?}", what, error);
    AppError::HardwareInit(heapless::String::from_truncated(what))
}
