#![deny(unsafe_code)]
#![no_main]
#![no_std]

use embassy_embedded_hal::shared_bus::asynch::spi::SpiDevice;
use embassy_executor::{task, Spawner};
use embassy_futures::select::{select, Either};
use embassy_time::{Instant, Timer};

use esp_hal::{
    clock::CpuClock,
    gpio::{Input, Level, Output, Pull},
    i2c::master::I2c,
    rng::Rng,
    timer::timg::TimerGroup,
    uart::{Config as UartConfig, Uart},
    Blocking,
};

use defmt::info;
use esp_backtrace as _;
use esp_println as _;

use ttn_mapper::{
    battery::Battery,
    config::{Intervals, CREDENTIALS},
    display::Oled,
    gps::{self, FixMailbox},
    i2c,
    lora::{self, LorawanHandle},
    pins, spi, state,
    tracker::Tracker,
};

type MapperTracker = Tracker<LorawanHandle, &'static FixMailbox, Oled<'static, I2c<'static, Blocking>>>;

/// Owns the tracker. MAC events and due uplink ticks are handled here, one at
/// a time.
#[task]
async fn track(mut tracker: MapperTracker) -> ! {
    tracker.start();

    loop {
        let event = match tracker.deadline() {
            Some(deadline) => match select(lora::EVENTS.receive(), Timer::at(deadline)).await {
                Either::First(event) => Some(event),
                Either::Second(()) => None,
            },
            None => Some(lora::EVENTS.receive().await),
        };

        if let Some(event) = event {
            tracker.on_event(event, Instant::now());
        }
        tracker.poll(Instant::now());
    }
}

#[esp_hal_embassy::main]
async fn main(spawner: Spawner) {
    info!("Initializing");

    let peripherals = esp_hal::init({
        let mut config = esp_hal::Config::default();
        config.cpu_clock = CpuClock::max();
        config
    });
    let pins = pins::get_tracker_pins_v1(peripherals);

    let timg0 = TimerGroup::new(pins.timg);
    esp_hal_embassy::init(timg0.timer0);

    info!("Initializing complete");

    // Setup UART for GPS
    let uart_config = UartConfig::default().baudrate(9600);
    let uart = match Uart::new_with_config(pins.uart, uart_config, pins.gps_rx, pins.gps_tx) {
        Ok(uart) => uart.into_async(),
        Err(err) => panic!("GPS UART setup: {:?}", err),
    };

    // Note that this task now owns the GPS UART completely
    spawner.must_spawn(gps::sample_uart(uart, &state::FIX));

    // Setup SPI bus for the radio
    let spi_bus = spi::init(pins.dma, pins.spi, pins.lora_clk, pins.lora_mosi, pins.lora_miso);

    let lora_nss = Output::new(pins.lora_nss, Level::High);
    let lora_spi_device = SpiDevice::new(spi_bus, lora_nss);

    let lora_rst = Output::new(pins.lora_rst, Level::High);
    let lora_irq = Input::new(pins.lora_irq, Pull::Down);

    spawner.must_spawn(lora::run(
        lora_spi_device,
        lora_irq,
        lora_rst,
        Rng::new(pins.rng),
        CREDENTIALS,
    ));

    // Setup I2C for the OLED, battery sense shares its redraws
    let i2c_bus = i2c::init(pins.i2c, pins.oled_sda, pins.oled_scl);
    let battery = Battery::new(pins.adc, pins.battery);
    let oled = Oled::new(i2c_bus, battery);

    let tracker = Tracker::new(LorawanHandle, &state::FIX, oled, Intervals::default());
    spawner.must_spawn(track(tracker));
}
