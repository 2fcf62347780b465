//! SSD1306 128x32 OLED status screen.
//!
//! 5x8 font, 4 lines of 25 characters.

use embedded_graphics::{
    mono_font::{ascii::FONT_5X8, MonoTextStyle},
    pixelcolor::BinaryColor,
    prelude::*,
    text::{Baseline, Text},
};
use embedded_hal::i2c::I2c;
use ssd1306::{mode::BufferedGraphicsMode, prelude::*, I2CDisplayInterface, Ssd1306};

use crate::{
    battery::Battery,
    status::{Screen, StatusDisplay},
};

const LINE_HEIGHT: i32 = 8;

type Driver<I2C> =
    Ssd1306<I2CInterface<I2C>, DisplaySize128x32, BufferedGraphicsMode<DisplaySize128x32>>;

pub struct Oled<'d, I2C> {
    driver: Driver<I2C>,
    battery: Battery<'d>,
}

impl<'d, I2C: I2c> Oled<'d, I2C> {
    /// Brings the panel up and shows the splash screen. A missing or broken
    /// panel is logged, the tracker keeps working without it.
    pub fn new(i2c: I2C, battery: Battery<'d>) -> Self {
        let interface = I2CDisplayInterface::new(i2c);
        let mut driver = Ssd1306::new(interface, DisplaySize128x32, DisplayRotation::Rotate0)
            .into_buffered_graphics_mode();

        if driver.init().is_err() {
            log_error!("OLED init failed");
        }

        let mut oled = Self { driver, battery };
        oled.splash();
        oled
    }

    fn splash(&mut self) {
        let style = MonoTextStyle::new(&FONT_5X8, BinaryColor::On);

        self.driver.clear_buffer();
        Text::with_baseline("TTN", Point::new(108, 5), style, Baseline::Top)
            .draw(&mut self.driver)
            .ok();
        Text::with_baseline("Mapper", Point::new(98, 18), style, Baseline::Top)
            .draw(&mut self.driver)
            .ok();
        if self.driver.flush().is_err() {
            log_warn!("OLED flush failed");
        }
    }
}

impl<'d, I2C: I2c> StatusDisplay for Oled<'d, I2C> {
    fn draw(&mut self, screen: &Screen) {
        let style = MonoTextStyle::new(&FONT_5X8, BinaryColor::On);
        let lines = [
            screen.counters.as_str(),
            screen.status[0].as_str(),
            screen.status[1].as_str(),
            screen.footer.as_str(),
        ];

        self.driver.clear_buffer();
        for (row, line) in lines.iter().enumerate() {
            let origin = Point::new(0, row as i32 * LINE_HEIGHT);
            Text::with_baseline(line, origin, style, Baseline::Top)
                .draw(&mut self.driver)
                .ok();
        }

        if self.driver.flush().is_err() {
            log_warn!("OLED flush failed");
        }
    }

    fn battery_voltage(&mut self) -> Option<f32> {
        self.battery.voltage()
    }
}
