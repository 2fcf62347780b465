use esp_hal::{
    gpio::AnyPin,
    i2c::master::{Config, I2c},
    peripherals::I2C0,
    Blocking,
};
use fugit::RateExtU32;

/// The display is the only device on the bus, so it gets the bus outright.
pub fn init(i2c: I2C0, sda: AnyPin, scl: AnyPin) -> I2c<'static, Blocking> {
    let config = Config {
        frequency: 400.kHz(),
        ..Config::default()
    };

    I2c::new(i2c, config).with_sda(sda).with_scl(scl)
}
