use esp_hal::{
    analog::adc::{Adc, AdcConfig, AdcPin, Attenuation},
    peripherals::ADC1,
};

use crate::pins::BatterySensePin;

/// Full scale of the ESP32-C3 ADC at 11 dB attenuation
const FULL_SCALE_VOLTS: f32 = 2.5;
const FULL_SCALE_COUNTS: f32 = 4095.0;
/// The battery is halved by a 100k/100k divider before the ADC
const DIVIDER: f32 = 2.0;

pub struct Battery<'d> {
    adc: Adc<'d, ADC1>,
    pin: AdcPin<BatterySensePin, ADC1>,
}

impl<'d> Battery<'d> {
    pub fn new(adc: ADC1, pin: BatterySensePin) -> Self {
        let mut config = AdcConfig::new();
        let pin = config.enable_pin(pin, Attenuation::Attenuation11dB);

        Self {
            adc: Adc::new(adc, config),
            pin,
        }
    }

    pub fn voltage(&mut self) -> Option<f32> {
        match nb::block!(self.adc.read_oneshot(&mut self.pin)) {
            Ok(raw) => Some(f32::from(raw) / FULL_SCALE_COUNTS * FULL_SCALE_VOLTS * DIVIDER),
            Err(_) => {
                log_warn!("Battery ADC read failed");
                None
            }
        }
    }
}
