use esp_hal::{
    gpio::{AnyPin, GpioPin, Pin},
    peripherals::{Peripherals, ADC1, DMA, I2C0, RNG, SPI2, TIMG0, UART0},
};

/// Battery sense divider, ADC1 channel 2
pub type BatterySensePin = GpioPin<2>;

pub struct TrackerPins {
    pub gps_rx: AnyPin,
    pub gps_tx: AnyPin,

    pub lora_rst: AnyPin,
    pub lora_irq: AnyPin,

    pub lora_nss: AnyPin,
    pub lora_mosi: AnyPin,
    pub lora_miso: AnyPin,
    pub lora_clk: AnyPin,

    pub oled_sda: AnyPin,
    pub oled_scl: AnyPin,

    pub battery: BatterySensePin,

    pub timg: TIMG0,
    pub uart: UART0,
    pub dma: DMA,
    pub spi: SPI2,
    pub i2c: I2C0,
    pub adc: ADC1,
    pub rng: RNG,
}

pub fn get_tracker_pins_v1(p: Peripherals) -> TrackerPins {
    TrackerPins {
        gps_rx: p.GPIO20.degrade(),
        gps_tx: p.GPIO21.degrade(),

        lora_rst: p.GPIO1.degrade(), // RST
        lora_irq: p.GPIO3.degrade(), // DIO0

        lora_nss: p.GPIO7.degrade(),
        lora_clk: p.GPIO6.degrade(),
        lora_miso: p.GPIO5.degrade(),
        lora_mosi: p.GPIO4.degrade(),

        oled_sda: p.GPIO8.degrade(),
        oled_scl: p.GPIO9.degrade(),

        battery: p.GPIO2,

        timg: p.TIMG0,
        uart: p.UART0,
        dma: p.DMA,
        spi: p.SPI2,
        i2c: p.I2C0,
        adc: p.ADC1,
        rng: p.RNG,
    }
}
