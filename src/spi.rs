use embassy_sync::{blocking_mutex::raw::NoopRawMutex, mutex::Mutex};
use fugit::RateExtU32;
use static_cell::StaticCell;

use esp_hal::{
    dma::{Dma, DmaPriority, DmaRxBuf, DmaTxBuf},
    dma_buffers,
    gpio::AnyPin,
    peripherals::{DMA, SPI2},
    spi::{
        master::{Config, Spi, SpiDmaBus},
        SpiMode,
    },
    Async,
};

pub type SpiBus = Mutex<NoopRawMutex, SpiDmaBus<'static, Async>>;

static SPI_BUS: StaticCell<SpiBus> = StaticCell::new();

/// A LoRaWAN frame never exceeds 256 bytes on air
const DMA_BUFFER_SIZE: usize = 256;

pub fn init(dma: DMA, spi: SPI2, sck: AnyPin, mosi: AnyPin, miso: AnyPin) -> &'static mut SpiBus {
    let dma = Dma::new(dma);
    let dma_channel = dma.channel0;

    let (rx_buffer, rx_descriptors, tx_buffer, tx_descriptors) = dma_buffers!(DMA_BUFFER_SIZE);
    let dma_rx_buf = match DmaRxBuf::new(rx_descriptors, rx_buffer) {
        Ok(buf) => buf,
        Err(err) => panic!("SPI DMA RX buffer: {:?}", err),
    };
    let dma_tx_buf = match DmaTxBuf::new(tx_descriptors, tx_buffer) {
        Ok(buf) => buf,
        Err(err) => panic!("SPI DMA TX buffer: {:?}", err),
    };

    let spi_config = Config {
        frequency: 1.MHz(),
        mode: SpiMode::Mode0,
        ..Config::default()
    };

    // The RFM95 is fine up to 10 MHz, 1 MHz keeps the breadboard wiring happy
    let spi = Spi::new_with_config(spi, spi_config)
        .with_sck(sck)
        .with_mosi(mosi)
        .with_miso(miso)
        .with_dma(dma_channel.configure(false, DmaPriority::Priority0))
        .with_buffers(dma_rx_buf, dma_tx_buf)
        .into_async();

    SPI_BUS.init(Mutex::new(spi))
}
