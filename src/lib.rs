#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

//! TTN Mapper tracker firmware.
//!
//! Periodically reads the latest GPS fix, packs it into a 12 (or 14) byte
//! uplink and hands it to a LoRaWAN stack, while a small OLED shows what the
//! MAC is doing. Everything that does not touch hardware lives in portable
//! modules so it can be exercised with `cargo test` on the host.

#[macro_use]
mod log;

pub mod config;
pub mod error;
pub mod gps;
pub mod payload;
pub mod radio;
pub mod scheduler;
pub mod state;
pub mod status;
pub mod tracker;

#[cfg(feature = "esp32c3")]
pub mod battery;
#[cfg(feature = "esp32c3")]
pub mod display;
#[cfg(feature = "esp32c3")]
pub mod i2c;
#[cfg(feature = "esp32c3")]
pub mod lora;
#[cfg(feature = "esp32c3")]
pub mod pins;
#[cfg(feature = "esp32c3")]
pub mod spi;

pub use error::Error;
