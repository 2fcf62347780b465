//! Build time configuration.
//!
//! Keys and intervals are injected by `build.rs` from the `TTN_*` environment
//! variables so no secrets need to be committed.

use embassy_time::Duration;

mod generated {
    include!(concat!(env!("OUT_DIR"), "/secrets.rs"));
}

/// LoRaWAN port used for the mapper uplink
/// (can be used in the 'Port filter' of the TTN Mapper integration)
pub const UPLINK_PORT: u8 = 2;

/// Time between uplinks. Respect the duty cycle!
pub const SEND_INTERVAL: Duration = Duration::from_secs(generated::SEND_INTERVAL_SECS);

/// Retry interval while there is no GPS fix
pub const FIX_WAIT_INTERVAL: Duration = Duration::from_secs(generated::FIX_WAIT_INTERVAL_SECS);

/// Cadence at which the GPS UART is drained
pub const GPS_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// OTAA credentials of this device.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Credentials {
    /// LSB first
    pub dev_eui: [u8; 8],
    /// LSB first
    pub app_eui: [u8; 8],
    pub app_key: [u8; 16],
}

pub const CREDENTIALS: Credentials = Credentials {
    dev_eui: generated::DEV_EUI,
    app_eui: generated::APP_EUI,
    app_key: generated::APP_KEY,
};

/// Timing knobs of the uplink job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Intervals {
    /// Used after a send and after a busy radio
    pub send: Duration,
    /// Used while waiting for a GPS fix, shorter than `send`
    pub fix_wait: Duration,
}

impl Default for Intervals {
    fn default() -> Self {
        Self {
            send: SEND_INTERVAL,
            fix_wait: FIX_WAIT_INTERVAL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fix_wait_is_shorter_than_send() {
        let intervals = Intervals::default();
        assert!(intervals.fix_wait < intervals.send);
    }

    #[test]
    fn uplink_port_is_application_port() {
        // 0 is reserved for MAC commands, 224+ for the LoRaWAN test protocol
        assert!((1..224).contains(&UPLINK_PORT));
    }
}
