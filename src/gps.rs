use core::cell::Cell;

use embassy_sync::blocking_mutex::{raw::CriticalSectionRawMutex, Mutex};
use nmea0183::{GPSQuality, ParseResult, Parser, Sentence, GGA};

/// UTC time of day reported with a fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GpsTime {
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
}

/// Snapshot of the most recent GGA sentence.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Fix {
    /// Degrees * 10^7, north positive
    pub latitude: i32,
    /// Degrees * 10^7, east positive
    pub longitude: i32,
    /// Meters above mean sea level
    pub altitude: f32,
    pub hdop: f32,
    pub valid: bool,
    pub time: Option<GpsTime>,
}

impl Fix {
    /// What the receiver reports before it has seen the sky
    pub const NONE: Fix = Fix {
        latitude: 0,
        longitude: 0,
        altitude: 0.0,
        hdop: 0.0,
        valid: false,
        time: None,
    };

    pub fn from_degrees(latitude: f64, longitude: f64, altitude: f32, hdop: f32) -> Self {
        Fix {
            latitude: degrees_to_fixed(latitude),
            longitude: degrees_to_fixed(longitude),
            altitude,
            hdop,
            valid: true,
            time: None,
        }
    }
}

impl Default for Fix {
    fn default() -> Self {
        Fix::NONE
    }
}

impl From<&GGA> for Fix {
    fn from(gga: &GGA) -> Self {
        Fix {
            latitude: degrees_to_fixed(gga.latitude.as_f64()),
            longitude: degrees_to_fixed(gga.longitude.as_f64()),
            altitude: gga.altitude.meters,
            hdop: gga.hdop,
            // Some receivers keep repeating the last position after losing lock
            valid: gga.gps_quality != GPSQuality::NoFix,
            time: Some(GpsTime {
                hours: gga.time.hours,
                minutes: gga.time.minutes,
                seconds: gga.time.seconds as u8,
            }),
        }
    }
}

/// Degrees to the 10^7 fixed point format, rounded to nearest.
fn degrees_to_fixed(degrees: f64) -> i32 {
    let scaled = degrees * 10_000_000.0;
    if scaled >= 0.0 {
        (scaled + 0.5) as i32
    } else {
        (scaled - 0.5) as i32
    }
}

/// Anything that can hand out the latest fix without blocking.
pub trait FixSource {
    fn latest_fix(&self) -> Fix;
}

impl<T: FixSource + ?Sized> FixSource for &T {
    fn latest_fix(&self) -> Fix {
        (**self).latest_fix()
    }
}

/// Single slot holding the last published fix.
///
/// Reads and writes each take one short critical section, so a reader never
/// sees half of an update even when the writer runs at a higher priority.
pub struct FixMailbox {
    slot: Mutex<CriticalSectionRawMutex, Cell<Fix>>,
}

impl FixMailbox {
    pub const fn new() -> Self {
        Self {
            slot: Mutex::new(Cell::new(Fix::NONE)),
        }
    }

    pub fn publish(&self, fix: Fix) {
        self.slot.lock(|slot| slot.set(fix));
    }
}

impl Default for FixMailbox {
    fn default() -> Self {
        Self::new()
    }
}

impl FixSource for FixMailbox {
    fn latest_fix(&self) -> Fix {
        self.slot.lock(|slot| slot.get())
    }
}

/// Turns the receiver's byte stream into published fixes.
pub struct GpsReceiver<'a> {
    // We only need GGA sentences, they carry everything that goes into an uplink
    parser: Parser,
    mailbox: &'a FixMailbox,
}

impl<'a> GpsReceiver<'a> {
    pub fn new(mailbox: &'a FixMailbox) -> Self {
        Self {
            parser: Parser::new().sentence_only(Sentence::GGA),
            mailbox,
        }
    }

    /// Feed whatever bytes the UART had buffered. Partial sentences are kept
    /// by the parser until the rest arrives.
    pub fn service(&mut self, bytes: &[u8]) {
        for result in self.parser.parse_from_bytes(bytes) {
            match result {
                Ok(ParseResult::GGA(Some(gga))) => {
                    let fix = Fix::from(&gga);
                    log_debug!(
                        "GGA lat={} lon={} hdop={}",
                        fix.latitude,
                        fix.longitude,
                        fix.hdop
                    );
                    self.mailbox.publish(fix);
                }
                Ok(ParseResult::GGA(None)) => {
                    // Receiver is talking but has no position yet
                    self.mailbox.publish(Fix::NONE);
                }
                Ok(_) => {
                    /* Other results parsed. This shouldn't happen because of the filter */
                }
                Err(e) => log_warn!("NMEA parse error: {}", e),
            }
        }
    }
}

#[cfg(feature = "esp32c3")]
pub use uart::sample_uart;

#[cfg(feature = "esp32c3")]
mod uart {
    use embassy_executor::task;
    use embassy_time::Timer;
    use embedded_io_async::{Read, Write};
    use esp_hal::{uart::Uart, Async};

    use super::{FixMailbox, GpsReceiver};
    use crate::{config::GPS_POLL_INTERVAL, Error};

    /// MTK receivers: GGA only, 1 Hz, no antenna status
    const SETUP_COMMANDS: [&[u8]; 3] = [
        b"$PMTK314,0,0,0,1,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0*29\r\n",
        b"$PMTK220,1000*1F\r\n",
        b"$PGCMD,33,0*6D\r\n",
    ];

    #[task]
    pub async fn sample_uart(uart: Uart<'static, Async>, mailbox: &'static FixMailbox) -> ! {
        let (mut rx, mut tx) = uart.split();

        for command in SETUP_COMMANDS {
            if Write::write_all(&mut tx, command).await.is_err() {
                log_warn!("Failed to configure GPS receiver");
            }
        }

        let mut receiver = GpsReceiver::new(mailbox);
        let mut buffer = [0u8; 128];

        loop {
            match Read::read(&mut rx, &mut buffer).await {
                Ok(read) => receiver.service(&buffer[..read]),
                Err(_) => log_warn!("GPS: {}", Error::Uart),
            }

            // 9600 baud is about a byte per millisecond, let the FIFO fill up a bit
            Timer::after(GPS_POLL_INTERVAL).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GGA_FIX: &[u8] = b"$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47\r\n";
    /// Same position, quality 0
    const GGA_LOST_LOCK: &[u8] = b"$GPGGA,123519,4807.038,N,01131.000,E,0,08,0.9,545.4,M,46.9,M,,*46\r\n";
    /// Cold start, every field empty
    const GGA_NO_POSITION: &[u8] = b"$GPGGA,064951.000,,,,,0,0,,,M,,M,,*47\r\n";

    #[test]
    fn mailbox_starts_without_fix() {
        let mailbox = FixMailbox::new();
        assert!(!mailbox.latest_fix().valid);
    }

    #[test]
    fn mailbox_returns_last_published() {
        let mailbox = FixMailbox::new();
        mailbox.publish(Fix::from_degrees(1.0, 2.0, 3.0, 4.0));
        mailbox.publish(Fix::from_degrees(5.0, 6.0, 7.0, 8.0));

        let fix = mailbox.latest_fix();
        assert!(fix.valid);
        assert_eq!(fix.latitude, 50_000_000);
        assert_eq!(fix.longitude, 60_000_000);
    }

    #[test]
    fn degrees_round_to_nearest() {
        assert_eq!(degrees_to_fixed(45.123456), 451_234_560);
        assert_eq!(degrees_to_fixed(-45.123456), -451_234_560);
        assert_eq!(degrees_to_fixed(0.000_000_06), 1);
        assert_eq!(degrees_to_fixed(-0.000_000_06), -1);
    }

    #[test]
    fn gga_sentence_publishes_fix() {
        let mailbox = FixMailbox::new();
        let mut receiver = GpsReceiver::new(&mailbox);

        receiver.service(GGA_FIX);

        let fix = mailbox.latest_fix();
        assert!(fix.valid);
        // 48 deg 07.038' N, 11 deg 31.000' E
        assert!((fix.latitude - 481_173_000).abs() <= 1);
        assert!((fix.longitude - 115_166_667).abs() <= 1);
        assert!((fix.altitude - 545.4).abs() < 0.01);
        assert!((fix.hdop - 0.9).abs() < 0.01);
        assert_eq!(
            fix.time,
            Some(GpsTime {
                hours: 12,
                minutes: 35,
                seconds: 19
            })
        );
    }

    #[test]
    fn sentence_split_across_reads() {
        let mailbox = FixMailbox::new();
        let mut receiver = GpsReceiver::new(&mailbox);

        let (head, tail) = GGA_FIX.split_at(20);
        receiver.service(head);
        assert!(!mailbox.latest_fix().valid);

        receiver.service(tail);
        assert!(mailbox.latest_fix().valid);
    }

    #[test]
    fn garbage_leaves_mailbox_alone() {
        let mailbox = FixMailbox::new();
        let published = Fix::from_degrees(10.0, 20.0, 30.0, 1.0);
        mailbox.publish(published);

        let mut receiver = GpsReceiver::new(&mailbox);
        receiver.service(b"$GPGGA,garbage*00\r\n");

        assert_eq!(mailbox.latest_fix(), published);
    }

    #[test]
    fn quality_zero_is_not_a_fix() {
        let mailbox = FixMailbox::new();
        let mut receiver = GpsReceiver::new(&mailbox);

        receiver.service(GGA_FIX);
        assert!(mailbox.latest_fix().valid);

        receiver.service(GGA_LOST_LOCK);
        let fix = mailbox.latest_fix();
        assert!(!fix.valid);
        assert!(fix.time.is_some());
    }

    #[test]
    fn empty_gga_clears_previous_fix() {
        let mailbox = FixMailbox::new();
        mailbox.publish(Fix::from_degrees(10.0, 20.0, 30.0, 1.0));

        let mut receiver = GpsReceiver::new(&mailbox);
        receiver.service(GGA_NO_POSITION);

        assert_eq!(mailbox.latest_fix(), Fix::NONE);
    }
}
