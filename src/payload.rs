//! TTN Mapper uplink payload.
//!
//! ```text
//!  0      4      8    10   12   14
//!  | lat  | lon  | alt | hdop | batt |
//! ```
//!
//! All fields are big-endian unsigned integers. Signed values carry a bias so
//! the network side decoder only has to subtract it:
//!
//! - latitude: degrees * 10^7 + 90 * 10^7
//! - longitude: degrees * 10^7 + 180 * 10^7
//! - altitude: meters + 0x7FFF
//! - hdop: hdop * 10
//! - battery (feature `battery`): volts * 100
//!
//! Values outside of what a field can carry are clamped to its range.

use heapless::Vec;
#[allow(unused_imports)]
use micromath::F32Ext;

use crate::gps::Fix;

const LATITUDE_BIAS: i64 = 900_000_000;
const LONGITUDE_BIAS: i64 = 1_800_000_000;
const ALTITUDE_BIAS: i32 = 0x7FFF;

/// Position part of the payload
pub const BASE_LEN: usize = 12;

cfg_if::cfg_if! {
    if #[cfg(feature = "battery")] {
        /// Bytes sent per uplink
        pub const PAYLOAD_LEN: usize = BASE_LEN + 2;
    } else {
        /// Bytes sent per uplink
        pub const PAYLOAD_LEN: usize = BASE_LEN;
    }
}

/// Largest payload any build produces
pub const MAX_PAYLOAD_LEN: usize = BASE_LEN + 2;

pub type UplinkPayload = Vec<u8, MAX_PAYLOAD_LEN>;

/// Packs a fix (and the battery voltage when that feature is built in) into
/// the uplink layout. Never fails.
pub fn encode(fix: &Fix, battery_volts: Option<f32>) -> UplinkPayload {
    let mut payload = UplinkPayload::new();

    let latitude = encode_coordinate(fix.latitude, LATITUDE_BIAS);
    let longitude = encode_coordinate(fix.longitude, LONGITUDE_BIAS);
    let altitude = encode_altitude(fix.altitude);
    let hdop = encode_scaled(fix.hdop, 10.0);

    // Capacity is MAX_PAYLOAD_LEN, none of these can overflow
    let _ = payload.extend_from_slice(&latitude.to_be_bytes());
    let _ = payload.extend_from_slice(&longitude.to_be_bytes());
    let _ = payload.extend_from_slice(&altitude.to_be_bytes());
    let _ = payload.extend_from_slice(&hdop.to_be_bytes());

    #[cfg(feature = "battery")]
    {
        let battery = battery_volts.map_or(0, |volts| encode_scaled(volts, 100.0));
        let _ = payload.extend_from_slice(&battery.to_be_bytes());
    }
    #[cfg(not(feature = "battery"))]
    let _ = battery_volts;

    payload
}

fn encode_coordinate(fixed: i32, bias: i64) -> u32 {
    (i64::from(fixed) + bias).clamp(0, 2 * bias) as u32
}

fn encode_altitude(meters: f32) -> u16 {
    let rounded = round_or_zero(meters) as i32;
    rounded.saturating_add(ALTITUDE_BIAS).clamp(0, u16::MAX as i32) as u16
}

fn encode_scaled(value: f32, scale: f32) -> u16 {
    let scaled = round_or_zero(value * scale);
    // `as` saturates at both ends of the range
    scaled as u16
}

/// Half away from zero, NaN becomes 0
fn round_or_zero(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.round()
    }
}

/// An uplink as the network side decoder sees it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodedUplink {
    /// Degrees * 10^7
    pub latitude: i32,
    /// Degrees * 10^7
    pub longitude: i32,
    pub altitude: i32,
    pub hdop: f32,
    pub battery_volts: Option<f32>,
}

impl DecodedUplink {
    /// Back into a fix, so it can be encoded again
    pub fn to_fix(&self) -> Fix {
        Fix {
            latitude: self.latitude,
            longitude: self.longitude,
            altitude: self.altitude as f32,
            hdop: self.hdop,
            valid: true,
            time: None,
        }
    }
}

/// Inverse of [`encode`]. Accepts the 12 byte layout and the 14 byte layout
/// with battery voltage.
pub fn decode(bytes: &[u8]) -> Option<DecodedUplink> {
    if bytes.len() != BASE_LEN && bytes.len() != BASE_LEN + 2 {
        return None;
    }

    let u32_at = |at: usize| u32::from_be_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
    let u16_at = |at: usize| u16::from_be_bytes([bytes[at], bytes[at + 1]]);

    let battery_volts = (bytes.len() > BASE_LEN).then(|| f32::from(u16_at(12)) / 100.0);

    Some(DecodedUplink {
        latitude: (i64::from(u32_at(0)) - LATITUDE_BIAS) as i32,
        longitude: (i64::from(u32_at(4)) - LONGITUDE_BIAS) as i32,
        altitude: i32::from(u16_at(8)) - ALTITUDE_BIAS,
        hdop: f32::from(u16_at(10)) / 10.0,
        battery_volts,
    })
}
