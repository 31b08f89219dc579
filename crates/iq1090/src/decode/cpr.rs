/**
* Position information is encoded in a Compact Position Reporting (CPR)
* format, which requires fewer bits to encode positions with higher
* resolution. The CPR offers a trade-off between global position ambiguity
* and local position accuracy. Two types of position messages (identified
* by the odd and even frame bit) are broadcast alternately, and decoding a
* globally unambiguous position requires one frame of each parity from the
* same aircraft.
*/
use super::bds::bds05::AirbornePosition;
use deku::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::f64::consts::PI;
use std::fmt;
use tracing::trace;

/// A flag to qualify a CPR position as odd or even
#[derive(Debug, PartialEq, Eq, Serialize, DekuRead, Copy, Clone)]
#[deku(type = "u8", bits = "1")]
#[serde(rename_all = "snake_case")]
pub enum CPRFormat {
    Even = 0,
    Odd = 1,
}

impl fmt::Display for CPRFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Even => "even",
                Self::Odd => "odd",
            }
        )
    }
}

/// A decoded geographical position
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone, Copy)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

/// NZ represents the number of latitude zones between the equator and a
/// pole. In Mode S, it is defined to be 15.
const NZ: f64 = 15.0;

/// CPR_MAX is 2^17 since CPR lat and lon values are encoded on 17 bits
const CPR_MAX: f64 = 131_072.0;

const D_LAT_EVEN: f64 = 360.0 / (4.0 * NZ);
const D_LAT_ODD: f64 = 360.0 / (4.0 * NZ - 1.0);

// The sign of % in Rust follows the dividend; CPR arithmetic expects the
// nonnegative remainder.
fn modulo(a: f64, b: f64) -> f64 {
    if a >= 0. {
        a % b
    } else {
        a % b + libm::fabs(b)
    }
}

/// Given the latitude, yield the number of longitude zones (between 1 and
/// 59) at that latitude.
///
/// The argument of the arccos drifts out of its domain close to the poles,
/// where a single zone remains.
fn nl(lat: f64) -> u64 {
    let lat = libm::fabs(lat);
    if lat >= 87.0 {
        return 1;
    }
    let a = 1.0 - libm::cos(PI / (2.0 * NZ));
    let b = libm::cos(lat.to_radians());
    let inner = a / (b * b);
    if inner >= 1.0 {
        return 1;
    }
    libm::floor(2.0 * PI / libm::acos(1.0 - inner)) as u64
}

/**
 * Decode a globally unambiguous airborne position from the raw 17-bit
 * codes of an even and an odd frame, `(lat_cpr, lon_cpr)` each.
 *
 * `latest` names the parity of the more recently received frame: its
 * latitude zone and longitude cell are the ones reported. Callers without
 * any notion of recency pass [`CPRFormat::Even`].
 */
pub fn cpr_decode(
    even: (u32, u32),
    odd: (u32, u32),
    latest: CPRFormat,
) -> Option<Position> {
    let cpr_lat_even = f64::from(even.0) / CPR_MAX;
    let cpr_lon_even = f64::from(even.1) / CPR_MAX;
    let cpr_lat_odd = f64::from(odd.0) / CPR_MAX;
    let cpr_lon_odd = f64::from(odd.1) / CPR_MAX;

    // Latitude zone index
    let j = libm::floor(59.0 * cpr_lat_even - 60.0 * cpr_lat_odd + 0.5);

    let mut lat_even = D_LAT_EVEN * (modulo(j, 60.) + cpr_lat_even);
    let mut lat_odd = D_LAT_ODD * (modulo(j, 59.) + cpr_lat_odd);

    if lat_even >= 270.0 {
        lat_even -= 360.0;
    }

    if lat_odd >= 270.0 {
        lat_odd -= 360.0;
    }

    if !(-90. ..=90.).contains(&lat_even) || !(-90. ..=90.).contains(&lat_odd)
    {
        return None;
    }
    // The two frames straddle a longitude zone boundary
    if nl(lat_even) != nl(lat_odd) {
        trace!("zone mismatch: {} vs {}", lat_even, lat_odd);
        return None;
    }

    let lat = if latest == CPRFormat::Even {
        lat_even
    } else {
        lat_odd
    };

    let (p, c) = if latest == CPRFormat::Even {
        (0, cpr_lon_even)
    } else {
        (1, cpr_lon_odd)
    };
    let nl = nl(lat);
    let ni = std::cmp::max(nl as i64 - p, 1) as f64;
    let m =
        libm::floor(cpr_lon_even * (nl - 1) as f64 - cpr_lon_odd * nl as f64 + 0.5);

    let r = modulo(m, ni);

    let mut lon = (360.0 / ni) * (r + c);
    if lon >= 180.0 {
        lon -= 360.0;
    }

    Some(Position {
        latitude: lat,
        longitude: lon,
    })
}

/**
 * Decode an airborne position from a pair of even and odd position
 * messages, in either order. The `latest` message drives the zone
 * selection.
 */
pub fn airborne_position(
    oldest: &AirbornePosition,
    latest: &AirbornePosition,
) -> Option<Position> {
    let (even, odd) = match (oldest.parity, latest.parity) {
        (CPRFormat::Even, CPRFormat::Odd) => (oldest, latest),
        (CPRFormat::Odd, CPRFormat::Even) => (latest, oldest),
        _ => return None,
    };
    cpr_decode(
        (even.lat_cpr.0, even.lon_cpr.0),
        (odd.lat_cpr.0, odd.lon_cpr.0),
        latest.parity,
    )
}

/// The most recent frame of each parity for one aircraft, together with
/// the store sequence number assigned when it was observed.
///
/// One instance lives per ICAO address for the duration of a decode
/// session; each parity slot only ever holds the latest frame of its kind.
#[derive(Debug, Default, Copy, Clone)]
pub struct AircraftState {
    even: Option<(AirbornePosition, u64)>,
    odd: Option<(AirbornePosition, u64)>,
}

impl AircraftState {
    /// Record a frame, overwriting any previous frame of the same parity
    pub fn observe(&mut self, frame: AirbornePosition, seq: u64) {
        match frame.parity {
            CPRFormat::Even => self.even = Some((frame, seq)),
            CPRFormat::Odd => self.odd = Some((frame, seq)),
        }
    }

    /// Attempt a global decode from the stored pair. None until both
    /// parities have been observed, or when the pair is inconsistent.
    pub fn position(&self) -> Option<Position> {
        let (even, even_seq) = self.even.as_ref()?;
        let (odd, odd_seq) = self.odd.as_ref()?;
        match even_seq.cmp(odd_seq) {
            Ordering::Less => airborne_position(even, odd),
            _ => airborne_position(odd, even),
        }
    }

    pub fn even(&self) -> Option<&AirbornePosition> {
        self.even.as_ref().map(|(frame, _)| frame)
    }

    pub fn odd(&self) -> Option<&AirbornePosition> {
        self.odd.as_ref().map(|(frame, _)| frame)
    }
}
