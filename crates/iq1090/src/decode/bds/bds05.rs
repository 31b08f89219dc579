use crate::decode::cpr::CPRFormat;
use deku::bitvec::{BitSlice, Msb0};
use deku::prelude::*;
use serde::Serialize;
use std::fmt;

/**
 * ## Airborne Position (BDS 0,5)
 *
 * with barometric altitude (TC=9..=18)
 *
 * | TC | SS | SAF | ALT | T | F | LAT-CPR | LON-CPR |
 * | -- | -- | --- | --- | - | - | ------- | ------- |
 * | 5  | 2  |  1  | 12  | 1 | 1 |   17    |   17    |
 *
 * The type code has already been consumed as the ME discriminant.
 */
#[derive(Debug, PartialEq, Serialize, DekuRead, Copy, Clone)]
pub struct AirbornePosition {
    /// Surveillance status
    #[deku(bits = "2")]
    #[serde(skip)]
    pub ss: u8,

    /// Single antenna flag
    #[deku(bits = "1")]
    #[serde(skip)]
    pub saf: u8,

    /// The altitude in feet, encoded on 12 bits. None if not available.
    #[deku(reader = "decode_ac12(deku::rest)")]
    #[serde(rename = "altitude")]
    pub alt: Option<i32>,

    /// UTC sync or not
    #[deku(bits = "1")]
    #[serde(skip)]
    pub t: bool,

    /// The CPR parity of the frame (even or odd)
    pub parity: CPRFormat,

    pub lat_cpr: CprCode,
    pub lon_cpr: CprCode,
}

/// A 17-bit encoded CPR latitude or longitude
#[derive(Debug, PartialEq, Eq, Serialize, DekuRead, Copy, Clone)]
pub struct CprCode(#[deku(bits = "17", endian = "big")] pub u32);

impl fmt::Display for CprCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Decode the altitude value encoded on 12 bits.
///
/// With the Q bit set, the remaining 11 bits count 25 ft increments from
/// -1000 ft. Otherwise the field is a Gillham (Mode C) code at 100 ft
/// resolution.
fn decode_ac12(
    rest: &BitSlice<u8, Msb0>,
) -> Result<(&BitSlice<u8, Msb0>, Option<i32>), DekuError> {
    let (rest, num) =
        u16::read(rest, (deku::ctx::Endian::Big, deku::ctx::BitSize(12)))?;

    let q = num & 0x10;

    if q > 0 {
        let n = i32::from(((num & 0x0fe0) >> 1) | (num & 0x000f));
        Ok((rest, Some(n * 25 - 1000)))
    } else {
        let n = ((num & 0x0fc0) << 1) | (num & 0x003f);
        Ok((rest, gillham_to_feet(n)))
    }
}

/// Convert a Gillham-coded altitude field to feet.
///
/// The 13-bit field interleaves the pulses as
/// C1 A1 C2 A2 C4 A4 (M) B1 D1 B2 D2 B4 D4; the A/B/D groups form a Gray
/// code counting 500 ft increments, the C group counts 100 ft increments
/// within each step. Illegal combinations return None.
#[rustfmt::skip]
fn gillham_to_feet(field: u16) -> Option<i32> {
    let c1 = field & 0x1000 != 0;
    let a1 = field & 0x0800 != 0;
    let c2 = field & 0x0400 != 0;
    let a2 = field & 0x0200 != 0;
    let c4 = field & 0x0100 != 0;
    let a4 = field & 0x0080 != 0;
    let b1 = field & 0x0020 != 0;
    let d1 = field & 0x0010 != 0;
    let b2 = field & 0x0008 != 0;
    let d2 = field & 0x0004 != 0;
    let b4 = field & 0x0002 != 0;
    let d4 = field & 0x0001 != 0;

    // D1 is never used for altitude; C1..C4 all zero is illegal
    if d1 || !(c1 || c2 || c4) {
        return None;
    }

    let mut one_hundreds: i32 = 0;
    if c1 { one_hundreds ^= 0x007; }
    if c2 { one_hundreds ^= 0x003; }
    if c4 { one_hundreds ^= 0x001; }

    // 7 stands for 5 in the C group
    if one_hundreds & 5 == 5 { one_hundreds ^= 2; }
    if one_hundreds > 5 {
        return None;
    }

    let mut five_hundreds: i32 = 0;
    if d2 { five_hundreds ^= 0x0ff; }
    if d4 { five_hundreds ^= 0x07f; }
    if a1 { five_hundreds ^= 0x03f; }
    if a2 { five_hundreds ^= 0x01f; }
    if a4 { five_hundreds ^= 0x00f; }
    if b1 { five_hundreds ^= 0x007; }
    if b2 { five_hundreds ^= 0x003; }
    if b4 { five_hundreds ^= 0x001; }

    // The C group counts alternately up and down
    if five_hundreds & 1 != 0 {
        one_hundreds = 6 - one_hundreds;
    }

    let n = five_hundreds * 5 + one_hundreds - 13;
    if n < 0 {
        return None;
    }
    Some(n * 100)
}

impl fmt::Display for AirbornePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  Airborne position (BDS 0,5)")?;
        let altitude = self.alt.map_or_else(
            || "None".to_string(),
            |altitude| format!("{altitude} ft"),
        );
        writeln!(f, "  Altitude:      {} barometric", altitude)?;
        writeln!(f, "  CPR parity:    {}", self.parity)?;
        writeln!(f, "  CPR latitude:  ({})", self.lat_cpr)?;
        writeln!(f, "  CPR longitude: ({})", self.lon_cpr)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::adsb::ME;
    use crate::decode::{Message, DF};
    use hexlit::hex;

    fn airborne(bytes: &[u8; 14]) -> AirbornePosition {
        let msg = Message::from_bytes((bytes, 0)).unwrap().1;
        let DF::ExtendedSquitterADSB(adsb) = msg.df else {
            unreachable!();
        };
        let ME::BDS05(position) = adsb.message else {
            unreachable!();
        };
        position
    }

    #[test]
    fn q_bit_altitude() {
        // Altitude field 0xC38: Q=1, ((0x61 << 4) | 8) * 25 - 1000
        let position = airborne(&hex!("8D40621D58C382D690C8AC2863A7"));
        assert_eq!(position.alt, Some(38000));
        assert_eq!(position.parity, CPRFormat::Even);
        assert_eq!(position.lat_cpr, CprCode(93000));
        assert_eq!(position.lon_cpr, CprCode(51372));
    }

    #[test]
    fn odd_frame_fields() {
        let position = airborne(&hex!("8D40621D58C386435CC412692AD6"));
        assert_eq!(position.alt, Some(38000));
        assert_eq!(position.parity, CPRFormat::Odd);
        assert_eq!(position.lat_cpr, CprCode(74158));
        assert_eq!(position.lon_cpr, CprCode(50194));
    }

    #[test]
    fn gillham_rejects_empty_c_group() {
        assert_eq!(gillham_to_feet(0), None);
    }

    #[test]
    fn gillham_rejects_d1() {
        assert_eq!(gillham_to_feet(0x1010), None);
    }

    #[test]
    fn gillham_low_codes() {
        // C1+C2+C4 together decode to the illegal 7
        assert_eq!(gillham_to_feet(0x1500), None);
        // C4 with B4: 1*5 + (6-1) - 13 below zero
        assert_eq!(gillham_to_feet(0x0102), None);
    }

    #[test]
    fn gillham_2500_ft() {
        // C2 + B1: five_hundreds 7, one_hundreds 6-3, (35+3-13)*100
        assert_eq!(gillham_to_feet(0x0420), Some(2500));
    }
}
