pub mod adsb;
pub mod bds;
pub mod cpr;
pub mod crc;

use adsb::ADSB;
use crc::modes_checksum;
use deku::bitvec::{BitSlice, Msb0};
use deku::prelude::*;
use serde::ser::{Serialize, Serializer};
use std::fmt;

const MODES_LONG_MSG_BYTES: usize = 14;
const MODES_SHORT_MSG_BYTES: usize = 7;

/**
 * DF stands for Downlink Format.
 *
 * A number between 0 and 24 encoding the type of the message. Only DF17
 * (the extended squitter carrying ADS-B) is decoded any further; the other
 * formats are recognized and skipped.
 */
#[derive(Debug, PartialEq, DekuRead, Clone)]
#[deku(type = "u8", bits = "5")]
pub enum DF {
    /// DF=17: Extended Squitter ADS-B (3.1.2.8.6)
    #[deku(id = "17")]
    ExtendedSquitterADSB(ADSB),

    /// Any other downlink format, left unparsed
    #[deku(id_pat = "_")]
    Unsupported,
}

/// The entry point for decoding a demodulated Mode S frame
///
/// Use as `Message::from_bytes()`. The parity syndrome is computed over the
/// full frame while reading; enforcement is left to the caller so that
/// validation can be switched off for noisy captures.
#[derive(Debug, PartialEq, DekuRead, Clone)]
pub struct Message {
    /// Remainder of the parity division over all bits, zero for a clean
    /// DF17 frame
    #[deku(reader = "Self::read_crc(deku::input_bits)")]
    pub crc: u32,

    /// The Downlink Format encoded in 5 bits
    pub df: DF,
}

impl Message {
    /// Compute the parity syndrome without consuming any input
    fn read_crc(
        rest: &BitSlice<u8, Msb0>,
    ) -> Result<(&BitSlice<u8, Msb0>, u32), DekuError> {
        let (_, remaining_bytes, _) =
            rest.domain().region().ok_or_else(|| {
                DekuError::Assertion("empty frame".to_string())
            })?;
        if remaining_bytes.is_empty() {
            return Err(DekuError::Assertion("empty frame".to_string()));
        }

        // Decode the DF quickly to determine the length of the message
        let df = remaining_bytes[0] >> 3;

        let bit_len = if df & 0x10 != 0 {
            MODES_LONG_MSG_BYTES * 8
        } else {
            MODES_SHORT_MSG_BYTES * 8
        };

        let crc = modes_checksum(remaining_bytes, bit_len)?;
        Ok((rest, crc))
    }
}

/// ICAO 24-bit address, commonly used to reference airframes, i.e. tail
/// numbers of aircraft
#[derive(PartialEq, Eq, PartialOrd, DekuRead, Hash, Copy, Clone, Ord)]
pub struct ICAO(#[deku(bits = 24, endian = "big")] pub u32);

impl fmt::Debug for ICAO {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06x}", self.0)?;
        Ok(())
    }
}

impl fmt::Display for ICAO {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06x}", self.0)?;
        Ok(())
    }
}

impl Serialize for ICAO {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let icao = format!("{:06x}", &self.0);
        serializer.serialize_str(&icao)
    }
}

impl core::str::FromStr for ICAO {
    type Err = core::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let num = u32::from_str_radix(s, 16)?;
        Ok(Self(num))
    }
}
