use super::bds::bds05;
use super::ICAO;
use deku::prelude::*;

/**
 * An ADS-B frame is 112 bits long and consists of five main parts,
 * shown as follows:
 *
 * +----------+----------+-------------+------------------------+-----------+
 * |  DF (5)  |  CA (3)  |  ICAO (24)  |         ME (56)        |  PI (24)  |
 * +----------+----------+-------------+------------------------+-----------+
 *
 */
#[derive(Debug, PartialEq, DekuRead, Clone)]
pub struct ADSB {
    /// Transponder capability, not interpreted here
    #[deku(bits = "3")]
    pub capability: u8,

    /// ICAO aircraft address
    pub icao24: ICAO,

    /// ME (typecode-dispatched payload)
    pub message: ME,

    /// Parity/Interrogator ID
    pub parity: ICAO,
}

/// The 56-bit ME field, keyed on the 5-bit type code.
///
/// Only airborne positions with barometric altitude (TC 9 to 18) carry
/// fields; every other payload consumes its 51 remaining bits unparsed so
/// the trailing parity field stays aligned.
#[derive(Debug, PartialEq, DekuRead, Copy, Clone)]
#[deku(type = "u8", bits = "5")]
pub enum ME {
    #[deku(id_pat = "9..=18")]
    BDS05(bds05::AirbornePosition),

    #[deku(id_pat = "_")]
    Unsupported {
        #[deku(bits = "51", endian = "big")]
        me: u64,
    },
}
