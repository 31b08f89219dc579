#![doc = include_str!("../readme.md")]
pub mod decode;
pub mod demod;
pub mod source;

pub mod prelude {
    /// This re-export is necessary to decode messages
    pub use deku::prelude::*;

    pub use crate::decode::adsb::{ADSB, ME};
    pub use crate::decode::bds::bds05::AirbornePosition;
    pub use crate::decode::cpr::{CPRFormat, Position};
    /// The root structure to decode demodulated frames
    pub use crate::decode::Message;
    pub use crate::decode::{DF, ICAO};
    pub use crate::demod::{
        DemodSettings, Demodulator, PositionReport, ReportSink,
    };
    pub use crate::source::{ByteSource, FileSource};
}
