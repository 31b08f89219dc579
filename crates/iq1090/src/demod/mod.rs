/*!
* The demodulation pipeline: raw I/Q bytes in, position reports out.
*
* A [`Demodulator`] owns everything one decode session needs: the
* detection settings, the per-aircraft CPR frame store and the counters.
* The stages (magnitude conversion, threshold estimation, preamble scan,
* bit slicing, parity check, DF17 parsing, CPR resolution) run strictly
* in buffer order, so "most recent frame" always means "latest in the
* capture".
*/
pub mod frame;
pub mod magnitude;
pub mod preamble;

pub use frame::{slice_frame, RawFrame, FRAME_BYTES};
pub use magnitude::{detection_threshold, magnitude};
pub use preamble::{CandidateScanner, FRAME_SAMPLES};

use crate::decode::adsb::ME;
use crate::decode::cpr::AircraftState;
use crate::decode::{Message, DF, ICAO};
use crate::source::ByteSource;
use deku::DekuContainerRead;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info, trace};

/// Errors that abort a decode session. Everything recoverable (truncated
/// candidates, parity failures, frames of no interest) is absorbed and
/// counted in [`DemodStats`] instead.
#[derive(Debug, Error)]
pub enum DemodError {
    #[error("empty capture: no I/Q bytes to demodulate")]
    EmptyCapture,

    #[error("failed to read capture: {0}")]
    Source(#[from] std::io::Error),
}

/// Tuning knobs for one decode session
#[derive(Debug, Clone, Copy)]
pub struct DemodSettings {
    /// Detection threshold, as a multiple of the mean magnitude
    pub threshold_factor: f32,

    /// Drop frames whose 24-bit parity syndrome is nonzero
    pub check_crc: bool,

    /// Also require the samples between the preamble pulses to stay
    /// below half the threshold
    pub strict_preamble: bool,
}

impl Default for DemodSettings {
    fn default() -> Self {
        DemodSettings {
            threshold_factor: 5.0,
            check_crc: true,
            strict_preamble: false,
        }
    }
}

/// Session counters, exposed for logging and diagnostics only
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct DemodStats {
    /// Magnitude samples in the capture
    pub samples: usize,
    /// Preamble candidates emitted by the scanner
    pub candidates: usize,
    /// Candidates dropped for running past the end of the buffer
    pub truncated: usize,
    /// Frames dropped on a nonzero parity syndrome
    pub crc_failures: usize,
    /// Frames with a downlink format other than 17
    pub other_df: usize,
    /// DF17 frames without an airborne-position payload
    pub other_tc: usize,
    /// Position reports emitted
    pub reports: usize,
    /// Reports emitted before a global position fix was possible
    pub without_fix: usize,
}

/// One decoded DF17 airborne-position frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionReport {
    pub icao: ICAO,

    /// Barometric altitude in feet; None for an undecodable Gillham code
    #[serde(rename = "alt")]
    pub altitude: Option<i32>,

    /// Absent until both CPR parities have been seen for this aircraft
    #[serde(rename = "lat", skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,

    #[serde(rename = "lon", skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,

    /// The frame itself, 28 uppercase hex characters
    #[serde(rename = "raw")]
    pub raw_hex: String,
}

/// Where decoded reports go, one call per frame, in pipeline order
pub trait ReportSink {
    fn emit(&mut self, report: PositionReport);
}

impl ReportSink for Vec<PositionReport> {
    fn emit(&mut self, report: PositionReport) {
        self.push(report);
    }
}

/// A single-session batch decoder for 1090 MHz I/Q captures
pub struct Demodulator {
    settings: DemodSettings,
    aircraft: BTreeMap<ICAO, AircraftState>,
    seq: u64,
    stats: DemodStats,
}

impl Demodulator {
    pub fn new(settings: DemodSettings) -> Self {
        Demodulator {
            settings,
            aircraft: BTreeMap::new(),
            seq: 0,
            stats: DemodStats::default(),
        }
    }

    pub fn settings(&self) -> &DemodSettings {
        &self.settings
    }

    pub fn stats(&self) -> &DemodStats {
        &self.stats
    }

    /// Drain the source, then decode. No I/O happens mid-pipeline.
    pub fn run(
        &mut self,
        source: &mut dyn ByteSource,
        sink: &mut dyn ReportSink,
    ) -> Result<(), DemodError> {
        let bytes = source.read_all()?;
        self.decode_bytes(&bytes, sink)
    }

    /// Decode a whole capture buffer, emitting reports in frame order.
    ///
    /// An empty buffer is the only fatal condition.
    pub fn decode_bytes(
        &mut self,
        iq: &[u8],
        sink: &mut dyn ReportSink,
    ) -> Result<(), DemodError> {
        if iq.is_empty() {
            return Err(DemodError::EmptyCapture);
        }

        let mag = magnitude(iq);
        self.stats.samples += mag.len();

        let threshold =
            detection_threshold(&mag, self.settings.threshold_factor);
        debug!(
            "{} samples, detection threshold {:.2}",
            mag.len(),
            threshold
        );

        let candidates: Vec<usize> = CandidateScanner::new(
            &mag,
            threshold,
            self.settings.strict_preamble,
        )
        .collect();
        debug!("{} preamble candidates", candidates.len());

        for start in candidates {
            self.stats.candidates += 1;
            let Some(frame) = slice_frame(&mag, start) else {
                self.stats.truncated += 1;
                continue;
            };
            if let Some(report) = self.process_frame(frame) {
                sink.emit(report);
            }
        }

        info!(
            "session so far: {} candidates, {} reports",
            self.stats.candidates, self.stats.reports
        );
        Ok(())
    }

    /// Decode one already-demodulated 14-byte frame through the same
    /// parity check, DF17 parse and CPR pairing as the capture pipeline.
    pub fn decode_frame(
        &mut self,
        bytes: [u8; FRAME_BYTES],
    ) -> Option<PositionReport> {
        self.process_frame(RawFrame { bytes, offset: 0 })
    }

    fn process_frame(&mut self, frame: RawFrame) -> Option<PositionReport> {
        let msg = match Message::from_bytes((&frame.bytes, 0)) {
            Ok((_, msg)) => msg,
            Err(e) => {
                trace!("undecodable frame at {}: {}", frame.offset, e);
                return None;
            }
        };

        if self.settings.check_crc && msg.crc != 0 {
            self.stats.crc_failures += 1;
            trace!(
                "parity syndrome {:06x} at sample {}",
                msg.crc,
                frame.offset
            );
            return None;
        }

        let DF::ExtendedSquitterADSB(adsb) = msg.df else {
            self.stats.other_df += 1;
            return None;
        };
        let icao = adsb.icao24;
        let ME::BDS05(position) = adsb.message else {
            self.stats.other_tc += 1;
            return None;
        };

        let seq = self.seq;
        self.seq += 1;
        let state = self.aircraft.entry(icao).or_default();
        state.observe(position, seq);
        let fix = state.position();

        debug!(
            "{}: {} frame at sample {}, fix: {:?}",
            icao, position.parity, frame.offset, fix
        );

        self.stats.reports += 1;
        if fix.is_none() {
            self.stats.without_fix += 1;
        }
        Some(PositionReport {
            icao,
            altitude: position.alt,
            latitude: fix.map(|p| p.latitude),
            longitude: fix.map(|p| p.longitude),
            raw_hex: frame.to_hex(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::preamble::{PREAMBLE_SAMPLES, SAMPLES_PER_BIT};
    use super::*;
    use approx::assert_relative_eq;
    use hexlit::hex;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const EVEN: [u8; 14] = hex!("8D40621D58C382D690C8AC2863A7");
    const ODD: [u8; 14] = hex!("8D40621D58C386435CC412692AD6");

    fn set_pulse(iq: &mut [u8], sample: usize) {
        iq[2 * sample] = 227;
        iq[2 * sample + 1] = 127;
    }

    /// Write a preamble and the PPM-modulated frame into an I/Q buffer
    fn inject_frame(iq: &mut [u8], start: usize, bytes: &[u8; 14]) {
        for p in [0, 2, 7, 9] {
            set_pulse(iq, start + p);
        }
        for bit in 0..112 {
            let set = bytes[bit / 8] & (0x80 >> (bit % 8)) != 0;
            let off = start + PREAMBLE_SAMPLES + bit * SAMPLES_PER_BIT;
            set_pulse(iq, if set { off } else { off + 1 });
        }
    }

    fn quiet_buffer(samples: usize) -> Vec<u8> {
        vec![127u8; 2 * samples]
    }

    fn decode(iq: &[u8], settings: DemodSettings) -> Vec<PositionReport> {
        let mut reports = Vec::new();
        let mut demod = Demodulator::new(settings);
        demod.decode_bytes(iq, &mut reports).unwrap();
        reports
    }

    #[test]
    fn empty_capture_is_fatal() {
        let mut demod = Demodulator::new(DemodSettings::default());
        let mut reports = Vec::new();
        assert!(matches!(
            demod.decode_bytes(&[], &mut reports),
            Err(DemodError::EmptyCapture)
        ));
    }

    #[test]
    fn even_odd_pair_resolves_a_position() {
        let mut iq = quiet_buffer(2000);
        inject_frame(&mut iq, 300, &EVEN);
        inject_frame(&mut iq, 900, &ODD);

        let reports = decode(&iq, DemodSettings::default());
        assert_eq!(reports.len(), 2);

        // The first frame alone cannot resolve a position
        assert_eq!(reports[0].icao, ICAO(0x40621D));
        assert_eq!(reports[0].altitude, Some(38000));
        assert_eq!(reports[0].latitude, None);
        assert_eq!(reports[0].longitude, None);
        assert_eq!(reports[0].raw_hex, "8D40621D58C382D690C8AC2863A7");

        // The second one pairs with it
        assert_eq!(reports[1].icao, ICAO(0x40621D));
        assert_eq!(reports[1].altitude, Some(38000));
        assert_relative_eq!(
            reports[1].latitude.unwrap(),
            52.25720,
            max_relative = 1e-3
        );
        assert_relative_eq!(
            reports[1].longitude.unwrap(),
            3.91937,
            max_relative = 1e-2
        );
    }

    #[test]
    fn single_frame_reports_without_fix() {
        let mut iq = quiet_buffer(1000);
        inject_frame(&mut iq, 400, &EVEN);

        let mut demod = Demodulator::new(DemodSettings::default());
        let mut reports = Vec::new();
        demod.decode_bytes(&iq, &mut reports).unwrap();

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].icao, ICAO(0x40621D));
        assert_eq!(reports[0].altitude, Some(38000));
        assert_eq!(reports[0].latitude, None);
        assert_eq!(demod.stats().without_fix, 1);
    }

    #[test]
    fn identification_frame_is_skipped() {
        // TC=4, a valid frame of no interest to the position pipeline
        let mut iq = quiet_buffer(1000);
        inject_frame(&mut iq, 400, &hex!("8D4840D6202CC371C32CE0576098"));

        let mut demod = Demodulator::new(DemodSettings::default());
        let mut reports = Vec::new();
        demod.decode_bytes(&iq, &mut reports).unwrap();

        assert!(reports.is_empty());
        assert_eq!(demod.stats().other_tc, 1);
    }

    #[test]
    fn non_df17_frame_is_skipped() {
        // A DF11 all-call reply padded to a long frame: parity cannot
        // pass over 56 bits of air plus noise, so the frame only reaches
        // the format dispatch with the parity check off
        let mut demod = Demodulator::new(DemodSettings {
            check_crc: false,
            ..DemodSettings::default()
        });
        let report =
            demod.decode_frame(hex!("5D4840D6D4E19300000000000000"));
        assert_eq!(report, None);
        assert_eq!(demod.stats().other_df, 1);
    }

    #[test]
    fn corrupted_frame_is_dropped() {
        let mut bytes = EVEN;
        bytes[9] ^= 0x40;
        let mut demod = Demodulator::new(DemodSettings::default());
        assert_eq!(demod.decode_frame(bytes), None);
        assert_eq!(demod.stats().crc_failures, 1);

        // The same frame passes with the check disabled
        let mut permissive = Demodulator::new(DemodSettings {
            check_crc: false,
            ..DemodSettings::default()
        });
        assert!(permissive.decode_frame(bytes).is_some());
    }

    #[test]
    fn injected_preamble_in_noise_is_the_only_candidate() {
        // 4000 bytes of noise around the 127.5 bias, four pulse bytes at
        // indices 1000/1004/1014/1018: one candidate at sample 500
        let mut rng = StdRng::seed_from_u64(0x1090);
        let mut iq: Vec<u8> =
            (0..4000).map(|_| rng.gen_range(120..=135)).collect();
        for i in [1000, 1004, 1014, 1018] {
            iq[i] = 227;
            iq[i + 1] = 127;
        }

        let mag = magnitude(&iq);
        let threshold = detection_threshold(&mag, 5.0);
        let candidates: Vec<usize> =
            CandidateScanner::new(&mag, threshold, false).collect();
        assert_eq!(candidates, vec![500]);

        // The bits behind the preamble are noise: no report survives
        let mut demod = Demodulator::new(DemodSettings::default());
        let mut reports = Vec::new();
        demod.decode_bytes(&iq, &mut reports).unwrap();
        assert_eq!(demod.stats().candidates, 1);
        assert!(reports.is_empty());
    }

    #[test]
    fn decoding_is_deterministic() {
        let mut iq = quiet_buffer(2000);
        inject_frame(&mut iq, 300, &EVEN);
        inject_frame(&mut iq, 900, &ODD);
        let first = decode(&iq, DemodSettings::default());
        let second = decode(&iq, DemodSettings::default());
        assert_eq!(first, second);
    }

    #[test]
    fn parity_slot_overwrites_keep_the_latest_frame() {
        // Two even frames then one odd: the fix pairs the second even
        let mut demod = Demodulator::new(DemodSettings::default());
        demod.decode_frame(EVEN);
        demod.decode_frame(EVEN);
        let report = demod.decode_frame(ODD).unwrap();
        assert!(report.latitude.is_some());
        assert_eq!(demod.stats().reports, 3);
        assert_eq!(demod.stats().without_fix, 2);
    }

    #[test]
    fn sessions_do_not_share_state() {
        let mut first = Demodulator::new(DemodSettings::default());
        first.decode_frame(EVEN);

        let mut second = Demodulator::new(DemodSettings::default());
        let report = second.decode_frame(ODD).unwrap();
        assert_eq!(report.latitude, None);
    }

    #[test]
    fn report_serializes_with_the_contract_keys() {
        let mut demod = Demodulator::new(DemodSettings::default());
        demod.decode_frame(EVEN);
        let report = demod.decode_frame(ODD).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["icao"], "40621d");
        assert_eq!(json["alt"], 38000);
        assert!(json["lat"].is_f64());
        assert!(json["lon"].is_f64());
        assert_eq!(json["raw"], "8D40621D58C386435CC412692AD6");
    }
}
