use tracing::trace;

/// One sample is 0.5 µs at the fixed 2 MSPS capture rate.
pub const SAMPLES_PER_BIT: usize = 2;
/// The Mode S preamble occupies 8 µs.
pub const PREAMBLE_SAMPLES: usize = 16;
/// Long Mode S frames carry 112 bits.
pub const FRAME_BITS: usize = 112;
/// Preamble plus data, in samples: the footprint of one whole frame.
pub const FRAME_SAMPLES: usize =
    PREAMBLE_SAMPLES + FRAME_BITS * SAMPLES_PER_BIT;

/// The preamble pulses sit at 0, 1, 3.5 and 4.5 µs.
const PULSES: [usize; 4] = [0, 2, 7, 9];
/// Samples between and right after the pulses, quiet in a clean preamble.
const QUIET: [usize; 6] = [1, 3, 4, 5, 6, 8];

/// Scan a magnitude buffer for Mode S preamble signatures.
///
/// Yields candidate frame offsets in strictly increasing order. After a
/// hit the cursor jumps over the whole frame so the same transmission is
/// never reported twice; a miss advances by a single sample. Candidates
/// always leave room for a full frame in the buffer.
///
/// All four pulse positions must exceed the threshold. The in-between
/// samples are only checked in strict mode, against half the threshold:
/// the lenient default catches weak frames whose quiet zones swim in
/// noise, at the price of more false candidates for the CRC to discard.
pub struct CandidateScanner<'a> {
    mag: &'a [f32],
    threshold: f32,
    strict: bool,
    cursor: usize,
}

impl<'a> CandidateScanner<'a> {
    pub fn new(mag: &'a [f32], threshold: f32, strict: bool) -> Self {
        CandidateScanner {
            mag,
            threshold,
            strict,
            cursor: 0,
        }
    }

    fn matches_at(&self, i: usize) -> bool {
        if !PULSES.iter().all(|&p| self.mag[i + p] > self.threshold) {
            return false;
        }
        if self.strict {
            let ceiling = self.threshold / 2.0;
            if !QUIET.iter().all(|&q| self.mag[i + q] < ceiling) {
                return false;
            }
        }
        true
    }
}

impl Iterator for CandidateScanner<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        while self.cursor + FRAME_SAMPLES <= self.mag.len() {
            let i = self.cursor;
            if self.matches_at(i) {
                trace!("preamble candidate at sample {}", i);
                self.cursor += FRAME_SAMPLES;
                return Some(i);
            }
            self.cursor += 1;
        }
        None
    }
}
