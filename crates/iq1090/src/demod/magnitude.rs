use num_complex::Complex;

/// Convert interleaved unsigned 8-bit I/Q bytes to a magnitude sequence.
///
/// RTL-SDR captures are DC-biased around 127.5; each (I, Q) pair becomes
/// one real, nonnegative sample. A trailing unpaired byte is dropped.
pub fn magnitude(iq: &[u8]) -> Vec<f32> {
    iq.chunks_exact(2)
        .map(|pair| {
            Complex::new(
                f32::from(pair[0]) - 127.5,
                f32::from(pair[1]) - 127.5,
            )
            .norm()
        })
        .collect()
}

/// Derive the pulse detection threshold from the magnitude sequence.
///
/// ADS-B pulses sit an order of magnitude above the noise floor, so a
/// fixed multiple of the arithmetic mean tracks gain changes between
/// captures without any per-window bookkeeping.
pub fn detection_threshold(mag: &[f32], factor: f32) -> f32 {
    if mag.is_empty() {
        return 0.0;
    }
    let sum: f64 = mag.iter().map(|&m| f64::from(m)).sum();
    factor * (sum / mag.len() as f64) as f32
}
