use deku::prelude::*;

/// The Mode S generator polynomial, 25 bits with the leading coefficient:
/// x^24 + x^23 + ... + x^13 + x^12 + x^10 + x^3 + 1
const GENERATOR: u32 = 0x1FF_F409;

/// Compute the Mode S parity syndrome over the first `bits` bits of `msg`.
///
/// The syndrome is the remainder of the long division of the whole frame
/// (payload and parity field together) by [`GENERATOR`], MSB first. For
/// DF17 extended squitters the PI field is pure parity, so a clean frame
/// divides out to zero.
pub fn modes_checksum(msg: &[u8], bits: usize) -> Result<u32, DekuError> {
    if msg.len() * 8 < bits {
        return Err(DekuError::Assertion(format!(
            "{} bytes cannot hold a {} bit frame",
            msg.len(),
            bits
        )));
    }

    let mut rem: u32 = 0;
    for i in 0..bits {
        let bit = (msg[i / 8] >> (7 - i % 8)) & 1;
        rem = (rem << 1) | u32::from(bit);
        if rem & 0x100_0000 != 0 {
            rem ^= GENERATOR;
        }
    }
    Ok(rem & 0xFF_FFFF)
}
