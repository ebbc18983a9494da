//! Modulation mapper (3GPP TS 36.211 section 7.1)

use common::types::ModulationScheme;
use num_complex::Complex32;
use std::f32::consts::FRAC_1_SQRT_2;

/// Map bits onto constellation symbols. Trailing bits that do not fill a
/// whole symbol are dropped.
pub fn modulate(bits: &[u8], scheme: ModulationScheme) -> Vec<Complex32> {
    let qm = scheme.bits_per_symbol();
    bits.chunks_exact(qm)
        .map(|b| match scheme {
            ModulationScheme::Qpsk => qpsk(b[0], b[1]),
            ModulationScheme::Qam16 => {
                let scale = 1.0 / 10f32.sqrt();
                Complex32::new(
                    level(b[0]) * (2.0 - level(b[2])) * scale,
                    level(b[1]) * (2.0 - level(b[3])) * scale,
                )
            }
            ModulationScheme::Qam64 => {
                let scale = 1.0 / 42f32.sqrt();
                Complex32::new(
                    level(b[0]) * (4.0 - level(b[2]) * (2.0 - level(b[4]))) * scale,
                    level(b[1]) * (4.0 - level(b[3]) * (2.0 - level(b[5]))) * scale,
                )
            }
        })
        .collect()
}

/// Single QPSK symbol
pub fn qpsk(b0: u8, b1: u8) -> Complex32 {
    Complex32::new(level(b0) * FRAC_1_SQRT_2, level(b1) * FRAC_1_SQRT_2)
}

/// 0 -> +1, 1 -> -1
fn level(bit: u8) -> f32 {
    1.0 - 2.0 * (bit & 1) as f32
}
