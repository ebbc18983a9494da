//! Primary and Secondary Synchronization Signal Generation
//!
//! Implements PSS and SSS generation according to 3GPP TS 36.211 section 6.11

use crate::LayerError;
use common::types::Pci;
use num_complex::Complex32;
use std::f32::consts::PI;
use tracing::debug;

use super::{FrameStructure, ResourceGrid};

/// PSS/SSS sequence length
pub const SYNC_LENGTH: usize = 62;

/// Zadoff-Chu root index for each N_ID(2)
const PSS_ROOTS: [u32; 3] = [25, 29, 34];

/// Generate the PSS sequence d_u(n) for N_ID(2)
pub fn generate_pss(nid2: u8) -> Vec<Complex32> {
    let u = PSS_ROOTS[nid2 as usize % 3];
    (0..SYNC_LENGTH as u32)
        .map(|n| {
            let m = if n < 31 { n * (n + 1) } else { (n + 1) * (n + 2) };
            // exp(-j*pi*u*m/63) has period 126 in u*m
            let phase = (u * m % 126) as f32;
            Complex32::from_polar(1.0, -PI * phase / 63.0)
        })
        .collect()
}

/// Length-31 m-sequence in +/-1 form: x(i+5) = sum of taps, x(0..5) = 0,0,0,0,1
fn m_sequence(taps: &[usize]) -> [f32; 31] {
    let mut x = [0u8; 31];
    x[4] = 1;
    for i in 0..26 {
        x[i + 5] = taps.iter().fold(0, |acc, &t| acc ^ x[i + t]);
    }

    let mut out = [0.0; 31];
    for (o, &b) in out.iter_mut().zip(x.iter()) {
        *o = 1.0 - 2.0 * b as f32;
    }
    out
}

/// SSS cyclic shift indices (m0, m1) for N_ID(1)
pub fn sss_indices(nid1: u16) -> (usize, usize) {
    let nid1 = nid1 as usize;
    let q_prime = nid1 / 30;
    let q = (nid1 + q_prime * (q_prime + 1) / 2) / 30;
    let m_prime = nid1 + q * (q + 1) / 2;
    let m0 = m_prime % 31;
    let m1 = (m0 + m_prime / 31 + 1) % 31;
    (m0, m1)
}

/// Generate the SSS sequence d(n) for subframe 0 or subframe 5
pub fn generate_sss(nid1: u16, nid2: u8, subframe5: bool) -> Vec<Complex32> {
    let s = m_sequence(&[2, 0]);
    let c = m_sequence(&[3, 0]);
    let z = m_sequence(&[4, 2, 1, 0]);
    let (m0, m1) = sss_indices(nid1);
    let nid2 = nid2 as usize;

    let mut d = vec![Complex32::new(0.0, 0.0); SYNC_LENGTH];
    for n in 0..31 {
        let s0 = s[(n + m0) % 31];
        let s1 = s[(n + m1) % 31];
        let c0 = c[(n + nid2) % 31];
        let c1 = c[(n + nid2 + 3) % 31];
        let z1_m0 = z[(n + m0 % 8) % 31];
        let z1_m1 = z[(n + m1 % 8) % 31];

        let (even, odd) = if subframe5 {
            (s1 * c0, s0 * c1 * z1_m1)
        } else {
            (s0 * c0, s1 * c1 * z1_m0)
        };
        d[2 * n] = Complex32::new(even, 0.0);
        d[2 * n + 1] = Complex32::new(odd, 0.0);
    }
    d
}

/// Synchronization signal generator for one cell
#[derive(Debug, Clone)]
pub struct SyncSignals {
    pss: Vec<Complex32>,
    sss_sf0: Vec<Complex32>,
    sss_sf5: Vec<Complex32>,
}

impl SyncSignals {
    /// Pre-compute PSS and both SSS variants
    pub fn new(pci: Pci) -> Self {
        debug!("Generating PSS/SSS for PCI {} (N_ID1={}, N_ID2={})", pci.0, pci.nid1(), pci.nid2());
        Self {
            pss: generate_pss(pci.nid2()),
            sss_sf0: generate_sss(pci.nid1(), pci.nid2(), false),
            sss_sf5: generate_sss(pci.nid1(), pci.nid2(), true),
        }
    }

    /// Write PSS and SSS into the grid for subframe 0 or 5
    pub fn map(&self, grid: &mut ResourceGrid, frame: &FrameStructure, sf_idx: u8) -> Result<(), LayerError> {
        if !frame.is_sync_subframe(sf_idx) {
            return Err(LayerError::ProcessingError(format!(
                "Subframe {} does not carry synchronization signals", sf_idx
            )));
        }
        let sss = if sf_idx == 5 { &self.sss_sf5 } else { &self.sss_sf0 };

        grid.map_centered(frame.pss_symbol(), &self.pss)?;
        grid.map_centered(frame.sss_symbol(), sss)?;
        Ok(())
    }
}
