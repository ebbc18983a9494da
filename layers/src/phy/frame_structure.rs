//! LTE Frame Structure
//!
//! Implements the type 1 (FDD) frame structure according to 3GPP TS 36.211
//! section 4 and the OFDM symbol timing of section 6.12.

use common::types::{CyclicPrefix, LteCellConfig};
use common::SUBFRAMES_PER_FRAME;

/// Subframes carrying PSS/SSS
pub const SYNC_SUBFRAMES: [u8; 2] = [0, 5];

/// Subframe carrying the PBCH
pub const PBCH_SUBFRAME: u8 = 0;

/// Number of OFDM symbols occupied by the PBCH (slot 1)
pub const PBCH_SYMBOLS: usize = 4;

/// Width of the central band holding PSS, SSS and PBCH, in subcarriers
pub const CENTRAL_SUBCARRIERS: usize = 72;

/// Frame structure of one downlink cell
#[derive(Debug, Clone)]
pub struct FrameStructure {
    cyclic_prefix: CyclicPrefix,
    fft_size: usize,
    nof_prb: usize,
}

impl FrameStructure {
    /// Create a new frame structure
    pub fn new(cell: &LteCellConfig) -> Self {
        Self {
            cyclic_prefix: cell.cyclic_prefix,
            fft_size: cell.bandwidth.fft_size(),
            nof_prb: cell.nof_prb(),
        }
    }

    /// Get number of symbols per slot
    pub fn symbols_per_slot(&self) -> usize {
        self.cyclic_prefix.symbols_per_slot()
    }

    /// Get number of symbols per subframe
    pub fn symbols_per_subframe(&self) -> usize {
        2 * self.symbols_per_slot()
    }

    /// FFT size
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Cyclic prefix length of symbol `l` within a slot
    pub fn cp_length(&self, l: usize) -> usize {
        match self.cyclic_prefix {
            CyclicPrefix::Normal if l == 0 => 160 * self.fft_size / 2048,
            CyclicPrefix::Normal => 144 * self.fft_size / 2048,
            CyclicPrefix::Extended => 512 * self.fft_size / 2048,
        }
    }

    /// CP lengths for every symbol of a subframe
    pub fn cp_lengths(&self) -> Vec<usize> {
        (0..self.symbols_per_subframe())
            .map(|l| self.cp_length(l % self.symbols_per_slot()))
            .collect()
    }

    /// Samples in one subframe
    pub fn samples_per_subframe(&self) -> usize {
        self.cp_lengths().iter().map(|cp| cp + self.fft_size).sum()
    }

    /// Slot number n_s of subframe symbol `l`
    pub fn slot_of(&self, sf_idx: u8, l: usize) -> usize {
        2 * sf_idx as usize + l / self.symbols_per_slot()
    }

    /// Check if this subframe carries PSS/SSS
    pub fn is_sync_subframe(&self, sf_idx: u8) -> bool {
        SYNC_SUBFRAMES.contains(&(sf_idx % SUBFRAMES_PER_FRAME))
    }

    /// Subframe symbol carrying the PSS (last symbol of the first slot)
    pub fn pss_symbol(&self) -> usize {
        self.symbols_per_slot() - 1
    }

    /// Subframe symbol carrying the SSS (just before the PSS)
    pub fn sss_symbol(&self) -> usize {
        self.symbols_per_slot() - 2
    }

    /// Subframe symbols carrying the PBCH
    pub fn pbch_symbols(&self) -> std::ops::Range<usize> {
        self.symbols_per_slot()..self.symbols_per_slot() + PBCH_SYMBOLS
    }

    /// Number of OFDM symbols used by the control region for a given CFI
    pub fn control_symbols(&self, cfi: u8) -> usize {
        if self.nof_prb < 10 {
            cfi as usize + 1
        } else {
            cfi as usize
        }
    }

    /// Subcarrier range of the central 72 subcarriers
    pub fn central_band(&self) -> std::ops::Range<usize> {
        let half = self.nof_prb * 6;
        half - CENTRAL_SUBCARRIERS / 2..half + CENTRAL_SUBCARRIERS / 2
    }
}
