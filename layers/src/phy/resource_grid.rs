//! Resource Grid for LTE downlink
//!
//! Holds the resource elements of one subframe, indexed by logical
//! subcarrier `k` (0 to N_RB * 12 - 1, DC excluded) and subframe symbol `l`.

use crate::LayerError;
use common::types::LteCellConfig;
use num_complex::Complex32;
use ndarray::{Array2, ArrayView1};

/// Resource grid for one subframe
#[derive(Debug, Clone)]
pub struct ResourceGrid {
    /// 2D grid: [subcarriers, symbols]
    grid: Array2<Complex32>,
    /// Number of resource blocks
    nof_prb: usize,
}

impl ResourceGrid {
    /// Create a new resource grid
    pub fn new(cell: &LteCellConfig) -> Self {
        let grid = Array2::zeros((cell.nof_subcarriers(), cell.symbols_per_subframe()));
        Self {
            grid,
            nof_prb: cell.nof_prb(),
        }
    }

    /// Clear the entire grid
    pub fn clear(&mut self) {
        self.grid.fill(Complex32::new(0.0, 0.0));
    }

    /// Number of resource blocks
    pub fn nof_prb(&self) -> usize {
        self.nof_prb
    }

    /// Number of subcarriers
    pub fn nof_subcarriers(&self) -> usize {
        self.grid.nrows()
    }

    /// Number of OFDM symbols
    pub fn nof_symbols(&self) -> usize {
        self.grid.ncols()
    }

    /// Map a resource element
    pub fn map_re(&mut self, k: usize, l: usize, value: Complex32) -> Result<(), LayerError> {
        let elem = self.grid.get_mut((k, l)).ok_or_else(|| {
            LayerError::InvalidConfiguration(format!("RE out of bounds: subcarrier={}, symbol={}", k, l))
        })?;
        *elem = value;
        Ok(())
    }

    /// Get a resource element
    pub fn get_re(&self, k: usize, l: usize) -> Option<Complex32> {
        self.grid.get((k, l)).copied()
    }

    /// Map a sequence centred on DC: element `n` lands on subcarrier
    /// `n - len/2 + N_sc/2`
    pub fn map_centered(&mut self, l: usize, sequence: &[Complex32]) -> Result<(), LayerError> {
        let half = self.nof_subcarriers() / 2;
        let start = half.checked_sub(sequence.len() / 2).ok_or_else(|| {
            LayerError::InvalidConfiguration(format!(
                "Sequence of length {} does not fit {} subcarriers", sequence.len(), self.nof_subcarriers()
            ))
        })?;

        for (n, &value) in sequence.iter().enumerate() {
            self.map_re(start + n, l, value)?;
        }
        Ok(())
    }

    /// Get symbol data as a slice view (no copy)
    pub fn symbol(&self, l: usize) -> Option<ArrayView1<Complex32>> {
        if l >= self.nof_symbols() {
            return None;
        }
        Some(self.grid.column(l))
    }

    /// Count non-zero resource elements in symbol `l`
    pub fn count_nonzero(&self, l: usize) -> usize {
        self.symbol(l)
            .map(|s| s.iter().filter(|v| v.norm_sqr() > 0.0).count())
            .unwrap_or(0)
    }
}
