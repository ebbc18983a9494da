//! OFDM Modulation for LTE downlink
//!
//! Implements OFDM baseband signal generation according to 3GPP TS 36.211
//! section 6.12, using rustfft for the inverse transform.

use crate::LayerError;
use num_complex::Complex32;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;
use tracing::debug;

use super::{FrameStructure, ResourceGrid};

/// OFDM modulator for downlink
pub struct OfdmModulator {
    /// FFT size
    fft_size: usize,
    /// Inverse FFT plan
    ifft: Arc<dyn Fft<f32>>,
    /// CP lengths for each symbol in the subframe
    cp_lengths: Vec<usize>,
    /// Frequency domain working buffer
    buffer: Vec<Complex32>,
    /// FFT scratch space
    scratch: Vec<Complex32>,
    /// Normalization applied to every output sample (1/sqrt(N))
    scale: f32,
}

impl OfdmModulator {
    /// Create a new OFDM modulator
    pub fn new(frame: &FrameStructure) -> Self {
        let fft_size = frame.fft_size();
        let mut planner = FftPlanner::new();
        let ifft = planner.plan_fft_inverse(fft_size);
        let scratch = vec![Complex32::new(0.0, 0.0); ifft.get_inplace_scratch_len()];

        debug!("Created OFDM modulator: fft_size={}, cp={:?}", fft_size, frame.cp_lengths());

        Self {
            fft_size,
            ifft,
            cp_lengths: frame.cp_lengths(),
            buffer: vec![Complex32::new(0.0, 0.0); fft_size],
            scratch,
            scale: 1.0 / (fft_size as f32).sqrt(),
        }
    }

    /// Samples produced per subframe
    pub fn subframe_length(&self) -> usize {
        self.cp_lengths.iter().map(|cp| cp + self.fft_size).sum()
    }

    /// Modulate one OFDM symbol and append it (CP first) to `output`
    pub fn modulate_symbol(
        &mut self,
        grid: &ResourceGrid,
        l: usize,
        output: &mut Vec<Complex32>,
    ) -> Result<(), LayerError> {
        let symbol = grid.symbol(l).ok_or_else(|| {
            LayerError::ProcessingError(format!("Symbol {} outside the resource grid", l))
        })?;
        let cp_len = *self.cp_lengths.get(l).ok_or_else(|| {
            LayerError::ProcessingError(format!("No CP length for symbol {}", l))
        })?;

        // Negative subcarriers wrap to the top of the FFT, DC stays empty
        let half = symbol.len() / 2;
        self.buffer.fill(Complex32::new(0.0, 0.0));
        for (k, &value) in symbol.iter().enumerate() {
            let bin = if k < half {
                self.fft_size - half + k
            } else {
                k - half + 1
            };
            self.buffer[bin] = value;
        }

        self.ifft.process_with_scratch(&mut self.buffer, &mut self.scratch);

        let scale = self.scale;
        output.extend(self.buffer[self.fft_size - cp_len..].iter().map(|&s| s * scale));
        output.extend(self.buffer.iter().map(|&s| s * scale));
        Ok(())
    }

    /// Modulate a complete subframe
    pub fn modulate_subframe(&mut self, grid: &ResourceGrid) -> Result<Vec<Complex32>, LayerError> {
        let mut output = Vec::with_capacity(self.subframe_length());
        for l in 0..grid.nof_symbols() {
            self.modulate_symbol(grid, l, &mut output)?;
        }
        Ok(output)
    }
}
