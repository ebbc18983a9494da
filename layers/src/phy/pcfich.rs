//! Physical Control Format Indicator Channel (PCFICH)
//!
//! 3GPP TS 36.212 section 5.3.4 and TS 36.211 section 6.7

use crate::LayerError;
use common::types::{LteCellConfig, ModulationScheme};

use super::modulation::modulate;
use super::regs::RegLayout;
use super::sequence::scramble;
use super::ResourceGrid;

/// CFI codeword length
const CFI_CODEWORD_BITS: usize = 32;

/// 32-bit CFI codeword (Table 5.3.4-1): a repeated 3-bit pattern
pub fn cfi_codeword(cfi: u8) -> Result<Vec<u8>, LayerError> {
    let pattern: [u8; 3] = match cfi {
        1 => [0, 1, 1],
        2 => [1, 0, 1],
        3 => [1, 1, 0],
        _ => return Err(LayerError::InvalidConfiguration(format!("CFI must be 1-3, got {}", cfi))),
    };
    Ok(pattern.iter().copied().cycle().take(CFI_CODEWORD_BITS).collect())
}

/// PCFICH processor
pub struct PcfichProcessor {
    n_id: u32,
}

impl PcfichProcessor {
    pub fn new(cell: &LteCellConfig) -> Self {
        Self { n_id: cell.pci.0 as u32 }
    }

    /// Encode the CFI of `layout` and write its 16 symbols for subframe `sf_idx`
    pub fn encode(&self, grid: &mut ResourceGrid, layout: &RegLayout, sf_idx: u8) -> Result<(), LayerError> {
        let mut bits = cfi_codeword(layout.cfi())?;

        let ns = 2 * sf_idx as u32;
        let c_init = (ns / 2 + 1) * (2 * self.n_id + 1) * (1 << 9) + self.n_id;
        scramble(&mut bits, c_init);

        let symbols = modulate(&bits, ModulationScheme::Qpsk);
        for (reg, quad) in layout.pcfich_regs().iter().zip(symbols.chunks_exact(4)) {
            for (&k, &value) in reg.subcarriers.iter().zip(quad) {
                grid.map_re(k, reg.l, value)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phy::FrameStructure;

    #[test]
    fn test_codewords() {
        let cw1 = cfi_codeword(1).unwrap();
        assert_eq!(cw1.len(), 32);
        assert_eq!(&cw1[..6], &[0, 1, 1, 0, 1, 1]);
        assert_eq!(&cw1[30..], &[0, 1]);
        assert_eq!(&cfi_codeword(3).unwrap()[30..], &[1, 1]);
        assert!(cfi_codeword(4).is_err());
    }

    #[test]
    fn test_pcfich_mapping() {
        let cell = LteCellConfig::default();
        let frame = FrameStructure::new(&cell);
        let layout = RegLayout::new(&cell, &frame, 1).unwrap();
        let pcfich = PcfichProcessor::new(&cell);
        let mut grid = ResourceGrid::new(&cell);

        pcfich.encode(&mut grid, &layout, 4).unwrap();
        assert_eq!(grid.count_nonzero(0), 16);
        for reg in layout.pcfich_regs() {
            for &k in &reg.subcarriers {
                assert!((grid.get_re(k, 0).unwrap().norm() - 1.0).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn test_scrambling_depends_on_subframe() {
        let cell = LteCellConfig::default();
        let frame = FrameStructure::new(&cell);
        let layout = RegLayout::new(&cell, &frame, 2).unwrap();
        let pcfich = PcfichProcessor::new(&cell);

        let mut a = ResourceGrid::new(&cell);
        let mut b = ResourceGrid::new(&cell);
        pcfich.encode(&mut a, &layout, 1).unwrap();
        pcfich.encode(&mut b, &layout, 2).unwrap();

        let differs = layout.pcfich_regs().iter()
            .flat_map(|reg| reg.subcarriers.iter())
            .any(|&k| a.get_re(k, 0) != b.get_re(k, 0));
        assert!(differs);
    }
}
