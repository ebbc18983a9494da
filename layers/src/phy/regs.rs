//! Control region layout
//!
//! Resource element groups (REGs) of the downlink control region and their
//! assignment to PCFICH, PHICH and PDCCH according to 3GPP TS 36.211
//! sections 6.2.4, 6.7.4, 6.8.5 and 6.9.3.

use crate::LayerError;
use common::types::{CyclicPrefix, LteCellConfig, PhichLength};
use tracing::debug;

use super::convolutional::subblock_interleave_order;
use super::FrameStructure;

/// REGs per control channel element
pub const REGS_PER_CCE: usize = 9;

/// A resource element group: four usable REs in one OFDM symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reg {
    /// First subcarrier covered by the group
    pub k0: usize,
    /// OFDM symbol
    pub l: usize,
    /// The four data subcarriers, ascending
    pub subcarriers: [usize; 4],
}

/// REG assignment of the control region for one CFI value
#[derive(Debug, Clone)]
pub struct RegLayout {
    cfi: u8,
    nof_symbols: usize,
    pcfich: [Reg; 4],
    phich: Vec<[Reg; 3]>,
    /// REGs left for PDCCH, in time-first order
    pdcch: Vec<Reg>,
    /// Interleaved position of every PDCCH quadruplet
    quad_to_reg: Vec<usize>,
    nof_cce: usize,
}

impl RegLayout {
    /// Compute the control region layout of a cell for `cfi`
    pub fn new(cell: &LteCellConfig, frame: &FrameStructure, cfi: u8) -> Result<Self, LayerError> {
        if !(1..=3).contains(&cfi) {
            return Err(LayerError::InvalidConfiguration(format!("CFI must be 1-3, got {}", cfi)));
        }

        let nof_symbols = frame.control_symbols(cfi);
        let nof_sc = cell.nof_subcarriers();
        let nsymb = cell.symbols_per_slot();
        let v_shift = cell.pci.0 as usize % 6;
        let n_id = cell.pci.0 as usize;

        // REGs per symbol, ordered by frequency
        let symbols: Vec<Vec<Reg>> = (0..nof_symbols)
            .map(|l| {
                let has_crs = l == 0 || (l == 1 && cell.nof_ports == 4) || l == nsymb - 3;
                let width = if has_crs { 6 } else { 4 };
                (0..nof_sc / width)
                    .map(|r| {
                        let k0 = r * width;
                        let mut subcarriers = [0usize; 4];
                        let data = (k0..k0 + width).filter(|k| !has_crs || k % 3 != v_shift % 3);
                        for (slot, k) in subcarriers.iter_mut().zip(data) {
                            *slot = k;
                        }
                        Reg { k0, l, subcarriers }
                    })
                    .collect()
            })
            .collect();

        let mut used: Vec<Vec<bool>> = symbols.iter().map(|s| vec![false; s.len()]).collect();

        // PCFICH: four REGs of the first symbol spread over the band
        let nof_prb = cell.nof_prb();
        let k_bar = 6 * (n_id % (2 * nof_prb));
        let mut pcfich = [symbols[0][0]; 4];
        for (i, reg) in pcfich.iter_mut().enumerate() {
            let k = (k_bar + (i * nof_prb / 2) * 6) % nof_sc;
            let idx = k / 6;
            *reg = symbols[0][idx];
            used[0][idx] = true;
        }

        // PHICH: three REGs per mapping unit among those not taken by PCFICH
        let available: Vec<Vec<usize>> = used
            .iter()
            .map(|u| u.iter().enumerate().filter(|(_, &taken)| !taken).map(|(i, _)| i).collect())
            .collect();
        let n0 = available[0].len();
        let nof_units = match cell.cyclic_prefix {
            CyclicPrefix::Normal => cell.nof_phich_groups(),
            CyclicPrefix::Extended => cell.nof_phich_groups() / 2,
        };

        let mut phich = Vec::with_capacity(nof_units);
        for unit in 0..nof_units {
            let mut group = [symbols[0][0]; 3];
            for (i, reg) in group.iter_mut().enumerate() {
                let l = match cell.phich_length {
                    PhichLength::Normal => 0,
                    PhichLength::Extended => i.min(nof_symbols - 1),
                };
                let n_l = available[l].len();
                let n_bar = (n_id * n_l / n0 + unit + i * n_l / 3) % n_l;
                let idx = available[l][n_bar];
                *reg = symbols[l][idx];
                used[l][idx] = true;
            }
            phich.push(group);
        }

        // PDCCH: everything else, numbered time first
        let mut pdcch = Vec::new();
        for k in 0..nof_sc {
            for (l, regs) in symbols.iter().enumerate() {
                let width = nof_sc / regs.len();
                if k % width == 0 && !used[l][k / width] {
                    pdcch.push(regs[k / width]);
                }
            }
        }

        let m_quad = pdcch.len();
        let order = subblock_interleave_order(m_quad);
        let mut quad_to_reg = vec![0; m_quad];
        for m in 0..m_quad {
            quad_to_reg[order[(m + n_id) % m_quad]] = m;
        }
        let nof_cce = m_quad / REGS_PER_CCE;

        debug!(
            "Control region for CFI {}: {} symbols, {} PHICH units, {} PDCCH REGs, {} CCEs",
            cfi, nof_symbols, nof_units, m_quad, nof_cce
        );

        Ok(Self {
            cfi,
            nof_symbols,
            pcfich,
            phich,
            pdcch,
            quad_to_reg,
            nof_cce,
        })
    }

    /// CFI this layout was computed for
    pub fn cfi(&self) -> u8 {
        self.cfi
    }

    /// Number of OFDM symbols of the control region
    pub fn nof_symbols(&self) -> usize {
        self.nof_symbols
    }

    /// Number of CCEs available to PDCCH
    pub fn nof_cce(&self) -> usize {
        self.nof_cce
    }

    /// REGs carrying PCFICH quadruplets 0-3
    pub fn pcfich_regs(&self) -> &[Reg; 4] {
        &self.pcfich
    }

    /// REGs reserved for each PHICH mapping unit
    pub fn phich_regs(&self) -> &[[Reg; 3]] {
        &self.phich
    }

    /// REGs used by PDCCH in 36.211 numbering order
    pub fn pdcch_regs(&self) -> &[Reg] {
        &self.pdcch
    }

    /// REGs carrying the nine quadruplets of a CCE, after interleaving
    pub fn cce_regs(&self, cce: usize) -> Result<Vec<Reg>, LayerError> {
        if cce >= self.nof_cce {
            return Err(LayerError::ProcessingError(format!(
                "CCE {} outside control region ({} CCEs)", cce, self.nof_cce
            )));
        }
        Ok((cce * REGS_PER_CCE..(cce + 1) * REGS_PER_CCE)
            .map(|q| self.pdcch[self.quad_to_reg[q]])
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::types::LteBandwidth;
    use std::collections::HashSet;

    fn layout(cell: &LteCellConfig, cfi: u8) -> RegLayout {
        RegLayout::new(cell, &FrameStructure::new(cell), cfi).unwrap()
    }

    #[test]
    fn test_six_prb_cfi1() {
        let cell = LteCellConfig::default();
        let regs = layout(&cell, 1);

        assert_eq!(regs.nof_symbols(), 2);
        assert_eq!(regs.pdcch_regs().len(), 23);
        assert_eq!(regs.nof_cce(), 2);

        let pcfich: Vec<usize> = regs.pcfich_regs().iter().map(|r| r.k0).collect();
        assert_eq!(pcfich, vec![6, 24, 42, 60]);

        assert_eq!(regs.phich_regs().len(), 1);
        let phich: Vec<usize> = regs.phich_regs()[0].iter().map(|r| r.k0).collect();
        assert_eq!(phich, vec![12, 30, 54]);
    }

    #[test]
    fn test_reg_subcarriers_skip_crs() {
        let cell = LteCellConfig::default(); // v_shift = 1
        let regs = layout(&cell, 1);
        let first = regs.pdcch_regs()[0];
        assert_eq!((first.k0, first.l), (0, 0));
        assert_eq!(first.subcarriers, [0, 2, 3, 5]);

        let second = regs.pdcch_regs()[1];
        assert_eq!((second.k0, second.l), (0, 1));
        assert_eq!(second.subcarriers, [0, 1, 2, 3]);
    }

    #[test]
    fn test_regs_are_disjoint_and_cover_region() {
        for (prb, cfi) in [(6, 1), (6, 3), (25, 2), (50, 3), (100, 1)] {
            let mut cell = LteCellConfig::default();
            cell.bandwidth = LteBandwidth::from_prb(prb).unwrap();
            cell.pci = common::Pci(prb as u16 + 7);
            let regs = layout(&cell, cfi);

            let mut res = HashSet::new();
            let all = regs.pcfich_regs().iter()
                .chain(regs.phich_regs().iter().flatten())
                .chain(regs.pdcch_regs().iter());
            for reg in all {
                for &k in &reg.subcarriers {
                    assert!(res.insert((k, reg.l)), "RE ({}, {}) assigned twice", k, reg.l);
                }
            }

            let nof_sc = cell.nof_subcarriers();
            let expected = (nof_sc - nof_sc / 3) + (regs.nof_symbols() - 1) * nof_sc;
            assert_eq!(res.len(), expected);
        }
    }

    #[test]
    fn test_cce_interleaving_is_bijective() {
        let mut cell = LteCellConfig::default();
        cell.bandwidth = LteBandwidth::Prb25;
        let regs = layout(&cell, 2);

        let mut seen = HashSet::new();
        for cce in 0..regs.nof_cce() {
            for reg in regs.cce_regs(cce).unwrap() {
                assert!(seen.insert((reg.k0, reg.l)));
            }
        }
        assert_eq!(seen.len(), regs.nof_cce() * REGS_PER_CCE);
        assert!(regs.cce_regs(regs.nof_cce()).is_err());
    }

    #[test]
    fn test_invalid_cfi() {
        let cell = LteCellConfig::default();
        assert!(RegLayout::new(&cell, &FrameStructure::new(&cell), 0).is_err());
        assert!(RegLayout::new(&cell, &FrameStructure::new(&cell), 4).is_err());
    }
}
