//! Cell-specific Reference Signals
//!
//! 3GPP TS 36.211 section 6.10.1. Pilots for every configured antenna port
//! are written into the single transmitted grid.

use crate::LayerError;
use common::types::{CyclicPrefix, LteCellConfig};
use num_complex::Complex32;
use tracing::debug;

use super::modulation::qpsk;
use super::sequence::GoldSequence;
use super::ResourceGrid;

/// Largest downlink bandwidth, N_RB^max,DL
const MAX_PRB: usize = 110;

/// CRS generator for one cell
#[derive(Debug, Clone)]
pub struct CrsGenerator {
    cell: LteCellConfig,
    v_shift: usize,
    /// Pilot sequences indexed by [slot * symbols_per_slot + l]
    sequences: Vec<Vec<Complex32>>,
}

impl CrsGenerator {
    /// Pre-compute pilot sequences for all 20 slots
    pub fn new(cell: &LteCellConfig) -> Self {
        let nsymb = cell.symbols_per_slot();
        let n_id = cell.pci.0 as u32;
        let n_cp = match cell.cyclic_prefix {
            CyclicPrefix::Normal => 1,
            CyclicPrefix::Extended => 0,
        };

        let mut sequences = Vec::with_capacity(20 * nsymb);
        for ns in 0..20u32 {
            for l in 0..nsymb as u32 {
                let c_init = (1 << 10) * (7 * (ns + 1) + l + 1) * (2 * n_id + 1) + 2 * n_id + n_cp;
                let bits = GoldSequence::bits(c_init, 4 * MAX_PRB);
                sequences.push(bits.chunks_exact(2).map(|b| qpsk(b[0], b[1])).collect());
            }
        }

        debug!("Generated CRS for PCI {} with {} port(s)", n_id, cell.nof_ports);

        Self {
            cell: *cell,
            v_shift: cell.pci.0 as usize % 6,
            sequences,
        }
    }

    /// Symbols within a slot that carry pilots for antenna port `port`
    fn port_symbols(&self, port: u8) -> Vec<usize> {
        let nsymb = self.cell.symbols_per_slot();
        match port {
            0 | 1 => vec![0, nsymb - 3],
            _ => vec![1],
        }
    }

    /// Frequency offset v for a port, symbol and slot
    fn v(port: u8, l: usize, ns: usize) -> usize {
        match port {
            0 => if l == 0 { 0 } else { 3 },
            1 => if l == 0 { 3 } else { 0 },
            2 => 3 * (ns % 2),
            _ => 3 + 3 * (ns % 2),
        }
    }

    /// Write the pilots of every configured port for subframe `sf_idx`
    pub fn map(&self, grid: &mut ResourceGrid, sf_idx: u8) -> Result<(), LayerError> {
        let nsymb = self.cell.symbols_per_slot();
        let nof_prb = self.cell.nof_prb();

        for slot in 0..2 {
            let ns = 2 * sf_idx as usize + slot;
            for port in 0..self.cell.nof_ports {
                for l in self.port_symbols(port) {
                    let seq = &self.sequences[ns * nsymb + l];
                    let offset = (Self::v(port, l, ns) + self.v_shift) % 6;
                    for m in 0..2 * nof_prb {
                        let k = 6 * m + offset;
                        grid.map_re(k, slot * nsymb + l, seq[m + MAX_PRB - nof_prb])?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Check whether RE (k, l) of a subframe carries a pilot of a configured port
    pub fn is_reference(&self, k: usize, l: usize) -> bool {
        let nsymb = self.cell.symbols_per_slot();
        let (slot, l_slot) = (l / nsymb, l % nsymb);

        (0..self.cell.nof_ports).any(|port| {
            self.port_symbols(port).contains(&l_slot)
                && k % 6 == (Self::v(port, l_slot, slot) + self.v_shift) % 6
        })
    }

    /// Check whether RE (k, l) would carry a pilot if four ports were configured
    pub fn is_reserved_for_four_ports(&self, k: usize, l: usize) -> bool {
        let nsymb = self.cell.symbols_per_slot();
        let l_slot = l % nsymb;
        (l_slot == 0 || l_slot == 1 || l_slot == nsymb - 3) && k % 3 == self.v_shift % 3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_port_density() {
        let cell = LteCellConfig::default();
        let crs = CrsGenerator::new(&cell);
        let mut grid = ResourceGrid::new(&cell);
        crs.map(&mut grid, 0).unwrap();

        // Two pilots per PRB in symbols 0, 4, 7 and 11
        for l in [0, 4, 7, 11] {
            assert_eq!(grid.count_nonzero(l), 12);
        }
        for l in [1, 2, 3, 5, 6, 8, 9, 10, 12, 13] {
            assert_eq!(grid.count_nonzero(l), 0);
        }
    }

    #[test]
    fn test_v_shift_positions() {
        let cell = LteCellConfig::default(); // PCI 1
        let crs = CrsGenerator::new(&cell);
        let mut grid = ResourceGrid::new(&cell);
        crs.map(&mut grid, 3).unwrap();

        assert!(grid.get_re(1, 0).unwrap().norm() > 0.0);
        assert!(grid.get_re(7, 0).unwrap().norm() > 0.0);
        assert!(grid.get_re(4, 4).unwrap().norm() > 0.0);
        assert!(crs.is_reference(1, 0));
        assert!(crs.is_reference(4, 4));
        assert!(!crs.is_reference(4, 0));
        assert!(!crs.is_reference(1, 1));
    }

    #[test]
    fn test_four_ports() {
        let mut cell = LteCellConfig::default();
        cell.nof_ports = 4;
        let crs = CrsGenerator::new(&cell);
        let mut grid = ResourceGrid::new(&cell);
        crs.map(&mut grid, 0).unwrap();

        assert_eq!(grid.count_nonzero(0), 24);
        assert_eq!(grid.count_nonzero(1), 24);
        assert_eq!(grid.count_nonzero(4), 24);
        assert!(crs.is_reference(4, 1));
        assert!(crs.is_reserved_for_four_ports(4, 8));
    }

    #[test]
    fn test_sequences_differ_per_slot() {
        let crs = CrsGenerator::new(&LteCellConfig::default());
        assert_ne!(crs.sequences[0], crs.sequences[7]);
        assert!(crs.sequences.iter().all(|s| s.len() == 2 * MAX_PRB));
    }
}
