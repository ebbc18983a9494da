//! PDSCH (Physical Downlink Shared Channel) implementation
//!
//! Transport block CRC attachment, a simplified circular rate matcher in
//! place of turbo coding, scrambling, modulation and resource mapping
//! according to 3GPP TS 36.211 section 6.3/6.4.

use crate::LayerError;
use common::types::{LteCellConfig, ModulationScheme, Rnti, SUBCARRIERS_PER_RB};
use common::{attach_crc, CRC24A_POLY, SUBFRAMES_PER_FRAME};
use tracing::{debug, trace};

use super::crs::CrsGenerator;
use super::modulation::modulate;
use super::sequence::scramble;
use super::{FrameStructure, ResourceGrid};

/// Transport block CRC length
pub const TB_CRC_BITS: usize = 24;

/// Subframe used as the capacity reference when configuring a HARQ process
/// (no synchronization or broadcast signals)
const NOMINAL_SUBFRAME: usize = 1;

/// State of the single downlink HARQ process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarqProcess {
    /// Transport block size in bits
    tbs: usize,
    /// Modulation of the codeword
    modulation: ModulationScheme,
    /// Allocated PRBs
    prb_mask: Vec<bool>,
    /// PDSCH resource elements per subframe index
    nof_re: [usize; SUBFRAMES_PER_FRAME as usize],
    /// Coded bit capacity per subframe index
    nof_bits: [usize; SUBFRAMES_PER_FRAME as usize],
}

impl HarqProcess {
    /// Transport block size in bits
    pub fn tbs(&self) -> usize {
        self.tbs
    }

    /// Modulation scheme
    pub fn modulation(&self) -> ModulationScheme {
        self.modulation
    }

    /// Allocated PRBs
    pub fn prb_mask(&self) -> &[bool] {
        &self.prb_mask
    }

    /// Number of allocated PRBs
    pub fn nof_prb(&self) -> usize {
        self.prb_mask.iter().filter(|&&p| p).count()
    }

    /// PDSCH resource elements in subframe `sf_idx`
    pub fn nof_re(&self, sf_idx: u8) -> usize {
        self.nof_re[sf_idx as usize % self.nof_re.len()]
    }

    /// Coded bit capacity of subframe `sf_idx`
    pub fn nof_bits(&self, sf_idx: u8) -> usize {
        self.nof_bits[sf_idx as usize % self.nof_bits.len()]
    }

    /// Whether the process carries no data
    pub fn is_empty(&self) -> bool {
        self.tbs == 0
    }
}

/// PDSCH processor
pub struct PdschProcessor {
    cell: LteCellConfig,
    frame: FrameStructure,
    crs: CrsGenerator,
    control_symbols: usize,
}

impl PdschProcessor {
    /// Create a processor for a control region of `control_symbols` OFDM symbols
    pub fn new(cell: &LteCellConfig, control_symbols: usize) -> Self {
        Self {
            cell: *cell,
            frame: FrameStructure::new(cell),
            crs: CrsGenerator::new(cell),
            control_symbols,
        }
    }

    /// Resource elements available to PDSCH on the allocated PRBs, in
    /// mapping order (frequency first, then time)
    pub fn re_positions(&self, prb_mask: &[bool], sf_idx: u8) -> Vec<(usize, usize)> {
        let central = self.frame.central_band();
        let sync = self.frame.is_sync_subframe(sf_idx);
        let sync_symbols = [self.frame.sss_symbol(), self.frame.pss_symbol()];
        let pbch_symbols = self.frame.pbch_symbols();

        let mut positions = Vec::new();
        for l in self.control_symbols..self.frame.symbols_per_subframe() {
            let reserved_central = (sync && sync_symbols.contains(&l))
                || (sf_idx == 0 && pbch_symbols.contains(&l));

            for (prb, _) in prb_mask.iter().enumerate().filter(|(_, &allocated)| allocated) {
                for k in prb * SUBCARRIERS_PER_RB..(prb + 1) * SUBCARRIERS_PER_RB {
                    if self.crs.is_reference(k, l) || (reserved_central && central.contains(&k)) {
                        continue;
                    }
                    positions.push((k, l));
                }
            }
        }
        positions
    }

    /// Build a HARQ process for a transport block of `tbs` bits over `prb_mask`
    pub fn configure_harq(
        &self,
        modulation: ModulationScheme,
        tbs: usize,
        prb_mask: &[bool],
    ) -> Result<HarqProcess, LayerError> {
        if prb_mask.len() != self.cell.nof_prb() {
            return Err(LayerError::HarqConfiguration(format!(
                "PRB mask covers {} PRBs, cell has {}", prb_mask.len(), self.cell.nof_prb()
            )));
        }

        let mut nof_re = [0; SUBFRAMES_PER_FRAME as usize];
        let mut nof_bits = [0; SUBFRAMES_PER_FRAME as usize];
        for sf in 0..SUBFRAMES_PER_FRAME {
            let re = self.re_positions(prb_mask, sf).len();
            nof_re[sf as usize] = re;
            nof_bits[sf as usize] = re * modulation.bits_per_symbol();
        }

        let capacity = nof_bits[NOMINAL_SUBFRAME];
        if tbs > 0 && tbs + TB_CRC_BITS > capacity {
            return Err(LayerError::HarqConfiguration(format!(
                "TBS {} + CRC exceeds {} coded bits", tbs, capacity
            )));
        }

        debug!(
            "Configured HARQ: TBS={}, {:?}, {} PRBs, {} REs/{} bits in a regular subframe",
            tbs, modulation, prb_mask.iter().filter(|&&p| p).count(), nof_re[NOMINAL_SUBFRAME], capacity
        );

        Ok(HarqProcess {
            tbs,
            modulation,
            prb_mask: prb_mask.to_vec(),
            nof_re,
            nof_bits,
        })
    }

    /// Encode one transport block and map it into the grid
    pub fn encode(
        &self,
        grid: &mut ResourceGrid,
        harq: &HarqProcess,
        payload: &[u8],
        rnti: Rnti,
        rv_idx: u8,
        sf_idx: u8,
    ) -> Result<(), LayerError> {
        if payload.len() != harq.tbs() {
            return Err(LayerError::ProcessingError(format!(
                "Payload of {} bits does not match TBS {}", payload.len(), harq.tbs()
            )));
        }

        let positions = self.re_positions(harq.prb_mask(), sf_idx);
        let e = positions.len() * harq.modulation().bits_per_symbol();
        if e == 0 || payload.is_empty() {
            return Ok(());
        }

        let block = attach_crc(payload, CRC24A_POLY, TB_CRC_BITS as u32);

        // Circular buffer read starting at the redundancy version offset
        let start = (rv_idx as usize % 4) * block.len() / 4;
        let mut bits: Vec<u8> = block.iter().copied().cycle().skip(start).take(e).collect();
        if e < block.len() {
            trace!("PDSCH punctured: {} of {} bits sent in subframe {}", e, block.len(), sf_idx);
        }

        let c_init = ((rnti.value() as u32) << 14) + ((sf_idx as u32) << 9) + self.cell.pci.0 as u32;
        scramble(&mut bits, c_init);

        let symbols = modulate(&bits, harq.modulation());
        for (&(k, l), &value) in positions.iter().zip(symbols.iter()) {
            grid.map_re(k, l, value)?;
        }

        trace!("PDSCH: {} bits on {} REs in subframe {}", block.len(), positions.len(), sf_idx);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex32;

    fn is_zero(v: Complex32) -> bool {
        v.norm_sqr() == 0.0
    }

    fn processor(cfi_symbols: usize) -> PdschProcessor {
        PdschProcessor::new(&LteCellConfig::default(), cfi_symbols)
    }

    #[test]
    fn test_re_counts_full_allocation() {
        let pdsch = processor(2);
        let harq = pdsch.configure_harq(ModulationScheme::Qam16, 1192, &[true; 6]).unwrap();

        assert_eq!(harq.nof_re(1), 828);
        assert_eq!(harq.nof_re(5), 684);
        assert_eq!(harq.nof_re(0), 408);
        assert_eq!(harq.nof_bits(1), 828 * 4);
        assert_eq!(harq.nof_prb(), 6);
    }

    #[test]
    fn test_partial_allocation() {
        let pdsch = processor(2);
        let mut mask = [false; 6];
        mask[2] = true;
        let harq = pdsch.configure_harq(ModulationScheme::Qpsk, 56, &mask).unwrap();
        assert_eq!(harq.nof_re(1), 138);

        let positions = pdsch.re_positions(&mask, 1);
        assert!(positions.iter().all(|&(k, l)| (24..36).contains(&k) && l >= 2));
    }

    #[test]
    fn test_capacity_check() {
        // Four control symbols leave 684 REs: 64QAM holds 4104 bits
        let pdsch = processor(4);
        assert!(pdsch.configure_harq(ModulationScheme::Qam64, 4080, &[true; 6]).is_ok());
        assert!(matches!(
            pdsch.configure_harq(ModulationScheme::Qam64, 4096, &[true; 6]),
            Err(LayerError::HarqConfiguration(_))
        ));
        assert!(pdsch.configure_harq(ModulationScheme::Qpsk, 0, &[false; 6]).is_ok());
        assert!(pdsch.configure_harq(ModulationScheme::Qpsk, 0, &[false; 5]).is_err());
    }

    #[test]
    fn test_encode_fills_allocation() {
        let cell = LteCellConfig::default();
        let pdsch = processor(2);
        let harq = pdsch.configure_harq(ModulationScheme::Qam16, 1192, &[true; 6]).unwrap();
        let mut grid = ResourceGrid::new(&cell);

        let payload: Vec<u8> = (0..1192).map(|i| (i % 5 == 0) as u8).collect();
        pdsch.encode(&mut grid, &harq, &payload, Rnti::new(1234), 0, 1).unwrap();

        let used: usize = (0..14).map(|l| grid.count_nonzero(l)).sum();
        assert_eq!(used, 828);
        // Control region and CRS REs stay empty
        assert!(is_zero(grid.get_re(0, 0).unwrap()));
        assert!(is_zero(grid.get_re(4, 4).unwrap()));

        assert!(pdsch.encode(&mut grid, &harq, &payload[..100], Rnti::new(1234), 0, 1).is_err());
    }

    #[test]
    fn test_rv_changes_output() {
        let cell = LteCellConfig::default();
        let pdsch = processor(2);
        let harq = pdsch.configure_harq(ModulationScheme::Qpsk, 256, &[true; 6]).unwrap();
        let payload: Vec<u8> = (0..256).map(|i| (i % 3 == 0) as u8).collect();

        let mut rv0 = ResourceGrid::new(&cell);
        let mut rv2 = ResourceGrid::new(&cell);
        pdsch.encode(&mut rv0, &harq, &payload, Rnti::new(1234), 0, 2).unwrap();
        pdsch.encode(&mut rv2, &harq, &payload, Rnti::new(1234), 2, 2).unwrap();

        let differs = (0..72).any(|k| rv0.get_re(k, 2) != rv2.get_re(k, 2));
        assert!(differs);
    }
}
