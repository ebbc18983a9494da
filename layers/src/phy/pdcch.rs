//! PDCCH (Physical Downlink Control Channel) implementation
//!
//! DCI format 1 packing (3GPP TS 36.212 section 5.3.3), UE-specific search
//! space (TS 36.213 section 9.1.1) and PDCCH modulation/mapping (TS 36.211
//! section 6.8).

use crate::LayerError;
use common::types::{LteCellConfig, ModulationScheme, Rnti};
use common::{append_bits, crc_bits, CRC16_POLY};
use tracing::{debug, trace};

use super::convolutional;
use super::modulation::modulate;
use super::regs::RegLayout;
use super::sequence::GoldSequence;
use super::ResourceGrid;

/// Coded bits carried by one CCE (9 REGs x 4 REs x 2 bits)
pub const BITS_PER_CCE: usize = 72;

/// Payload sizes that must be avoided (Table 5.3.3.1.2-1)
const AMBIGUOUS_SIZES: [usize; 10] = [12, 14, 16, 20, 24, 26, 32, 40, 44, 56];

/// Search space hashing constants (36.213 section 9.1.1)
const Y_A: u64 = 39827;
const Y_D: u64 = 65537;

/// Resource block group size P (36.213 Table 7.1.6.1-1)
pub fn rbg_size(nof_prb: usize) -> usize {
    match nof_prb {
        0..=10 => 1,
        11..=26 => 2,
        27..=63 => 3,
        _ => 4,
    }
}

/// Number of resource block groups
pub fn nof_rbg(nof_prb: usize) -> usize {
    nof_prb.div_ceil(rbg_size(nof_prb))
}

/// Payload size of DCI format 1A (used to avoid size collisions)
fn format1a_size(nof_prb: usize) -> usize {
    let riv_values = nof_prb * (nof_prb + 1) / 2;
    let riv_bits = usize::BITS as usize - (riv_values - 1).leading_zeros() as usize;
    let size = 15 + riv_bits;
    if AMBIGUOUS_SIZES.contains(&size) {
        size + 1
    } else {
        size
    }
}

/// DCI format 1: resource allocation type 0 downlink assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DciFormat1 {
    /// RBG bitmap, bit i selects RBG i
    pub rbg_bitmask: u128,
    /// Modulation and coding scheme (0-31)
    pub mcs_idx: u8,
    /// HARQ process number (0-7)
    pub harq_process: u8,
    /// New data indicator
    pub ndi: bool,
    /// Redundancy version (0-3)
    pub rv_idx: u8,
    /// TPC command for PUCCH
    pub tpc: u8,
}

impl DciFormat1 {
    /// Pack the DCI into its payload bits for a cell of `nof_prb` resource blocks
    pub fn pack(&self, nof_prb: usize) -> Vec<u8> {
        let mut bits = Vec::with_capacity(64);

        // Resource allocation header: type 0
        if nof_prb > 10 {
            bits.push(0);
        }

        // RBG bitmap, RBG 0 first
        for i in 0..nof_rbg(nof_prb) {
            bits.push(((self.rbg_bitmask >> i) & 1) as u8);
        }

        append_bits(&mut bits, self.mcs_idx as u32, 5);
        append_bits(&mut bits, self.harq_process as u32, 3);
        bits.push(self.ndi as u8);
        append_bits(&mut bits, self.rv_idx as u32, 2);
        append_bits(&mut bits, self.tpc as u32, 2);

        let size_1a = format1a_size(nof_prb);
        while bits.len() == size_1a || AMBIGUOUS_SIZES.contains(&bits.len()) {
            bits.push(0);
        }

        bits
    }
}

/// A PDCCH candidate: aggregation level and first CCE
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DciLocation {
    /// Aggregation level L (1, 2, 4 or 8)
    pub aggregation_level: usize,
    /// First CCE index
    pub ncce: usize,
}

/// UE-specific search space candidates for subframe `sf_idx`, highest
/// aggregation level first
pub fn ue_search_space(nof_cce: usize, rnti: Rnti, sf_idx: u8) -> Vec<DciLocation> {
    let mut y = rnti.value() as u64;
    for _ in 0..=sf_idx {
        y = (Y_A * y) % Y_D;
    }

    let mut locations = Vec::new();
    for (level, nof_candidates) in [(8usize, 2u64), (4, 2), (2, 6), (1, 6)] {
        let slots = (nof_cce / level) as u64;
        if slots == 0 {
            continue;
        }
        for m in 0..nof_candidates {
            let location = DciLocation {
                aggregation_level: level,
                ncce: level * ((y + m) % slots) as usize,
            };
            if !locations.contains(&location) {
                locations.push(location);
            }
        }
    }
    locations
}

/// Candidate locations for all ten subframes, computed once
#[derive(Debug, Clone)]
pub struct DciCandidateTable {
    locations: Vec<Vec<DciLocation>>,
}

impl DciCandidateTable {
    pub fn new(nof_cce: usize, rnti: Rnti) -> Self {
        let locations: Vec<Vec<DciLocation>> = (0..10).map(|sf| ue_search_space(nof_cce, rnti, sf)).collect();
        debug!(
            "Computed DCI candidates for RNTI {} over {} CCEs: {} per subframe",
            rnti.value(), nof_cce, locations[0].len()
        );
        Self { locations }
    }

    /// Candidates of subframe `sf_idx`
    pub fn candidates(&self, sf_idx: u8) -> &[DciLocation] {
        &self.locations[sf_idx as usize % 10]
    }

    /// First candidate of subframe `sf_idx`
    pub fn first(&self, sf_idx: u8) -> Option<DciLocation> {
        self.candidates(sf_idx).first().copied()
    }
}

/// PDCCH processor
pub struct PdcchProcessor {
    nof_prb: usize,
    n_id: u32,
}

impl PdcchProcessor {
    pub fn new(cell: &LteCellConfig) -> Self {
        Self {
            nof_prb: cell.nof_prb(),
            n_id: cell.pci.0 as u32,
        }
    }

    /// Channel-code a DCI for `rnti` into the 72*L bits of its candidate
    pub fn encode_dci(&self, dci: &DciFormat1, rnti: Rnti, aggregation_level: usize) -> Vec<u8> {
        let mut bits = dci.pack(self.nof_prb);
        let crc = crc_bits(&bits, CRC16_POLY, 16) ^ rnti.value() as u32;
        append_bits(&mut bits, crc, 16);

        convolutional::encode_and_rate_match(&bits, BITS_PER_CCE * aggregation_level)
    }

    /// Encode a DCI and write it onto the CCEs of `location`
    pub fn encode(
        &self,
        grid: &mut ResourceGrid,
        layout: &RegLayout,
        dci: &DciFormat1,
        rnti: Rnti,
        location: DciLocation,
        sf_idx: u8,
    ) -> Result<(), LayerError> {
        let level = location.aggregation_level;
        if location.ncce + level > layout.nof_cce() {
            return Err(LayerError::ProcessingError(format!(
                "DCI location L={} ncce={} exceeds {} CCEs", level, location.ncce, layout.nof_cce()
            )));
        }

        let mut bits = self.encode_dci(dci, rnti, level);

        // Scrambling runs over the whole PDCCH block, starting at CCE 0
        let c_init = (sf_idx as u32) * (1 << 9) + self.n_id;
        let offset = location.ncce * BITS_PER_CCE;
        let mut seq = GoldSequence::new(c_init);
        for _ in 0..offset {
            seq.next_bit();
        }
        for bit in bits.iter_mut() {
            *bit ^= seq.next_bit();
        }

        let symbols = modulate(&bits, ModulationScheme::Qpsk);
        let mut quads = symbols.chunks_exact(4);
        for cce in location.ncce..location.ncce + level {
            for reg in layout.cce_regs(cce)? {
                let quad = quads.next().ok_or_else(|| {
                    LayerError::ProcessingError("PDCCH symbols exhausted".to_string())
                })?;
                for (&k, &value) in reg.subcarriers.iter().zip(quad) {
                    grid.map_re(k, reg.l, value)?;
                }
            }
        }

        trace!("PDCCH: RNTI {} at L={} ncce={} in subframe {}", rnti.value(), level, location.ncce, sf_idx);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phy::FrameStructure;

    fn dci() -> DciFormat1 {
        DciFormat1 {
            rbg_bitmask: 0b000111,
            mcs_idx: 12,
            harq_process: 0,
            ndi: false,
            rv_idx: 0,
            tpc: 0,
        }
    }

    #[test]
    fn test_rbg_size() {
        assert_eq!(rbg_size(6), 1);
        assert_eq!(rbg_size(25), 2);
        assert_eq!(rbg_size(50), 3);
        assert_eq!(rbg_size(100), 4);
        assert_eq!(nof_rbg(25), 13);
        assert_eq!(nof_rbg(75), 19);
    }

    #[test]
    fn test_format1_packing() {
        let bits = dci().pack(6);
        assert_eq!(bits.len(), 19);
        assert_eq!(&bits[..6], &[1, 1, 1, 0, 0, 0]);
        assert_eq!(&bits[6..11], &[0, 1, 1, 0, 0]);

        // 25 PRB: header + 13 RBG bits + 13 fixed bits
        let bits = dci().pack(25);
        assert_eq!(bits.len(), 27);
        assert_eq!(bits[0], 0);
        assert_eq!(&bits[1..4], &[1, 1, 1]);
    }

    #[test]
    fn test_ambiguous_size_padding() {
        for prb in [6, 15, 25, 50, 75, 100] {
            let len = dci().pack(prb).len();
            assert!(!AMBIGUOUS_SIZES.contains(&len));
            assert_ne!(len, format1a_size(prb));
        }
    }

    #[test]
    fn test_search_space() {
        let rnti = Rnti::new(1234);
        let locations = ue_search_space(20, rnti, 0);
        // Y_0 = 39827 * 1234 mod 65537 = 59305
        assert_eq!(locations[0], DciLocation { aggregation_level: 8, ncce: 8 });
        assert_eq!(locations[1], DciLocation { aggregation_level: 8, ncce: 0 });

        // Two CCEs: only L=2 and L=1 fit
        let small = ue_search_space(2, rnti, 3);
        assert_eq!(small[0], DciLocation { aggregation_level: 2, ncce: 0 });
        assert!(small.iter().all(|l| l.aggregation_level <= 2 && l.ncce + l.aggregation_level <= 2));
    }

    #[test]
    fn test_candidate_table() {
        let table = DciCandidateTable::new(2, Rnti::new(1234));
        for sf in 0..10 {
            assert_eq!(table.first(sf), Some(DciLocation { aggregation_level: 2, ncce: 0 }));
        }
        assert!(DciCandidateTable::new(0, Rnti::new(1)).first(0).is_none());
    }

    #[test]
    fn test_encoded_length() {
        let cell = LteCellConfig::default();
        let pdcch = PdcchProcessor::new(&cell);
        assert_eq!(pdcch.encode_dci(&dci(), Rnti::new(1234), 2).len(), 144);
    }

    #[test]
    fn test_pdcch_mapping() {
        let cell = LteCellConfig::default();
        let frame = FrameStructure::new(&cell);
        let layout = RegLayout::new(&cell, &frame, 1).unwrap();
        let pdcch = PdcchProcessor::new(&cell);
        let mut grid = ResourceGrid::new(&cell);

        let location = DciLocation { aggregation_level: 2, ncce: 0 };
        pdcch.encode(&mut grid, &layout, &dci(), Rnti::new(1234), location, 1).unwrap();
        assert_eq!(grid.count_nonzero(0) + grid.count_nonzero(1), 72);

        let too_far = DciLocation { aggregation_level: 2, ncce: 1 };
        assert!(pdcch.encode(&mut grid, &layout, &dci(), Rnti::new(1234), too_far, 1).is_err());
    }
}
