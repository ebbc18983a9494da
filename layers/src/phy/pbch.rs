//! Physical Broadcast Channel (PBCH) Processing
//!
//! Implements MIB packing and PBCH encoding according to 3GPP TS 36.331
//! section 6.2.2, TS 36.212 section 5.3.1 and TS 36.211 section 6.6

use crate::LayerError;
use common::types::{CyclicPrefix, LteBandwidth, LteCellConfig, ModulationScheme, PhichLength, PhichResources};
use common::{append_bits, crc_bits, CRC16_POLY};
use num_complex::Complex32;
use tracing::trace;

use super::convolutional;
use super::crs::CrsGenerator;
use super::modulation::modulate;
use super::sequence::scramble;
use super::{FrameStructure, ResourceGrid};

/// MIB payload length
pub const MIB_LENGTH: usize = 24;

/// MIB (Master Information Block) structure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mib {
    /// Downlink bandwidth
    pub bandwidth: LteBandwidth,
    /// PHICH duration
    pub phich_length: PhichLength,
    /// PHICH resource factor
    pub phich_resources: PhichResources,
    /// System frame number; only the 8 MSBs are signalled
    pub sfn: u16,
}

impl Mib {
    /// Create the MIB of a cell for a given system frame number
    pub fn new(cell: &LteCellConfig, sfn: u16) -> Self {
        Self {
            bandwidth: cell.bandwidth,
            phich_length: cell.phich_length,
            phich_resources: cell.phich_resources,
            sfn,
        }
    }

    /// Encode MIB to bits (24 bits total)
    pub fn encode(&self) -> Vec<u8> {
        let mut bits = Vec::with_capacity(MIB_LENGTH);

        // dl-Bandwidth (3 bits)
        append_bits(&mut bits, self.bandwidth.mib_code() as u32, 3);

        // phich-Duration (1 bit)
        bits.push(match self.phich_length {
            PhichLength::Normal => 0,
            PhichLength::Extended => 1,
        });

        // phich-Resource (2 bits)
        append_bits(&mut bits, self.phich_resources.mib_code() as u32, 2);

        // systemFrameNumber, 8 most significant bits
        append_bits(&mut bits, (self.sfn >> 2) as u32, 8);

        // spare (10 bits)
        append_bits(&mut bits, 0, 10);

        bits
    }

    /// Decode MIB from bits. The two SFN LSBs are not carried and read as 0.
    pub fn decode(bits: &[u8]) -> Result<Self, LayerError> {
        if bits.len() != MIB_LENGTH {
            return Err(LayerError::ProcessingError(
                format!("MIB must be 24 bits, got {}", bits.len())
            ));
        }

        let field = |start: usize, len: usize| {
            bits[start..start + len].iter().fold(0u16, |acc, &b| (acc << 1) | b as u16)
        };

        let bandwidth = match field(0, 3) {
            0 => LteBandwidth::Prb6,
            1 => LteBandwidth::Prb15,
            2 => LteBandwidth::Prb25,
            3 => LteBandwidth::Prb50,
            4 => LteBandwidth::Prb75,
            5 => LteBandwidth::Prb100,
            code => {
                return Err(LayerError::ProcessingError(format!("Invalid dl-Bandwidth code {}", code)))
            }
        };
        let phich_length = if field(3, 1) == 0 { PhichLength::Normal } else { PhichLength::Extended };
        let phich_resources = match field(4, 2) {
            0 => PhichResources::OneSixth,
            1 => PhichResources::Half,
            2 => PhichResources::One,
            _ => PhichResources::Two,
        };

        Ok(Self {
            bandwidth,
            phich_length,
            phich_resources,
            sfn: field(6, 8) << 2,
        })
    }
}

/// CRC mask selecting the number of transmit antenna ports (Table 5.3.1.1-1)
fn port_mask(nof_ports: u8) -> u32 {
    match nof_ports {
        1 => 0x0000,
        2 => 0xFFFF,
        _ => 0x5555,
    }
}

/// PBCH processor
pub struct PbchProcessor {
    cell: LteCellConfig,
    /// Coded bits over the 40 ms PBCH period
    block_bits: usize,
}

impl PbchProcessor {
    /// Create a new PBCH processor
    pub fn new(cell: &LteCellConfig) -> Self {
        let block_bits = match cell.cyclic_prefix {
            CyclicPrefix::Normal => 1920,
            CyclicPrefix::Extended => 1728,
        };
        Self { cell: *cell, block_bits }
    }

    /// Number of QPSK symbols sent in each radio frame
    pub fn symbols_per_frame(&self) -> usize {
        self.block_bits / 8
    }

    /// CRC-16 of the MIB, masked with the antenna port selection
    fn masked_crc(&self, payload: &[u8]) -> u32 {
        crc_bits(payload, CRC16_POLY, 16) ^ port_mask(self.cell.nof_ports)
    }

    /// Encode a MIB into the QPSK symbols of the whole 40 ms block
    pub fn encode(&self, mib: &Mib) -> Vec<Complex32> {
        let mut bits = mib.encode();
        let crc = self.masked_crc(&bits);
        append_bits(&mut bits, crc, 16);

        let mut coded = convolutional::encode_and_rate_match(&bits, self.block_bits);
        scramble(&mut coded, self.cell.pci.0 as u32);

        modulate(&coded, ModulationScheme::Qpsk)
    }

    /// Map the segment for `sfn` into slot 1 symbols 0-3 of the central 72
    /// subcarriers, skipping REs reserved for reference signals of four ports
    pub fn map(
        &self,
        grid: &mut ResourceGrid,
        frame: &FrameStructure,
        crs: &CrsGenerator,
        symbols: &[Complex32],
        sfn: u16,
    ) -> Result<(), LayerError> {
        let per_frame = self.symbols_per_frame();
        if symbols.len() != 4 * per_frame {
            return Err(LayerError::ProcessingError(format!(
                "PBCH block must hold {} symbols, got {}", 4 * per_frame, symbols.len()
            )));
        }

        let segment = (sfn % 4) as usize;
        let mut source = symbols[segment * per_frame..(segment + 1) * per_frame].iter();

        for l in frame.pbch_symbols() {
            for k in frame.central_band() {
                if crs.is_reserved_for_four_ports(k, l) {
                    continue;
                }
                let value = source.next().ok_or_else(|| {
                    LayerError::ProcessingError("PBCH segment exhausted before mapping completed".to_string())
                })?;
                grid.map_re(k, l, *value)?;
            }
        }

        trace!("Mapped PBCH segment {} for SFN {}", segment, sfn);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mib_fields() {
        let cell = LteCellConfig::default();
        let mib = Mib::new(&cell, 0x2A7);
        let bits = mib.encode();
        assert_eq!(bits.len(), 24);

        // 6 PRB -> 000, normal duration, phich resources "1" -> 10
        assert_eq!(&bits[..6], &[0, 0, 0, 0, 1, 0]);
        // SFN 0x2A7 >> 2 = 0xA9
        assert_eq!(&bits[6..14], &[1, 0, 1, 0, 1, 0, 0, 1]);
        assert!(bits[14..].iter().all(|&b| b == 0));

        let decoded = Mib::decode(&bits).unwrap();
        assert_eq!(decoded.bandwidth, LteBandwidth::Prb6);
        assert_eq!(decoded.phich_resources, PhichResources::One);
        assert_eq!(decoded.sfn, 0x2A4);
    }

    #[test]
    fn test_crc_mask() {
        let mut cell = LteCellConfig::default();
        let bits = Mib::new(&cell, 8).encode();
        let plain = crc_bits(&bits, CRC16_POLY, 16);

        assert_eq!(PbchProcessor::new(&cell).masked_crc(&bits), plain);
        cell.nof_ports = 2;
        assert_eq!(PbchProcessor::new(&cell).masked_crc(&bits), plain ^ 0xFFFF);
        cell.nof_ports = 4;
        assert_eq!(PbchProcessor::new(&cell).masked_crc(&bits), plain ^ 0x5555);
    }

    #[test]
    fn test_encode_length() {
        let cell = LteCellConfig::default();
        let pbch = PbchProcessor::new(&cell);
        let symbols = pbch.encode(&Mib::new(&cell, 0));
        assert_eq!(symbols.len(), 960);
        assert_eq!(pbch.symbols_per_frame(), 240);
    }

    #[test]
    fn test_mapping_fills_central_band() {
        let cell = LteCellConfig::default();
        let frame = FrameStructure::new(&cell);
        let crs = CrsGenerator::new(&cell);
        let pbch = PbchProcessor::new(&cell);
        let mut grid = ResourceGrid::new(&cell);

        let symbols = pbch.encode(&Mib::new(&cell, 5));
        pbch.map(&mut grid, &frame, &crs, &symbols, 5).unwrap();

        assert_eq!(grid.count_nonzero(7), 48);
        assert_eq!(grid.count_nonzero(8), 48);
        assert_eq!(grid.count_nonzero(9), 72);
        assert_eq!(grid.count_nonzero(10), 72);

        // Segment 1 of the block starts at the first non-reserved RE of slot 1
        assert_eq!(grid.get_re(0, 7).unwrap(), symbols[240]);
    }

    #[test]
    fn test_extended_cp_capacity() {
        let mut cell = LteCellConfig::default();
        cell.cyclic_prefix = CyclicPrefix::Extended;
        let frame = FrameStructure::new(&cell);
        let crs = CrsGenerator::new(&cell);
        let pbch = PbchProcessor::new(&cell);
        let mut grid = ResourceGrid::new(&cell);

        let symbols = pbch.encode(&Mib::new(&cell, 0));
        assert_eq!(symbols.len(), 864);
        pbch.map(&mut grid, &frame, &crs, &symbols, 0).unwrap();
        let total: usize = frame.pbch_symbols().map(|l| grid.count_nonzero(l)).sum();
        assert_eq!(total, 216);
    }
}
