//! Common Types for the LTE eNodeB
//!
//! Defines the cell-level types shared by the PHY, MAC and the binary

use serde::{Deserialize, Serialize};
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;
use thiserror::Error;

/// Errors raised while validating cell parameters
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommonError {
    #[error("Unsupported bandwidth: {0} PRB (expected 6, 15, 25, 50, 75 or 100)")]
    UnsupportedBandwidth(u16),

    #[error("Invalid physical cell ID: {0} (expected 0-503)")]
    InvalidPci(u16),

    #[error("Unsupported number of antenna ports: {0} (expected 1, 2 or 4)")]
    UnsupportedPortCount(u8),
}

/// Radio Network Temporary Identifier (RNTI)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rnti(pub u16);

impl Rnti {
    /// Create a new RNTI
    pub fn new(value: u16) -> Self {
        Self(value)
    }

    /// Get the RNTI value
    pub fn value(&self) -> u16 {
        self.0
    }
}

/// Physical Cell Identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pci(pub u16);

impl Pci {
    /// Maximum valid LTE PCI value (0-503)
    pub const MAX: u16 = 503;

    /// Create a new PCI with validation
    pub fn new(value: u16) -> Option<Self> {
        if value <= Self::MAX {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Physical-layer cell identity group N_ID(1) (0-167)
    pub fn nid1(&self) -> u16 {
        self.0 / 3
    }

    /// Physical-layer identity within the group N_ID(2) (0-2)
    pub fn nid2(&self) -> u8 {
        (self.0 % 3) as u8
    }
}

/// LTE channel bandwidths, in resource blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive, Serialize, Deserialize)]
pub enum LteBandwidth {
    /// 1.4 MHz
    Prb6 = 6,
    /// 3 MHz
    Prb15 = 15,
    /// 5 MHz
    Prb25 = 25,
    /// 10 MHz
    Prb50 = 50,
    /// 15 MHz
    Prb75 = 75,
    /// 20 MHz
    Prb100 = 100,
}

impl LteBandwidth {
    /// Look up the bandwidth for a resource block count
    pub fn from_prb(nof_prb: u16) -> Result<Self, CommonError> {
        Self::from_u16(nof_prb).ok_or(CommonError::UnsupportedBandwidth(nof_prb))
    }

    /// Number of downlink resource blocks
    pub fn nof_prb(&self) -> usize {
        *self as usize
    }

    /// IFFT size used to generate one OFDM symbol
    pub fn fft_size(&self) -> usize {
        match self {
            LteBandwidth::Prb6 => 128,
            LteBandwidth::Prb15 => 256,
            LteBandwidth::Prb25 => 512,
            LteBandwidth::Prb50 => 1024,
            LteBandwidth::Prb75 => 1536,
            LteBandwidth::Prb100 => 2048,
        }
    }

    /// Baseband sample rate in Hz (15 kHz subcarrier spacing)
    pub fn sample_rate_hz(&self) -> f64 {
        self.fft_size() as f64 * 15_000.0
    }

    /// dl-Bandwidth field of the MIB (3 bits)
    pub fn mib_code(&self) -> u8 {
        match self {
            LteBandwidth::Prb6 => 0,
            LteBandwidth::Prb15 => 1,
            LteBandwidth::Prb25 => 2,
            LteBandwidth::Prb50 => 3,
            LteBandwidth::Prb75 => 4,
            LteBandwidth::Prb100 => 5,
        }
    }
}

/// Cyclic prefix type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CyclicPrefix {
    Normal,
    Extended,
}

impl CyclicPrefix {
    /// OFDM symbols per 0.5 ms slot
    pub fn symbols_per_slot(&self) -> usize {
        match self {
            CyclicPrefix::Normal => 7,
            CyclicPrefix::Extended => 6,
        }
    }
}

/// PHICH resource factor N_g
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhichResources {
    #[serde(rename = "1/6")]
    OneSixth,
    #[serde(rename = "1/2")]
    Half,
    #[serde(rename = "1")]
    One,
    #[serde(rename = "2")]
    Two,
}

impl PhichResources {
    /// N_g as a (numerator, denominator) pair
    fn ng(&self) -> (usize, usize) {
        match self {
            PhichResources::OneSixth => (1, 6),
            PhichResources::Half => (1, 2),
            PhichResources::One => (1, 1),
            PhichResources::Two => (2, 1),
        }
    }

    /// phich-Resource field of the MIB (2 bits)
    pub fn mib_code(&self) -> u8 {
        match self {
            PhichResources::OneSixth => 0,
            PhichResources::Half => 1,
            PhichResources::One => 2,
            PhichResources::Two => 3,
        }
    }
}

/// PHICH duration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhichLength {
    Normal,
    Extended,
}

/// Modulation schemes used on the shared channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModulationScheme {
    Qpsk,
    Qam16,
    Qam64,
}

impl ModulationScheme {
    /// Modulation order Q_m
    pub fn bits_per_symbol(&self) -> usize {
        match self {
            ModulationScheme::Qpsk => 2,
            ModulationScheme::Qam16 => 4,
            ModulationScheme::Qam64 => 6,
        }
    }
}

/// Static cell configuration, fixed at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LteCellConfig {
    /// Downlink bandwidth
    pub bandwidth: LteBandwidth,
    /// Number of cell-specific antenna ports
    pub nof_ports: u8,
    /// Physical cell ID
    pub pci: Pci,
    /// Cyclic prefix type
    pub cyclic_prefix: CyclicPrefix,
    /// PHICH resource factor
    pub phich_resources: PhichResources,
    /// PHICH duration
    pub phich_length: PhichLength,
}

impl LteCellConfig {
    /// Validate raw cell parameters
    pub fn new(
        nof_prb: u16,
        nof_ports: u8,
        cell_id: u16,
        cyclic_prefix: CyclicPrefix,
        phich_resources: PhichResources,
        phich_length: PhichLength,
    ) -> Result<Self, CommonError> {
        let bandwidth = LteBandwidth::from_prb(nof_prb)?;
        let pci = Pci::new(cell_id).ok_or(CommonError::InvalidPci(cell_id))?;
        if !matches!(nof_ports, 1 | 2 | 4) {
            return Err(CommonError::UnsupportedPortCount(nof_ports));
        }

        Ok(Self {
            bandwidth,
            nof_ports,
            pci,
            cyclic_prefix,
            phich_resources,
            phich_length,
        })
    }

    /// Number of downlink resource blocks
    pub fn nof_prb(&self) -> usize {
        self.bandwidth.nof_prb()
    }

    /// Number of used subcarriers
    pub fn nof_subcarriers(&self) -> usize {
        self.nof_prb() * SUBCARRIERS_PER_RB
    }

    /// OFDM symbols per slot
    pub fn symbols_per_slot(&self) -> usize {
        self.cyclic_prefix.symbols_per_slot()
    }

    /// OFDM symbols per 1 ms subframe
    pub fn symbols_per_subframe(&self) -> usize {
        2 * self.symbols_per_slot()
    }

    /// Number of PHICH groups N_PHICH^group (36.211 6.9)
    pub fn nof_phich_groups(&self) -> usize {
        let (num, den) = self.phich_resources.ng();
        let groups = (num * self.nof_prb()).div_ceil(den * 8);
        match self.cyclic_prefix {
            CyclicPrefix::Normal => groups,
            CyclicPrefix::Extended => 2 * groups,
        }
    }
}

impl Default for LteCellConfig {
    fn default() -> Self {
        Self {
            bandwidth: LteBandwidth::Prb6,
            nof_ports: 1,
            pci: Pci(1),
            cyclic_prefix: CyclicPrefix::Normal,
            phich_resources: PhichResources::One,
            phich_length: PhichLength::Normal,
        }
    }
}

/// Subcarriers in one resource block
pub const SUBCARRIERS_PER_RB: usize = 12;

/// Subframes in one radio frame
pub const SUBFRAMES_PER_FRAME: u8 = 10;

/// System frame numbers wrap at this value
pub const SFN_MODULUS: u16 = 1024;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pci_validation() {
        assert!(Pci::new(0).is_some());
        assert!(Pci::new(503).is_some());
        assert!(Pci::new(504).is_none());

        let pci = Pci::new(301).unwrap();
        assert_eq!(pci.nid1(), 100);
        assert_eq!(pci.nid2(), 1);
    }

    #[test]
    fn test_bandwidth_lookup() {
        assert_eq!(LteBandwidth::from_prb(6).unwrap(), LteBandwidth::Prb6);
        assert_eq!(LteBandwidth::from_prb(100).unwrap().fft_size(), 2048);
        assert_eq!(LteBandwidth::from_prb(7), Err(CommonError::UnsupportedBandwidth(7)));
        assert_eq!(LteBandwidth::Prb6.sample_rate_hz(), 1.92e6);
    }

    #[test]
    fn test_cell_validation() {
        let cell = LteCellConfig::new(
            25, 2, 7, CyclicPrefix::Normal, PhichResources::One, PhichLength::Normal,
        ).unwrap();
        assert_eq!(cell.nof_subcarriers(), 300);
        assert_eq!(cell.symbols_per_subframe(), 14);

        assert!(LteCellConfig::new(
            25, 3, 7, CyclicPrefix::Normal, PhichResources::One, PhichLength::Normal,
        ).is_err());
        assert!(LteCellConfig::new(
            25, 1, 600, CyclicPrefix::Normal, PhichResources::One, PhichLength::Normal,
        ).is_err());
    }

    #[test]
    fn test_phich_groups() {
        let mut cell = LteCellConfig::default();
        assert_eq!(cell.nof_phich_groups(), 1);

        cell.bandwidth = LteBandwidth::Prb50;
        cell.phich_resources = PhichResources::Two;
        assert_eq!(cell.nof_phich_groups(), 13);

        cell.phich_resources = PhichResources::OneSixth;
        assert_eq!(cell.nof_phich_groups(), 2);
    }
}
