//! Physical Layer (PHY) Submodules
//!
//! This module contains the LTE downlink physical layer according to
//! 3GPP TS 36.211-36.213: synchronization and reference signals, the
//! broadcast and control channels, the shared channel and OFDM modulation.

pub mod frame_structure;
pub mod resource_grid;
pub mod ofdm;
pub mod sequence;
pub mod modulation;
pub mod convolutional;
pub mod pss_sss;
pub mod crs;
pub mod pbch;
pub mod regs;
pub mod pcfich;
pub mod pdcch;
pub mod pdsch;

// Re-export commonly used types
pub use frame_structure::FrameStructure;
pub use resource_grid::ResourceGrid;
pub use ofdm::OfdmModulator;
pub use pss_sss::SyncSignals;
pub use crs::CrsGenerator;
pub use pbch::{PbchProcessor, Mib};
pub use regs::RegLayout;
pub use pcfich::PcfichProcessor;
pub use pdcch::{DciCandidateTable, DciFormat1, DciLocation, PdcchProcessor};
pub use pdsch::{HarqProcess, PdschProcessor};

use crate::LayerError;
use common::types::{LteCellConfig, ModulationScheme, Rnti};
use num_complex::Complex32;
use tracing::{debug, info};

/// Downlink PHY of one cell: every channel processor plus the grid they
/// write into
pub struct DownlinkPhy {
    cell: LteCellConfig,
    frame: FrameStructure,
    grid: ResourceGrid,
    ofdm: OfdmModulator,
    sync: SyncSignals,
    crs: CrsGenerator,
    pbch: PbchProcessor,
    pcfich: PcfichProcessor,
    pdcch: PdcchProcessor,
    pdsch: PdschProcessor,
    layout: RegLayout,
    candidates: DciCandidateTable,
    /// PBCH block of the current 40 ms period
    pbch_symbols: Vec<Complex32>,
}

impl DownlinkPhy {
    /// Build the PHY for a cell, a fixed CFI and the single scheduled RNTI
    pub fn new(cell: &LteCellConfig, cfi: u8, rnti: Rnti) -> Result<Self, LayerError> {
        let frame = FrameStructure::new(cell);
        let layout = RegLayout::new(cell, &frame, cfi)?;
        let candidates = DciCandidateTable::new(layout.nof_cce(), rnti);

        info!(
            "Downlink PHY: PCI {}, {} PRB, {} port(s), CFI {}, FFT {}, {} CCEs",
            cell.pci.0, cell.nof_prb(), cell.nof_ports, cfi, frame.fft_size(), layout.nof_cce()
        );

        Ok(Self {
            cell: *cell,
            grid: ResourceGrid::new(cell),
            ofdm: OfdmModulator::new(&frame),
            sync: SyncSignals::new(cell.pci),
            crs: CrsGenerator::new(cell),
            pbch: PbchProcessor::new(cell),
            pcfich: PcfichProcessor::new(cell),
            pdcch: PdcchProcessor::new(cell),
            pdsch: PdschProcessor::new(cell, layout.nof_symbols()),
            layout,
            candidates,
            frame,
            pbch_symbols: Vec::new(),
        })
    }

    /// Time-domain samples per subframe
    pub fn samples_per_subframe(&self) -> usize {
        self.ofdm.subframe_length()
    }

    /// Start a new subframe
    pub fn clear(&mut self) {
        self.grid.clear();
    }

    /// PSS and SSS, on subframes 0 and 5 only. Returns whether they were mapped.
    pub fn map_sync(&mut self, sf_idx: u8) -> Result<bool, LayerError> {
        if !self.frame.is_sync_subframe(sf_idx) {
            return Ok(false);
        }
        self.sync.map(&mut self.grid, &self.frame, sf_idx)?;
        Ok(true)
    }

    /// Reference signals of all configured ports
    pub fn map_crs(&mut self, sf_idx: u8) -> Result<(), LayerError> {
        self.crs.map(&mut self.grid, sf_idx)
    }

    /// Refresh the MIB and, on subframe 0, map the PBCH segment of `sfn`.
    /// Returns whether PBCH was mapped.
    pub fn map_pbch(&mut self, sfn: u16, sf_idx: u8) -> Result<bool, LayerError> {
        let mib = Mib::new(&self.cell, sfn);
        if sf_idx != frame_structure::PBCH_SUBFRAME {
            return Ok(false);
        }

        // The coded block only changes at the start of each 40 ms period
        if sfn % 4 == 0 || self.pbch_symbols.is_empty() {
            self.pbch_symbols = self.pbch.encode(&mib);
            debug!("Encoded PBCH block for SFN {}", sfn);
        }
        self.pbch.map(&mut self.grid, &self.frame, &self.crs, &self.pbch_symbols, sfn)?;
        Ok(true)
    }

    /// Control format indicator
    pub fn map_pcfich(&mut self, sf_idx: u8) -> Result<(), LayerError> {
        self.pcfich.encode(&mut self.grid, &self.layout, sf_idx)
    }

    /// Build the HARQ process for a grant on `prb_mask`
    pub fn configure_harq(
        &self,
        modulation: ModulationScheme,
        tbs: usize,
        prb_mask: &[bool],
    ) -> Result<HarqProcess, LayerError> {
        self.pdsch.configure_harq(modulation, tbs, prb_mask)
    }

    /// DCI on the first search space candidate, then the transport block on
    /// PDSCH. Returns the DCI location used, or `None` when no candidate fits.
    pub fn map_grant(
        &mut self,
        dci: &DciFormat1,
        harq: &HarqProcess,
        payload: &[u8],
        rnti: Rnti,
        sf_idx: u8,
    ) -> Result<Option<DciLocation>, LayerError> {
        let Some(location) = self.candidates.first(sf_idx) else {
            return Ok(None);
        };

        self.pdcch.encode(&mut self.grid, &self.layout, dci, rnti, location, sf_idx)?;
        self.pdsch.encode(&mut self.grid, harq, payload, rnti, dci.rv_idx, sf_idx)?;
        Ok(Some(location))
    }

    /// OFDM-modulate the current grid
    pub fn modulate(&mut self) -> Result<Vec<Complex32>, LayerError> {
        self.ofdm.modulate_subframe(&self.grid)
    }
}
