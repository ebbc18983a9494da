//! Downlink resource allocation
//!
//! Turns the interactive PRB selection (a center offset and a width around
//! the middle of the band) into a type 0 allocation: an RBG bitmask, the
//! PRBs it covers and the resulting transport block size.

use crate::phy::pdcch::{nof_rbg, rbg_size, DciFormat1};
use crate::LayerError;
use common::types::ModulationScheme;
use tracing::debug;

use super::mcs::McsEntry;

/// Center offset and width of the selected band, in resource block groups
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrbSelection {
    /// Offset from the middle of the band, may be negative
    pub center: i32,
    /// Number of groups around the center, never negative
    pub width: i32,
}

impl Default for PrbSelection {
    fn default() -> Self {
        Self { center: 0, width: 1 }
    }
}

impl PrbSelection {
    pub fn new(center: i32, width: i32) -> Self {
        Self {
            center,
            width: width.max(0),
        }
    }

    /// Move the center by `delta` groups
    pub fn shifted(self, delta: i32) -> Self {
        Self {
            center: self.center.saturating_add(delta),
            ..self
        }
    }

    /// Grow or shrink the width by `delta` groups, floored at zero
    pub fn resized(self, delta: i32) -> Self {
        Self {
            width: self.width.saturating_add(delta).max(0),
            ..self
        }
    }

    /// Bitmask with bit k set when k - nof_prb/2 lies in
    /// [center - width/2, center + width/2)
    pub fn bitmask(&self, nof_prb: usize) -> u128 {
        if self.width <= 0 {
            return 0;
        }
        let half = nof_prb as i64 / 2;
        let lo = self.center as i64 - (self.width / 2) as i64;
        let hi = self.center as i64 + (self.width / 2) as i64;

        (0..nof_prb.min(128))
            .filter(|&k| (lo..hi).contains(&(k as i64 - half)))
            .fold(0u128, |mask, k| mask | (1 << k))
    }
}

/// PRBs covered by an RBG bitmask. Bits beyond the last group are ignored.
pub fn prb_mask(rbg_bitmask: u128, nof_prb: usize) -> Vec<bool> {
    let p = rbg_size(nof_prb);
    let mut prbs = vec![false; nof_prb];
    for rbg in (0..nof_rbg(nof_prb)).filter(|&i| (rbg_bitmask >> i) & 1 == 1) {
        for prb in prbs.iter_mut().skip(rbg * p).take(p) {
            *prb = true;
        }
    }
    prbs
}

/// A complete downlink assignment for the single scheduled UE
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceAllocation {
    pub harq_process: u8,
    pub mcs_idx: u8,
    pub ndi: bool,
    pub rv_idx: u8,
    pub rbg_bitmask: u128,
    pub modulation: ModulationScheme,
    /// Transport block size in bits
    pub tbs: usize,
    /// Allocated PRBs
    pub prb_mask: Vec<bool>,
}

impl ResourceAllocation {
    /// Number of allocated PRBs
    pub fn nof_prb(&self) -> usize {
        self.prb_mask.iter().filter(|&&p| p).count()
    }

    /// Whether no PRB is allocated
    pub fn is_empty(&self) -> bool {
        self.nof_prb() == 0
    }

    /// DCI format 1 carrying this assignment
    pub fn dci(&self) -> DciFormat1 {
        DciFormat1 {
            rbg_bitmask: self.rbg_bitmask,
            mcs_idx: self.mcs_idx,
            harq_process: self.harq_process,
            ndi: self.ndi,
            rv_idx: self.rv_idx,
            tpc: 0,
        }
    }
}

/// Builds allocations for a cell of fixed bandwidth
#[derive(Debug, Clone, Copy)]
pub struct ResourceAllocator {
    nof_prb: usize,
}

impl ResourceAllocator {
    pub fn new(nof_prb: usize) -> Self {
        Self { nof_prb }
    }

    /// Allocation for a selection and MCS index. HARQ process 0, NDI 0 and
    /// RV 0 are used for every transmission.
    pub fn allocate(&self, selection: PrbSelection, mcs_idx: i32) -> Result<ResourceAllocation, LayerError> {
        let mcs = McsEntry::from_index(mcs_idx)?;
        let rbg_bitmask = selection.bitmask(self.nof_prb);
        let prb_mask = prb_mask(rbg_bitmask, self.nof_prb);
        let tbs = mcs.tbs(prb_mask.iter().filter(|&&p| p).count());

        debug!(
            "Allocation: center={} width={} bitmask={:#x} MCS={} ({:?}) TBS={}",
            selection.center, selection.width, rbg_bitmask, mcs_idx, mcs.modulation, tbs
        );

        Ok(ResourceAllocation {
            harq_process: 0,
            mcs_idx: mcs_idx as u8,
            ndi: false,
            rv_idx: 0,
            rbg_bitmask,
            modulation: mcs.modulation,
            tbs,
            prb_mask,
        })
    }
}
