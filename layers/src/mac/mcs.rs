//! Modulation and coding scheme tables
//!
//! MCS index to modulation order and TBS index (3GPP TS 36.213 Table
//! 7.1.7.1-1), and transport block sizes from Table 7.1.7.2.1-1.
//!
//! Sizes are exact for 1 to 10 PRBs and for the full-band allocations of the
//! 15, 25, 50 and 100 PRB cells. Other PRB counts interpolate linearly
//! between the neighbouring exact columns.

use crate::LayerError;
use common::types::ModulationScheme;

/// Highest MCS index accepted for a new transmission
pub const MAX_MCS: i32 = 28;

/// Transport block sizes for 1 to 10 PRBs, indexed by I_TBS
const TBS_SMALL: [[usize; 10]; 27] = [
    [16, 32, 56, 88, 120, 152, 176, 208, 224, 256],
    [24, 56, 88, 144, 176, 208, 224, 256, 328, 344],
    [32, 72, 144, 176, 208, 256, 296, 328, 376, 424],
    [40, 104, 176, 208, 256, 328, 392, 440, 504, 568],
    [56, 120, 208, 256, 328, 408, 488, 552, 632, 696],
    [72, 144, 224, 328, 424, 504, 600, 680, 776, 872],
    [88, 176, 256, 392, 504, 600, 712, 808, 936, 1032],
    [104, 224, 328, 472, 584, 712, 840, 968, 1096, 1224],
    [120, 256, 392, 536, 680, 808, 968, 1096, 1256, 1384],
    [136, 296, 456, 616, 776, 936, 1096, 1256, 1416, 1544],
    [144, 328, 504, 680, 872, 1032, 1224, 1384, 1544, 1736],
    [176, 376, 584, 776, 1000, 1192, 1384, 1608, 1800, 2024],
    [208, 440, 680, 904, 1128, 1352, 1608, 1800, 2024, 2280],
    [224, 488, 744, 1000, 1256, 1544, 1800, 2024, 2280, 2536],
    [256, 552, 840, 1128, 1416, 1736, 1992, 2280, 2600, 2856],
    [280, 600, 904, 1224, 1544, 1800, 2152, 2472, 2728, 3112],
    [328, 632, 968, 1288, 1608, 1928, 2280, 2600, 2984, 3240],
    [336, 696, 1064, 1416, 1800, 2152, 2536, 2856, 3240, 3624],
    [376, 776, 1160, 1544, 1992, 2344, 2792, 3112, 3624, 4008],
    [408, 840, 1288, 1736, 2152, 2600, 2984, 3496, 3880, 4264],
    [440, 904, 1384, 1864, 2344, 2792, 3240, 3752, 4136, 4584],
    [488, 1000, 1480, 1992, 2472, 2984, 3496, 4008, 4584, 4968],
    [520, 1064, 1608, 2152, 2664, 3240, 3752, 4264, 4776, 5352],
    [552, 1128, 1736, 2280, 2856, 3496, 4008, 4584, 5160, 5736],
    [584, 1192, 1800, 2408, 2984, 3624, 4264, 4968, 5544, 5992],
    [616, 1256, 1864, 2536, 3112, 3752, 4392, 5160, 5736, 6200],
    [712, 1480, 2216, 2984, 3752, 4392, 5160, 5992, 6712, 7480],
];

/// PRB counts of the exact full-band columns
const FULL_BAND_PRB: [usize; 4] = [15, 25, 50, 100];

/// Transport block sizes of the full-band columns, indexed by I_TBS
const TBS_FULL_BAND: [[usize; 27]; 4] = [
    [
        392, 520, 648, 872, 1064, 1320, 1544, 1800, 2088, 2344, 2664, 2984, 3368, 3880, 4264, 4584,
        4968, 5544, 5992, 6456, 6968, 7480, 7992, 8504, 9144, 9528, 11064,
    ],
    [
        680, 904, 1096, 1416, 1800, 2216, 2600, 3112, 3496, 4008, 4392, 4968, 5736, 6456, 7224, 7736,
        7992, 9144, 9912, 10680, 11448, 12576, 13536, 14112, 15264, 15840, 18336,
    ],
    [
        1384, 1800, 2216, 2856, 3624, 4392, 5160, 6200, 6968, 7992, 8760, 9912, 11448, 12960, 14112,
        15264, 16416, 18336, 19848, 21384, 22920, 25456, 27376, 28336, 30576, 31704, 36696,
    ],
    [
        2792, 3624, 4584, 5736, 7224, 8760, 10296, 12216, 14112, 15840, 17568, 19848, 22920, 25456,
        28336, 30576, 32856, 36696, 39232, 43816, 46888, 51024, 55056, 57336, 61664, 63776, 75376,
    ],
];

/// Modulation and TBS index of an MCS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct McsEntry {
    pub modulation: ModulationScheme,
    pub i_tbs: usize,
}

impl McsEntry {
    /// Look up an MCS index (0-28)
    pub fn from_index(mcs_idx: i32) -> Result<Self, LayerError> {
        let (modulation, i_tbs) = match mcs_idx {
            0..=9 => (ModulationScheme::Qpsk, mcs_idx),
            10..=16 => (ModulationScheme::Qam16, mcs_idx - 1),
            17..=MAX_MCS => (ModulationScheme::Qam64, mcs_idx - 2),
            _ => return Err(LayerError::InvalidMcs(mcs_idx)),
        };
        Ok(Self {
            modulation,
            i_tbs: i_tbs as usize,
        })
    }

    /// Transport block size in bits over `nof_prb` allocated PRBs
    pub fn tbs(&self, nof_prb: usize) -> usize {
        transport_block_size(self.i_tbs, nof_prb)
    }
}

/// Transport block size for a TBS index and PRB count. Zero PRBs carry nothing.
pub fn transport_block_size(i_tbs: usize, nof_prb: usize) -> usize {
    if nof_prb == 0 {
        return 0;
    }
    let i_tbs = i_tbs.min(TBS_SMALL.len() - 1);
    if nof_prb <= TBS_SMALL[i_tbs].len() {
        return TBS_SMALL[i_tbs][nof_prb - 1];
    }

    // Interpolate between the exact columns around `nof_prb`
    let mut lower = (TBS_SMALL[i_tbs].len(), TBS_SMALL[i_tbs][TBS_SMALL[i_tbs].len() - 1]);
    for (&prb, column) in FULL_BAND_PRB.iter().zip(TBS_FULL_BAND.iter()) {
        let upper = (prb, column[i_tbs]);
        if nof_prb <= prb {
            let (p0, t0) = lower;
            let (p1, t1) = upper;
            return (t0 + (t1 - t0) * (nof_prb - p0) / (p1 - p0)) / 8 * 8;
        }
        lower = upper;
    }

    // Past the widest column
    lower.1 * nof_prb / lower.0 / 8 * 8
}
