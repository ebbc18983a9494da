//! Medium Access Control (MAC) Layer Implementation
//!
//! Downlink resource allocation for a single UE, the MCS/TBS tables, the
//! interactive control commands and the subframe scheduler that drives the
//! PHY (3GPP TS 36.213 section 7.1).

pub mod allocator;
pub mod mcs;
pub mod control;
pub mod scheduler;

pub use allocator::{prb_mask, PrbSelection, ResourceAllocation, ResourceAllocator};
pub use control::ControlCommand;
pub use mcs::{transport_block_size, McsEntry, MAX_MCS};
pub use scheduler::{
    FrameTiming, SchedulerConfig, SchedulerError, SchedulerStats, SubframeReport, SubframeScheduler,
    DEFAULT_RNTI,
};
