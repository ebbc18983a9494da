//! Frame/subframe scheduler
//!
//! Drives the downlink PHY one subframe at a time: signals, broadcast and
//! control channels, the data grant when a payload is available, OFDM
//! modulation and the hand-off to the sink. Control updates are validated
//! in full and staged; they take effect at the start of the next subframe.

use crate::phy::{DciLocation, DownlinkPhy, HarqProcess};
use crate::LayerError;
use common::types::{LteCellConfig, Rnti};
use common::{SFN_MODULUS, SUBFRAMES_PER_FRAME};
use interfaces::{ControlChannel, DataSource, InterfaceError, WaveformSink};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, error, info, trace, warn};

use super::allocator::{PrbSelection, ResourceAllocation, ResourceAllocator};
use super::control::ControlCommand;

/// RNTI of the single scheduled UE
pub const DEFAULT_RNTI: u16 = 1234;

/// Scheduler errors. Any of them ends the run.
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Layer error: {0}")]
    Layer(#[from] LayerError),

    #[error("Interface error: {0}")]
    Interface(#[from] InterfaceError),
}

/// Scheduler configuration
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Cell parameters
    pub cell: LteCellConfig,
    /// Control format indicator (1-3)
    pub cfi: u8,
    /// UE the shared channel is addressed to
    pub rnti: Rnti,
    /// Initial MCS index
    pub mcs_idx: i32,
    /// Initial PRB selection
    pub selection: PrbSelection,
    /// Number of frames to emit, -1 for no limit
    pub frame_count: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cell: LteCellConfig::default(),
            cfi: 1,
            rnti: Rnti::new(DEFAULT_RNTI),
            mcs_idx: 12,
            selection: PrbSelection::default(),
            frame_count: -1,
        }
    }
}

impl SchedulerConfig {
    /// Number of subframes to emit, `None` when unbounded
    pub fn subframe_limit(&self) -> Option<u64> {
        u64::try_from(self.frame_count)
            .ok()
            .map(|frames| frames * SUBFRAMES_PER_FRAME as u64)
    }
}

/// Counters kept over a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub subframes: u64,
    pub frames: u64,
    pub pdsch_transmissions: u64,
    /// Data subframes for which the source had nothing
    pub empty_subframes: u64,
    pub rejected_updates: u64,
    pub samples_written: u64,
}

/// What one subframe carried
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubframeReport {
    pub sf_idx: u8,
    pub sfn: u16,
    pub sync: bool,
    pub pbch: bool,
    pub pcfich: bool,
    /// Candidate the DCI was sent on
    pub pdcch: Option<DciLocation>,
    pub pdsch: bool,
    /// Selection and MCS in force for this subframe
    pub selection: PrbSelection,
    pub mcs_idx: i32,
    pub tbs: usize,
    pub nof_samples: usize,
}

/// Subframe index, system frame number and number of subframes emitted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameTiming {
    pub sf_idx: u8,
    pub sfn: u16,
    pub emitted: u64,
}

impl FrameTiming {
    /// Step to the next subframe. Returns true when a new frame starts.
    pub fn advance(&mut self) -> bool {
        self.emitted += 1;
        self.sf_idx += 1;
        if self.sf_idx < SUBFRAMES_PER_FRAME {
            return false;
        }
        self.sf_idx = 0;
        self.sfn = (self.sfn + 1) % SFN_MODULUS;
        true
    }
}

/// Allocation and HARQ process that were validated together
#[derive(Debug, Clone)]
struct Grant {
    selection: PrbSelection,
    mcs_idx: i32,
    allocation: ResourceAllocation,
    harq: HarqProcess,
}

/// The downlink subframe scheduler
pub struct SubframeScheduler {
    config: SchedulerConfig,
    phy: DownlinkPhy,
    allocator: ResourceAllocator,
    sink: Box<dyn WaveformSink>,
    source: Box<dyn DataSource>,
    control: Box<dyn ControlChannel>,
    active: Grant,
    staged: Option<Grant>,
    timing: FrameTiming,
    running: Arc<RwLock<bool>>,
    stats: SchedulerStats,
}

impl SubframeScheduler {
    /// Build the PHY and the initial grant. Fails when the initial MCS or
    /// allocation cannot be configured.
    pub fn new(
        config: SchedulerConfig,
        sink: Box<dyn WaveformSink>,
        source: Box<dyn DataSource>,
        control: Box<dyn ControlChannel>,
    ) -> Result<Self, SchedulerError> {
        let phy = DownlinkPhy::new(&config.cell, config.cfi, config.rnti)?;
        let allocator = ResourceAllocator::new(config.cell.nof_prb());
        let active = build_grant(&phy, &allocator, config.selection, config.mcs_idx)?;

        info!(
            "Scheduler ready: MCS {}, TBS {} bits on {} PRB(s), RNTI {}, {} samples per subframe",
            active.mcs_idx,
            active.allocation.tbs,
            active.allocation.nof_prb(),
            config.rnti.value(),
            phy.samples_per_subframe()
        );

        Ok(Self {
            config,
            phy,
            allocator,
            sink,
            source,
            control,
            active,
            staged: None,
            timing: FrameTiming::default(),
            running: Arc::new(RwLock::new(true)),
            stats: SchedulerStats::default(),
        })
    }

    /// Flag checked before every subframe; clearing it stops the run
    pub fn running(&self) -> Arc<RwLock<bool>> {
        self.running.clone()
    }

    pub fn timing(&self) -> FrameTiming {
        self.timing
    }

    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    /// Selection currently in force
    pub fn selection(&self) -> PrbSelection {
        self.active.selection
    }

    /// Allocation currently in force
    pub fn allocation(&self) -> &ResourceAllocation {
        &self.active.allocation
    }

    /// Run until the frame limit is reached or the running flag is cleared,
    /// then close the sink
    pub async fn run(&mut self) -> Result<SchedulerStats, SchedulerError> {
        let limit = self.config.subframe_limit();
        match limit {
            Some(n) => info!("Transmitting {} subframes", n),
            None => info!("Transmitting until interrupted"),
        }

        let result = self.run_until(limit).await;
        if let Err(e) = &result {
            error!("Scheduler stopped at SFN {} subframe {}: {}", self.timing.sfn, self.timing.sf_idx, e);
        }

        let closed = self.sink.close().await;

        info!(
            "Done: {} subframes, {} frames, {} PDSCH, {} without data, {} rejected updates, {} samples",
            self.stats.subframes,
            self.stats.frames,
            self.stats.pdsch_transmissions,
            self.stats.empty_subframes,
            self.stats.rejected_updates,
            self.stats.samples_written
        );

        result?;
        closed?;
        Ok(self.stats.clone())
    }

    async fn run_until(&mut self, limit: Option<u64>) -> Result<(), SchedulerError> {
        while limit.map_or(true, |n| self.timing.emitted < n) {
            if !*self.running.read().await {
                info!("Interrupted at SFN {} subframe {}", self.timing.sfn, self.timing.sf_idx);
                break;
            }
            self.run_subframe().await?;
        }
        Ok(())
    }

    /// Build and emit one subframe
    pub async fn run_subframe(&mut self) -> Result<SubframeReport, SchedulerError> {
        if let Some(grant) = self.staged.take() {
            info!(
                "Applying update: center={} width={} MCS={} TBS={}",
                grant.selection.center, grant.selection.width, grant.mcs_idx, grant.allocation.tbs
            );
            self.active = grant;
        }

        let FrameTiming { sf_idx, sfn, .. } = self.timing;

        self.phy.clear();
        let sync = self.phy.map_sync(sf_idx)?;
        self.phy.map_crs(sf_idx)?;
        let pbch = self.phy.map_pbch(sfn, sf_idx)?;
        self.phy.map_pcfich(sf_idx)?;

        self.poll_control()?;

        let payload = if sf_idx != 0 {
            self.source.pull(self.active.allocation.tbs).await?
        } else {
            None
        };

        let mut pdcch = None;
        match payload {
            Some(bits) if !self.active.allocation.is_empty() => {
                let dci = self.active.allocation.dci();
                pdcch = self.phy.map_grant(&dci, &self.active.harq, &bits, self.config.rnti, sf_idx)?;
                match pdcch {
                    Some(location) => {
                        self.stats.pdsch_transmissions += 1;
                        debug!(
                            "SF {}: DCI at ncce={} L={}, {} bits on PDSCH",
                            sf_idx, location.ncce, location.aggregation_level, bits.len()
                        );
                    }
                    None => debug!("SF {}: no PDCCH candidate, grant dropped", sf_idx),
                }
            }
            Some(_) => trace!("SF {}: empty allocation, no grant", sf_idx),
            None if sf_idx != 0 => {
                self.stats.empty_subframes += 1;
                trace!("SF {}: no data", sf_idx);
            }
            None => {}
        }

        let samples = self.phy.modulate()?;
        self.sink.write(&samples).await?;

        let report = SubframeReport {
            sf_idx,
            sfn,
            sync,
            pbch,
            pcfich: true,
            pdcch,
            pdsch: pdcch.is_some(),
            selection: self.active.selection,
            mcs_idx: self.active.mcs_idx,
            tbs: self.active.allocation.tbs,
            nof_samples: samples.len(),
        };

        self.stats.subframes += 1;
        self.stats.samples_written += samples.len() as u64;
        if self.timing.advance() {
            self.stats.frames += 1;
            info!("SFN: {:4}", self.timing.sfn);
        }

        Ok(report)
    }

    /// Poll the control channel once and stage a validated update
    fn poll_control(&mut self) -> Result<(), SchedulerError> {
        let Some(line) = self.control.poll_line()? else {
            return Ok(());
        };
        let Some(command) = ControlCommand::parse(&line) else {
            return Ok(());
        };

        let current = &self.active;
        let (selection, mcs_idx) = match command {
            ControlCommand::ShiftCenter(delta) => (current.selection.shifted(delta), current.mcs_idx),
            ControlCommand::ResizeWidth(delta) => (current.selection.resized(delta), current.mcs_idx),
            ControlCommand::SetMcs(mcs) => (current.selection, mcs),
        };

        match build_grant(&self.phy, &self.allocator, selection, mcs_idx) {
            Ok(grant) => {
                debug!("Staged {:?}", command);
                self.staged = Some(grant);
            }
            Err(e) => {
                warn!("Rejected control update {:?}: {}", command, e);
                self.stats.rejected_updates += 1;
            }
        }
        Ok(())
    }
}

/// Allocation plus a HARQ process configured for it
fn build_grant(
    phy: &DownlinkPhy,
    allocator: &ResourceAllocator,
    selection: PrbSelection,
    mcs_idx: i32,
) -> Result<Grant, LayerError> {
    let allocation = allocator.allocate(selection, mcs_idx)?;
    let harq = phy.configure_harq(allocation.modulation, allocation.tbs, &allocation.prb_mask)?;
    Ok(Grant {
        selection,
        mcs_idx,
        allocation,
        harq,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use interfaces::SyntheticSource;
    use num_complex::Complex32;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Records the length of every subframe written
    #[derive(Default, Clone)]
    struct MemorySink {
        writes: Arc<Mutex<Vec<usize>>>,
        closed: Arc<Mutex<bool>>,
    }

    #[async_trait]
    impl WaveformSink for MemorySink {
        async fn write(&mut self, samples: &[Complex32]) -> Result<(), InterfaceError> {
            self.writes.lock().unwrap().push(samples.len());
            Ok(())
        }

        async fn close(&mut self) -> Result<(), InterfaceError> {
            *self.closed.lock().unwrap() = true;
            Ok(())
        }
    }

    /// Returns one scripted line per poll, then nothing
    struct ScriptedControl {
        lines: VecDeque<Option<&'static str>>,
    }

    impl ScriptedControl {
        fn new(lines: &[Option<&'static str>]) -> Self {
            Self { lines: lines.iter().copied().collect() }
        }
    }

    impl ControlChannel for ScriptedControl {
        fn poll_line(&mut self) -> Result<Option<Vec<u8>>, InterfaceError> {
            Ok(self.lines.pop_front().flatten().map(|l| l.as_bytes().to_vec()))
        }
    }

    /// A network source with nothing to read
    struct EmptySource;

    #[async_trait]
    impl DataSource for EmptySource {
        async fn pull(&mut self, _tbs_bits: usize) -> Result<Option<Vec<u8>>, InterfaceError> {
            Ok(None)
        }
    }

    fn config(selection: PrbSelection, frame_count: i64) -> SchedulerConfig {
        SchedulerConfig {
            selection,
            frame_count,
            ..SchedulerConfig::default()
        }
    }

    fn scheduler(config: SchedulerConfig, control: &[Option<&'static str>]) -> (SubframeScheduler, MemorySink) {
        let sink = MemorySink::default();
        let scheduler = SubframeScheduler::new(
            config,
            Box::new(sink.clone()),
            Box::new(SyntheticSource::new(Some(7))),
            Box::new(ScriptedControl::new(control)),
        )
        .unwrap();
        (scheduler, sink)
    }

    #[test]
    fn test_frame_timing_wraps() {
        let mut timing = FrameTiming { sf_idx: 8, sfn: 1023, emitted: 0 };
        assert!(!timing.advance());
        assert_eq!((timing.sf_idx, timing.sfn), (9, 1023));
        assert!(timing.advance());
        assert_eq!((timing.sf_idx, timing.sfn, timing.emitted), (0, 0, 2));
    }

    #[test]
    fn test_subframe_limit() {
        assert_eq!(config(PrbSelection::default(), 1).subframe_limit(), Some(10));
        assert_eq!(config(PrbSelection::default(), 0).subframe_limit(), Some(0));
        assert_eq!(config(PrbSelection::default(), -1).subframe_limit(), None);
    }

    #[tokio::test]
    async fn test_one_frame_six_prb() {
        let (mut scheduler, _sink) = scheduler(config(PrbSelection::new(0, 6), 1), &[]);

        let mut reports = Vec::new();
        for _ in 0..10 {
            reports.push(scheduler.run_subframe().await.unwrap());
        }

        let first = &reports[0];
        assert!(first.sync && first.pbch && first.pcfich);
        assert!(first.pdcch.is_none() && !first.pdsch);

        for report in &reports[1..] {
            assert!(report.pcfich && report.pdsch && !report.pbch);
            assert_eq!(report.pdcch, Some(DciLocation { aggregation_level: 2, ncce: 0 }));
            assert_eq!(report.sync, report.sf_idx == 5);
            assert_eq!(report.tbs, 1192);
            assert_eq!(report.nof_samples, 1920);
        }

        assert_eq!(scheduler.timing().sfn, 1);
        assert_eq!(scheduler.stats().pdsch_transmissions, 9);
    }

    #[tokio::test]
    async fn test_run_respects_frame_count() {
        let (mut scheduler, sink) = scheduler(config(PrbSelection::new(0, 6), 2), &[]);
        let stats = scheduler.run().await.unwrap();

        assert_eq!(stats.subframes, 20);
        assert_eq!(stats.frames, 2);
        assert_eq!(stats.samples_written, 20 * 1920);
        assert_eq!(sink.writes.lock().unwrap().len(), 20);
        assert!(*sink.closed.lock().unwrap());
        assert_eq!(scheduler.timing().sfn, 2);
    }

    #[tokio::test]
    async fn test_empty_allocation_sends_no_grant() {
        let (mut scheduler, _sink) = scheduler(config(PrbSelection::default(), 1), &[]);
        assert!(scheduler.allocation().is_empty());

        for _ in 0..10 {
            let report = scheduler.run_subframe().await.unwrap();
            assert!(report.pdcch.is_none() && !report.pdsch);
        }
        assert_eq!(scheduler.stats().pdsch_transmissions, 0);
    }

    #[tokio::test]
    async fn test_width_increment_applies_next_subframe() {
        let (mut scheduler, _sink) = scheduler(config(PrbSelection::new(0, 2), 1), &[None, Some("&")]);

        let r0 = scheduler.run_subframe().await.unwrap();
        let r1 = scheduler.run_subframe().await.unwrap();
        let r2 = scheduler.run_subframe().await.unwrap();

        assert_eq!(r0.selection, PrbSelection::new(0, 2));
        assert_eq!(r1.selection, PrbSelection::new(0, 2));
        assert_eq!(r2.selection.width, r1.selection.width + 1);
        assert_eq!(r2.selection.center, r1.selection.center);
    }

    #[tokio::test]
    async fn test_center_commands() {
        let (mut scheduler, _sink) = scheduler(config(PrbSelection::new(0, 2), 1), &[Some("%"), Some("'"), Some("'")]);
        let centers: Vec<i32> = run_subframes(&mut scheduler, 4).await.iter().map(|r| r.selection.center).collect();
        assert_eq!(centers, vec![0, 1, 0, -1]);
    }

    #[tokio::test]
    async fn test_non_numeric_input_selects_mcs_zero() {
        let (mut scheduler, _sink) = scheduler(config(PrbSelection::new(0, 6), 1), &[Some("abc")]);

        let r0 = scheduler.run_subframe().await.unwrap();
        let r1 = scheduler.run_subframe().await.unwrap();
        assert_eq!(r0.mcs_idx, 12);
        assert_eq!(r1.mcs_idx, 0);
        assert_eq!(scheduler.allocation().mcs_idx, 0);
    }

    #[tokio::test]
    async fn test_invalid_updates_keep_previous_grant() {
        let config = SchedulerConfig {
            cfi: 3,
            ..config(PrbSelection::new(0, 6), 1)
        };
        // "40" is out of range, "28" does not fit four control symbols
        let (mut scheduler, _sink) = scheduler(config, &[Some("40"), Some("28"), Some("")]);

        for _ in 0..4 {
            let report = scheduler.run_subframe().await.unwrap();
            assert_eq!(report.mcs_idx, 12);
        }
        assert_eq!(scheduler.stats().rejected_updates, 2);
    }

    #[tokio::test]
    async fn test_no_data_suppresses_grant() {
        let mut scheduler = SubframeScheduler::new(
            config(PrbSelection::new(0, 6), 1),
            Box::new(MemorySink::default()),
            Box::new(EmptySource),
            Box::new(ScriptedControl::new(&[])),
        )
        .unwrap();

        let stats = scheduler.run().await.unwrap();
        assert_eq!(stats.subframes, 10);
        assert_eq!(stats.pdsch_transmissions, 0);
        assert_eq!(stats.empty_subframes, 9);
    }

    #[tokio::test]
    async fn test_cleared_flag_stops_before_first_subframe() {
        let (mut scheduler, sink) = scheduler(config(PrbSelection::new(0, 6), -1), &[]);
        *scheduler.running().write().await = false;

        let stats = scheduler.run().await.unwrap();
        assert_eq!(stats.subframes, 0);
        assert!(sink.writes.lock().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_initial_mcs() {
        let result = SubframeScheduler::new(
            SchedulerConfig { mcs_idx: 29, ..SchedulerConfig::default() },
            Box::new(MemorySink::default()),
            Box::new(EmptySource),
            Box::new(ScriptedControl::new(&[])),
        );
        assert!(matches!(result, Err(SchedulerError::Layer(LayerError::InvalidMcs(29)))));
    }

    async fn run_subframes(scheduler: &mut SubframeScheduler, n: usize) -> Vec<SubframeReport> {
        let mut reports = Vec::with_capacity(n);
        for _ in 0..n {
            reports.push(scheduler.run_subframe().await.unwrap());
        }
        reports
    }
}
