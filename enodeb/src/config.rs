//! eNodeB configuration file
//!
//! Every section is optional and defaults to the values of the command line
//! flags. Files ending in `.yml`/`.yaml` are read as YAML, `.toml` as TOML.

use anyhow::{anyhow, bail, Context};
use common::types::{CyclicPrefix, LteCellConfig, PhichLength, PhichResources, Rnti};
use interfaces::{FileSinkConfig, UdpSourceConfig, ZmqRfConfig};
use layers::mac::{PrbSelection, SchedulerConfig, DEFAULT_RNTI};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EnodebConfig {
    pub cell: CellSection,
    pub pdsch: PdschSection,
    pub radio: RadioSection,
    pub output: OutputSection,
    pub input: InputSection,
    pub run: RunSection,
    pub log: LogConfig,
}

/// Cell parameters
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CellSection {
    /// Physical cell ID (0-503)
    pub cell_id: u16,
    /// Downlink bandwidth in PRBs (6, 15, 25, 50, 75, 100)
    pub prb_count: u16,
    /// Cell-specific antenna ports (1, 2 or 4)
    pub nof_ports: u8,
    pub cyclic_prefix: CyclicPrefix,
    pub phich_resources: PhichResources,
    pub phich_length: PhichLength,
}

impl Default for CellSection {
    fn default() -> Self {
        Self {
            cell_id: 1,
            prb_count: 6,
            nof_ports: 1,
            cyclic_prefix: CyclicPrefix::Normal,
            phich_resources: PhichResources::One,
            phich_length: PhichLength::Normal,
        }
    }
}

/// Shared channel parameters
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PdschSection {
    pub mcs_index: i32,
    pub cfi: u8,
    pub rnti: u16,
    /// Initial center offset in RBGs
    pub prb_center: i32,
    /// Initial width in RBGs
    pub prb_width: i32,
}

impl Default for PdschSection {
    fn default() -> Self {
        Self {
            mcs_index: 12,
            cfi: 1,
            rnti: DEFAULT_RNTI,
            prb_center: 0,
            prb_width: 1,
        }
    }
}

/// ZMQ radio front end
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RadioSection {
    /// srsRAN style device arguments, e.g. `tx_port=tcp://*:2000`
    pub device_args: String,
    /// Scale applied to every sample before transmission
    pub amplitude: f32,
    /// TX gain in dB
    pub gain: f32,
    /// Center frequency in Hz
    pub center_frequency: f64,
}

impl Default for RadioSection {
    fn default() -> Self {
        Self {
            device_args: String::new(),
            amplitude: 0.1,
            gain: 70.0,
            center_frequency: 2.4e9,
        }
    }
}

/// File output. When a path is set the radio is not used.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputSection {
    pub file_path: Option<String>,
    /// Delay after each subframe written to file
    pub pacing_ms: u64,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            file_path: None,
            pacing_ms: 5,
        }
    }
}

/// Transport block source
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct InputSection {
    /// UDP port to read payloads from, -1 generates random payloads
    pub udp_listen_port: i32,
    /// Time to wait for a datagram each subframe, 0 polls
    pub udp_timeout_ms: u64,
    /// Seed for the random payload generator
    pub seed: Option<u64>,
}

impl Default for InputSection {
    fn default() -> Self {
        Self {
            udp_listen_port: -1,
            udp_timeout_ms: 0,
            seed: None,
        }
    }
}

/// Run length
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RunSection {
    /// Frames to transmit, -1 runs until interrupted
    pub frame_count: i64,
}

impl Default for RunSection {
    fn default() -> Self {
        Self { frame_count: -1 }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LogConfig {
    /// Level used when neither RUST_LOG nor -v is given
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl EnodebConfig {
    /// Load configuration from a YAML or TOML file
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file {}", path.display()))?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("yml") | Some("yaml") => Self::from_yaml_str(&contents),
            Some("toml") => Self::from_toml_str(&contents),
            _ => Err(anyhow!("Unknown configuration format: {}", path.display())),
        }
    }

    pub fn from_yaml_str(contents: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(contents)?)
    }

    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Check values that the component constructors do not check themselves
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.run.frame_count < -1 {
            bail!("frame_count must be -1 or non-negative, got {}", self.run.frame_count);
        }
        if !(1..=3).contains(&self.pdsch.cfi) {
            bail!("CFI must be 1-3, got {}", self.pdsch.cfi);
        }
        if self.input.udp_listen_port > u16::MAX as i32 || self.input.udp_listen_port == 0 {
            bail!("Invalid UDP listen port {}", self.input.udp_listen_port);
        }
        if !self.radio.amplitude.is_finite() || self.radio.amplitude < 0.0 {
            bail!("Invalid radio amplitude {}", self.radio.amplitude);
        }
        self.cell_config()?;
        Ok(())
    }

    pub fn cell_config(&self) -> anyhow::Result<LteCellConfig> {
        let cell = &self.cell;
        LteCellConfig::new(
            cell.prb_count,
            cell.nof_ports,
            cell.cell_id,
            cell.cyclic_prefix,
            cell.phich_resources,
            cell.phich_length,
        )
        .context("Invalid cell configuration")
    }

    pub fn scheduler_config(&self) -> anyhow::Result<SchedulerConfig> {
        Ok(SchedulerConfig {
            cell: self.cell_config()?,
            cfi: self.pdsch.cfi,
            rnti: Rnti::new(self.pdsch.rnti),
            mcs_idx: self.pdsch.mcs_index,
            selection: PrbSelection::new(self.pdsch.prb_center, self.pdsch.prb_width),
            frame_count: self.run.frame_count,
        })
    }

    /// Radio settings, with the sample rate taken from the cell bandwidth
    pub fn radio_config(&self) -> anyhow::Result<ZmqRfConfig> {
        let mut config = ZmqRfConfig::from_device_args(&self.radio.device_args)?;
        config.sample_rate = self.cell_config()?.bandwidth.sample_rate_hz();
        config.tx_gain = self.radio.gain;
        config.tx_frequency = self.radio.center_frequency;
        Ok(config)
    }

    /// File sink settings, `None` when streaming to the radio
    pub fn file_sink_config(&self) -> Option<FileSinkConfig> {
        self.output.file_path.as_ref().map(|path| FileSinkConfig {
            pacing: Duration::from_millis(self.output.pacing_ms),
            ..FileSinkConfig::new(path)
        })
    }

    /// UDP source settings, `None` for the synthetic source
    pub fn udp_source_config(&self) -> Option<UdpSourceConfig> {
        let port = u16::try_from(self.input.udp_listen_port).ok().filter(|&p| p > 0)?;
        Some(UdpSourceConfig {
            recv_timeout: Duration::from_millis(self.input.udp_timeout_ms),
            ..UdpSourceConfig::on_port(port)
        })
    }
}
