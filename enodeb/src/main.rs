//! Albor Space LTE eNodeB Main Application
//!
//! Generates a continuous LTE downlink waveform and writes it to a file or
//! streams it through the ZMQ virtual radio. Typing on stdin changes the
//! PDSCH allocation while the waveform is being generated.

mod config;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use config::EnodebConfig;
use interfaces::{
    ControlChannel, DataSource, FileSink, RadioSink, StdinControl, SyntheticSource, UdpSource,
    WaveformSink, ZmqRadio,
};
use layers::mac::SubframeScheduler;

/// Albor Space LTE eNodeB waveform generator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a YAML or TOML configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// ZMQ device arguments (e.g., "tx_port=tcp://*:2000")
    #[arg(long)]
    radio_args: Option<String>,

    /// Sample amplitude for the radio [default: 0.1]
    #[arg(long)]
    radio_amplitude: Option<f32>,

    /// TX gain in dB [default: 70]
    #[arg(long)]
    radio_gain: Option<f32>,

    /// TX center frequency in Hz [default: 2.4e9]
    #[arg(long)]
    radio_center_frequency: Option<f64>,

    /// Write samples to this file instead of the radio
    #[arg(long)]
    output_file_path: Option<String>,

    /// PDSCH MCS index (0-28) [default: 12]
    #[arg(long, allow_negative_numbers = true)]
    mcs_index: Option<i32>,

    /// Number of frames to transmit, -1 for no limit [default: -1]
    #[arg(long, allow_negative_numbers = true)]
    frame_count: Option<i64>,

    /// Physical cell ID (0-503) [default: 1]
    #[arg(long)]
    cell_id: Option<u16>,

    /// Number of PRBs (6, 15, 25, 50, 75, 100) [default: 6]
    #[arg(long)]
    prb_count: Option<u16>,

    /// UDP port for transport block data, -1 for random data [default: -1]
    #[arg(long, allow_negative_numbers = true)]
    udp_listen_port: Option<i32>,

    /// Log level or filter directive (e.g. "debug", "layers=trace")
    #[arg(long)]
    verbosity: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    /// Command line flags take precedence over the configuration file
    fn apply(&self, config: &mut EnodebConfig) {
        if let Some(args) = &self.radio_args {
            config.radio.device_args = args.clone();
        }
        if let Some(amplitude) = self.radio_amplitude {
            config.radio.amplitude = amplitude;
        }
        if let Some(gain) = self.radio_gain {
            config.radio.gain = gain;
        }
        if let Some(freq) = self.radio_center_frequency {
            config.radio.center_frequency = freq;
        }
        if let Some(path) = &self.output_file_path {
            config.output.file_path = Some(path.clone());
        }
        if let Some(mcs) = self.mcs_index {
            config.pdsch.mcs_index = mcs;
        }
        if let Some(frames) = self.frame_count {
            config.run.frame_count = frames;
        }
        if let Some(cell_id) = self.cell_id {
            config.cell.cell_id = cell_id;
        }
        if let Some(prb) = self.prb_count {
            config.cell.prb_count = prb;
        }
        if let Some(port) = self.udp_listen_port {
            config.input.udp_listen_port = port;
        }
    }

    /// Filter directive when RUST_LOG is not set
    fn log_level(&self, config: &EnodebConfig) -> String {
        if let Some(level) = &self.verbosity {
            return level.clone();
        }
        match self.verbose {
            0 => config.log.level.clone(),
            1 => "debug".to_string(),
            _ => "trace".to_string(),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => EnodebConfig::from_file(path)?,
        None => EnodebConfig::default(),
    };
    args.apply(&mut config);

    // Initialize logging
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level(&config)));

    fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .init();

    info!("Starting Albor Space LTE eNodeB");
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {:#}", e);
        return Err(e);
    }

    let scheduler_config = config.scheduler_config()?;
    let cell = scheduler_config.cell;
    info!("Cell configuration:");
    info!("  PCI: {}", cell.pci.0);
    info!("  PRBs: {}", cell.nof_prb());
    info!("  Ports: {}", cell.nof_ports);
    info!("  MCS: {}", scheduler_config.mcs_idx);

    let sink: Box<dyn WaveformSink> = match config.file_sink_config() {
        Some(file_config) => {
            info!("Writing samples to {}", file_config.path.display());
            Box::new(FileSink::create(file_config).await?)
        }
        None => {
            let radio_config = config.radio_config()?;
            let (srate, gain, freq) = (radio_config.sample_rate, radio_config.tx_gain, radio_config.tx_frequency);
            let mut radio = ZmqRadio::open(radio_config).context("Failed to open ZMQ radio")?;
            info!("Set TX rate: {:.2} MHz", radio.set_tx_srate(srate) / 1e6);
            info!("Set TX gain: {:.1} dB", radio.set_tx_gain(gain));
            info!("Set TX freq: {:.2} MHz", radio.set_tx_freq(freq) / 1e6);
            Box::new(RadioSink::new(radio, config.radio.amplitude))
        }
    };

    let source: Box<dyn DataSource> = match config.udp_source_config() {
        Some(udp_config) => Box::new(UdpSource::bind(udp_config).await?),
        None => {
            info!("Generating random transport blocks");
            Box::new(SyntheticSource::new(config.input.seed))
        }
    };

    let control: Box<dyn ControlChannel> = Box::new(StdinControl::spawn()?);

    let mut scheduler = SubframeScheduler::new(scheduler_config, sink, source, control)
        .context("Failed to initialize scheduler")?;

    // Clear the running flag on Ctrl-C; the current subframe completes first
    let running = scheduler.running();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
            *running.write().await = false;
        }
    });

    info!("eNodeB initialized successfully");
    info!("Type a new MCS index and press Enter; % ' move and & ( resize the allocation");

    match scheduler.run().await {
        Ok(stats) => {
            info!("eNodeB finished after {} frames", stats.frames);
            Ok(())
        }
        Err(e) => {
            error!("eNodeB stopped: {}", e);
            Err(e.into())
        }
    }
}
