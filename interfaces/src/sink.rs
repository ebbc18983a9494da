//! Waveform sinks
//!
//! A sink consumes one subframe of baseband samples at a time. Two variants
//! exist: a raw sample file (paced to roughly real time) and the ZMQ radio.

use crate::zmq_rf::{samples_to_bytes, IqBuffer, ZmqRadio};
use crate::InterfaceError;
use async_trait::async_trait;
use num_complex::Complex32;
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Destination for generated subframes
#[async_trait]
pub trait WaveformSink: Send {
    /// Write one subframe of samples
    async fn write(&mut self, samples: &[Complex32]) -> Result<(), InterfaceError>;

    /// Flush and release the sink
    async fn close(&mut self) -> Result<(), InterfaceError> {
        Ok(())
    }
}

/// File sink configuration
#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    /// Output path, created or truncated on open
    pub path: PathBuf,
    /// Pause after each subframe write
    pub pacing: Duration,
}

impl FileSinkConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            pacing: Duration::from_millis(5),
        }
    }
}

/// Writes raw interleaved little-endian f32 I/Q samples to a file
pub struct FileSink {
    config: FileSinkConfig,
    file: File,
    samples_written: u64,
}

impl FileSink {
    pub async fn create(config: FileSinkConfig) -> Result<Self, InterfaceError> {
        let file = File::create(&config.path).await.map_err(|e| {
            InterfaceError::InitializationFailed(format!(
                "Failed to create output file {}: {}",
                config.path.display(),
                e
            ))
        })?;
        info!("Writing samples to file {}", config.path.display());

        Ok(Self {
            config,
            file,
            samples_written: 0,
        })
    }
}

#[async_trait]
impl WaveformSink for FileSink {
    async fn write(&mut self, samples: &[Complex32]) -> Result<(), InterfaceError> {
        let bytes = samples_to_bytes(samples);
        self.file.write_all(&bytes).await?;
        self.file.flush().await?;
        self.samples_written += samples.len() as u64;

        if !self.config.pacing.is_zero() {
            tokio::time::sleep(self.config.pacing).await;
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), InterfaceError> {
        self.file.sync_all().await?;
        debug!("Closed output file after {} samples", self.samples_written);
        Ok(())
    }
}

/// Streams scaled subframes through the ZMQ radio
pub struct RadioSink {
    radio: ZmqRadio,
    amplitude: f32,
    samples_written: u64,
}

impl RadioSink {
    pub fn new(radio: ZmqRadio, amplitude: f32) -> Self {
        Self {
            radio,
            amplitude,
            samples_written: 0,
        }
    }
}

#[async_trait]
impl WaveformSink for RadioSink {
    async fn write(&mut self, samples: &[Complex32]) -> Result<(), InterfaceError> {
        let scaled: Vec<Complex32> = samples.iter().map(|&s| s * self.amplitude).collect();
        let buffer = IqBuffer::from_samples(scaled, self.samples_written, true);
        self.radio.send(buffer).await?;
        self.samples_written += samples.len() as u64;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), InterfaceError> {
        let stats = self.radio.stats();
        info!(
            "Radio closed: {} samples in {} buffers",
            stats.tx_samples, stats.tx_buffers
        );
        Ok(())
    }
}
