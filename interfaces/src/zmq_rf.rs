//! ZMQ RF Driver for IQ Sample Transmission
//!
//! This module implements the ZMQ-based virtual radio used as the eNodeB's
//! streaming transmit front end. It follows the srsRAN ZMQ convention: the
//! transmitter binds a REP socket, the receiving peer sends a one-byte request
//! and gets one buffer of raw complex-float samples in reply.

use crate::InterfaceError;
use num_complex::Complex32;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, info, trace};
use zmq::{Context, Socket};

/// Default sample rate (6 PRB cell)
pub const DEFAULT_SAMPLE_RATE: f64 = 1.92e6;

/// Default ZMQ TX port
pub const DEFAULT_TX_PORT: u16 = 2000;

/// ZMQ RF configuration
#[derive(Debug, Clone)]
pub struct ZmqRfConfig {
    /// Sample rate in Hz
    pub sample_rate: f64,
    /// TX binding address
    pub tx_address: String,
    /// Transmit gain in dB
    pub tx_gain: f32,
    /// Center frequency in Hz
    pub tx_frequency: f64,
    /// How long to wait for the peer's request, -1 waits forever
    pub request_timeout_ms: i32,
    /// How long a reply may take to be queued, -1 waits forever
    pub send_timeout_ms: i32,
}

impl Default for ZmqRfConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            tx_address: format!("tcp://*:{}", DEFAULT_TX_PORT),
            tx_gain: 70.0,
            tx_frequency: 2.4e9,
            request_timeout_ms: -1,
            send_timeout_ms: 100,
        }
    }
}

impl ZmqRfConfig {
    /// Parse device arguments in srsRAN format
    /// Format: "key1=value1,key2=value2,..."
    pub fn from_device_args(args: &str) -> Result<Self, InterfaceError> {
        let mut config = Self::default();

        for pair in args.split(',') {
            let parts: Vec<&str> = pair.trim().split('=').collect();
            if parts.len() != 2 {
                continue;
            }

            let key = parts[0].trim();
            let value = parts[1].trim();

            match key {
                "base_srate" => {
                    config.sample_rate = value.parse::<f64>()
                        .map_err(|_| InterfaceError::InvalidConfig("Invalid base_srate".to_string()))?;
                }
                "tx_gain" => {
                    config.tx_gain = value.parse::<f32>()
                        .map_err(|_| InterfaceError::InvalidConfig("Invalid tx_gain".to_string()))?;
                }
                "request_timeout_ms" => {
                    config.request_timeout_ms = value.parse::<i32>()
                        .map_err(|_| InterfaceError::InvalidConfig("Invalid request_timeout_ms".to_string()))?;
                }
                "send_timeout_ms" => {
                    config.send_timeout_ms = value.parse::<i32>()
                        .map_err(|_| InterfaceError::InvalidConfig("Invalid send_timeout_ms".to_string()))?;
                }
                "tx_port" | "tx_port0" => {
                    config.tx_address = value.to_string();
                }
                _ => {
                    debug!("Ignoring unknown device argument: {}", key);
                }
            }
        }

        Ok(config)
    }
}

/// Sample buffer for IQ data
#[derive(Clone)]
pub struct IqBuffer {
    /// Complex IQ samples
    pub samples: Vec<Complex32>,
    /// Timestamp in samples
    pub timestamp: u64,
    /// Marks the first buffer of a transmit burst
    pub start_of_burst: bool,
}

impl IqBuffer {
    /// Create from raw samples
    pub fn from_samples(samples: Vec<Complex32>, timestamp: u64, start_of_burst: bool) -> Self {
        Self {
            samples,
            timestamp,
            start_of_burst,
        }
    }
}

/// Convert samples to raw bytes (interleaved little-endian f32 re/im, srsRAN cf_t)
pub fn samples_to_bytes(samples: &[Complex32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 8);

    for sample in samples {
        bytes.extend_from_slice(&sample.re.to_le_bytes());
        bytes.extend_from_slice(&sample.im.to_le_bytes());
    }

    bytes
}

/// Convert raw bytes back to samples
pub fn bytes_to_samples(bytes: &[u8]) -> Result<Vec<Complex32>, InterfaceError> {
    if bytes.len() % 8 != 0 {
        return Err(InterfaceError::InvalidMessage);
    }

    Ok(bytes
        .chunks_exact(8)
        .map(|c| {
            let re = f32::from_le_bytes([c[0], c[1], c[2], c[3]]);
            let im = f32::from_le_bytes([c[4], c[5], c[6], c[7]]);
            Complex32::new(re, im)
        })
        .collect())
}

/// TX statistics
#[derive(Debug, Default, Clone)]
pub struct RfStats {
    pub tx_samples: u64,
    pub tx_buffers: u64,
    pub tx_bursts: u64,
}

/// ZMQ virtual radio, transmit side
pub struct ZmqRadio {
    config: ZmqRfConfig,
    _context: Context,
    tx_socket: Arc<Mutex<Socket>>,
    stats: RfStats,
}

impl ZmqRadio {
    /// Open the radio: bind the TX socket
    pub fn open(config: ZmqRfConfig) -> Result<Self, InterfaceError> {
        info!("Opening ZMQ radio");
        let context = Context::new();

        info!("Creating TX socket (REP) to bind to {}", config.tx_address);
        let tx_socket = context.socket(zmq::REP)?;
        tx_socket.bind(&config.tx_address)
            .map_err(|e| InterfaceError::InitializationFailed(
                format!("Failed to bind {}: {}", config.tx_address, e)
            ))?;
        tx_socket.set_rcvtimeo(config.request_timeout_ms)?;
        tx_socket.set_sndtimeo(config.send_timeout_ms)?;
        info!("TX socket bound to {} (REP mode) - waiting for receiver requests", config.tx_address);

        Ok(Self {
            config,
            _context: context,
            tx_socket: Arc::new(Mutex::new(tx_socket)),
            stats: RfStats::default(),
        })
    }

    /// Set the TX sample rate, returning the rate in effect
    pub fn set_tx_srate(&mut self, rate_hz: f64) -> f64 {
        self.config.sample_rate = rate_hz;
        self.config.sample_rate
    }

    /// Set the TX gain, returning the gain in effect
    pub fn set_tx_gain(&mut self, gain_db: f32) -> f32 {
        self.config.tx_gain = gain_db;
        self.config.tx_gain
    }

    /// Set the TX center frequency, returning the frequency in effect
    pub fn set_tx_freq(&mut self, freq_hz: f64) -> f64 {
        self.config.tx_frequency = freq_hz;
        self.config.tx_frequency
    }

    /// Stream one buffer: wait for the peer's request, then reply with the samples
    pub async fn send(&mut self, buffer: IqBuffer) -> Result<(), InterfaceError> {
        let bytes = samples_to_bytes(&buffer.samples);
        let nof_samples = buffer.samples.len();
        let socket = self.tx_socket.clone();
        let request_timeout = self.config.request_timeout_ms;

        if buffer.start_of_burst {
            trace!("TX: start of burst at timestamp {}", buffer.timestamp);
        }

        tokio::task::spawn_blocking(move || -> Result<(), InterfaceError> {
            let socket = socket.lock()
                .map_err(|_| InterfaceError::ConnectionFailed("TX socket lock poisoned".to_string()))?;

            let mut request = [0u8; 1];
            match socket.recv_into(&mut request, 0) {
                Ok(_) => trace!("TX: Received request (dummy byte: 0x{:02X})", request[0]),
                Err(zmq::Error::EAGAIN) => {
                    return Err(InterfaceError::TransmitTimeout(
                        Duration::from_millis(request_timeout.max(0) as u64)
                    ));
                }
                Err(e) => return Err(InterfaceError::ZmqError(e)),
            }

            socket.send(&bytes, 0)?;
            Ok(())
        })
        .await
        .map_err(|e| InterfaceError::ConnectionFailed(format!("TX task failed: {}", e)))?
        .inspect_err(|e| error!("Failed to send TX samples: {}", e))?;

        self.stats.tx_samples += nof_samples as u64;
        self.stats.tx_buffers += 1;
        if buffer.start_of_burst {
            self.stats.tx_bursts += 1;
        }
        trace!("TX: Sent {} samples, timestamp={}", nof_samples, buffer.timestamp);
        Ok(())
    }

    /// Get RF statistics
    pub fn stats(&self) -> RfStats {
        self.stats.clone()
    }

    /// Get the active configuration
    pub fn config(&self) -> &ZmqRfConfig {
        &self.config
    }
}
