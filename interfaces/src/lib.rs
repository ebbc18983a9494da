//! I/O Interfaces Library
//! 
//! This crate provides the eNodeB's edges: the ZeroMQ virtual radio, the
//! waveform sinks, the transport-block data sources and the interactive
//! control channel.

pub mod zmq_rf;
pub mod sink;
pub mod data_source;
pub mod control_channel;

use std::time::Duration;
use thiserror::Error;

pub use control_channel::{ControlChannel, StdinControl};
pub use data_source::{DataSource, SyntheticSource, UdpSource, UdpSourceConfig};
pub use sink::{FileSink, FileSinkConfig, RadioSink, WaveformSink};
pub use zmq_rf::{IqBuffer, RfStats, ZmqRadio, ZmqRfConfig};

/// Interface errors
#[derive(Error, Debug)]
pub enum InterfaceError {
    #[error("ZMQ error: {0}")]
    ZmqError(#[from] zmq::Error),
    
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    
    #[error("Invalid message format")]
    InvalidMessage,
    
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),
    
    #[error("Transmit timed out after {0:?}")]
    TransmitTimeout(Duration),
}
