//! Protocol Stack Layers Library
//! 
//! This crate implements the LTE downlink physical layer (36.211/36.212)
//! and the MAC-side subframe scheduler that drives it.

pub mod phy;
pub mod mac;

use thiserror::Error;

/// Common errors for protocol layers
#[derive(Error, Debug)]
pub enum LayerError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    
    #[error("Invalid MCS index {0} (expected 0-28)")]
    InvalidMcs(i32),
    
    #[error("HARQ configuration failed: {0}")]
    HarqConfiguration(String),
    
    #[error("Processing error: {0}")]
    ProcessingError(String),
    
    #[error("Invalid cell configuration: {0}")]
    Cell(#[from] common::CommonError),
}
