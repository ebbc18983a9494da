//! Operator control input
//!
//! Lines typed on standard input are collected by a reader thread and
//! handed to the scheduler without blocking subframe generation. The thread
//! lives outside the tokio runtime so a read that never returns cannot hold
//! up runtime shutdown.

use crate::InterfaceError;
use std::io::{BufRead, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Non-blocking source of raw control lines
pub trait ControlChannel: Send {
    /// Return the next complete line (without the trailing newline) if one is
    /// waiting. Never blocks.
    fn poll_line(&mut self) -> Result<Option<Vec<u8>>, InterfaceError>;
}

/// Control lines read from stdin (or any buffered reader) by a background thread
pub struct StdinControl {
    rx: mpsc::UnboundedReceiver<std::io::Result<Vec<u8>>>,
    closed: bool,
}

impl StdinControl {
    /// Start reading process stdin
    pub fn spawn() -> Result<Self, InterfaceError> {
        info!("Control input: stdin");
        Self::from_reader(BufReader::new(std::io::stdin()))
    }

    /// Start reading lines from an arbitrary reader. The reader thread is
    /// detached and ends at EOF, on a read error or once the receiver is gone.
    pub fn from_reader<R>(mut reader: R) -> Result<Self, InterfaceError>
    where
        R: BufRead + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();

        std::thread::Builder::new()
            .name("control-input".to_string())
            .spawn(move || loop {
                let mut line = Vec::new();
                match reader.read_until(b'\n', &mut line) {
                    Ok(0) => break,
                    Ok(_) => {
                        if line.last() == Some(&b'\n') {
                            line.pop();
                        }
                        if line.last() == Some(&b'\r') {
                            line.pop();
                        }
                        if tx.send(Ok(line)).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(e));
                        break;
                    }
                }
            })
            .map_err(|e| {
                InterfaceError::InitializationFailed(format!("Failed to start control input thread: {}", e))
            })?;

        Ok(Self { rx, closed: false })
    }
}

impl ControlChannel for StdinControl {
    fn poll_line(&mut self) -> Result<Option<Vec<u8>>, InterfaceError> {
        match self.rx.try_recv() {
            Ok(Ok(line)) => Ok(Some(line)),
            Ok(Err(e)) => Err(InterfaceError::Io(e)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => {
                if !self.closed {
                    debug!("Control input closed");
                    self.closed = true;
                }
                Ok(None)
            }
        }
    }
}
