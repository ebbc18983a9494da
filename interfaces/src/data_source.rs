//! Transport block payload sources
//!
//! The scheduler asks for exactly one transport block per data subframe.
//! `SyntheticSource` always answers with random bits, `UdpSource` answers
//! with the next datagram if one is waiting.

use crate::InterfaceError;
use async_trait::async_trait;
use common::{bytes_to_hex, unpack_bits};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::{debug, info, trace};

/// Supplies transport block payloads, one bit per byte
#[async_trait]
pub trait DataSource: Send {
    /// Fetch a payload of exactly `tbs_bits` bits, or `None` when nothing is
    /// available for this subframe
    async fn pull(&mut self, tbs_bits: usize) -> Result<Option<Vec<u8>>, InterfaceError>;
}

/// Random payload generator
pub struct SyntheticSource {
    rng: StdRng,
}

impl SyntheticSource {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }
}

#[async_trait]
impl DataSource for SyntheticSource {
    async fn pull(&mut self, tbs_bits: usize) -> Result<Option<Vec<u8>>, InterfaceError> {
        let bits = (0..tbs_bits).map(|_| self.rng.gen_range(0..2u8)).collect();
        Ok(Some(bits))
    }
}

/// UDP source configuration
#[derive(Debug, Clone)]
pub struct UdpSourceConfig {
    /// Local address to listen on
    pub listen_addr: SocketAddr,
    /// How long to wait for a datagram each subframe, zero polls
    pub recv_timeout: Duration,
}

impl UdpSourceConfig {
    /// Listen on all interfaces at `port`
    pub fn on_port(port: u16) -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], port)),
            recv_timeout: Duration::ZERO,
        }
    }
}

/// Datagram-fed payload source
pub struct UdpSource {
    config: UdpSourceConfig,
    socket: UdpSocket,
    datagrams: u64,
}

impl UdpSource {
    pub async fn bind(config: UdpSourceConfig) -> Result<Self, InterfaceError> {
        let socket = UdpSocket::bind(config.listen_addr).await.map_err(|e| {
            InterfaceError::InitializationFailed(format!(
                "Failed to bind UDP socket on {}: {}",
                config.listen_addr, e
            ))
        })?;
        info!("Listening for transport block data on UDP {}", socket.local_addr()?);

        Ok(Self {
            config,
            socket,
            datagrams: 0,
        })
    }

    /// Address the socket is actually bound to
    pub fn local_addr(&self) -> Result<SocketAddr, InterfaceError> {
        Ok(self.socket.local_addr()?)
    }

    /// Number of non-empty datagrams consumed
    pub fn datagrams_received(&self) -> u64 {
        self.datagrams
    }

    async fn receive(&self, buf: &mut [u8]) -> Result<Option<usize>, InterfaceError> {
        if self.config.recv_timeout.is_zero() {
            return match self.socket.try_recv_from(buf) {
                Ok((n, _)) => Ok(Some(n)),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
                Err(e) => Err(e.into()),
            };
        }

        match tokio::time::timeout(self.config.recv_timeout, self.socket.recv_from(buf)).await {
            Ok(result) => Ok(Some(result?.0)),
            Err(_) => {
                trace!("No datagram within {:?}", self.config.recv_timeout);
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl DataSource for UdpSource {
    async fn pull(&mut self, tbs_bits: usize) -> Result<Option<Vec<u8>>, InterfaceError> {
        if tbs_bits == 0 {
            return Ok(None);
        }

        let mut buf = vec![0u8; tbs_bits.div_ceil(8)];
        let n = match self.receive(&mut buf).await? {
            Some(0) | None => return Ok(None),
            Some(n) => n,
        };

        self.datagrams += 1;
        debug!("Received {} byte datagram for a {} bit transport block", n, tbs_bits);
        trace!("Datagram head: {}", bytes_to_hex(&buf[..n.min(16)]));

        let mut bits = unpack_bits(&buf[..n]);
        bits.resize(tbs_bits, 0);
        Ok(Some(bits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_synthetic_exact_length() {
        let mut source = SyntheticSource::new(Some(7));
        let bits = source.pull(1800).await.unwrap().unwrap();
        assert_eq!(bits.len(), 1800);
        assert!(bits.iter().all(|&b| b <= 1));
        assert!(bits.iter().any(|&b| b == 1));

        let empty = source.pull(0).await.unwrap().unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn test_synthetic_seed_is_reproducible() {
        let mut a = SyntheticSource::new(Some(42));
        let mut b = SyntheticSource::new(Some(42));
        assert_eq!(a.pull(64).await.unwrap(), b.pull(64).await.unwrap());
    }

    async fn loopback_source(timeout: Duration) -> (UdpSource, UdpSocket) {
        let config = UdpSourceConfig {
            listen_addr: "127.0.0.1:0".parse().unwrap(),
            recv_timeout: timeout,
        };
        let source = UdpSource::bind(config).await.unwrap();
        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender.connect(source.local_addr().unwrap()).await.unwrap();
        (source, sender)
    }

    #[tokio::test]
    async fn test_udp_nothing_waiting() {
        let (mut source, _sender) = loopback_source(Duration::ZERO).await;
        assert_eq!(source.pull(64).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_udp_timeout_is_no_data() {
        let (mut source, _sender) = loopback_source(Duration::from_millis(10)).await;
        assert_eq!(source.pull(64).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_udp_short_datagram_padded() {
        let (mut source, sender) = loopback_source(Duration::from_millis(500)).await;
        sender.send(&[0xA5]).await.unwrap();

        let bits = source.pull(16).await.unwrap().unwrap();
        assert_eq!(bits.len(), 16);
        assert_eq!(source.datagrams_received(), 1);
        assert_eq!(&bits[..8], &[1, 0, 1, 0, 0, 1, 0, 1]);
        assert!(bits[8..].iter().all(|&b| b == 0));
    }

    #[tokio::test]
    async fn test_udp_long_datagram_truncated() {
        let (mut source, sender) = loopback_source(Duration::from_millis(500)).await;
        sender.send(&[0xFF, 0x00, 0xFF]).await.unwrap();

        let bits = source.pull(12).await.unwrap().unwrap();
        assert_eq!(bits, vec![1, 1, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0]);
    }

    #[tokio::test]
    async fn test_udp_packed_payload() {
        let (mut source, sender) = loopback_source(Duration::from_millis(500)).await;
        let payload: Vec<u8> = (0..40).map(|i| (i % 3 == 1) as u8).collect();
        sender.send(&common::pack_bits(&payload)).await.unwrap();

        assert_eq!(source.pull(40).await.unwrap(), Some(payload));
    }

    #[tokio::test]
    async fn test_udp_zero_tbs_skips_socket() {
        let (mut source, sender) = loopback_source(Duration::from_millis(500)).await;
        sender.send(&[0x01]).await.unwrap();
        assert_eq!(source.pull(0).await.unwrap(), None);
    }
}
