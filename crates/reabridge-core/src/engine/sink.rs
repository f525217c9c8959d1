//! Outbound datagram seam.
//!
//! Everything the engine sends goes through a [`DatagramSink`]. A bound
//! [`UdpSocket`] is a sink; [`OneShotSink`] opens an ephemeral socket per
//! datagram for engines that are not connected.

use crate::error::{Error, Result};
use std::net::{SocketAddr, UdpSocket};

/// Destination for encoded outbound datagrams.
pub trait DatagramSink: Send + Sync {
    /// Write one datagram. Fire-and-forget: success means it left the socket.
    fn send_datagram(&self, bytes: &[u8], target: SocketAddr) -> Result<()>;
}

impl DatagramSink for UdpSocket {
    fn send_datagram(&self, bytes: &[u8], target: SocketAddr) -> Result<()> {
        self.send_to(bytes, target)
            .map_err(|e| Error::transport(&format!("send to {} failed", target), e))?;
        Ok(())
    }
}

/// Opens an ephemeral socket for a single datagram, closing it right after.
#[derive(Debug, Default, Clone, Copy)]
pub struct OneShotSink;

impl DatagramSink for OneShotSink {
    fn send_datagram(&self, bytes: &[u8], target: SocketAddr) -> Result<()> {
        let bind_addr = if target.is_ipv6() { "[::]:0" } else { "0.0.0.0:0" };
        let socket = UdpSocket::bind(bind_addr)
            .map_err(|e| Error::transport("cannot open one-shot socket", e))?;
        log::trace!("[OSC] one-shot socket {:?} -> {}", socket.local_addr().ok(), target);
        socket.send_datagram(bytes, target)
    }
}
