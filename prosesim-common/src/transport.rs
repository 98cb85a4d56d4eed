//! Network transport utilities
//!
//! Async UDP wrapper used by the sidelink task. The PC5 channel is treated
//! as unreliable and unordered between distinct peers; no retransmission or
//! ordering is provided at this layer.

use std::net::SocketAddr;

use tokio::net::UdpSocket;

use crate::Error;

/// Maximum UDP datagram size accepted on receive.
const MAX_DATAGRAM_SIZE: usize = 65535;

/// Async UDP socket wrapper for the simulated PC5 sidelink.
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    /// Binds a UDP socket to the specified address.
    ///
    /// Use port 0 for automatic port assignment.
    pub async fn bind(addr: SocketAddr) -> Result<Self, Error> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self { socket })
    }

    /// Sends a datagram to the specified destination address.
    pub async fn send_to(&self, data: &[u8], addr: SocketAddr) -> Result<(), Error> {
        self.socket.send_to(data, addr).await?;
        Ok(())
    }

    /// Sends the same datagram to every address in the list.
    ///
    /// Emulates a sidelink broadcast over the unicast UDP substrate. Send
    /// errors toward individual peers are collapsed into the first error
    /// after all destinations have been attempted.
    pub async fn broadcast_to(&self, data: &[u8], addrs: &[SocketAddr]) -> Result<(), Error> {
        let mut first_err = None;
        for addr in addrs {
            if let Err(e) = self.socket.send_to(data, *addr).await {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// Receives a datagram, returning the data and the source address.
    pub async fn recv_from(&self) -> Result<(Vec<u8>, SocketAddr), Error> {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        let (len, addr) = self.socket.recv_from(&mut buf).await?;
        buf.truncate(len);
        Ok((buf, addr))
    }

    /// Returns the local address this socket is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        Ok(self.socket.local_addr()?)
    }
}
