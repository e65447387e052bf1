//! Packet transport abstraction.
//!
//! The dispatcher consumes any [`PacketConn`]; `tokio::net::UdpSocket` is
//! the production implementation, and tests drive the loop with scripted
//! connections.

use std::future::Future;
use std::io;
use std::net::SocketAddr;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;

/// A packet-oriented (datagram) connection.
pub trait PacketConn: Send + Sync {
    /// Receive one datagram into `buf`, returning its length and source.
    fn recv_from(
        &self,
        buf: &mut [u8],
    ) -> impl Future<Output = io::Result<(usize, SocketAddr)>> + Send;

    /// Local bind address.
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

impl PacketConn for UdpSocket {
    fn recv_from(
        &self,
        buf: &mut [u8],
    ) -> impl Future<Output = io::Result<(usize, SocketAddr)>> + Send {
        UdpSocket::recv_from(self, buf)
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        UdpSocket::local_addr(self)
    }
}

/// Create and bind a UDP socket with receiver-friendly options.
///
/// For IPv6 addresses, sets `IPV6_V6ONLY` so the socket handles IPv6 only
/// and never sees IPv4-mapped addresses. Sets `SO_REUSEADDR` for quick
/// restarts.
pub async fn bind_udp_socket(addr: SocketAddr) -> io::Result<UdpSocket> {
    let domain = if addr.is_ipv6() {
        Domain::IPV6
    } else {
        Domain::IPV4
    };

    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;

    if addr.is_ipv6() {
        socket.set_only_v6(true)?;
    }

    socket.set_reuse_address(true)?;

    // Must be non-blocking before handing the fd to tokio
    socket.set_nonblocking(true)?;

    socket.bind(&addr.into())?;

    UdpSocket::from_std(socket.into())
}
