//! The broadcast UDP socket every node sends and listens on.

use std::net::SocketAddrV4;

use anyhow::{Context, Result};
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;

use corridor_core::config::RadioConfig;

/// Bind the shared protocol port with broadcast enabled.
///
/// Several nodes on one host may share the port, so address reuse is on.
pub fn bind(radio: &RadioConfig) -> Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).context("socket()")?;

    socket.set_reuse_address(true).context("SO_REUSEADDR")?;
    socket.set_broadcast(true).context("SO_BROADCAST")?;
    socket.set_nonblocking(true).context("O_NONBLOCK")?;

    let local = SocketAddrV4::new(radio.bind_address, radio.port);
    socket
        .bind(&local.into())
        .with_context(|| format!("failed to bind {local}"))?;

    let socket = UdpSocket::from_std(socket.into()).context("failed to register socket")?;
    tracing::info!(%local, "radio socket bound");
    Ok(socket)
}

/// Where broadcasts go.
pub fn broadcast_target(radio: &RadioConfig) -> SocketAddrV4 {
    SocketAddrV4::new(radio.broadcast_address, radio.port)
}
