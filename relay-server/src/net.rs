//! Socket construction helpers. The listen-socket half mirrors the teacher's
//! own `network` module almost verbatim (reuse-address, bind-to-broadcast,
//! multicast group membership); the raw half is new, built the same way the
//! teacher reaches for a raw `libc::setsockopt` call when `socket2` has no
//! safe wrapper (see its `IP_MULTICAST_ALL` handling).

use socket2::{Domain, Protocol as SockProtocol, Type};
use std::io;
use std::mem;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};
use std::os::unix::io::AsRawFd;
use tokio::net::UdpSocket;

fn new_socket() -> io::Result<socket2::Socket> {
    let socket = socket2::Socket::new(Domain::IPV4, Type::DGRAM, Some(SockProtocol::UDP))?;
    socket.set_nonblocking(true)?;
    socket.set_reuse_address(true)?;
    Ok(socket)
}

/// Disable `IP_MULTICAST_ALL` on Linux so a multicast datagram is delivered
/// only to sockets that joined its group on the interface it actually
/// arrived on, not to every multicast socket in the process.
#[cfg(target_os = "linux")]
fn disable_multicast_all(socket: &socket2::Socket) -> io::Result<()> {
    unsafe {
        let optval: libc::c_int = 0;
        let ret = libc::setsockopt(
            socket.as_raw_fd(),
            libc::SOL_IP,
            libc::IP_MULTICAST_ALL,
            &optval as *const _ as *const libc::c_void,
            mem::size_of_val(&optval) as libc::socklen_t,
        );
        if ret != 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn disable_multicast_all(_socket: &socket2::Socket) -> io::Result<()> {
    Ok(())
}

fn bind_to_broadcast(socket: &socket2::Socket, addr: SocketAddrV4) -> io::Result<()> {
    socket.set_broadcast(true)?;
    socket.bind(&socket2::SockAddr::from(addr))?;
    log::trace!("bound broadcast socket to {addr}");
    Ok(())
}

/// Join `group` on every declared interface, the way `IP_ADD_MEMBERSHIP` is
/// scoped per-NIC rather than process-wide.
fn join_multicast_on_every_interface(
    socket: &socket2::Socket,
    group: Ipv4Addr,
    interfaces: &[Ipv4Addr],
) -> io::Result<()> {
    disable_multicast_all(socket)?;
    for nic in interfaces {
        socket.join_multicast_v4(&group, nic)?;
        log::trace!("joined multicast group {group} on interface {nic}");
    }
    Ok(())
}

/// Bind a listening socket for one protocol's port, `0.0.0.0:port`, with
/// `SO_REUSEADDR` and `SO_BROADCAST` set so it can both accept directed
/// broadcasts and be shared across protocols that coincidentally reuse a
/// port. When `multicast_group` is set, the same socket also joins that
/// group on every declared interface (§4.3 "Bind") so multicast-only
/// protocols like AirPlay actually receive anything at all.
pub fn create_udp_listen(
    port: u16,
    multicast_group: Option<Ipv4Addr>,
    interfaces: &[Ipv4Addr],
) -> io::Result<UdpSocket> {
    let socket = new_socket()?;
    bind_to_broadcast(&socket, SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port))?;
    if let Some(group) = multicast_group {
        join_multicast_on_every_interface(&socket, group, interfaces)?;
    }
    UdpSocket::from_std(socket.into())
}

/// The tunnel socket is a plain bound UDP socket; no broadcast/multicast
/// needed since it only ever talks point-to-point with the remote site.
pub fn create_tunnel_socket(port: u16) -> io::Result<UdpSocket> {
    let socket = new_socket()?;
    socket.bind(&socket2::SockAddr::from(SocketAddr::new(
        IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        port,
    )))?;
    UdpSocket::from_std(socket.into())
}

/// Build the raw IPv4 socket the emitter spoofs source addresses from:
/// `SOCK_RAW` over `IPPROTO_UDP`, `IP_HDRINCL` so the kernel sends our own
/// IPv4 header verbatim instead of building one, `SO_BROADCAST` so
/// broadcast destinations aren't rejected.
pub fn create_raw_socket() -> io::Result<socket2::Socket> {
    let socket = socket2::Socket::new(Domain::IPV4, Type::RAW, Some(SockProtocol::UDP))?;
    socket.set_broadcast(true)?;

    unsafe {
        let enable: libc::c_int = 1;
        let ret = libc::setsockopt(
            socket.as_raw_fd(),
            libc::IPPROTO_IP,
            libc::IP_HDRINCL,
            &enable as *const _ as *const libc::c_void,
            mem::size_of_val(&enable) as libc::socklen_t,
        );
        if ret != 0 {
            return Err(io::Error::last_os_error());
        }
    }

    Ok(socket)
}
