//! The two UDP sockets facing AgOpenGPS.
//!
//! The main socket binds the interface matching the configured subnet (or
//! loopback when none matches) and carries all regular traffic; the
//! discovery socket binds the wildcard address so subnet announcements are
//! received no matter which interface they arrive on.

use aog_tc::aog::{encode_packet, AogPacket, Deframer};
use log::{debug, info, warn};
use nix::sys::socket::{
    bind, setsockopt, socket, sockopt::ReuseAddr, AddressFamily, SockFlag, SockType, SockaddrIn,
};
use pnet::datalink;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddrV4, UdpSocket};
use std::os::fd::AsRawFd;

/// Port this server listens on.
pub const LOCAL_PORT: u16 = 8888;
/// Port AOG listens on for our broadcasts.
pub const AOG_PORT: u16 = 9999;

pub struct UdpConnections {
    subnet: [u8; 3],
    main_socket: UdpSocket,
    discovery_socket: UdpSocket,
    main_deframer: Deframer,
    discovery_deframer: Deframer,
}

impl UdpConnections {
    pub fn open(subnet: [u8; 3]) -> io::Result<Self> {
        let main_socket = open_main_socket(subnet)?;
        let discovery_socket =
            open_socket(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, LOCAL_PORT))?;
        Ok(UdpConnections {
            subnet,
            main_socket,
            discovery_socket,
            main_deframer: Deframer::new(),
            discovery_deframer: Deframer::new(),
        })
    }

    pub fn subnet(&self) -> [u8; 3] {
        self.subnet
    }

    /// Rebinds the main socket after a subnet change.
    pub fn rebind(&mut self, subnet: [u8; 3]) -> io::Result<()> {
        info!(
            "Rebinding main UDP socket for subnet {}.{}.{}.0",
            subnet[0], subnet[1], subnet[2]
        );
        self.subnet = subnet;
        self.main_socket = open_main_socket(subnet)?;
        Ok(())
    }

    /// One non-blocking pump of the main socket; returns the deframed
    /// packets.
    pub fn handle_incoming_packets(&mut self) -> Vec<AogPacket> {
        pump(&self.main_socket, &mut self.main_deframer)
    }

    /// One non-blocking pump of the discovery socket.
    pub fn handle_address_detection(&mut self) -> Vec<AogPacket> {
        pump(&self.discovery_socket, &mut self.discovery_deframer)
    }

    /// Frames and broadcasts a packet to AOG. Transmit errors (typically a
    /// currently unreachable subnet) are swallowed and reported as `false`.
    pub fn send(&self, source: u8, pgn: u8, payload: &[u8]) -> bool {
        let packet = match encode_packet(source, pgn, payload) {
            Ok(packet) => packet,
            Err(e) => {
                warn!("Refusing to send malformed AOG packet: {}", e);
                return false;
            }
        };
        let broadcast = SocketAddrV4::new(
            Ipv4Addr::new(self.subnet[0], self.subnet[1], self.subnet[2], 255),
            AOG_PORT,
        );
        match self.main_socket.send_to(&packet, broadcast) {
            Ok(_) => true,
            Err(e) => {
                debug!("Broadcast to {} failed: {}", broadcast, e);
                false
            }
        }
    }
}

fn open_socket(address: SocketAddrV4) -> io::Result<UdpSocket> {
    // Both sockets share port 8888 (one bound to an interface, one to the
    // wildcard), so address reuse must be enabled before binding.
    let fd = socket(
        AddressFamily::Inet,
        SockType::Datagram,
        SockFlag::empty(),
        None,
    )
    .map_err(io::Error::from)?;
    setsockopt(&fd, ReuseAddr, &true).map_err(io::Error::from)?;
    bind(fd.as_raw_fd(), &SockaddrIn::from(address)).map_err(io::Error::from)?;

    let socket = UdpSocket::from(fd);
    socket.set_broadcast(true)?;
    socket.set_nonblocking(true)?;
    Ok(socket)
}

fn open_main_socket(subnet: [u8; 3]) -> io::Result<UdpSocket> {
    let local_ip = find_local_ip(subnet);
    open_socket(SocketAddrV4::new(local_ip, LOCAL_PORT))
}

/// Picks the local interface address whose first three octets match the
/// configured subnet; falls back to loopback.
pub fn find_local_ip(subnet: [u8; 3]) -> Ipv4Addr {
    info!("Available IP addresses:");
    for interface in datalink::interfaces() {
        for network in &interface.ips {
            let IpAddr::V4(address) = network.ip() else {
                continue;
            };
            info!("- {} ({})", address, interface.name);
            if address.octets()[0..3] == subnet {
                info!(
                    "Found local endpoint address {} matching subnet {}.{}.{}.0",
                    address, subnet[0], subnet[1], subnet[2]
                );
                return address;
            }
        }
    }
    info!(
        "No address matches subnet {}.{}.{}.0, using loopback",
        subnet[0], subnet[1], subnet[2]
    );
    Ipv4Addr::LOCALHOST
}

fn pump(socket: &UdpSocket, deframer: &mut Deframer) -> Vec<AogPacket> {
    match socket.recv_from(deframer.vacant()) {
        Ok((received, _sender)) => deframer.commit(received),
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
        Err(e) => warn!("Error while receiving data: {}", e),
    }

    let mut packets = Vec::new();
    while let Some(packet) = deframer.next_packet() {
        packets.push(packet);
    }
    packets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmatched_subnet_falls_back_to_loopback() {
        // TEST-NET-3 should not be configured on any interface.
        assert_eq!(find_local_ip([203, 0, 113]), Ipv4Addr::LOCALHOST);
    }
}
