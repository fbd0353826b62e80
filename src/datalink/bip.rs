//! BACnet/IP (Annex J) port adapter.
//!
//! Only the two BVLC functions a router core ever emits on its own
//! initiative are implemented: `Original-Unicast-NPDU` and
//! `Original-Broadcast-NPDU`. Foreign-device registration, the Broadcast
//! Distribution Table, and BBMD relay are out of scope; this adapter treats
//! the datalink as an opaque send/receive/local-address/broadcast-address
//! capability.

use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

use crate::datalink::{DataLinkError, Result};
use crate::network::address::Address;
use crate::network::npdu::{self, Npdu};
use crate::network::port::PortTransport;

/// BACnet/IP well-known port number (0xBAC0).
pub const BACNET_IP_PORT: u16 = 47808;

/// BVLC (BACnet Virtual Link Control) message types this adapter uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BvlcFunction {
    OriginalUnicastNpdu = 0x0A,
    OriginalBroadcastNpdu = 0x0B,
}

/// Wrap an NPDU in its 4-octet BVLC header: `0x81`, the function tag, then
/// the big-endian total length (header plus `npdu`). A free function rather
/// than a header type with its own `encode` method, matching
/// [`network::npdu::encode`](crate::network::npdu::encode)'s shape, since
/// nothing in this crate holds on to a header value between building it and
/// writing it to the socket.
pub fn encode_bvlc(function: BvlcFunction, npdu: &[u8]) -> [u8; 4] {
    let total = 4u16 + npdu.len() as u16;
    [0x81, function as u8, (total >> 8) as u8, (total & 0xFF) as u8]
}

/// Decode a BVLC header, returning the function tag and the NPDU slice that
/// follows it. The declared length is checked against `data.len()` here, so
/// a datagram whose header lies about its own size is rejected outright
/// rather than handed downstream with a slice that doesn't match it — the
/// same no-partial-success stance [`network::npdu::decode`](crate::network::npdu::decode)
/// takes on a truncated NPDU.
pub fn decode_bvlc(data: &[u8]) -> Result<(BvlcFunction, &[u8])> {
    if data.len() < 4 {
        return Err(DataLinkError::InvalidFrame);
    }
    if data[0] != 0x81 {
        return Err(DataLinkError::InvalidFrame);
    }
    let function = match data[1] {
        0x0A => BvlcFunction::OriginalUnicastNpdu,
        0x0B => BvlcFunction::OriginalBroadcastNpdu,
        _ => return Err(DataLinkError::InvalidFrame),
    };
    let declared_len = ((data[2] as u16) << 8) | (data[3] as u16);
    if declared_len as usize != data.len() {
        return Err(DataLinkError::InvalidFrame);
    }
    Ok((function, &data[4..]))
}

fn mac_to_socket_addr(mac: &[u8]) -> Option<SocketAddr> {
    if mac.len() != 6 {
        return None;
    }
    let port = u16::from_be_bytes([mac[4], mac[5]]);
    Some(SocketAddr::from(([mac[0], mac[1], mac[2], mac[3]], port)))
}

fn socket_addr_to_mac(addr: SocketAddr) -> Vec<u8> {
    match addr {
        SocketAddr::V4(v4) => {
            let mut mac = v4.ip().octets().to_vec();
            mac.extend_from_slice(&v4.port().to_be_bytes());
            mac
        }
        SocketAddr::V6(_) => Vec::new(),
    }
}

/// A BACnet/IP port: a bound UDP socket plus the subnet broadcast address
/// computed from the local address at construction time.
pub struct BipPort {
    socket: UdpSocket,
    local_addr: SocketAddr,
    broadcast_addr: SocketAddr,
    net: u16,
}

impl BipPort {
    /// Bind a new BACnet/IP port. `net` is the network number this port
    /// will be registered under (default 1, per `spec.md` §6).
    pub fn new<A: ToSocketAddrs>(bind_addr: A, net: u16) -> Result<Self> {
        let socket = UdpSocket::bind(bind_addr).map_err(DataLinkError::IoError)?;
        let local_addr = socket.local_addr().map_err(DataLinkError::IoError)?;
        socket.set_broadcast(true).map_err(DataLinkError::IoError)?;

        let broadcast_addr = match local_addr {
            SocketAddr::V4(addr) => {
                let ip = addr.ip().octets();
                let broadcast_ip = std::net::Ipv4Addr::new(ip[0], ip[1], ip[2], 255);
                SocketAddr::new(broadcast_ip.into(), BACNET_IP_PORT)
            }
            SocketAddr::V6(_) => return Err(DataLinkError::InvalidFrame),
        };

        Ok(Self {
            socket,
            local_addr,
            broadcast_addr,
            net,
        })
    }

    fn send_unicast_npdu(&self, npdu: &[u8], dest: SocketAddr) -> Result<usize> {
        let mut frame = encode_bvlc(BvlcFunction::OriginalUnicastNpdu, npdu).to_vec();
        frame.extend_from_slice(npdu);
        self.socket
            .send_to(&frame, dest)
            .map_err(DataLinkError::IoError)
    }

    fn send_broadcast_npdu(&self, npdu: &[u8]) -> Result<usize> {
        let mut frame = encode_bvlc(BvlcFunction::OriginalBroadcastNpdu, npdu).to_vec();
        frame.extend_from_slice(npdu);
        self.socket
            .send_to(&frame, self.broadcast_addr)
            .map_err(DataLinkError::IoError)
    }

    /// Strip the BVLC header from a received datagram, returning the NPDU
    /// bytes (version onward). Rejects anything whose declared length
    /// doesn't match the datagram actually received.
    pub fn strip_bvlc(data: &[u8]) -> Result<&[u8]> {
        let (_function, npdu) = decode_bvlc(data)?;
        Ok(npdu)
    }
}

impl PortTransport for BipPort {
    fn send(&mut self, dest: &Address, npdu: &Npdu, pdu: &[u8]) -> usize {
        let mut frame = npdu::encode(npdu);
        frame.extend_from_slice(pdu);

        let result = if dest.is_broadcast() || dest.mac.is_empty() {
            self.send_broadcast_npdu(&frame)
        } else {
            match mac_to_socket_addr(&dest.mac) {
                Some(addr) => self.send_unicast_npdu(&frame, addr),
                None => return 0,
            }
        };
        result.unwrap_or(0)
    }

    fn broadcast_addr(&self) -> Address {
        Address::new(self.net, Vec::new())
    }

    fn local_addr(&self) -> Address {
        Address::new(self.net, socket_addr_to_mac(self.local_addr))
    }

    fn net_number(&self) -> u16 {
        self.net
    }
}
