//! The port/transport boundary: what a router needs from a BACnet/IP or
//! MS/TP interface, and nothing else.
//!
//! The reference implementation and the teacher crate both bury send/receive
//! inside a concrete data-link type. `spec.md` §4.E treats the data link as
//! an opaque collaborator: the router core only needs to hand a frame to a
//! port and ask it for its local/broadcast addressing, so that surface is
//! captured here as a trait, grounded on the teacher's `DataLink` trait
//! (`datalink/mod.rs`) but narrowed to the router's actual needs.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use super::address::Address;
use super::npdu::Npdu;

/// Everything the router core needs from a concrete data-link adapter.
///
/// Implementors own their socket/bus state; the router core only ever calls
/// `send` with an already-decided NPDU header and APDU/control payload.
pub trait PortTransport: Send {
    /// Encode and transmit `npdu`+`pdu` to `dest` on this port's network.
    /// Returns the number of octets written to the underlying transport.
    fn send(&mut self, dest: &Address, npdu: &Npdu, pdu: &[u8]) -> usize;

    /// The address that means "everyone on this network" for this
    /// transport (e.g. `net` with an empty MAC for BACnet/IP broadcast,
    /// `0xFF` for MS/TP).
    fn broadcast_addr(&self) -> Address;

    /// This port's own address on its directly connected network.
    fn local_addr(&self) -> Address;

    /// The network number this transport is configured with.
    fn net_number(&self) -> u16;
}
