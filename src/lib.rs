#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

pub mod datalink;
pub mod network;

pub use network::{
    Address, ApduHandler, ForwardDropReason, ForwardOutcome, NetworkControlOutcome,
    NetworkMessage, Npdu, NpduControl, NpduDecodeError, Port, PortEntry, PortTransport,
    RejectReason, RemoteNetwork, Router, RouterConfig, RouterError, RoutingTable,
};

#[cfg(feature = "std")]
extern crate std;

#[cfg(not(feature = "std"))]
extern crate alloc;

/// BACnet network-layer protocol version this crate decodes and emits.
pub const BACNET_PROTOCOL_VERSION: u8 = network::npdu::PROTOCOL_VERSION;

#[cfg(test)]
mod tests {
    use crate::network::npdu::{decode, encode};
    use crate::{Address, Npdu, NpduControl};

    #[test]
    fn crate_level_reexports_round_trip_an_npdu() {
        let mut npdu = Npdu::local();
        npdu.control = NpduControl {
            source_present: true,
            ..NpduControl::default()
        };
        npdu.source = Some(Address::new(5, vec![0xaa, 0xbb]));
        let bytes = encode(&npdu);
        let (decoded, _) = decode(&bytes).unwrap();
        assert_eq!(decoded, npdu);
    }
}
