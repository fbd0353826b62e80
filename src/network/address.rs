//! BACnet network-layer address triple.
//!
//! An [`Address`] is the *(net, mac, adr)* triple of ASHRAE 135 §5: a 16-bit
//! network number, the MAC address of a node on that network, and an
//! optional routed-address field that is populated only once a message has
//! crossed at least one router.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

/// Network number meaning "local network" (this directly connected segment).
pub const LOCAL_NETWORK: u16 = 0;

/// Network number meaning "global broadcast" (the 0xFFFF sentinel).
pub const BROADCAST_NETWORK: u16 = 0xFFFF;

/// A BACnet network-layer address: network number plus MAC, with an optional
/// routed-address field for addresses that have already crossed a router.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Address {
    /// 16-bit network number. `0` means local, `0xFFFF` means broadcast.
    pub net: u16,
    /// MAC address on the directly connected network named by `net`.
    pub mac: Vec<u8>,
    /// Routed-address field, present once this address has been rewritten
    /// by an intermediate router (see `forward::routed_source`).
    pub adr: Option<Vec<u8>>,
}

impl Address {
    /// Build a plain local/direct address with no routed-address field.
    pub fn new(net: u16, mac: Vec<u8>) -> Self {
        Self {
            net,
            mac,
            adr: None,
        }
    }

    /// The global broadcast destination: `net = 0xFFFF`, zero-length MAC.
    pub fn global_broadcast() -> Self {
        Self::new(BROADCAST_NETWORK, Vec::new())
    }

    /// `true` if this address names the global broadcast network.
    pub fn is_broadcast(&self) -> bool {
        self.net == BROADCAST_NETWORK
    }

    /// `true` if this address names the local/this-network sentinel.
    pub fn is_local(&self) -> bool {
        self.net == LOCAL_NETWORK
    }
}
