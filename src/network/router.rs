//! `Router`: the single entry point that ties the NPDU codec, routing table,
//! control-message handler, and forwarder together.
//!
//! Grounded on the teacher's `NetworkLayerHandler`/`RouterManager`
//! (`network/mod.rs`) for the overall "own a routing table, process one
//! NPDU at a time" shape, generalized from the teacher's partial
//! Who-Is/I-Am/busy-network subset to the full ASHRAE 135 §6.6 dispatch this
//! crate implements in [`super::control`].

#[cfg(not(feature = "std"))]
use alloc::{boxed::Box, vec::Vec};

use super::address::Address;
use super::control::{self, NetworkControlOutcome, NetworkMessage};
use super::forward::{self, ForwardOutcome};
use super::npdu::{self, Npdu, NpduDecodeError};
use super::port::PortTransport;
use super::routing::RoutingTable;

/// Errors `Router::handle_frame` can return. Matches `spec.md` §7's
/// decode-failure kind; every other error kind in §7 is represented as a
/// first-class outcome value rather than an `Err` (see module docs).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RouterError {
    #[error("NPDU decode failed: {0}")]
    Decode(NpduDecodeError),
}

impl From<NpduDecodeError> for RouterError {
    fn from(err: NpduDecodeError) -> Self {
        RouterError::Decode(err)
    }
}

/// The collaborator that receives application-layer payloads this router
/// delivers locally. The router never interprets `apdu`.
pub trait ApduHandler {
    fn handle_apdu(&mut self, source: &Address, apdu: &[u8]);
}

/// Network numbers assigned to the two well-known port types at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RouterConfig {
    pub bip_net: u16,
    pub mstp_net: u16,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            bip_net: 1,
            mstp_net: 2,
        }
    }
}

#[cfg(feature = "std")]
impl RouterConfig {
    /// Read `BACNET_IP_NET`/`BACNET_MSTP_NET`, falling back to
    /// [`RouterConfig::default`] for a missing or malformed value. Performs
    /// no I/O beyond `std::env::var` and never panics — this is a
    /// convenience for a binary built on top of the crate, not something
    /// the core itself relies on, mirroring the reference's
    /// `datalink_init` environment lookup without the reference's
    /// `exit`-on-failure behavior.
    pub fn from_env() -> Self {
        let default = Self::default();
        let bip_net = std::env::var("BACNET_IP_NET")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default.bip_net);
        let mstp_net = std::env::var("BACNET_MSTP_NET")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default.mstp_net);
        Self { bip_net, mstp_net }
    }
}

/// The router core: a routing table plus the single-threaded, cooperative
/// dispatch loop described in `spec.md` §5. A future multithreaded caller
/// must serialize calls to [`Router::handle_frame`] through one mutex held
/// for the whole call, since the routing table is read and mutated without
/// internal locking.
pub struct Router {
    table: RoutingTable,
}

impl Router {
    pub fn new() -> Self {
        Self {
            table: RoutingTable::new(),
        }
    }

    pub fn table(&self) -> &RoutingTable {
        &self.table
    }

    pub fn table_mut(&mut self) -> &mut RoutingTable {
        &mut self.table
    }

    /// Attach a port at network `net` with local MAC `mac`, using
    /// `transport` to send frames on it.
    pub fn add_port(&mut self, net: u16, mac: Vec<u8>, transport: Box<dyn PortTransport>) -> bool {
        self.table.add_port(net, mac, transport)
    }

    /// Process one received frame: `(source_port, source_mac, frame)`. This
    /// is the single dispatch entry point a datalink receive loop calls per
    /// frame, decoding the NPCI, routing to the control handler or the
    /// forwarder, and realizing whatever outbound effect results by calling
    /// `send` on the relevant ports.
    pub fn handle_frame(
        &mut self,
        source_port: usize,
        source_mac: &[u8],
        frame: &[u8],
        apdu_handler: &mut dyn ApduHandler,
    ) -> Result<(), RouterError> {
        log::debug!("frame received on port {source_port} from {source_mac:?}, {} bytes", frame.len());

        let (npdu, body_offset) = npdu::decode(frame).map_err(|err| {
            log::warn!("NPDU decode failed on port {source_port}: {err}");
            RouterError::Decode(err)
        })?;
        let payload = &frame[body_offset..];

        let source_addr = npdu
            .source
            .clone()
            .unwrap_or_else(|| Address::new(0, source_mac.to_vec()));

        if npdu.is_network_message() {
            log::info!(
                "control message type {:?} from port {source_port}",
                npdu.network_message_type
            );
            let outcomes = control::handle(&mut self.table, source_port, &source_addr, &npdu, payload);
            for outcome in outcomes {
                self.realize_control_outcome(source_port, outcome);
            }
            return Ok(());
        }

        let dest = npdu.destination.clone().unwrap_or_else(|| Address::new(0, Vec::new()));

        if dest.is_local() || dest.is_broadcast() {
            if is_confirmed_broadcast_drop(&dest, payload) {
                log::debug!("dropping confirmed-service broadcast from port {source_port}");
            } else {
                apdu_handler.handle_apdu(&source_addr, payload);
            }
            if dest.is_local() {
                return Ok(());
            }
            // broadcast destinations still fall through to the forwarder
            // below, which propagates the frame onto the other ports.
        }

        let outcome = forward::forward(&mut self.table, source_port, &source_addr, &dest, &npdu, payload);
        self.realize_forward_outcome(source_port, outcome);
        Ok(())
    }

    fn realize_control_outcome(&mut self, source_port: usize, outcome: NetworkControlOutcome) {
        match outcome {
            NetworkControlOutcome::None => {}
            NetworkControlOutcome::Reply { dest, message } => {
                let dest = dest.unwrap_or_else(Address::global_broadcast);
                self.send_message(source_port, &dest, &message);
            }
            NetworkControlOutcome::Broadcast { except_port, message } => {
                self.broadcast_message(except_port, &message);
            }
            NetworkControlOutcome::RejectAt(dest, reason) => {
                log::warn!("rejecting message from port {source_port}: {reason}");
                let message = NetworkMessage::RejectMessageToNetwork { reason, dnet: 0 };
                self.send_message(source_port, &dest, &message);
            }
        }
    }

    fn realize_forward_outcome(&mut self, source_port: usize, outcome: ForwardOutcome) {
        match outcome {
            ForwardOutcome::Drop(reason) => {
                log::debug!("dropping frame from port {source_port}: {reason:?}");
            }
            ForwardOutcome::Deliver {
                port,
                link_dest,
                npdu,
                pdu,
            } => {
                self.send_npdu(port, &link_dest, &npdu, &pdu);
            }
            ForwardOutcome::Broadcast { except_port, npdu, pdu } => {
                for index in 0..self.table.len() {
                    if index == except_port {
                        continue;
                    }
                    let dest = self.table.port(index).port.transport.broadcast_addr();
                    self.send_npdu(index, &dest, &npdu, &pdu);
                }
            }
            ForwardOutcome::DiscoverAndBroadcast {
                except_port,
                npdu,
                pdu,
                whois,
            } => {
                for index in 0..self.table.len() {
                    if index == except_port {
                        continue;
                    }
                    let dest = self.table.port(index).port.transport.broadcast_addr();
                    self.send_npdu(index, &dest, &npdu, &pdu);
                }
                self.broadcast_message(except_port, &whois);
            }
        }
    }

    /// Send `npdu`/`pdu` out `port`, addressed at the link layer to `dest`.
    /// `dest` is always supplied by the caller, never derived from
    /// `npdu.destination` here: the NPCI's logical destination and the
    /// physical send target are different things for an intermediate
    /// forward (see [`ForwardOutcome::Deliver`]).
    fn send_npdu(&mut self, port: usize, dest: &Address, npdu: &Npdu, pdu: &[u8]) {
        log::debug!("sending {} bytes on port {port}", pdu.len());
        self.table.port_mut(port).port.transport.send(dest, npdu, pdu);
    }

    fn send_message(&mut self, port: usize, dest: &Address, message: &NetworkMessage) {
        let npdu = Npdu {
            control: super::npdu::NpduControl {
                network_message: true,
                destination_present: !dest.is_local(),
                ..super::npdu::NpduControl::default()
            },
            destination: if dest.is_local() { None } else { Some(dest.clone()) },
            hop_count: if dest.is_local() { None } else { Some(255) },
            network_message_type: Some(message.tag()),
            ..Npdu::local()
        };
        let payload = message.encode_payload();
        log::debug!("sending control message type {:#x} on port {port}", message.tag());
        self.table.port_mut(port).port.transport.send(dest, &npdu, &payload);
    }

    fn broadcast_message(&mut self, except_port: usize, message: &NetworkMessage) {
        for index in 0..self.table.len() {
            if index == except_port {
                continue;
            }
            self.send_message(index, &Address::global_broadcast(), message);
        }
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

/// Property P7: a confirmed-service request (APDU first-octet high nibble
/// `0x0`) addressed to the broadcast network is never delivered locally.
fn is_confirmed_broadcast_drop(dest: &Address, apdu: &[u8]) -> bool {
    dest.is_broadcast() && apdu.first().is_some_and(|b| b >> 4 == 0x0)
}
