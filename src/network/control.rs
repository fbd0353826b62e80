//! The ASHRAE 135 §6.6 network-layer control-message state machine.
//!
//! Dispatch is on the one-octet message type carried in the NPCI
//! (`Npdu::network_message_type`). Grounded on the reference's
//! `network_control_handler`/`who_is_router_to_network_handler`
//! (`original_source/apps/fuzz-afl/main.c`), recast as a pure function over
//! a [`RoutingTable`] that returns the outbound effects to take rather than
//! performing I/O itself — the teacher crate's `Npdu` has no equivalent
//! state machine, so the dispatch shape here follows the reference
//! structure while the Rust surface (an enum of outcomes) follows the
//! teacher's general preference for returning data over side-effecting
//! calls inline (see `service::confirmed` handler return types).

#[cfg(not(feature = "std"))]
use alloc::{vec, vec::Vec};

use super::address::Address;
use super::npdu::Npdu;
use super::routing::RoutingTable;

const MSG_WHO_IS_ROUTER_TO_NETWORK: u8 = 0x00;
const MSG_I_AM_ROUTER_TO_NETWORK: u8 = 0x01;
const MSG_I_COULD_BE_ROUTER_TO_NETWORK: u8 = 0x02;
const MSG_REJECT_MESSAGE_TO_NETWORK: u8 = 0x03;
const MSG_ROUTER_BUSY_TO_NETWORK: u8 = 0x04;
const MSG_ROUTER_AVAILABLE_TO_NETWORK: u8 = 0x05;
const MSG_INITIALIZE_ROUTING_TABLE: u8 = 0x06;
const MSG_INITIALIZE_ROUTING_TABLE_ACK: u8 = 0x07;
const MSG_ESTABLISH_CONNECTION_TO_NETWORK: u8 = 0x08;
const MSG_DISCONNECT_CONNECTION_TO_NETWORK: u8 = 0x09;

/// Why a `Reject-Message-To-Network` was sent, per ASHRAE 135 §6.6.9.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Reason 0, or any vendor/reserved code ≥ 7, reported numerically.
    Other(u8),
    Unreachable,
    Busy,
    UnknownMessageType,
    MessageTooLong,
    Security,
    InvalidAddressLength,
}

impl RejectReason {
    fn to_code(self) -> u8 {
        match self {
            RejectReason::Other(code) => code,
            RejectReason::Unreachable => 1,
            RejectReason::Busy => 2,
            RejectReason::UnknownMessageType => 3,
            RejectReason::MessageTooLong => 4,
            RejectReason::Security => 5,
            RejectReason::InvalidAddressLength => 6,
        }
    }

    fn from_code(code: u8) -> Self {
        match code {
            1 => RejectReason::Unreachable,
            2 => RejectReason::Busy,
            3 => RejectReason::UnknownMessageType,
            4 => RejectReason::MessageTooLong,
            5 => RejectReason::Security,
            6 => RejectReason::InvalidAddressLength,
            other => RejectReason::Other(other),
        }
    }
}

impl core::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            RejectReason::Other(code) => write!(f, "other ({code})"),
            RejectReason::Unreachable => write!(f, "router unreachable"),
            RejectReason::Busy => write!(f, "router busy"),
            RejectReason::UnknownMessageType => write!(f, "unknown network message type"),
            RejectReason::MessageTooLong => write!(f, "message too long"),
            RejectReason::Security => write!(f, "security error"),
            RejectReason::InvalidAddressLength => write!(f, "invalid address length"),
        }
    }
}

/// One entry of an `Initialize-Routing-Table(-Ack)` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitRoutingTableEntry {
    pub net: u16,
    pub port_id: u8,
    pub info: Vec<u8>,
}

/// An outbound network-layer control message, not yet wrapped in an NPCI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkMessage {
    WhoIsRouterToNetwork(Option<u16>),
    IAmRouterToNetwork(Vec<u16>),
    RejectMessageToNetwork { reason: RejectReason, dnet: u16 },
    InitializeRoutingTableAck(Vec<InitRoutingTableEntry>),
}

impl NetworkMessage {
    pub fn tag(&self) -> u8 {
        match self {
            NetworkMessage::WhoIsRouterToNetwork(_) => MSG_WHO_IS_ROUTER_TO_NETWORK,
            NetworkMessage::IAmRouterToNetwork(_) => MSG_I_AM_ROUTER_TO_NETWORK,
            NetworkMessage::RejectMessageToNetwork { .. } => MSG_REJECT_MESSAGE_TO_NETWORK,
            NetworkMessage::InitializeRoutingTableAck(_) => MSG_INITIALIZE_ROUTING_TABLE_ACK,
        }
    }

    /// Encode the message body (everything after the message-type octet).
    pub fn encode_payload(&self) -> Vec<u8> {
        match self {
            NetworkMessage::WhoIsRouterToNetwork(None) => Vec::new(),
            NetworkMessage::WhoIsRouterToNetwork(Some(net)) => net.to_be_bytes().to_vec(),
            NetworkMessage::IAmRouterToNetwork(nets) => {
                nets.iter().flat_map(|n| n.to_be_bytes()).collect()
            }
            NetworkMessage::RejectMessageToNetwork { reason, dnet } => {
                let mut out = vec![reason.to_code()];
                if *dnet != 0 {
                    out.extend_from_slice(&dnet.to_be_bytes());
                }
                out
            }
            NetworkMessage::InitializeRoutingTableAck(entries) => {
                let mut out = vec![entries.len() as u8];
                for entry in entries {
                    out.extend_from_slice(&entry.net.to_be_bytes());
                    out.push(entry.port_id);
                    out.push(entry.info.len() as u8);
                    out.extend_from_slice(&entry.info);
                }
                out
            }
        }
    }
}

/// What the caller should do as a result of handling one control message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkControlOutcome {
    /// Send `message` back out the port the request arrived on, to `dest`
    /// (global broadcast when `dest` is `None`).
    Reply {
        dest: Option<Address>,
        message: NetworkMessage,
    },
    /// Send `message`, as a broadcast, on every port except `except_port`,
    /// using the original (unrewritten) source address of the request.
    Broadcast { except_port: usize, message: NetworkMessage },
    /// Send `Reject-Message-To-Network(reason)` back toward `dest`.
    RejectAt(Address, RejectReason),
    /// No outbound effect.
    None,
}

/// Networks reachable through every port except `except_port`: every other
/// port's own network, plus every remote network owned by those ports.
/// Used by both the `I-Am-Router-To-Network(0)` emitter (property P4) and
/// nowhere else, since `Initialize-Routing-Table-Ack` enumerates all ports.
fn networks_excluding_port(table: &RoutingTable, except_port: usize) -> Vec<u16> {
    let mut nets = Vec::new();
    for (index, entry) in table.ports_iter() {
        if index == except_port {
            continue;
        }
        nets.push(entry.port.net);
        nets.extend(entry.remotes.iter().map(|r| r.net));
    }
    nets
}

fn all_port_ack_entries(table: &RoutingTable) -> Vec<InitRoutingTableEntry> {
    table
        .ports_iter()
        .map(|(index, entry)| InitRoutingTableEntry {
            net: entry.port.net,
            port_id: (index + 1) as u8,
            info: Vec::new(),
        })
        .collect()
}

fn read_u16(bytes: &[u8], offset: usize) -> Option<u16> {
    if offset + 2 > bytes.len() {
        return None;
    }
    Some(u16::from_be_bytes([bytes[offset], bytes[offset + 1]]))
}

/// Handle one decoded network-layer control message. `payload` is the NPCI
/// body past the message-type octet. Returns zero or more outcomes for the
/// caller to realize as outbound frames (almost always zero or one; never
/// more than one per `spec.md` §4.C).
pub fn handle(
    table: &mut RoutingTable,
    source_port: usize,
    source_addr: &Address,
    npdu: &Npdu,
    payload: &[u8],
) -> Vec<NetworkControlOutcome> {
    let Some(tag) = npdu.network_message_type else {
        return vec![NetworkControlOutcome::None];
    };

    match tag {
        MSG_WHO_IS_ROUTER_TO_NETWORK => {
            if payload.len() >= 2 {
                let dnet = read_u16(payload, 0).unwrap();
                match table.find(dnet) {
                    Some((index, _)) if index == source_port => vec![NetworkControlOutcome::None],
                    Some(_) => vec![NetworkControlOutcome::Reply {
                        dest: Some(Address::global_broadcast()),
                        message: NetworkMessage::IAmRouterToNetwork(vec![dnet]),
                    }],
                    None => vec![NetworkControlOutcome::Broadcast {
                        except_port: source_port,
                        message: NetworkMessage::WhoIsRouterToNetwork(Some(dnet)),
                    }],
                }
            } else {
                let nets = networks_excluding_port(table, source_port);
                vec![NetworkControlOutcome::Reply {
                    dest: Some(Address::global_broadcast()),
                    message: NetworkMessage::IAmRouterToNetwork(nets),
                }]
            }
        }

        MSG_I_AM_ROUTER_TO_NETWORK => {
            let via_net = table.port(source_port).port.net;
            let mut offset = 0;
            while let Some(net) = read_u16(payload, offset) {
                table.add_remote(via_net, net, source_addr.clone());
                offset += 2;
            }
            vec![NetworkControlOutcome::None]
        }

        MSG_REJECT_MESSAGE_TO_NETWORK => {
            if !payload.is_empty() {
                let reason = RejectReason::from_code(payload[0]);
                let dnet = read_u16(payload, 1).unwrap_or(0);
                log::warn!(
                    "Reject-Message-To-Network from port {source_port}: {reason} (dnet {dnet})"
                );
            }
            vec![NetworkControlOutcome::None]
        }

        MSG_INITIALIZE_ROUTING_TABLE => {
            if let Some(&count) = payload.first() {
                if count > 0 {
                    let via_net = table.port(source_port).port.net;
                    let mut offset = 1usize;
                    for _ in 0..count {
                        let Some(dnet) = read_u16(payload, offset) else {
                            break;
                        };
                        let Some(&info_len) = payload.get(offset + 3) else {
                            break;
                        };
                        let entry_len = 4 + info_len as usize;
                        if offset + entry_len > payload.len() {
                            break;
                        }
                        table.add_remote(via_net, dnet, source_addr.clone());
                        offset += entry_len;
                    }
                }
            }
            vec![NetworkControlOutcome::Reply {
                dest: Some(Address::global_broadcast()),
                message: NetworkMessage::InitializeRoutingTableAck(all_port_ack_entries(table)),
            }]
        }

        MSG_I_COULD_BE_ROUTER_TO_NETWORK
        | MSG_ROUTER_BUSY_TO_NETWORK
        | MSG_ROUTER_AVAILABLE_TO_NETWORK
        | MSG_INITIALIZE_ROUTING_TABLE_ACK
        | MSG_ESTABLISH_CONNECTION_TO_NETWORK
        | MSG_DISCONNECT_CONNECTION_TO_NETWORK => vec![NetworkControlOutcome::None],

        _ => vec![NetworkControlOutcome::RejectAt(
            source_addr.clone(),
            RejectReason::UnknownMessageType,
        )],
    }
}
