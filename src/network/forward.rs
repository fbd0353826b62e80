//! Routed-APDU forwarding: §4.D/§6.5-6.6 of the ASHRAE 135 network layer.
//!
//! Grounded on the reference's `routed_apdu_handler`
//! (`original_source/apps/fuzz-afl/main.c`), which is the only place in the
//! reference that implements the broadcast/known-DNET/unknown-DNET split
//! and the decrement-then-zero-check hop-count rule quoted there from
//! §6.6.3. The teacher crate has no equivalent forwarder (`network/mod.rs`
//! only encodes/decodes NPDUs), so the control-flow shape below is original
//! to this module, built in the teacher's error-less "return an outcome
//! value" style used throughout `network::control`.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use super::address::Address;
use super::control::NetworkMessage;
use super::npdu::{Npdu, NpduControl};
use super::routing::RoutingTable;

/// Why a frame was dropped instead of forwarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardDropReason {
    /// The hop count reached zero after decrement and further transmission
    /// was required.
    HopCountExhausted,
}

/// What the caller should do with a decoded, non-control NPDU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardOutcome {
    /// Emit `(npdu, pdu)` on `port`, addressed at the link layer to
    /// `link_dest`. `link_dest` is never derived from `npdu.destination` by
    /// the caller: for a direct delivery it's the originally addressed
    /// device's MAC on `port`'s own network; for an intermediate forward
    /// it's the next-hop router's MAC, which is not the same address the
    /// NPCI's DADR still names.
    Deliver {
        port: usize,
        link_dest: Address,
        npdu: Npdu,
        pdu: Vec<u8>,
    },
    /// Emit `(npdu, pdu)` as a broadcast on every port except `except_port`.
    Broadcast { except_port: usize, npdu: Npdu, pdu: Vec<u8> },
    /// Like `Broadcast`, but also issue `Who-Is-Router-To-Network` on every
    /// port to discover the still-unknown destination network.
    DiscoverAndBroadcast {
        except_port: usize,
        npdu: Npdu,
        pdu: Vec<u8>,
        whois: NetworkMessage,
    },
    Drop(ForwardDropReason),
}

/// Compute the source triple a router must present when re-emitting a
/// frame, per `spec.md` §4.D "Routed-source synthesis". When the received
/// source was already routed (`net != 0`), the route it came in on is
/// learned into `table` as a side effect.
fn routed_source(table: &mut RoutingTable, source_port: usize, received_src: &Address) -> Address {
    let via_net = table.port(source_port).port.net;
    if received_src.net != 0 {
        table.add_remote(via_net, received_src.net, received_src.clone());
        received_src.clone()
    } else {
        Address::new(via_net, received_src.mac.clone())
    }
}

fn decrement_hop_count(npdu: &Npdu) -> Option<u8> {
    npdu.hop_count.map(|h| h.saturating_sub(1))
}

/// Forward one decoded, non-control NPDU. `source_addr` is the NPCI's
/// source triple as received (possibly `net == 0` for a directly attached
/// sender). `dest` is the NPCI's destination triple.
pub fn forward(
    table: &mut RoutingTable,
    source_port: usize,
    source_addr: &Address,
    dest: &Address,
    npdu: &Npdu,
    apdu: &[u8],
) -> ForwardOutcome {
    if dest.is_broadcast() {
        let new_hop = decrement_hop_count(npdu);
        if npdu.hop_count.is_some() && new_hop == Some(0) {
            return ForwardOutcome::Drop(ForwardDropReason::HopCountExhausted);
        }
        let src = routed_source(table, source_port, source_addr);
        let out_npdu = Npdu {
            version: npdu.version,
            control: NpduControl {
                source_present: true,
                ..npdu.control
            },
            destination: Some(Address::global_broadcast()),
            source: Some(src),
            hop_count: new_hop,
            network_message_type: None,
        };
        return ForwardOutcome::Broadcast {
            except_port: source_port,
            npdu: out_npdu,
            pdu: apdu.to_vec(),
        };
    }

    match table.find(dest.net) {
        Some((port, next_hop)) => {
            let new_hop = decrement_hop_count(npdu);
            if npdu.hop_count.is_some() && new_hop == Some(0) {
                return ForwardOutcome::Drop(ForwardDropReason::HopCountExhausted);
            }
            let src = routed_source(table, source_port, source_addr);

            let (out_npdu, link_dest) = match next_hop {
                None => {
                    // Direct delivery: the matched port's own network is
                    // dest.net, so the NPCI's DNET/DADR are stripped, but
                    // the frame still has to reach the originally addressed
                    // device's MAC, not go out as a broadcast.
                    let out_npdu = Npdu {
                        version: npdu.version,
                        control: NpduControl {
                            destination_present: false,
                            source_present: true,
                            ..npdu.control
                        },
                        destination: None,
                        source: Some(src),
                        hop_count: None,
                        network_message_type: None,
                    };
                    let own_net = table.port(port).port.net;
                    (out_npdu, Address::new(own_net, dest.mac.clone()))
                }
                Some(next_hop_addr) => {
                    // Intermediate forward: keep DNET/DADR in the NPCI, but
                    // the link-layer target is the next-hop router's MAC,
                    // not the final device's DADR still named there.
                    let out_npdu = Npdu {
                        version: npdu.version,
                        control: NpduControl {
                            destination_present: true,
                            source_present: true,
                            ..npdu.control
                        },
                        destination: Some(dest.clone()),
                        source: Some(src),
                        hop_count: new_hop,
                        network_message_type: None,
                    };
                    (out_npdu, next_hop_addr)
                }
            };

            ForwardOutcome::Deliver {
                port,
                link_dest,
                npdu: out_npdu,
                pdu: apdu.to_vec(),
            }
        }
        None => {
            let new_hop = decrement_hop_count(npdu);
            if npdu.hop_count.is_some() && new_hop == Some(0) {
                return ForwardOutcome::Drop(ForwardDropReason::HopCountExhausted);
            }
            let src = routed_source(table, source_port, source_addr);
            let out_npdu = Npdu {
                version: npdu.version,
                control: NpduControl {
                    destination_present: true,
                    source_present: true,
                    ..npdu.control
                },
                destination: Some(dest.clone()),
                source: Some(src),
                hop_count: new_hop,
                network_message_type: None,
            };
            ForwardOutcome::DiscoverAndBroadcast {
                except_port: source_port,
                npdu: out_npdu,
                pdu: apdu.to_vec(),
                whois: NetworkMessage::WhoIsRouterToNetwork(Some(dest.net)),
            }
        }
    }
}
