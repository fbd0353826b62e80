//! Property tests for the invariants and properties named in `spec.md` §8:
//! P1 (routing-table network-number uniqueness), P2 (NPDU codec round-trip),
//! P3 (decode never reads past the buffer), P4 (loop-free advertisement),
//! P5 (hop-count monotonicity), P6 (source-rewriting).

use std::sync::{Arc, Mutex};

use bacnet_router_core::network::control::{self, NetworkControlOutcome, NetworkMessage};
use bacnet_router_core::network::forward::{self, ForwardOutcome};
use bacnet_router_core::network::npdu::{decode, encode};
use bacnet_router_core::{Address, ApduHandler, Npdu, NpduControl, PortTransport, Router, RoutingTable};
use proptest::prelude::*;

/// A `PortTransport` double that discards everything it's asked to send.
/// Property tests only inspect the outcomes the router/forwarder/control
/// handler return, never what a port does with them.
struct NullPort {
    net: u16,
}

impl PortTransport for NullPort {
    fn send(&mut self, _dest: &Address, _npdu: &Npdu, _pdu: &[u8]) -> usize {
        0
    }

    fn broadcast_addr(&self) -> Address {
        Address::global_broadcast()
    }

    fn local_addr(&self) -> Address {
        Address::new(self.net, vec![self.net as u8])
    }

    fn net_number(&self) -> u16 {
        self.net
    }
}

fn arb_mac() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..6)
}

fn arb_net() -> impl Strategy<Value = u16> {
    1u16..0xFFFEu16
}

fn port(net: u16) -> Box<dyn PortTransport> {
    Box::new(NullPort { net })
}

proptest! {
    /// P1: after any sequence of `add_port`/`add_remote` calls, every network
    /// number present anywhere in the table is unique.
    #[test]
    fn p1_network_numbers_stay_unique(
        nets in prop::collection::vec(arb_net(), 1..12),
        macs in prop::collection::vec(arb_mac(), 1..12),
    ) {
        let mut table = RoutingTable::new();
        let mut accepted_direct = Vec::new();
        let mut accepted_remote = Vec::new();

        for (i, &net) in nets.iter().enumerate() {
            let mac = macs[i % macs.len()].clone();
            if i % 2 == 0 {
                if table.add_port(net, mac, port(net)) {
                    accepted_direct.push(net);
                }
            } else if let Some(&via) = accepted_direct.first() {
                if table.add_remote(via, net, Address::new(net, mac)) {
                    accepted_remote.push(net);
                }
            }
        }

        let mut all: Vec<u16> = accepted_direct.iter().chain(accepted_remote.iter()).copied().collect();
        all.sort_unstable();
        let mut deduped = all.clone();
        deduped.dedup();
        prop_assert_eq!(all, deduped);
    }

    /// P2: every `Npdu` this codec can produce survives encode-then-decode.
    #[test]
    fn p2_codec_round_trips(
        dest_mac in arb_mac(),
        src_mac in arb_mac(),
        dest_net in any::<u16>(),
        src_net in any::<u16>(),
        hop in any::<u8>(),
        has_dest in any::<bool>(),
        has_src in any::<bool>(),
    ) {
        let npdu = Npdu {
            version: 1,
            control: NpduControl {
                destination_present: has_dest,
                source_present: has_src,
                ..NpduControl::default()
            },
            destination: if has_dest { Some(Address::new(dest_net, dest_mac)) } else { None },
            source: if has_src { Some(Address::new(src_net, src_mac)) } else { None },
            hop_count: if has_dest { Some(hop) } else { None },
            network_message_type: None,
        };
        let bytes = encode(&npdu);
        let (decoded, consumed) = decode(&bytes).unwrap();
        prop_assert_eq!(decoded, npdu);
        prop_assert_eq!(consumed, bytes.len());
    }

    /// P3: decode never panics and never reads past the end of arbitrary
    /// input bytes.
    #[test]
    fn p3_decode_never_overreads(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
        let _ = decode(&bytes);
    }

    /// P4: `I-Am-Router-To-Network(0)`'s reachable-network list excludes
    /// anything owned by the source port.
    #[test]
    fn p4_advertisement_excludes_source_port(
        net_a in arb_net(),
        net_b in arb_net(),
    ) {
        prop_assume!(net_a != net_b);
        let mut table = RoutingTable::new();
        table.add_port(net_a, vec![1], port(net_a));
        table.add_port(net_b, vec![2], port(net_b));

        let npdu = Npdu {
            control: NpduControl { network_message: true, ..NpduControl::default() },
            network_message_type: Some(0x00),
            ..Npdu::local()
        };
        let outcomes = control::handle(&mut table, 0, &Address::new(0, vec![0xaa]), &npdu, &[]);
        match &outcomes[..] {
            [NetworkControlOutcome::Reply { message: NetworkMessage::IAmRouterToNetwork(nets), .. }] => {
                prop_assert!(!nets.contains(&net_a));
                prop_assert!(nets.contains(&net_b));
            }
            other => prop_assert!(false, "unexpected outcome: {other:?}"),
        }
    }

    /// P5: forwarding a frame with destination-present always produces a
    /// hop count one less than it started with (saturating at zero).
    #[test]
    fn p5_hop_count_decrements_by_one(hop in 2u8..=255) {
        let mut table = RoutingTable::new();
        table.add_port(1, vec![1], port(1));
        table.add_port(2, vec![2], port(2));
        table.add_remote(1, 5, Address::new(5, vec![0xaa]));

        let npdu = Npdu {
            control: NpduControl { destination_present: true, ..NpduControl::default() },
            hop_count: Some(hop),
            ..Npdu::local()
        };
        let dest = Address::new(5, vec![0xbb]);
        let source = Address::new(0, vec![0x99]);
        let outcome = forward::forward(&mut table, 1, &source, &dest, &npdu, b"apdu");
        match outcome {
            ForwardOutcome::Deliver { npdu, .. } => {
                prop_assert_eq!(npdu.hop_count, Some(hop - 1));
            }
            other => prop_assert!(false, "expected Deliver, got {other:?}"),
        }
    }

    /// P6: a source with network 0 (directly attached) is always rewritten
    /// to the forwarding port's own network; a nonzero source network is
    /// always preserved unchanged.
    #[test]
    fn p6_source_rewriting_matches_source_network(
        source_net in any::<u16>(),
        source_mac in arb_mac(),
    ) {
        let mut table = RoutingTable::new();
        table.add_port(1, vec![1], port(1));
        table.add_port(2, vec![2], port(2));
        table.add_remote(1, 5, Address::new(5, vec![0xaa]));

        let npdu = Npdu {
            control: NpduControl { destination_present: true, ..NpduControl::default() },
            hop_count: Some(10),
            ..Npdu::local()
        };
        let dest = Address::new(1, vec![0xcc]);
        let source = Address::new(source_net, source_mac.clone());
        let outcome = forward::forward(&mut table, 1, &source, &dest, &npdu, b"apdu");
        if let ForwardOutcome::Deliver { npdu, .. } = outcome {
            let emitted = npdu.source.unwrap();
            if source_net == 0 {
                prop_assert_eq!(emitted.net, 2);
                prop_assert_eq!(emitted.mac, source_mac);
            } else {
                prop_assert_eq!(emitted.net, source_net);
                prop_assert_eq!(emitted.mac, source_mac);
            }
        } else {
            prop_assert!(false, "expected Deliver");
        }
    }
}

/// A `PortTransport` double that records every `send` call's exact
/// arguments, shared with the test through an `Arc<Mutex<_>>` so the
/// `Router` can own it while the test still inspects what it received.
#[derive(Clone)]
struct RecordingPort {
    net: u16,
    sent: Arc<Mutex<Vec<(Address, Npdu, Vec<u8>)>>>,
}

impl RecordingPort {
    fn new(net: u16) -> (Self, Arc<Mutex<Vec<(Address, Npdu, Vec<u8>)>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                net,
                sent: sent.clone(),
            },
            sent,
        )
    }
}

impl PortTransport for RecordingPort {
    fn send(&mut self, dest: &Address, npdu: &Npdu, pdu: &[u8]) -> usize {
        self.sent.lock().unwrap().push((dest.clone(), npdu.clone(), pdu.to_vec()));
        pdu.len()
    }

    fn broadcast_addr(&self) -> Address {
        Address::new(self.net, Vec::new())
    }

    fn local_addr(&self) -> Address {
        Address::new(self.net, vec![self.net as u8])
    }

    fn net_number(&self) -> u16 {
        self.net
    }
}

struct NoopApduHandler;

impl ApduHandler for NoopApduHandler {
    fn handle_apdu(&mut self, _source: &Address, _apdu: &[u8]) {}
}

/// NPDU bytes for a frame with DNET/DADR present, addressed to `dnet`/`dadr`,
/// hop count 10, no source (directly attached sender).
fn npdu_bytes_to(dnet: u16, dadr: &[u8]) -> Vec<u8> {
    let npdu = Npdu {
        control: NpduControl {
            destination_present: true,
            ..NpduControl::default()
        },
        destination: Some(Address::new(dnet, dadr.to_vec())),
        hop_count: Some(10),
        ..Npdu::local()
    };
    let mut frame = encode(&npdu);
    frame.extend_from_slice(b"apdu");
    frame
}

/// Direct delivery must unicast to the originally addressed device's MAC,
/// never fall back to a broadcast on the destination port.
#[test]
fn direct_delivery_sends_to_the_original_device_mac_not_broadcast() {
    let mut router = Router::new();
    let (port0, _sent0) = RecordingPort::new(1);
    let (port1, sent1) = RecordingPort::new(7);
    router.add_port(1, vec![0x01], Box::new(port0));
    router.add_port(7, vec![0x07], Box::new(port1));

    let frame = npdu_bytes_to(7, &[0xcc]);
    router
        .handle_frame(0, &[0x99], &frame, &mut NoopApduHandler)
        .unwrap();

    let sent = sent1.lock().unwrap();
    assert_eq!(sent.len(), 1);
    let (dest, npdu, _pdu) = &sent[0];
    assert_eq!(dest, &Address::new(7, vec![0xcc]));
    assert!(npdu.destination.is_none());
}

/// An intermediate forward must unicast to the next-hop router's MAC, not
/// the final device's DADR still present in the NPCI.
#[test]
fn intermediate_forward_sends_to_the_next_hop_mac_not_the_final_device() {
    let mut router = Router::new();
    let (port0, _sent0) = RecordingPort::new(1);
    let (port1, sent1) = RecordingPort::new(2);
    router.add_port(1, vec![0x01], Box::new(port0));
    router.add_port(2, vec![0x02], Box::new(port1));
    router
        .table_mut()
        .add_remote(2, 5, Address::new(5, vec![0xaa, 0xbb]));

    let frame = npdu_bytes_to(5, &[0xcc]);
    router
        .handle_frame(0, &[0x99], &frame, &mut NoopApduHandler)
        .unwrap();

    let sent = sent1.lock().unwrap();
    assert_eq!(sent.len(), 1);
    let (dest, npdu, _pdu) = &sent[0];
    assert_eq!(dest, &Address::new(5, vec![0xaa, 0xbb]));
    assert_eq!(npdu.destination, Some(Address::new(5, vec![0xcc])));
}
