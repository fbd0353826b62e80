//! BACnet network layer: NPDU codec, routing table, control-message state
//! machine, forwarding, and the port abstraction that ties them together.
//!
//! This module replaces the teacher crate's single `network` module, which
//! bundled the NPDU codec together with a large set of higher-layer
//! concerns (BDT/FDT, path discovery, diagnostics, security filtering) that
//! belong to a full BACnet/IP device rather than to a layer-3 router core.
//! It is split into the five components of that router: [`npdu`] (A),
//! [`routing`] (B), [`control`] (C), [`forward`] (D), and [`port`] (E),
//! orchestrated by [`router::Router`].

pub mod address;
pub mod control;
pub mod forward;
pub mod npdu;
pub mod port;
pub mod router;
pub mod routing;

pub use address::{Address, BROADCAST_NETWORK, LOCAL_NETWORK};
pub use control::{NetworkControlOutcome, NetworkMessage, RejectReason};
pub use forward::{ForwardDropReason, ForwardOutcome};
pub use npdu::{Npdu, NpduControl, NpduDecodeError};
pub use port::PortTransport;
pub use router::{ApduHandler, Router, RouterConfig, RouterError};
pub use routing::{Port, PortEntry, RemoteNetwork, RoutingTable};
