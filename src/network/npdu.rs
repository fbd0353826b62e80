//! NPDU codec: the Network Protocol Control Information header.
//!
//! Wire format (ASHRAE 135 §6.2, normative — see `spec.md` §6):
//!
//! ```text
//! octet 0:  protocol version, must be 0x01
//! octet 1:  control byte
//!             bit7  network-layer-message present
//!             bit5  destination present
//!             bit3  source present
//!             bit2  data-expecting-reply
//!             bit1-0 priority (0-3)
//! [NET, LEN, ADR[LEN]]   destination triple, only if bit5 is set
//! [NET, LEN, ADR[LEN]]   source triple, only if bit3 is set
//! [hop count]            only if destination is present
//! [message type]         only if bit7 is set
//! ```
//!
//! Modeled on the teacher crate's `Npdu::encode`/`Npdu::decode`
//! (`network/mod.rs`), generalized to also carry the one-octet network
//! message type the control-message state machine needs to dispatch on.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use bytes::{BufMut, BytesMut};

use super::address::Address;

/// BACnet network protocol version. Only version 1 is defined.
pub const PROTOCOL_VERSION: u8 = 1;

/// Errors produced while decoding an NPDU header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum NpduDecodeError {
    /// Octet 0 was not `PROTOCOL_VERSION`.
    #[error("unsupported NPDU version: {0}")]
    UnsupportedVersion(u8),
    /// The buffer ended before a declared field could be read.
    #[error("truncated NPDU")]
    Truncated,
    /// A length field claimed more bytes than the buffer holds.
    #[error("invalid NPDU length field")]
    InvalidLength,
}

/// The NPCI control byte, decomposed into its named bit fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NpduControl {
    /// bit7: this NPDU carries a network-layer control message.
    pub network_message: bool,
    /// bit5: a destination (DNET/DLEN/DADR) triple follows.
    pub destination_present: bool,
    /// bit3: a source (SNET/SLEN/SADR) triple follows.
    pub source_present: bool,
    /// bit2: data-expecting-reply.
    pub expecting_reply: bool,
    /// bits1-0: priority, 0 (normal) through 3 (life safety).
    pub priority: u8,
}

impl NpduControl {
    fn to_byte(self) -> u8 {
        let mut byte = self.priority & 0x03;
        if self.network_message {
            byte |= 0x80;
        }
        if self.destination_present {
            byte |= 0x20;
        }
        if self.source_present {
            byte |= 0x08;
        }
        if self.expecting_reply {
            byte |= 0x04;
        }
        byte
    }

    fn from_byte(byte: u8) -> Self {
        Self {
            network_message: byte & 0x80 != 0,
            destination_present: byte & 0x20 != 0,
            source_present: byte & 0x08 != 0,
            expecting_reply: byte & 0x04 != 0,
            priority: byte & 0x03,
        }
    }
}

/// A decoded NPDU header: the transient value described in `spec.md` §3.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Npdu {
    /// Always `PROTOCOL_VERSION` for a successfully decoded frame.
    pub version: u8,
    pub control: NpduControl,
    pub destination: Option<Address>,
    pub source: Option<Address>,
    /// Present iff `destination` is present.
    pub hop_count: Option<u8>,
    /// Present iff `control.network_message` is set.
    pub network_message_type: Option<u8>,
}

impl Npdu {
    /// An otherwise-empty NPDU for application data with no routing fields.
    pub fn local() -> Self {
        Self {
            version: PROTOCOL_VERSION,
            control: NpduControl::default(),
            destination: None,
            source: None,
            hop_count: None,
            network_message_type: None,
        }
    }

    pub fn is_network_message(&self) -> bool {
        self.control.network_message
    }
}

fn read_u16(bytes: &[u8], offset: usize) -> Result<(u16, usize), NpduDecodeError> {
    if offset + 2 > bytes.len() {
        return Err(NpduDecodeError::Truncated);
    }
    Ok((
        u16::from_be_bytes([bytes[offset], bytes[offset + 1]]),
        offset + 2,
    ))
}

fn write_u16(buf: &mut BytesMut, value: u16) {
    buf.put_u16(value);
}

fn read_triple(bytes: &[u8], mut pos: usize) -> Result<(Address, usize), NpduDecodeError> {
    let (net, next) = read_u16(bytes, pos)?;
    pos = next;
    if pos >= bytes.len() {
        return Err(NpduDecodeError::Truncated);
    }
    let len = bytes[pos] as usize;
    pos += 1;
    if pos + len > bytes.len() {
        return Err(NpduDecodeError::InvalidLength);
    }
    let mac = bytes[pos..pos + len].to_vec();
    pos += len;
    Ok((Address::new(net, mac), pos))
}

fn write_triple(buf: &mut BytesMut, addr: &Address) {
    write_u16(buf, addr.net);
    buf.put_u8(addr.mac.len() as u8);
    buf.put_slice(&addr.mac);
}

/// Decode an NPDU header from `bytes`. Returns the header and the offset of
/// the first byte past the header (`body_offset`), per `spec.md` §4.A.
///
/// Never reads past `bytes.len()`: every length-prefixed field is bounds
/// checked before the slice it describes is taken (property P3).
pub fn decode(bytes: &[u8]) -> Result<(Npdu, usize), NpduDecodeError> {
    if bytes.len() < 2 {
        return Err(NpduDecodeError::Truncated);
    }
    let version = bytes[0];
    if version != PROTOCOL_VERSION {
        return Err(NpduDecodeError::UnsupportedVersion(version));
    }
    let control = NpduControl::from_byte(bytes[1]);
    let mut pos = 2;

    let destination = if control.destination_present {
        let (addr, next) = read_triple(bytes, pos)?;
        pos = next;
        Some(addr)
    } else {
        None
    };

    let source = if control.source_present {
        let (addr, next) = read_triple(bytes, pos)?;
        pos = next;
        Some(addr)
    } else {
        None
    };

    let hop_count = if destination.is_some() {
        if pos >= bytes.len() {
            return Err(NpduDecodeError::Truncated);
        }
        let hop = bytes[pos];
        pos += 1;
        Some(hop)
    } else {
        None
    };

    let network_message_type = if control.network_message {
        if pos >= bytes.len() {
            return Err(NpduDecodeError::Truncated);
        }
        let tag = bytes[pos];
        pos += 1;
        Some(tag)
    } else {
        None
    };

    Ok((
        Npdu {
            version,
            control,
            destination,
            source,
            hop_count,
            network_message_type,
        },
        pos,
    ))
}

/// Encode an NPDU header. Inverse of [`decode`] for any `Npdu` it could
/// produce (property P2).
pub fn encode(npdu: &Npdu) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(16);
    buf.put_u8(npdu.version);
    buf.put_u8(npdu.control.to_byte());

    if let Some(ref dest) = npdu.destination {
        write_triple(&mut buf, dest);
    }
    if let Some(ref src) = npdu.source {
        write_triple(&mut buf, src);
    }
    if npdu.destination.is_some() {
        buf.put_u8(npdu.hop_count.unwrap_or(0));
    }
    if let Some(tag) = npdu.network_message_type {
        buf.put_u8(tag);
    }

    buf.to_vec()
}
