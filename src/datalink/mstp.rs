//! BACnet MS/TP (Master-Slave/Token-Passing) port adapter.
//!
//! Trimmed from the teacher's `MstpDataLink`: the MS/TP frame format
//! (preamble, header CRC, data CRC) and its encode/decode are kept, since
//! they're the concrete wire grounding for what `PortTransport::send` must
//! do on this medium. The token-passing state machine (`MstpState`,
//! `_handle_token`, `_next_station` rotation) is dropped — `spec.md` §1
//! scopes medium access control out, treating a port as "opaque" once a
//! frame reaches or leaves it. What remains is an in-memory send queue
//! standing in for the RS-485 transmit path, matching the teacher's own
//! "simplified simulation" framing of `MstpDataLink::new`.

#[cfg(feature = "std")]
use std::collections::VecDeque;

use crate::datalink::{DataLinkError, Result};
use crate::network::address::Address;
use crate::network::npdu::{self, Npdu};
use crate::network::port::PortTransport;

/// MS/TP frame preamble bytes.
pub const MSTP_PREAMBLE_55: u8 = 0x55;
pub const MSTP_PREAMBLE_FF: u8 = 0xFF;

/// Maximum MS/TP data length.
pub const MSTP_MAX_DATA_LENGTH: usize = 501;

/// MS/TP header size (without data).
pub const MSTP_HEADER_SIZE: usize = 8;

/// Broadcast station address.
pub const MSTP_BROADCAST_ADDRESS: u8 = 255;

/// MS/TP frame types this adapter sends and recognizes on receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MstpFrameType {
    BacnetDataExpectingReply = 5,
    BacnetDataNotExpectingReply = 6,
}

impl MstpFrameType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            5 => Some(Self::BacnetDataExpectingReply),
            6 => Some(Self::BacnetDataNotExpectingReply),
            _ => None,
        }
    }
}

/// An MS/TP frame: preamble, 5-byte header, header CRC, data, data CRC.
#[derive(Debug, Clone)]
pub struct MstpFrame {
    pub frame_type: MstpFrameType,
    pub destination: u8,
    pub source: u8,
    pub data_length: u16,
    pub header_crc: u8,
    pub data: Vec<u8>,
    pub data_crc: Option<u16>,
}

impl MstpFrame {
    pub fn new(frame_type: MstpFrameType, destination: u8, source: u8, data: Vec<u8>) -> Result<Self> {
        if data.len() > MSTP_MAX_DATA_LENGTH {
            return Err(DataLinkError::InvalidFrame);
        }

        let data_length = data.len() as u16;
        let header_bytes = [
            frame_type as u8,
            destination,
            source,
            (data_length >> 8) as u8,
            (data_length & 0xFF) as u8,
        ];
        let header_crc = calculate_header_crc(&header_bytes);
        let data_crc = if !data.is_empty() {
            Some(crc16_mstp(&data))
        } else {
            None
        };

        Ok(Self {
            frame_type,
            destination,
            source,
            data_length,
            header_crc,
            data,
            data_crc,
        })
    }

    pub fn bacnet_data(destination: u8, source: u8, data: Vec<u8>, expecting_reply: bool) -> Result<Self> {
        let frame_type = if expecting_reply {
            MstpFrameType::BacnetDataExpectingReply
        } else {
            MstpFrameType::BacnetDataNotExpectingReply
        };
        Self::new(frame_type, destination, source, data)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut frame = Vec::with_capacity(MSTP_HEADER_SIZE + self.data.len() + 2);
        frame.push(MSTP_PREAMBLE_55);
        frame.push(MSTP_PREAMBLE_FF);
        frame.push(self.frame_type as u8);
        frame.push(self.destination);
        frame.push(self.source);
        frame.push((self.data_length >> 8) as u8);
        frame.push((self.data_length & 0xFF) as u8);
        frame.push(self.header_crc);

        if !self.data.is_empty() {
            frame.extend_from_slice(&self.data);
            if let Some(crc) = self.data_crc {
                frame.push((crc & 0xFF) as u8);
                frame.push((crc >> 8) as u8);
            }
        }

        frame
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < MSTP_HEADER_SIZE {
            return Err(DataLinkError::InvalidFrame);
        }
        if data[0] != MSTP_PREAMBLE_55 || data[1] != MSTP_PREAMBLE_FF {
            return Err(DataLinkError::InvalidFrame);
        }

        let frame_type = MstpFrameType::from_u8(data[2]).ok_or(DataLinkError::InvalidFrame)?;
        let destination = data[3];
        let source = data[4];
        let data_length = ((data[5] as u16) << 8) | (data[6] as u16);
        let header_crc = data[7];

        let header_bytes = [data[2], data[3], data[4], data[5], data[6]];
        if calculate_header_crc(&header_bytes) != header_crc {
            return Err(DataLinkError::InvalidFrame);
        }

        let expected_size = MSTP_HEADER_SIZE + data_length as usize + if data_length > 0 { 2 } else { 0 };
        if data.len() != expected_size {
            return Err(DataLinkError::InvalidFrame);
        }

        let (frame_data, data_crc) = if data_length > 0 {
            let data_start = MSTP_HEADER_SIZE;
            let data_end = data_start + data_length as usize;
            let frame_data = data[data_start..data_end].to_vec();
            let crc_low = data[data_end];
            let crc_high = data[data_end + 1];
            let data_crc = ((crc_high as u16) << 8) | (crc_low as u16);
            if crc16_mstp(&frame_data) != data_crc {
                return Err(DataLinkError::InvalidFrame);
            }
            (frame_data, Some(data_crc))
        } else {
            (Vec::new(), None)
        };

        Ok(Self {
            frame_type,
            destination,
            source,
            data_length,
            header_crc,
            data: frame_data,
            data_crc,
        })
    }
}

/// ASHRAE 135 Annex G CRC-8 over an MS/TP header.
fn calculate_header_crc(header: &[u8; 5]) -> u8 {
    let mut crc = 0xFFu8;
    for &byte in header {
        crc ^= byte;
        for _ in 0..8 {
            if crc & 0x01 != 0 {
                crc = (crc >> 1) ^ 0x55;
            } else {
                crc >>= 1;
            }
        }
    }
    !crc
}

/// ASHRAE 135 Annex G CRC-16 over an MS/TP data field.
fn crc16_mstp(data: &[u8]) -> u16 {
    let mut crc = 0xFFFFu16;
    for &byte in data {
        crc ^= byte as u16;
        for _ in 0..8 {
            if crc & 0x0001 != 0 {
                crc = (crc >> 1) ^ 0x8408;
            } else {
                crc >>= 1;
            }
        }
    }
    !crc
}

/// An MS/TP port: a station address plus an in-memory outbound queue
/// standing in for the RS-485 transmit path. A real deployment would drain
/// this queue through a token-passing state machine; this adapter is only
/// responsible for framing and queuing, matching `PortTransport`'s
/// fire-and-forget `send`.
#[cfg(feature = "std")]
pub struct MstpPort {
    station_address: u8,
    net: u16,
    sent: VecDeque<MstpFrame>,
}

#[cfg(feature = "std")]
impl MstpPort {
    pub fn new(station_address: u8, net: u16) -> Self {
        Self {
            station_address,
            net,
            sent: VecDeque::new(),
        }
    }

    /// Drain frames queued by `send`, in send order.
    pub fn drain(&mut self) -> Vec<MstpFrame> {
        self.sent.drain(..).collect()
    }
}

#[cfg(feature = "std")]
impl PortTransport for MstpPort {
    fn send(&mut self, dest: &Address, npdu: &Npdu, pdu: &[u8]) -> usize {
        let dest_addr = if dest.is_broadcast() || dest.mac.is_empty() {
            MSTP_BROADCAST_ADDRESS
        } else {
            match dest.mac.first() {
                Some(&addr) => addr,
                None => return 0,
            }
        };

        let mut payload = npdu::encode(npdu);
        payload.extend_from_slice(pdu);

        let frame = match MstpFrame::bacnet_data(dest_addr, self.station_address, payload, false) {
            Ok(frame) => frame,
            Err(_) => return 0,
        };
        let len = frame.encode().len();
        self.sent.push_back(frame);
        len
    }

    fn broadcast_addr(&self) -> Address {
        Address::new(self.net, vec![MSTP_BROADCAST_ADDRESS])
    }

    fn local_addr(&self) -> Address {
        Address::new(self.net, vec![self.station_address])
    }

    fn net_number(&self) -> u16 {
        self.net
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_encode_decode_round_trips_with_data() {
        let data = vec![0x01, 0x02, 0x03, 0x04];
        let frame = MstpFrame::bacnet_data(10, 20, data.clone(), true).unwrap();
        let encoded = frame.encode();
        let decoded = MstpFrame::decode(&encoded).unwrap();

        assert_eq!(decoded.frame_type, MstpFrameType::BacnetDataExpectingReply);
        assert_eq!(decoded.destination, 10);
        assert_eq!(decoded.source, 20);
        assert_eq!(decoded.data, data);
        assert!(decoded.data_crc.is_some());
    }

    #[test]
    fn decode_rejects_bad_preamble_and_truncated_frames() {
        let mut bad_frame = vec![0x00, 0xFF];
        bad_frame.extend_from_slice(&[0x06, 0x05, 0x03, 0x00, 0x00, 0x00]);
        assert!(MstpFrame::decode(&bad_frame).is_err());

        let too_short = vec![0x55, 0xFF, 0x00];
        assert!(MstpFrame::decode(&too_short).is_err());
    }

    #[test]
    fn decode_rejects_corrupted_data_crc() {
        let frame = MstpFrame::bacnet_data(10, 20, vec![0x01, 0x02], false).unwrap();
        let mut encoded = frame.encode();
        let last = encoded.len() - 1;
        encoded[last] ^= 0xFF;
        assert!(MstpFrame::decode(&encoded).is_err());
    }

    #[test]
    fn port_send_queues_a_framed_npdu_addressed_by_station() {
        let mut port = MstpPort::new(3, 2);
        let npdu = Npdu::local();
        let dest = Address::new(2, vec![9]);
        let sent = port.send(&dest, &npdu, b"apdu");
        assert!(sent > 0);

        let mut queued = port.drain();
        assert_eq!(queued.len(), 1);
        let frame = queued.pop().unwrap();
        assert_eq!(frame.source, 3);
        assert_eq!(frame.destination, 9);
    }

    #[test]
    fn port_broadcast_send_uses_mstp_broadcast_address() {
        let mut port = MstpPort::new(3, 2);
        let npdu = Npdu::local();
        let sent = port.send(&port.broadcast_addr(), &npdu, b"apdu");
        assert!(sent > 0);
        let frame = port.drain().pop().unwrap();
        assert_eq!(frame.destination, MSTP_BROADCAST_ADDRESS);
    }
}
