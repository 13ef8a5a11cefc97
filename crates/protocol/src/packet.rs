//! Packet framing for the datagram protocol spoken over data channels.
//!
//! Wire format (little-endian except where noted):
//! ```text
//! ┌──────────────────┬──────┬─────────────────────────────────────┐
//! │ sequence + flags │ u16  │ bits 15/14 are RELIABLE / MESSAGE   │
//! ├──────────────────┼──────┼─────────────────────────────────────┤
//! │ packet type      │ u8   │                                     │
//! ├──────────────────┼──────┼─────────────────────────────────────┤
//! │ version          │ u8   │ per packet type                     │
//! ├──────────────────┼──────┼─────────────────────────────────────┤
//! │ sender UUID      │ [16] │ big-endian; sourced packets only;   │
//! │                  │      │ zeroed before authentication        │
//! ├──────────────────┼──────┼─────────────────────────────────────┤
//! │ payload          │ [u8] │ type-specific                       │
//! └──────────────────┴──────┴─────────────────────────────────────┘
//! ```

use bitflags::bitflags;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use uuid::Uuid;

use crate::error::{PacketError, PacketResult};
use crate::packet_type::PacketType;

bitflags! {
    /// Control bits folded into the high end of the sequence field.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PacketFlags: u16 {
        /// Delivery is acknowledged and retried
        const RELIABLE = 0x8000;
        /// Part of a multi-packet message
        const MESSAGE = 0x4000;
    }
}

/// Mask selecting the sequence number out of the combined field.
pub const SEQUENCE_MASK: u16 = 0x3FFF;

/// Base header: sequence+flags, type, version.
pub const BASE_HEADER_SIZE: usize = 4;

/// Writes a u128 as two 64-bit halves, most significant half first.
pub fn put_u128_be(buf: &mut impl BufMut, value: u128) {
    buf.put_u64((value >> 64) as u64);
    buf.put_u64(value as u64);
}

/// Writes a u128 as two 64-bit halves, least significant half first.
pub fn put_u128_le(buf: &mut impl BufMut, value: u128) {
    buf.put_u64_le(value as u64);
    buf.put_u64_le((value >> 64) as u64);
}

pub fn get_u128_be(buf: &mut impl Buf) -> u128 {
    let high = buf.get_u64() as u128;
    let low = buf.get_u64() as u128;
    (high << 64) | low
}

pub fn get_u128_le(buf: &mut impl Buf) -> u128 {
    let low = buf.get_u64_le() as u128;
    let high = buf.get_u64_le() as u128;
    (high << 64) | low
}

/// A single protocol packet: parsed header plus payload bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    packet_type: PacketType,
    version: u8,
    flags: PacketFlags,
    sequence: u16,
    sender: Uuid,
    payload: BytesMut,
}

impl Packet {
    /// Creates an empty packet of the given type at its current version.
    /// The sender UUID starts zeroed and is stamped at send time once the
    /// domain server has assigned a session UUID.
    pub fn new(packet_type: PacketType) -> Self {
        Self {
            packet_type,
            version: packet_type.version(),
            flags: PacketFlags::empty(),
            sequence: 0,
            sender: Uuid::nil(),
            payload: BytesMut::new(),
        }
    }

    pub fn with_payload(packet_type: PacketType, payload: impl Into<BytesMut>) -> Self {
        let mut packet = Self::new(packet_type);
        packet.payload = payload.into();
        packet
    }

    pub fn packet_type(&self) -> PacketType {
        self.packet_type
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn flags(&self) -> PacketFlags {
        self.flags
    }

    pub fn set_flags(&mut self, flags: PacketFlags) {
        self.flags = flags;
    }

    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    /// Sets the sequence number; the two control bits are not part of it.
    pub fn set_sequence(&mut self, sequence: u16) {
        self.sequence = sequence & SEQUENCE_MASK;
    }

    pub fn sender(&self) -> Uuid {
        self.sender
    }

    pub fn set_sender(&mut self, sender: Uuid) {
        self.sender = sender;
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn payload_mut(&mut self) -> &mut BytesMut {
        &mut self.payload
    }

    /// Header length for this packet's type.
    pub fn header_size(packet_type: PacketType) -> usize {
        if packet_type.is_sourced() {
            BASE_HEADER_SIZE + 16
        } else {
            BASE_HEADER_SIZE
        }
    }

    /// Verification stub. Packet payloads are not yet signed; the seam is
    /// kept so verification can be tightened without touching call sites.
    pub fn verify(&self) -> bool {
        true
    }

    /// Serializes header and payload.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(Self::header_size(self.packet_type) + self.payload.len());
        buf.put_u16_le(self.flags.bits() | (self.sequence & SEQUENCE_MASK));
        buf.put_u8(self.packet_type.as_u8());
        buf.put_u8(self.version);
        if self.packet_type.is_sourced() {
            put_u128_be(&mut buf, self.sender.as_u128());
        }
        buf.extend_from_slice(&self.payload);
        buf.freeze()
    }

    /// Parses a packet from raw datagram bytes.
    pub fn from_bytes(bytes: Bytes) -> PacketResult<Self> {
        let mut buf = bytes;
        if buf.len() < BASE_HEADER_SIZE {
            return Err(PacketError::BufferTooShort {
                need: BASE_HEADER_SIZE,
                have: buf.len(),
            });
        }

        let combined = buf.get_u16_le();
        let flags = PacketFlags::from_bits_truncate(combined);
        let sequence = combined & SEQUENCE_MASK;
        let packet_type = PacketType::from_u8(buf.get_u8())?;
        let version = buf.get_u8();

        let sender = if packet_type.is_sourced() {
            if buf.len() < 16 {
                return Err(PacketError::BufferTooShort {
                    need: 16,
                    have: buf.len(),
                });
            }
            Uuid::from_u128(get_u128_be(&mut buf))
        } else {
            Uuid::nil()
        };

        Ok(Self {
            packet_type,
            version,
            flags,
            sequence,
            sender,
            payload: BytesMut::from(&buf[..]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sourced_header_round_trip() {
        let sender = Uuid::new_v4();
        let mut packet = Packet::with_payload(PacketType::Ping, &b"abc"[..]);
        packet.set_sequence(0x1234);
        packet.set_sender(sender);
        packet.set_flags(PacketFlags::RELIABLE);

        let parsed = Packet::from_bytes(packet.to_bytes()).unwrap();
        assert_eq!(parsed.packet_type(), PacketType::Ping);
        assert_eq!(parsed.sequence(), 0x1234);
        assert_eq!(parsed.sender(), sender);
        assert_eq!(parsed.flags(), PacketFlags::RELIABLE);
        assert_eq!(parsed.payload(), b"abc");
    }

    #[test]
    fn unsourced_header_has_no_sender() {
        let packet = Packet::new(PacketType::DomainConnectRequest);
        let bytes = packet.to_bytes();
        assert_eq!(bytes.len(), BASE_HEADER_SIZE);

        let parsed = Packet::from_bytes(bytes).unwrap();
        assert_eq!(parsed.sender(), Uuid::nil());
    }

    #[test]
    fn sequence_is_masked_to_fourteen_bits() {
        let mut packet = Packet::new(PacketType::Ping);
        packet.set_sequence(0xFFFF);
        assert_eq!(packet.sequence(), SEQUENCE_MASK);
    }

    #[test]
    fn sequence_and_flags_do_not_collide() {
        let mut packet = Packet::new(PacketType::Ping);
        packet.set_sequence(SEQUENCE_MASK);
        packet.set_flags(PacketFlags::RELIABLE | PacketFlags::MESSAGE);
        let parsed = Packet::from_bytes(packet.to_bytes()).unwrap();
        assert_eq!(parsed.sequence(), SEQUENCE_MASK);
        assert_eq!(parsed.flags(), PacketFlags::RELIABLE | PacketFlags::MESSAGE);
    }

    #[test]
    fn u128_halves_round_trip_both_endians() {
        let value = 0x0123_4567_89AB_CDEF_FEDC_BA98_7654_3210u128;

        let mut be = BytesMut::new();
        put_u128_be(&mut be, value);
        assert_eq!(get_u128_be(&mut be.freeze()), value);

        let mut le = BytesMut::new();
        put_u128_le(&mut le, value);
        assert_eq!(get_u128_le(&mut le.freeze()), value);
    }

    #[test]
    fn truncated_packet_is_rejected() {
        let err = Packet::from_bytes(Bytes::from_static(&[0x00, 0x00])).unwrap_err();
        assert!(matches!(err, PacketError::BufferTooShort { .. }));
    }
}
