//! Packet-type bytes and per-type protocol versions.
//!
//! Each packet begins with a type byte and a version byte; versions advance
//! independently per type so a mixer can roll a format change without
//! touching the rest of the protocol.

use crate::error::PacketError;

/// Control-plane and entity packets the client speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    Unknown = 0,
    DomainList = 2,
    Ping = 3,
    PingReply = 4,
    DomainListRequest = 13,
    DomainConnectionDenied = 16,
    DomainDisconnectRequest = 31,
    DomainServerRemovedNode = 32,
    DomainConnectRequest = 45,
    EntityData = 55,
    EntityQuery = 56,
    EntityEdit = 59,
}

impl PacketType {
    pub fn from_u8(value: u8) -> Result<Self, PacketError> {
        match value {
            0 => Ok(PacketType::Unknown),
            2 => Ok(PacketType::DomainList),
            3 => Ok(PacketType::Ping),
            4 => Ok(PacketType::PingReply),
            13 => Ok(PacketType::DomainListRequest),
            16 => Ok(PacketType::DomainConnectionDenied),
            31 => Ok(PacketType::DomainDisconnectRequest),
            32 => Ok(PacketType::DomainServerRemovedNode),
            45 => Ok(PacketType::DomainConnectRequest),
            55 => Ok(PacketType::EntityData),
            56 => Ok(PacketType::EntityQuery),
            59 => Ok(PacketType::EntityEdit),
            other => Err(PacketError::UnknownPacketType(other)),
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Current version byte for this packet type.
    pub fn version(self) -> u8 {
        match self {
            PacketType::DomainList => 2,
            PacketType::Ping | PacketType::PingReply => 1,
            PacketType::DomainListRequest => 2,
            PacketType::DomainConnectionDenied => 1,
            PacketType::DomainDisconnectRequest => 1,
            PacketType::DomainServerRemovedNode => 1,
            PacketType::DomainConnectRequest => 2,
            PacketType::EntityData | PacketType::EntityQuery | PacketType::EntityEdit => 3,
            PacketType::Unknown => 0,
        }
    }

    /// Whether packets of this type carry a 16-byte sender UUID after the
    /// base header. The domain join/leave exchange runs before the server
    /// has assigned the client a session UUID, so those types go unsourced.
    pub fn is_sourced(self) -> bool {
        !matches!(
            self,
            PacketType::DomainList
                | PacketType::DomainConnectRequest
                | PacketType::DomainConnectionDenied
                | PacketType::DomainDisconnectRequest
                | PacketType::DomainServerRemovedNode
        )
    }
}

impl std::fmt::Display for PacketType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_round_trip() {
        for packet_type in [
            PacketType::DomainList,
            PacketType::Ping,
            PacketType::PingReply,
            PacketType::DomainListRequest,
            PacketType::DomainConnectionDenied,
            PacketType::DomainDisconnectRequest,
            PacketType::DomainServerRemovedNode,
            PacketType::DomainConnectRequest,
            PacketType::EntityData,
            PacketType::EntityQuery,
            PacketType::EntityEdit,
        ] {
            assert_eq!(PacketType::from_u8(packet_type.as_u8()), Ok(packet_type));
        }
    }

    #[test]
    fn unknown_byte_is_an_error() {
        assert_eq!(
            PacketType::from_u8(200),
            Err(PacketError::UnknownPacketType(200))
        );
    }

    #[test]
    fn domain_join_packets_are_unsourced() {
        assert!(!PacketType::DomainConnectRequest.is_sourced());
        assert!(!PacketType::DomainList.is_sourced());
        assert!(PacketType::DomainListRequest.is_sourced());
        assert!(PacketType::EntityEdit.is_sourced());
    }
}
