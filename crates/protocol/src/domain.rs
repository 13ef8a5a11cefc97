//! Payload codecs for the domain join/roster protocol.
//!
//! These are the bodies of the control packets the client exchanges with the
//! domain server: connect and list requests, the roster reply, denial,
//! removal notices and the address-probe pings. Scalars are little-endian,
//! UUIDs 16 bytes big-endian.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use uuid::Uuid;

use crate::error::{PacketError, PacketResult};
use crate::node_type::NodeType;
use crate::packet::{get_u128_be, put_u128_be};

/// Identifies the protocol generation; both sides must agree byte-for-byte.
pub const PROTOCOL_SIGNATURE: [u8; 16] = [
    0x56, 0x4C, 0x53, 0x01, 0x9A, 0x3D, 0x71, 0xE4, 0x08, 0xC2, 0x5B, 0x6F, 0xD0, 0x24, 0x8E,
    0xB7,
];

fn ensure(buf: &impl Buf, need: usize) -> PacketResult<()> {
    if buf.remaining() < need {
        return Err(PacketError::BufferTooShort {
            need,
            have: buf.remaining(),
        });
    }
    Ok(())
}

fn put_socket_addr(buf: &mut BytesMut, addr: SocketAddr) {
    match addr.ip() {
        IpAddr::V4(ip) => {
            buf.put_u8(4);
            buf.put_slice(&ip.octets());
        }
        IpAddr::V6(ip) => {
            buf.put_u8(6);
            buf.put_slice(&ip.octets());
        }
    }
    buf.put_u16_le(addr.port());
}

fn get_socket_addr(buf: &mut Bytes) -> PacketResult<SocketAddr> {
    ensure(buf, 1)?;
    let family = buf.get_u8();
    let ip = match family {
        4 => {
            ensure(buf, 4)?;
            let mut octets = [0u8; 4];
            buf.copy_to_slice(&mut octets);
            IpAddr::V4(Ipv4Addr::from(octets))
        }
        6 => {
            ensure(buf, 16)?;
            let mut octets = [0u8; 16];
            buf.copy_to_slice(&mut octets);
            IpAddr::V6(Ipv6Addr::from(octets))
        }
        other => {
            return Err(PacketError::Malformed(format!(
                "unknown address family {}",
                other
            )))
        }
    };
    ensure(buf, 2)?;
    Ok(SocketAddr::new(ip, buf.get_u16_le()))
}

fn put_string(buf: &mut BytesMut, value: &str) {
    buf.put_u16_le(value.len() as u16);
    buf.put_slice(value.as_bytes());
}

fn get_string(buf: &mut Bytes) -> PacketResult<String> {
    ensure(buf, 2)?;
    let len = buf.get_u16_le() as usize;
    ensure(buf, len)?;
    let bytes = buf.split_to(len);
    String::from_utf8(bytes.to_vec())
        .map_err(|_| PacketError::Malformed("string is not valid UTF-8".into()))
}

fn get_uuid(buf: &mut Bytes) -> PacketResult<Uuid> {
    ensure(buf, 16)?;
    Ok(Uuid::from_u128(get_u128_be(buf)))
}

/// Body of a DomainConnectRequest.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectRequest {
    /// Must equal [`PROTOCOL_SIGNATURE`].
    pub protocol_signature: [u8; 16],
    /// Session UUID from a previous DomainList, or nil on first contact.
    pub session_uuid: Uuid,
    /// Assignment-client types the client wants in its roster.
    pub node_types_of_interest: Vec<NodeType>,
    pub place_name: String,
}

impl ConnectRequest {
    pub fn new(session_uuid: Uuid, node_types_of_interest: Vec<NodeType>) -> Self {
        Self {
            protocol_signature: PROTOCOL_SIGNATURE,
            session_uuid,
            node_types_of_interest,
            place_name: String::new(),
        }
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        buf.put_slice(&self.protocol_signature);
        put_u128_be(&mut buf, self.session_uuid.as_u128());
        buf.put_u8(self.node_types_of_interest.len() as u8);
        for node_type in &self.node_types_of_interest {
            buf.put_u8(node_type.as_u8());
        }
        put_string(&mut buf, &self.place_name);
        buf.freeze()
    }

    pub fn from_bytes(mut buf: Bytes) -> PacketResult<Self> {
        ensure(&buf, 16)?;
        let mut protocol_signature = [0u8; 16];
        buf.copy_to_slice(&mut protocol_signature);
        let session_uuid = get_uuid(&mut buf)?;
        ensure(&buf, 1)?;
        let count = buf.get_u8() as usize;
        let mut node_types_of_interest = Vec::with_capacity(count);
        for _ in 0..count {
            ensure(&buf, 1)?;
            let byte = buf.get_u8();
            node_types_of_interest.push(
                NodeType::from_u8(byte)
                    .ok_or_else(|| PacketError::Malformed(format!("bad node type {}", byte)))?,
            );
        }
        let place_name = get_string(&mut buf)?;
        Ok(Self {
            protocol_signature,
            session_uuid,
            node_types_of_interest,
            place_name,
        })
    }
}

/// One assignment client advertised in a DomainList.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeEntry {
    pub node_type: NodeType,
    pub uuid: Uuid,
    pub public_addr: SocketAddr,
    pub local_addr: SocketAddr,
}

/// Body of a DomainList.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainList {
    pub domain_uuid: Uuid,
    pub domain_local_id: u16,
    /// The session UUID this client is known by.
    pub session_uuid: Uuid,
    /// The compact local ID assigned to this client.
    pub local_id: u16,
    pub nodes: Vec<NodeEntry>,
}

impl DomainList {
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        put_u128_be(&mut buf, self.domain_uuid.as_u128());
        buf.put_u16_le(self.domain_local_id);
        put_u128_be(&mut buf, self.session_uuid.as_u128());
        buf.put_u16_le(self.local_id);
        buf.put_u16_le(self.nodes.len() as u16);
        for node in &self.nodes {
            buf.put_u8(node.node_type.as_u8());
            put_u128_be(&mut buf, node.uuid.as_u128());
            put_socket_addr(&mut buf, node.public_addr);
            put_socket_addr(&mut buf, node.local_addr);
        }
        buf.freeze()
    }

    pub fn from_bytes(mut buf: Bytes) -> PacketResult<Self> {
        let domain_uuid = get_uuid(&mut buf)?;
        ensure(&buf, 2)?;
        let domain_local_id = buf.get_u16_le();
        let session_uuid = get_uuid(&mut buf)?;
        ensure(&buf, 2)?;
        let local_id = buf.get_u16_le();
        ensure(&buf, 2)?;
        let count = buf.get_u16_le() as usize;
        let mut nodes = Vec::with_capacity(count);
        for _ in 0..count {
            ensure(&buf, 1)?;
            let type_byte = buf.get_u8();
            let node_type = NodeType::from_u8(type_byte)
                .ok_or_else(|| PacketError::Malformed(format!("bad node type {}", type_byte)))?;
            let uuid = get_uuid(&mut buf)?;
            let public_addr = get_socket_addr(&mut buf)?;
            let local_addr = get_socket_addr(&mut buf)?;
            nodes.push(NodeEntry {
                node_type,
                uuid,
                public_addr,
                local_addr,
            });
        }
        Ok(Self {
            domain_uuid,
            domain_local_id,
            session_uuid,
            local_id,
            nodes,
        })
    }
}

/// Why a domain refused a connect request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DeniedReason {
    Unknown = 0,
    ProtocolMismatch = 1,
    LoginErrorMetaverse = 2,
    NotAuthorizedMetaverse = 3,
    TooManyUsers = 4,
    TimedOut = 5,
    LoginErrorDomain = 6,
    NotAuthorizedDomain = 7,
}

impl DeniedReason {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => DeniedReason::ProtocolMismatch,
            2 => DeniedReason::LoginErrorMetaverse,
            3 => DeniedReason::NotAuthorizedMetaverse,
            4 => DeniedReason::TooManyUsers,
            5 => DeniedReason::TimedOut,
            6 => DeniedReason::LoginErrorDomain,
            7 => DeniedReason::NotAuthorizedDomain,
            _ => DeniedReason::Unknown,
        }
    }
}

/// Body of a DomainConnectionDenied.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionDenied {
    pub reason: DeniedReason,
    pub message: String,
}

impl ConnectionDenied {
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        buf.put_u8(self.reason as u8);
        put_string(&mut buf, &self.message);
        buf.freeze()
    }

    pub fn from_bytes(mut buf: Bytes) -> PacketResult<Self> {
        ensure(&buf, 1)?;
        let reason = DeniedReason::from_u8(buf.get_u8());
        let message = get_string(&mut buf)?;
        Ok(Self { reason, message })
    }
}

/// Which of a node's two advertised addresses a ping probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PingType {
    Local = 1,
    Public = 2,
}

impl PingType {
    pub fn from_u8(value: u8) -> PacketResult<Self> {
        match value {
            1 => Ok(PingType::Local),
            2 => Ok(PingType::Public),
            other => Err(PacketError::Malformed(format!("bad ping type {}", other))),
        }
    }
}

/// Body of Ping and PingReply; a reply echoes the request verbatim.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ping {
    pub ping_type: PingType,
    /// Sender's clock, microseconds.
    pub timestamp: u64,
}

impl Ping {
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(9);
        buf.put_u8(self.ping_type as u8);
        buf.put_u64_le(self.timestamp);
        buf.freeze()
    }

    pub fn from_bytes(mut buf: Bytes) -> PacketResult<Self> {
        ensure(&buf, 9)?;
        let ping_type = PingType::from_u8(buf.get_u8())?;
        let timestamp = buf.get_u64_le();
        Ok(Self {
            ping_type,
            timestamp,
        })
    }
}

/// Body of a DomainServerRemovedNode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RemovedNode {
    pub uuid: Uuid,
}

impl RemovedNode {
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(16);
        put_u128_be(&mut buf, self.uuid.as_u128());
        buf.freeze()
    }

    pub fn from_bytes(mut buf: Bytes) -> PacketResult<Self> {
        Ok(Self {
            uuid: get_uuid(&mut buf)?,
        })
    }
}

/// Body of an EntityQuery: the rate the client is willing to receive
/// entity data at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntityQuery {
    pub max_entity_packets_per_second: u16,
}

impl EntityQuery {
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(2);
        buf.put_u16_le(self.max_entity_packets_per_second);
        buf.freeze()
    }

    pub fn from_bytes(mut buf: Bytes) -> PacketResult<Self> {
        ensure(&buf, 2)?;
        Ok(Self {
            max_entity_packets_per_second: buf.get_u16_le(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    #[test]
    fn connect_request_round_trip() {
        let request = ConnectRequest::new(
            Uuid::new_v4(),
            NodeType::ASSIGNMENT_CLIENTS.to_vec(),
        );
        let parsed = ConnectRequest::from_bytes(request.to_bytes()).unwrap();
        assert_eq!(parsed, request);
        assert_eq!(parsed.protocol_signature, PROTOCOL_SIGNATURE);
    }

    #[test]
    fn domain_list_round_trip() {
        let list = DomainList {
            domain_uuid: Uuid::new_v4(),
            domain_local_id: 1,
            session_uuid: Uuid::new_v4(),
            local_id: 42,
            nodes: vec![
                NodeEntry {
                    node_type: NodeType::EntityServer,
                    uuid: Uuid::new_v4(),
                    public_addr: addr("203.0.113.7:40104"),
                    local_addr: addr("192.168.1.10:40104"),
                },
                NodeEntry {
                    node_type: NodeType::AudioMixer,
                    uuid: Uuid::new_v4(),
                    public_addr: addr("[2001:db8::1]:40103"),
                    local_addr: addr("192.168.1.11:40103"),
                },
            ],
        };
        assert_eq!(DomainList::from_bytes(list.to_bytes()).unwrap(), list);
    }

    #[test]
    fn empty_domain_list_round_trip() {
        let list = DomainList {
            domain_uuid: Uuid::new_v4(),
            domain_local_id: 0,
            session_uuid: Uuid::new_v4(),
            local_id: 1,
            nodes: Vec::new(),
        };
        assert_eq!(DomainList::from_bytes(list.to_bytes()).unwrap(), list);
    }

    #[test]
    fn denied_round_trip() {
        let denied = ConnectionDenied {
            reason: DeniedReason::TooManyUsers,
            message: "Domain is at capacity".into(),
        };
        assert_eq!(
            ConnectionDenied::from_bytes(denied.to_bytes()).unwrap(),
            denied
        );
    }

    #[test]
    fn ping_round_trip() {
        let ping = Ping {
            ping_type: PingType::Public,
            timestamp: 1_688_896_885_851_574,
        };
        assert_eq!(Ping::from_bytes(ping.to_bytes()).unwrap(), ping);
    }

    #[test]
    fn truncated_list_is_rejected() {
        let list = DomainList {
            domain_uuid: Uuid::new_v4(),
            domain_local_id: 1,
            session_uuid: Uuid::new_v4(),
            local_id: 42,
            nodes: vec![NodeEntry {
                node_type: NodeType::AvatarMixer,
                uuid: Uuid::new_v4(),
                public_addr: addr("203.0.113.7:40102"),
                local_addr: addr("192.168.1.10:40102"),
            }],
        };
        let bytes = list.to_bytes();
        let err = DomainList::from_bytes(bytes.slice(..bytes.len() - 3)).unwrap_err();
        assert!(matches!(err, PacketError::BufferTooShort { .. }));
    }
}
