//! Node-type discriminants for the peers a client talks to.
//!
//! A domain is served by one domain server plus a set of assignment clients
//! (avatar mixer, audio mixer, entity server, messages mixer, asset server).
//! On the wire a node type is a single byte.

use serde::{Deserialize, Serialize};

/// Remote node kind, as carried in packets and signaling messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum NodeType {
    DomainServer = b'D',
    EntityServer = b'o',
    Agent = b'I',
    AudioMixer = b'M',
    AvatarMixer = b'W',
    AssetServer = b'A',
    MessagesMixer = b'm',
    Unassigned = 1,
}

impl NodeType {
    /// The assignment-client types a typical interactive client asks the
    /// domain server for.
    pub const ASSIGNMENT_CLIENTS: [NodeType; 4] = [
        NodeType::AvatarMixer,
        NodeType::AudioMixer,
        NodeType::EntityServer,
        NodeType::MessagesMixer,
    ];

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            b'D' => Some(NodeType::DomainServer),
            b'o' => Some(NodeType::EntityServer),
            b'I' => Some(NodeType::Agent),
            b'M' => Some(NodeType::AudioMixer),
            b'W' => Some(NodeType::AvatarMixer),
            b'A' => Some(NodeType::AssetServer),
            b'm' => Some(NodeType::MessagesMixer),
            1 => Some(NodeType::Unassigned),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            NodeType::DomainServer => "Domain Server",
            NodeType::EntityServer => "Entity Server",
            NodeType::Agent => "Agent",
            NodeType::AudioMixer => "Audio Mixer",
            NodeType::AvatarMixer => "Avatar Mixer",
            NodeType::AssetServer => "Asset Server",
            NodeType::MessagesMixer => "Messages Mixer",
            NodeType::Unassigned => "Unassigned",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_byte_value() {
        for node_type in [
            NodeType::DomainServer,
            NodeType::EntityServer,
            NodeType::Agent,
            NodeType::AudioMixer,
            NodeType::AvatarMixer,
            NodeType::AssetServer,
            NodeType::MessagesMixer,
            NodeType::Unassigned,
        ] {
            assert_eq!(NodeType::from_u8(node_type.as_u8()), Some(node_type));
        }
    }

    #[test]
    fn rejects_unknown_byte() {
        assert_eq!(NodeType::from_u8(0xFF), None);
    }
}
