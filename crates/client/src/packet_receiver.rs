//! Dispatches received packets to listeners registered by packet type.

use std::collections::{HashMap, HashSet};

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::warn;
use veles_protocol::{NodeType, Packet, PacketType};

/// A parsed packet plus the channel it arrived on.
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    pub node_type: NodeType,
    pub packet: Packet,
}

/// Type-keyed packet dispatch. Listeners receive messages over unbounded
/// queues so dispatch never blocks the delivery task; unknown or
/// unregistered types are warned about once and dropped.
pub struct PacketReceiver {
    listeners: HashMap<u8, mpsc::UnboundedSender<ReceivedMessage>>,
    warned: HashSet<u8>,
}

impl PacketReceiver {
    pub fn new() -> Self {
        Self {
            listeners: HashMap::new(),
            warned: HashSet::new(),
        }
    }

    /// Routes packets of `packet_type` to `listener`.
    pub fn register(
        &mut self,
        packet_type: PacketType,
        listener: mpsc::UnboundedSender<ReceivedMessage>,
    ) {
        self.listeners.insert(packet_type.as_u8(), listener);
    }

    /// Registers one listener for several types at once.
    pub fn register_types(
        &mut self,
        packet_types: &[PacketType],
        listener: &mpsc::UnboundedSender<ReceivedMessage>,
    ) {
        for packet_type in packet_types {
            self.register(*packet_type, listener.clone());
        }
    }

    /// Parses and dispatches one datagram.
    pub fn handle(&mut self, node_type: NodeType, payload: Bytes) {
        let packet = match Packet::from_bytes(payload) {
            Ok(packet) => packet,
            Err(e) => {
                warn!(from = %node_type, error = %e, "Dropping undecodable packet");
                return;
            }
        };

        if !packet.verify() {
            warn!(from = %node_type, packet_type = %packet.packet_type(), "Dropping unverified packet");
            return;
        }

        let type_byte = packet.packet_type().as_u8();
        match self.listeners.get(&type_byte) {
            Some(listener) => {
                if listener.send(ReceivedMessage { node_type, packet }).is_err() {
                    self.listeners.remove(&type_byte);
                }
            }
            None => {
                if self.warned.insert(type_byte) {
                    warn!(packet_type = type_byte, "No handler registered for packet type");
                }
            }
        }
    }
}

impl Default for PacketReceiver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatches_to_the_registered_listener() {
        let mut receiver = PacketReceiver::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        receiver.register(PacketType::Ping, tx);

        let packet = Packet::with_payload(PacketType::Ping, &b"x"[..]);
        receiver.handle(NodeType::AudioMixer, packet.to_bytes());

        let message = rx.try_recv().unwrap();
        assert_eq!(message.node_type, NodeType::AudioMixer);
        assert_eq!(message.packet.packet_type(), PacketType::Ping);
    }

    #[test]
    fn unknown_type_is_dropped() {
        let mut receiver = PacketReceiver::new();
        // Type byte 200 is not part of the protocol.
        receiver.handle(
            NodeType::AudioMixer,
            Bytes::from_static(&[0x00, 0x00, 200, 1]),
        );
    }

    #[test]
    fn unregistered_type_is_dropped() {
        let mut receiver = PacketReceiver::new();
        let packet = Packet::new(PacketType::Ping);
        receiver.handle(NodeType::AudioMixer, packet.to_bytes());
        receiver.handle(NodeType::AudioMixer, packet.to_bytes());
    }
}
