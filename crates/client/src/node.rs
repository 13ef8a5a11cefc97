//! Roster records for remote nodes.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use uuid::Uuid;
use veles_protocol::NodeType;

/// Which of a node's two advertised addresses answered first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActiveSocket {
    #[default]
    None,
    Local,
    Public,
}

/// One assignment client in the roster. The UUID is fixed at creation; a
/// node that comes back under a new UUID is a new node.
#[derive(Debug, Clone)]
pub struct Node {
    uuid: Uuid,
    node_type: NodeType,
    pub public_addr: SocketAddr,
    pub local_addr: SocketAddr,
    pub active_socket: ActiveSocket,
    pub last_heard: Instant,
}

impl Node {
    pub fn new(
        uuid: Uuid,
        node_type: NodeType,
        public_addr: SocketAddr,
        local_addr: SocketAddr,
    ) -> Self {
        Self {
            uuid,
            node_type,
            public_addr,
            local_addr,
            active_socket: ActiveSocket::None,
            last_heard: Instant::now(),
        }
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    pub fn heard_now(&mut self) {
        self.last_heard = Instant::now();
    }

    pub fn is_silent(&self, timeout: Duration) -> bool {
        self.last_heard.elapsed() > timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_node_is_not_silent() {
        let node = Node::new(
            Uuid::new_v4(),
            NodeType::AudioMixer,
            "203.0.113.7:40103".parse().unwrap(),
            "192.168.1.2:40103".parse().unwrap(),
        );
        assert!(!node.is_silent(Duration::from_secs(2)));
        assert_eq!(node.active_socket, ActiveSocket::None);
    }
}
