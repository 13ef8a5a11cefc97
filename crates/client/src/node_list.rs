//! The node list: domain sessions, the check-in loop, and the roster.
//!
//! One node-list task owns the socket and everything above it. It is driven
//! by three inputs: SDK commands, channel events from the socket, and the
//! 1 Hz check-in tick, which is the only source of periodic protocol
//! traffic. All state transitions are published through a watch channel
//! (current value) and a broadcast channel (every transition, for
//! sequence-sensitive consumers).

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

use veles_protocol::domain::{
    ConnectRequest, ConnectionDenied, DomainList, EntityQuery, Ping, PingType, RemovedNode,
};
use veles_protocol::entity_edit::{decode_entity_stream, encode_entity_edit, EntityEditMessage};
use veles_protocol::{
    AppendState, EntityProperties, NodeType, Packet, PacketType, SEQUENCE_MASK,
};

use crate::config::ClientConfig;
use crate::domain_handler::{DomainHandler, DomainState};
use crate::node::{ActiveSocket, Node};
use crate::packet_receiver::{PacketReceiver, ReceivedMessage};
use crate::socket::{Socket, SocketState};
use crate::transport::{ChannelEvent, DataChannelOpener, LinkEvent};

/// State of one assignment client as seen by the SDK.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AssignmentClientState {
    #[default]
    Unavailable,
    Disconnected,
    Connected,
}

/// Everything observable about a session, published as it happens.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    DomainStateChanged(DomainState),
    NodeStateChanged {
        node_type: NodeType,
        state: AssignmentClientState,
    },
    NodeActivated {
        node_type: NodeType,
        uuid: Uuid,
    },
    NodeKilled {
        node_type: NodeType,
        uuid: Uuid,
    },
    EntityData(Vec<EntityEditMessage>),
}

/// Requests from the SDK surface into the node-list task.
#[derive(Debug)]
pub(crate) enum Command {
    Connect(String),
    Disconnect,
    EditEntity {
        entity_id: Uuid,
        properties: Box<EntityProperties>,
    },
}

/// Handles the SDK surface keeps to talk to a running node list.
#[derive(Clone)]
pub(crate) struct NodeListHandle {
    pub command_tx: mpsc::Sender<Command>,
    pub events: broadcast::Sender<SessionEvent>,
    pub domain_state: watch::Receiver<DomainState>,
    pub node_states: HashMap<NodeType, watch::Receiver<AssignmentClientState>>,
}

pub(crate) struct NodeList {
    config: ClientConfig,
    socket: Socket,
    socket_events: mpsc::Receiver<ChannelEvent>,
    receiver: PacketReceiver,
    internal_rx: mpsc::UnboundedReceiver<ReceivedMessage>,
    domain: DomainHandler,
    nodes: HashMap<Uuid, Node>,
    command_rx: mpsc::Receiver<Command>,
    events_tx: broadcast::Sender<SessionEvent>,
    domain_state_tx: watch::Sender<DomainState>,
    node_state_tx: HashMap<NodeType, watch::Sender<AssignmentClientState>>,
    sequence: u16,
}

impl NodeList {
    /// Spawns the node-list task for one context.
    pub fn spawn(config: ClientConfig, opener: std::sync::Arc<dyn DataChannelOpener>) -> NodeListHandle {
        let (socket, socket_events) = Socket::new(opener);
        let (command_tx, command_rx) = mpsc::channel(32);
        let (events_tx, _) = broadcast::channel(64);
        let (domain_state_tx, domain_state) = watch::channel(DomainState::Disconnected);

        let mut node_state_tx = HashMap::new();
        let mut node_states = HashMap::new();
        for node_type in NodeType::ASSIGNMENT_CLIENTS {
            let (tx, rx) = watch::channel(AssignmentClientState::Unavailable);
            node_state_tx.insert(node_type, tx);
            node_states.insert(node_type, rx);
        }

        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let mut receiver = PacketReceiver::new();
        receiver.register_types(
            &[
                PacketType::DomainList,
                PacketType::DomainConnectionDenied,
                PacketType::DomainServerRemovedNode,
                PacketType::Ping,
                PacketType::PingReply,
                PacketType::EntityData,
            ],
            &internal_tx,
        );

        let node_list = Self {
            config,
            socket,
            socket_events,
            receiver,
            internal_rx,
            domain: DomainHandler::new(),
            nodes: HashMap::new(),
            command_rx,
            events_tx: events_tx.clone(),
            domain_state_tx,
            node_state_tx,
            sequence: 0,
        };
        tokio::spawn(node_list.run());

        NodeListHandle {
            command_tx,
            events: events_tx,
            domain_state,
            node_states,
        }
    }

    async fn run(mut self) {
        let mut check_in = tokio::time::interval(self.config.check_in_period);
        check_in.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = check_in.tick() => {
                    self.check_in();
                    self.remove_silent_nodes();
                }

                command = self.command_rx.recv() => {
                    match command {
                        Some(Command::Connect(url)) => self.handle_connect(url),
                        Some(Command::Disconnect) => self.handle_disconnect(),
                        Some(Command::EditEntity { entity_id, properties }) => {
                            self.handle_edit_entity(entity_id, *properties);
                        }
                        None => break,
                    }
                }

                Some(event) = self.socket_events.recv() => {
                    self.handle_channel_event(event);
                }

                Some(message) = self.internal_rx.recv() => {
                    self.handle_packet(message);
                }
            }
        }

        debug!("Node list task shutting down");
        self.socket.clear_connections();
    }

    /// One tick of the periodic check-in described by the join protocol.
    fn check_in(&mut self) {
        let Some(url) = self.domain.url().map(str::to_owned) else {
            return;
        };
        if matches!(self.domain.state(), DomainState::Refused) {
            // A refusal stands until disconnect/connect or a spontaneous
            // DomainList from the server.
            return;
        }

        match self.socket.state(NodeType::DomainServer) {
            SocketState::Unconnected => {
                if !self.socket.reconnect_allowed(self.config.reconnect_min_delay) {
                    return;
                }
                info!(url = %url, "Dialing domain server");
                if self.domain.state() == DomainState::Error {
                    self.domain.set_state(DomainState::Connecting);
                    self.publish_domain_state();
                }
                self.socket.connect_to_host(&url, NodeType::DomainServer);
            }
            SocketState::Connecting => {}
            SocketState::Connected => {
                if self.domain.is_connected() {
                    self.send_packet(
                        NodeType::DomainServer,
                        PacketType::DomainListRequest,
                        Bytes::new(),
                    );
                } else {
                    let request = ConnectRequest::new(
                        self.domain.session_uuid(),
                        NodeType::ASSIGNMENT_CLIENTS.to_vec(),
                    );
                    self.send_packet(
                        NodeType::DomainServer,
                        PacketType::DomainConnectRequest,
                        request.to_bytes(),
                    );
                }
            }
        }
    }

    fn handle_connect(&mut self, url: String) {
        let url = if url.is_empty() {
            self.config.signaling_url.clone()
        } else {
            url
        };
        info!(url = %url, "Starting domain session");
        self.domain.start_connecting(url);
        self.publish_domain_state();
        self.check_in();
    }

    fn handle_disconnect(&mut self) {
        if self.domain.url().is_none() {
            return;
        }
        info!("Disconnecting from domain");
        self.send_packet(
            NodeType::DomainServer,
            PacketType::DomainDisconnectRequest,
            Bytes::new(),
        );
        self.kill_all_nodes();
        self.domain.reset();
        self.publish_domain_state();
        self.socket.clear_connections();
    }

    fn handle_edit_entity(&mut self, entity_id: Uuid, properties: EntityProperties) {
        if self.socket.state(NodeType::EntityServer) != SocketState::Connected {
            warn!("Dropping entity edit: entity server is not connected");
            return;
        }

        let capacity = self
            .config
            .max_packet_size
            .saturating_sub(Packet::header_size(PacketType::EntityEdit));
        let mut buffer = vec![0u8; capacity];
        let result = encode_entity_edit(&mut buffer, entity_id, unix_micros(), &properties);
        match result.append_state {
            AppendState::None => {
                warn!(entity = %entity_id, "Entity edit does not fit a packet; dropping");
            }
            state => {
                if state == AppendState::Partial {
                    warn!(entity = %entity_id, "Entity edit truncated to fit the packet");
                }
                buffer.truncate(result.bytes_written);
                self.send_packet(
                    NodeType::EntityServer,
                    PacketType::EntityEdit,
                    Bytes::from(buffer),
                );
            }
        }
    }

    fn handle_channel_event(&mut self, event: ChannelEvent) {
        match event.event {
            LinkEvent::Open => {
                if event.node_type == NodeType::DomainServer {
                    // Connected at the transport level; the next check-in
                    // sends the connect request.
                    self.check_in();
                } else {
                    self.probe_node_addresses(event.node_type);
                }
            }
            LinkEvent::Message(payload) => {
                self.note_heard(event.node_type);
                self.receiver.handle(event.node_type, payload);
            }
            LinkEvent::Error(error) => {
                warn!(node_type = %event.node_type, error, "Data channel error");
                if event.node_type == NodeType::DomainServer
                    && self.domain.state() == DomainState::Connecting
                    && !self.domain.is_connected()
                {
                    self.domain.set_state(DomainState::Error);
                    self.publish_domain_state();
                }
            }
            LinkEvent::Closed => self.handle_channel_closed(event.node_type),
        }
    }

    fn handle_channel_closed(&mut self, node_type: NodeType) {
        if node_type == NodeType::DomainServer {
            let interrupted = self.domain.url().is_some()
                && matches!(
                    self.domain.state(),
                    DomainState::Connected | DomainState::Connecting
                );
            if interrupted {
                info!("Domain connection lost; will redial on the next check-in");
                self.domain.set_interrupted();
                self.publish_domain_state();
                self.kill_all_nodes();
                self.socket.clear_connections();
            }
        } else if let Some(uuid) = self.node_uuid_of_type(node_type) {
            self.kill_node(uuid);
        }
    }

    fn handle_packet(&mut self, message: ReceivedMessage) {
        let payload = Bytes::copy_from_slice(message.packet.payload());
        match message.packet.packet_type() {
            PacketType::DomainList => match DomainList::from_bytes(payload) {
                Ok(list) => self.process_domain_list(list),
                Err(e) => warn!(error = %e, "Dropping malformed DomainList"),
            },
            PacketType::DomainConnectionDenied => match ConnectionDenied::from_bytes(payload) {
                Ok(denied) => {
                    warn!(reason = ?denied.reason, message = %denied.message, "Domain refused connection");
                    self.domain.set_refused(denied.message);
                    self.publish_domain_state();
                }
                Err(e) => warn!(error = %e, "Dropping malformed denial"),
            },
            PacketType::DomainServerRemovedNode => match RemovedNode::from_bytes(payload) {
                Ok(removed) => self.process_kill_node(removed.uuid),
                Err(e) => warn!(error = %e, "Dropping malformed removal notice"),
            },
            PacketType::Ping => match Ping::from_bytes(payload) {
                Ok(ping) => {
                    // Reply on the channel the ping arrived on.
                    self.send_packet(
                        message.node_type,
                        PacketType::PingReply,
                        ping.to_bytes(),
                    );
                }
                Err(e) => warn!(error = %e, "Dropping malformed ping"),
            },
            PacketType::PingReply => match Ping::from_bytes(payload) {
                Ok(reply) => self.process_ping_reply(message.node_type, reply),
                Err(e) => warn!(error = %e, "Dropping malformed ping reply"),
            },
            PacketType::EntityData => match decode_entity_stream(&payload) {
                Ok(records) => {
                    let _ = self.events_tx.send(SessionEvent::EntityData(records));
                }
                Err(e) => warn!(error = %e, "Dropping malformed entity data"),
            },
            other => debug!(packet_type = %other, "Unexpected packet type in node list"),
        }
    }

    fn process_domain_list(&mut self, list: DomainList) {
        self.domain
            .set_session(list.domain_uuid, list.session_uuid, list.local_id);
        if self.domain.set_state(DomainState::Connected) {
            info!(
                domain = %list.domain_uuid,
                local_id = list.local_id,
                "Connected to domain"
            );
        }
        self.publish_domain_state();

        for entry in &list.nodes {
            if let Some(node) = self.nodes.get_mut(&entry.uuid) {
                // Liveness is judged by traffic on the node's own channel,
                // not by the domain server still advertising it.
                node.public_addr = entry.public_addr;
                node.local_addr = entry.local_addr;
                continue;
            }

            // At most one channel per node type: a node that came back
            // under a new UUID replaces its predecessor.
            if let Some(stale) = self.node_uuid_of_type(entry.node_type) {
                self.kill_node(stale);
            }

            info!(node_type = %entry.node_type, uuid = %entry.uuid, "Adding node");
            self.nodes.insert(
                entry.uuid,
                Node::new(entry.uuid, entry.node_type, entry.public_addr, entry.local_addr),
            );
            self.set_node_state(entry.node_type, AssignmentClientState::Disconnected);
            self.socket.open_data_channel(entry.node_type);
        }

        // Anything the server stopped advertising is gone.
        let advertised: Vec<Uuid> = list.nodes.iter().map(|n| n.uuid).collect();
        let missing: Vec<Uuid> = self
            .nodes
            .keys()
            .filter(|uuid| !advertised.contains(uuid))
            .copied()
            .collect();
        for uuid in missing {
            self.kill_node(uuid);
        }
    }

    /// Sends a probe to each of the node's advertised addresses; whichever
    /// answers first becomes the active socket.
    fn probe_node_addresses(&mut self, node_type: NodeType) {
        if self.node_uuid_of_type(node_type).is_none() {
            return;
        }
        for ping_type in [PingType::Local, PingType::Public] {
            let ping = Ping {
                ping_type,
                timestamp: unix_micros(),
            };
            self.send_packet(node_type, PacketType::Ping, ping.to_bytes());
        }
    }

    fn process_ping_reply(&mut self, node_type: NodeType, reply: Ping) {
        let Some(uuid) = self.node_uuid_of_type(node_type) else {
            return;
        };
        let Some(node) = self.nodes.get_mut(&uuid) else {
            return;
        };
        node.heard_now();
        if node.active_socket != ActiveSocket::None {
            return;
        }
        node.active_socket = match reply.ping_type {
            PingType::Local => ActiveSocket::Local,
            PingType::Public => ActiveSocket::Public,
        };
        info!(node_type = %node_type, uuid = %uuid, socket = ?node.active_socket, "Node activated");
        self.set_node_state(node_type, AssignmentClientState::Connected);
        let _ = self.events_tx.send(SessionEvent::NodeActivated { node_type, uuid });

        if node_type == NodeType::EntityServer {
            let query = EntityQuery {
                max_entity_packets_per_second: 90,
            };
            self.send_packet(node_type, PacketType::EntityQuery, query.to_bytes());
        }
    }

    fn process_kill_node(&mut self, uuid: Uuid) {
        if !self.domain.session_uuid().is_nil() && uuid == self.domain.session_uuid() {
            // The server asking us to remove ourselves has no defined
            // client-side semantics yet.
            unimplemented!("removing the local session via a kill-node notice");
        }
        self.kill_node(uuid);
    }

    fn kill_node(&mut self, uuid: Uuid) {
        let Some(node) = self.nodes.remove(&uuid) else {
            return;
        };
        let node_type = node.node_type();
        info!(node_type = %node_type, uuid = %uuid, "Killing node");
        self.socket.close_channel(node_type);
        self.set_node_state(node_type, AssignmentClientState::Unavailable);
        let _ = self.events_tx.send(SessionEvent::NodeKilled { node_type, uuid });
    }

    fn kill_all_nodes(&mut self) {
        let uuids: Vec<Uuid> = self.nodes.keys().copied().collect();
        for uuid in uuids {
            self.kill_node(uuid);
        }
    }

    fn remove_silent_nodes(&mut self) {
        // The domain server is not in the roster and is never pruned; its
        // liveness is the check-in loop's business.
        let silent: Vec<Uuid> = self
            .nodes
            .values()
            .filter(|node| node.is_silent(self.config.silent_node_timeout))
            .map(Node::uuid)
            .collect();
        for uuid in silent {
            debug!(uuid = %uuid, "Node went silent");
            self.kill_node(uuid);
        }
    }

    fn note_heard(&mut self, node_type: NodeType) {
        if let Some(uuid) = self.node_uuid_of_type(node_type) {
            if let Some(node) = self.nodes.get_mut(&uuid) {
                node.heard_now();
            }
        }
    }

    fn node_uuid_of_type(&self, node_type: NodeType) -> Option<Uuid> {
        self.nodes
            .values()
            .find(|node| node.node_type() == node_type)
            .map(Node::uuid)
    }

    fn send_packet(&mut self, node_type: NodeType, packet_type: PacketType, payload: Bytes) -> bool {
        let mut packet = Packet::with_payload(packet_type, &payload[..]);
        self.sequence = self.sequence.wrapping_add(1) & SEQUENCE_MASK;
        packet.set_sequence(self.sequence);
        if packet_type.is_sourced() {
            packet.set_sender(self.domain.session_uuid());
        }
        self.socket.write_datagram(node_type, packet.to_bytes())
    }

    fn publish_domain_state(&self) {
        let state = self.domain.state();
        let changed = self.domain_state_tx.send_if_modified(|current| {
            if *current != state {
                *current = state;
                true
            } else {
                false
            }
        });
        if changed {
            let _ = self
                .events_tx
                .send(SessionEvent::DomainStateChanged(state));
        }
    }

    fn set_node_state(&mut self, node_type: NodeType, state: AssignmentClientState) {
        let Some(tx) = self.node_state_tx.get(&node_type) else {
            return;
        };
        let changed = tx.send_if_modified(|current| {
            if *current != state {
                *current = state;
                true
            } else {
                false
            }
        });
        if changed {
            let _ = self
                .events_tx
                .send(SessionEvent::NodeStateChanged { node_type, state });
        }
    }
}

fn unix_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_micros() as u64)
        .unwrap_or(0)
}
