//! End-to-end domain sessions against a scripted domain server running over
//! in-memory channels.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{sleep, timeout};
use uuid::Uuid;

use veles::client::transport::memory::{MemoryNetwork, MemoryOpener, MemoryPeer};
use veles::client::{
    AssignmentClientState, ClientConfig, DomainServer, DomainState, EntityServer, SessionEvent,
};
use veles::protocol::domain::{ConnectionDenied, DeniedReason, DomainList, NodeEntry, RemovedNode};
use veles::protocol::entity::{Color, EntityProperties, EntityType};
use veles::protocol::entity_edit::{decode_entity_edit, encode_entity_stream};
use veles::protocol::{NodeType, Packet, PacketType};

fn test_config() -> ClientConfig {
    ClientConfig {
        signaling_url: "ws://127.0.0.1:40102".into(),
        max_packet_size: 1492,
        check_in_period: Duration::from_millis(50),
        silent_node_timeout: Duration::from_secs(30),
        reconnect_min_delay: Duration::from_millis(10),
    }
}

/// A scripted domain server: answers check-ins with a DomainList (or a
/// denial), answers address probes, serves entity data and records edits.
#[derive(Clone)]
struct MockDomain {
    domain_uuid: Uuid,
    session_uuid: Uuid,
    deny: Arc<AtomicBool>,
    mute_pings: Arc<AtomicBool>,
    advertised: Arc<Mutex<Vec<NodeEntry>>>,
    domain_tx: Arc<Mutex<Option<mpsc::Sender<Bytes>>>>,
    kick_tx: Arc<watch::Sender<u32>>,
    edits: Arc<Mutex<Vec<Uuid>>>,
}

impl MockDomain {
    fn start() -> (Self, MemoryNetwork) {
        let (network, accept_rx) = MemoryNetwork::new();
        let (kick_tx, _) = watch::channel(0);
        let mock = Self {
            domain_uuid: Uuid::new_v4(),
            session_uuid: Uuid::new_v4(),
            deny: Arc::new(AtomicBool::new(false)),
            mute_pings: Arc::new(AtomicBool::new(false)),
            advertised: Arc::new(Mutex::new(Vec::new())),
            domain_tx: Arc::new(Mutex::new(None)),
            kick_tx: Arc::new(kick_tx),
            edits: Arc::new(Mutex::new(Vec::new())),
        };
        tokio::spawn(accept_loop(accept_rx, mock.clone()));
        (mock, network)
    }

    fn advertise_entity_server(&self) -> Uuid {
        let uuid = Uuid::new_v4();
        self.advertised.lock().unwrap().push(NodeEntry {
            node_type: NodeType::EntityServer,
            uuid,
            public_addr: "203.0.113.4:40104".parse().unwrap(),
            local_addr: "10.0.0.4:40104".parse().unwrap(),
        });
        uuid
    }

    fn clear_advertised(&self) {
        self.advertised.lock().unwrap().clear();
    }

    fn domain_list(&self) -> DomainList {
        DomainList {
            domain_uuid: self.domain_uuid,
            domain_local_id: 1,
            session_uuid: self.session_uuid,
            local_id: 42,
            nodes: self.advertised.lock().unwrap().clone(),
        }
    }

    /// Sends a packet on the domain server channel unprompted.
    async fn push(&self, packet_type: PacketType, payload: Bytes) {
        let tx = loop {
            let current = self.domain_tx.lock().unwrap().clone();
            match current {
                Some(tx) => break tx,
                None => sleep(Duration::from_millis(10)).await,
            }
        };
        let packet = Packet::with_payload(packet_type, &payload[..]);
        let _ = tx.send(packet.to_bytes()).await;
    }

    /// Severs every open channel, like a network interruption.
    fn kick_all(&self) {
        self.kick_tx.send_modify(|generation| *generation += 1);
    }
}

async fn accept_loop(mut accept_rx: mpsc::UnboundedReceiver<MemoryPeer>, mock: MockDomain) {
    while let Some(peer) = accept_rx.recv().await {
        tokio::spawn(peer_task(peer, mock.clone()));
    }
}

async fn respond(outgoing: &mpsc::Sender<Bytes>, packet_type: PacketType, payload: Bytes) {
    let packet = Packet::with_payload(packet_type, &payload[..]);
    let _ = outgoing.send(packet.to_bytes()).await;
}

async fn peer_task(mut peer: MemoryPeer, mock: MockDomain) {
    if peer.node_type == NodeType::DomainServer {
        *mock.domain_tx.lock().unwrap() = Some(peer.outgoing_tx.clone());
    }
    let mut kick_rx = mock.kick_tx.subscribe();

    loop {
        tokio::select! {
            inbound = peer.incoming_rx.recv() => {
                let Some(bytes) = inbound else { break };
                let Ok(packet) = Packet::from_bytes(bytes) else { continue };
                match packet.packet_type() {
                    PacketType::DomainConnectRequest | PacketType::DomainListRequest => {
                        if mock.deny.load(Ordering::SeqCst) {
                            let denied = ConnectionDenied {
                                reason: DeniedReason::TooManyUsers,
                                message: "Domain is at capacity".into(),
                            };
                            respond(&peer.outgoing_tx, PacketType::DomainConnectionDenied, denied.to_bytes()).await;
                        } else {
                            respond(&peer.outgoing_tx, PacketType::DomainList, mock.domain_list().to_bytes()).await;
                        }
                    }
                    PacketType::Ping => {
                        if !mock.mute_pings.load(Ordering::SeqCst) {
                            let payload = Bytes::copy_from_slice(packet.payload());
                            respond(&peer.outgoing_tx, PacketType::PingReply, payload).await;
                        }
                    }
                    PacketType::EntityQuery => {
                        let mut props = EntityProperties::new(EntityType::Box);
                        props.color = Some(Color::new(10, 20, 30));
                        let stream = encode_entity_stream(&[(Uuid::new_v4(), 5, props)], 1024);
                        respond(&peer.outgoing_tx, PacketType::EntityData, Bytes::from(stream)).await;
                    }
                    PacketType::EntityEdit => {
                        if let Ok(message) = decode_entity_edit(packet.payload()) {
                            mock.edits.lock().unwrap().push(message.entity_id);
                        }
                    }
                    _ => {}
                }
            }

            _ = kick_rx.changed() => break,
        }
    }
}

async fn wait_for(
    events: &mut broadcast::Receiver<SessionEvent>,
    what: &str,
    mut predicate: impl FnMut(&SessionEvent) -> bool,
) -> SessionEvent {
    timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await {
                Ok(event) if predicate(&event) => return event,
                Ok(_) => {}
                Err(e) => panic!("event stream ended while waiting for {what}: {e}"),
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {what}"))
}

async fn wait_for_domain_state(events: &mut broadcast::Receiver<SessionEvent>, want: DomainState) {
    wait_for(events, &format!("domain state {want:?}"), |event| {
        matches!(event, SessionEvent::DomainStateChanged(state) if *state == want)
    })
    .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn full_session_cycle() {
    tracing_subscriber::fmt().with_test_writer().try_init().ok();

    let (mock, network) = MockDomain::start();
    mock.advertise_entity_server();

    let domain_server =
        DomainServer::with_opener(test_config(), Arc::new(MemoryOpener::new(network)));
    let entity_server = EntityServer::new(domain_server.context_id());
    let mut events = domain_server.subscribe_events();

    assert_eq!(domain_server.state(), DomainState::Disconnected);
    assert_eq!(entity_server.state(), AssignmentClientState::Unavailable);

    domain_server.connect("ws://mock").await;
    wait_for_domain_state(&mut events, DomainState::Connecting).await;
    wait_for_domain_state(&mut events, DomainState::Connected).await;

    wait_for(&mut events, "entity server disconnected", |event| {
        matches!(
            event,
            SessionEvent::NodeStateChanged {
                node_type: NodeType::EntityServer,
                state: AssignmentClientState::Disconnected,
            }
        )
    })
    .await;
    wait_for(&mut events, "entity server activation", |event| {
        matches!(
            event,
            SessionEvent::NodeActivated {
                node_type: NodeType::EntityServer,
                ..
            }
        )
    })
    .await;
    assert_eq!(entity_server.state(), AssignmentClientState::Connected);

    domain_server.disconnect().await;
    wait_for(&mut events, "entity server unavailable", |event| {
        matches!(
            event,
            SessionEvent::NodeStateChanged {
                node_type: NodeType::EntityServer,
                state: AssignmentClientState::Unavailable,
            }
        )
    })
    .await;
    wait_for_domain_state(&mut events, DomainState::Disconnected).await;
    assert_eq!(domain_server.state(), DomainState::Disconnected);
}

#[tokio::test(flavor = "multi_thread")]
async fn entity_data_and_edits_flow() {
    tracing_subscriber::fmt().with_test_writer().try_init().ok();

    let (mock, network) = MockDomain::start();
    mock.advertise_entity_server();

    let domain_server =
        DomainServer::with_opener(test_config(), Arc::new(MemoryOpener::new(network)));
    let entity_server = EntityServer::new(domain_server.context_id());
    let mut events = domain_server.subscribe_events();

    domain_server.connect("ws://mock").await;
    wait_for_domain_state(&mut events, DomainState::Connected).await;

    // The entity server answers the post-activation query with data.
    let data_event = wait_for(&mut events, "entity data", |event| {
        matches!(event, SessionEvent::EntityData(_))
    })
    .await;
    if let SessionEvent::EntityData(records) = data_event {
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].properties.color, Some(Color::new(10, 20, 30)));
    }

    // An edit reaches the entity server.
    let entity_id = Uuid::new_v4();
    let mut props = EntityProperties::new(EntityType::Box);
    props.color = Some(Color::new(240, 37, 148));
    entity_server.edit_entity(entity_id, props).await;

    timeout(Duration::from_secs(5), async {
        loop {
            if mock.edits.lock().unwrap().contains(&entity_id) {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("edit never reached the entity server");
}

#[tokio::test(flavor = "multi_thread")]
async fn refusal_stops_checkins_until_the_server_relents() {
    tracing_subscriber::fmt().with_test_writer().try_init().ok();

    let (mock, network) = MockDomain::start();
    mock.deny.store(true, Ordering::SeqCst);

    let domain_server =
        DomainServer::with_opener(test_config(), Arc::new(MemoryOpener::new(network)));
    let mut events = domain_server.subscribe_events();

    domain_server.connect("ws://mock").await;
    wait_for_domain_state(&mut events, DomainState::Refused).await;
    assert_eq!(domain_server.state(), DomainState::Refused);

    // Policy changes server-side; a spontaneous DomainList revives the
    // session without a new connect().
    mock.deny.store(false, Ordering::SeqCst);
    mock.push(PacketType::DomainList, mock.domain_list().to_bytes())
        .await;
    wait_for_domain_state(&mut events, DomainState::Connected).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn removed_node_notice_kills_the_node() {
    tracing_subscriber::fmt().with_test_writer().try_init().ok();

    let (mock, network) = MockDomain::start();
    let entity_uuid = mock.advertise_entity_server();

    let domain_server =
        DomainServer::with_opener(test_config(), Arc::new(MemoryOpener::new(network)));
    let mut events = domain_server.subscribe_events();

    domain_server.connect("ws://mock").await;
    wait_for(&mut events, "entity server activation", |event| {
        matches!(event, SessionEvent::NodeActivated { .. })
    })
    .await;

    mock.clear_advertised();
    let removed = RemovedNode { uuid: entity_uuid };
    mock.push(PacketType::DomainServerRemovedNode, removed.to_bytes())
        .await;

    let killed = wait_for(&mut events, "node killed", |event| {
        matches!(event, SessionEvent::NodeKilled { .. })
    })
    .await;
    if let SessionEvent::NodeKilled { uuid, .. } = killed {
        assert_eq!(uuid, entity_uuid);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn silent_nodes_are_pruned() {
    tracing_subscriber::fmt().with_test_writer().try_init().ok();

    let (mock, network) = MockDomain::start();
    mock.mute_pings.store(true, Ordering::SeqCst);
    let entity_uuid = mock.advertise_entity_server();

    let mut config = test_config();
    config.silent_node_timeout = Duration::from_millis(150);
    let domain_server = DomainServer::with_opener(config, Arc::new(MemoryOpener::new(network)));
    let mut events = domain_server.subscribe_events();

    domain_server.connect("ws://mock").await;
    wait_for_domain_state(&mut events, DomainState::Connected).await;

    // The node never answers its probes, so it gets killed without ever
    // reaching CONNECTED.
    let killed = wait_for(&mut events, "silent node killed", |event| {
        matches!(event, SessionEvent::NodeKilled { .. })
    })
    .await;
    if let SessionEvent::NodeKilled { uuid, .. } = killed {
        assert_eq!(uuid, entity_uuid);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn reconnects_after_transport_interruption() {
    tracing_subscriber::fmt().with_test_writer().try_init().ok();

    let (mock, network) = MockDomain::start();
    mock.advertise_entity_server();

    let domain_server =
        DomainServer::with_opener(test_config(), Arc::new(MemoryOpener::new(network)));
    let mut events = domain_server.subscribe_events();

    domain_server.connect("ws://mock").await;
    wait_for_domain_state(&mut events, DomainState::Connected).await;
    wait_for(&mut events, "first activation", |event| {
        matches!(event, SessionEvent::NodeActivated { .. })
    })
    .await;

    // Sever everything; the check-in loop drives the session back up.
    mock.kick_all();
    wait_for_domain_state(&mut events, DomainState::Connecting).await;
    wait_for_domain_state(&mut events, DomainState::Connected).await;
    wait_for(&mut events, "re-activation", |event| {
        matches!(event, SessionEvent::NodeActivated { .. })
    })
    .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_host_reports_error_then_recovers() {
    tracing_subscriber::fmt().with_test_writer().try_init().ok();

    let (mock, network) = MockDomain::start();
    mock.advertise_entity_server();
    network.set_refusing(true);

    let domain_server =
        DomainServer::with_opener(test_config(), Arc::new(MemoryOpener::new(network.clone())));
    let mut events = domain_server.subscribe_events();

    domain_server.connect("ws://mock").await;
    wait_for_domain_state(&mut events, DomainState::Error).await;

    // Host comes back; the check-in loop recovers without intervention.
    network.set_refusing(false);
    wait_for_domain_state(&mut events, DomainState::Connected).await;
}
