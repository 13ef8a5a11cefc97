use bytes::Bytes;
use tokio::sync::mpsc;
use veles::client::transport::memory::{MemoryNetwork, MemoryOpener, MemoryPeer};
use veles::client::transport::{ChannelEvent, DataChannelOpener, LinkEvent, LinkState};
use veles::protocol::NodeType;

async fn next_event(events_rx: &mut mpsc::Receiver<ChannelEvent>) -> LinkEvent {
    tokio::time::timeout(std::time::Duration::from_secs(2), events_rx.recv())
        .await
        .expect("timed out waiting for a channel event")
        .expect("event queue closed")
        .event
}

fn spawn_echo(mut peer: MemoryPeer) {
    tokio::spawn(async move {
        while let Some(payload) = peer.incoming_rx.recv().await {
            if peer.outgoing_tx.send(payload).await.is_err() {
                break;
            }
        }
    });
}

#[tokio::test]
async fn echo_and_ready_state_order() {
    let (network, mut accept_rx) = MemoryNetwork::new();
    let opener = MemoryOpener::new(network);
    let (events_tx, mut events_rx) = mpsc::channel(32);

    let channel = opener.open(NodeType::DomainServer, None, events_tx);
    let mut observed = vec![channel.ready_state()];

    spawn_echo(accept_rx.recv().await.expect("no peer"));

    assert!(matches!(next_event(&mut events_rx).await, LinkEvent::Open));
    observed.push(channel.ready_state());

    assert!(channel.send(Bytes::from_static(b"echo:Hello")));
    match next_event(&mut events_rx).await {
        LinkEvent::Message(payload) => assert_eq!(&payload[..], b"echo:Hello"),
        other => panic!("expected the echo back, got {:?}", other),
    }

    channel.close();
    observed.push(channel.ready_state());
    assert!(matches!(next_event(&mut events_rx).await, LinkEvent::Closed));
    observed.push(channel.ready_state());

    assert_eq!(
        observed,
        vec![
            LinkState::Connecting,
            LinkState::Open,
            LinkState::Closing,
            LinkState::Closed
        ]
    );
}

#[tokio::test]
async fn two_independent_channels_do_not_share_traffic() {
    let (network_a, mut accept_a) = MemoryNetwork::new();
    let (network_b, mut accept_b) = MemoryNetwork::new();
    let opener_a = MemoryOpener::new(network_a);
    let opener_b = MemoryOpener::new(network_b);

    let (events_tx_a, mut events_a) = mpsc::channel(32);
    let (events_tx_b, mut events_b) = mpsc::channel(32);

    let channel_a = opener_a.open(NodeType::DomainServer, None, events_tx_a);
    let channel_b = opener_b.open(NodeType::DomainServer, None, events_tx_b);

    spawn_echo(accept_a.recv().await.expect("no peer a"));
    spawn_echo(accept_b.recv().await.expect("no peer b"));

    assert!(matches!(next_event(&mut events_a).await, LinkEvent::Open));
    assert!(matches!(next_event(&mut events_b).await, LinkEvent::Open));

    assert!(channel_a.send(Bytes::from_static(b"echo:Hello")));
    assert!(channel_b.send(Bytes::from_static(b"echo:Goodbye")));

    match next_event(&mut events_a).await {
        LinkEvent::Message(payload) => assert_eq!(&payload[..], b"echo:Hello"),
        other => panic!("channel a got {:?}", other),
    }
    match next_event(&mut events_b).await {
        LinkEvent::Message(payload) => assert_eq!(&payload[..], b"echo:Goodbye"),
        other => panic!("channel b got {:?}", other),
    }

    // Neither channel has anything else queued.
    assert!(events_a.try_recv().is_err());
    assert!(events_b.try_recv().is_err());
}

#[tokio::test]
async fn unreachable_network_yields_error_and_closed() {
    let (network, _accept_rx) = MemoryNetwork::new();
    network.set_refusing(true);
    let opener = MemoryOpener::new(network);
    let (events_tx, mut events_rx) = mpsc::channel(32);

    let channel = opener.open(NodeType::DomainServer, None, events_tx);
    assert!(matches!(next_event(&mut events_rx).await, LinkEvent::Error(_)));
    assert!(matches!(next_event(&mut events_rx).await, LinkEvent::Closed));
    assert_eq!(channel.ready_state(), LinkState::Closed);
}
