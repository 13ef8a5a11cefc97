//! Connects to a domain and logs what happens for half a minute.
//!
//! Usage: `cargo run --example connect -- ws://127.0.0.1:40102`

use std::time::Duration;

use veles_client::{ClientConfig, DomainServer, EntityServer};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "ws://127.0.0.1:40102".into());

    let domain_server = DomainServer::new(ClientConfig::default());
    domain_server.on_state_changed(|state| println!("domain: {:?}", state));

    let entity_server = EntityServer::new(domain_server.context_id());
    entity_server.on_state_changed(|state| println!("entity server: {:?}", state));
    entity_server.on_entity_data(|records| println!("received {} entity records", records.len()));

    domain_server.connect(&url).await;
    tokio::time::sleep(Duration::from_secs(30)).await;
    domain_server.disconnect().await;
}
