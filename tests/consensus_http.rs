//! Multi-node consensus over real HTTP
//!
//! Each node serves its router on an ephemeral localhost port so resolution goes
//! through the reqwest chain source.

use axum::routing::get;
use axum::Router;
use powledger::api::build_api_router;
use powledger::blockchain::valid_chain;
use powledger::config::Config;
use powledger::node::Node;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

fn new_node(id: &str) -> Arc<Node> {
    let mut config = Config::default();
    config.miner.threads = 2;
    config.miner.node_identifier = Some(id.to_string());
    config.network.peer_timeout_secs = 3;
    Arc::new(Node::new(config).expect("Failed to create node"))
}

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn unused_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

#[tokio::test]
async fn test_longer_peer_chain_is_adopted() {
    tokio::time::timeout(Duration::from_secs(120), async {
        let a = new_node("node-a");
        let b = new_node("node-b");

        b.ledger.new_transaction("x", "y", 2.0);
        b.mine().await.unwrap();
        b.mine().await.unwrap();
        assert_eq!(b.ledger.len(), 3);

        let b_addr = serve(build_api_router(b.clone())).await;
        let dead = format!("127.0.0.1:{}", unused_port());

        a.register_peer(&dead).unwrap();
        a.register_peer(&format!("http://{}", b_addr)).unwrap();
        a.ledger.new_transaction("p", "q", 1.0);

        let resolution = a.resolve().await;

        assert!(resolution.replaced);
        assert_eq!(a.ledger.chain(), b.ledger.chain());
        assert!(valid_chain(&a.ledger.chain()));
        // The pending buffer survives replacement.
        assert_eq!(a.ledger.pending_transactions().len(), 1);

        // Mining continues on top of the adopted chain.
        let block = a.mine().await.unwrap();
        assert_eq!(block.index, 4);
        assert!(valid_chain(&a.ledger.chain()));
    })
    .await
    .expect("test_longer_peer_chain_is_adopted timed out");
}

#[tokio::test]
async fn test_shorter_peer_is_ignored_over_http() {
    tokio::time::timeout(Duration::from_secs(120), async {
        let a = new_node("node-a");
        let b = new_node("node-b");

        a.mine().await.unwrap();
        let before = a.ledger.chain();

        let b_addr = serve(build_api_router(b.clone())).await;
        a.register_peer(&b_addr.to_string()).unwrap();

        let resolution = a.resolve().await;

        assert!(!resolution.replaced);
        assert_eq!(resolution.chain, before);
        assert_eq!(a.ledger.chain(), before);
    })
    .await
    .expect("test_shorter_peer_is_ignored_over_http timed out");
}

#[tokio::test]
async fn test_misbehaving_peers_are_skipped() {
    tokio::time::timeout(Duration::from_secs(60), async {
        let a = new_node("node-a");
        let before = a.ledger.chain();

        let garbage = serve(Router::new().route("/chain", get(|| async { "not a chain" }))).await;
        let missing = serve(Router::new()).await;

        a.register_peer(&garbage.to_string()).unwrap();
        a.register_peer(&missing.to_string()).unwrap();
        a.register_peer(&format!("127.0.0.1:{}", unused_port())).unwrap();

        let resolution = a.resolve().await;

        assert!(!resolution.replaced);
        assert_eq!(a.ledger.chain(), before);
    })
    .await
    .expect("test_misbehaving_peers_are_skipped timed out");
}

#[tokio::test]
async fn test_resolve_endpoint_reports_replacement() {
    tokio::time::timeout(Duration::from_secs(120), async {
        let a = new_node("node-a");
        let b = new_node("node-b");
        b.mine().await.unwrap();

        let a_addr = serve(build_api_router(a.clone())).await;
        let b_addr = serve(build_api_router(b.clone())).await;

        let client = reqwest::Client::new();
        let response = client
            .post(format!("http://{}/nodes/register", a_addr))
            .json(&serde_json::json!({ "nodes": [format!("http://{}", b_addr)] }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 201);

        let json: serde_json::Value = client
            .get(format!("http://{}/nodes/resolve", a_addr))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(json["message"], "Our chain was replaced");
        assert_eq!(json["new_chain"].as_array().unwrap().len(), 2);
        assert_eq!(a.ledger.len(), 2);
    })
    .await
    .expect("test_resolve_endpoint_reports_replacement timed out");
}
