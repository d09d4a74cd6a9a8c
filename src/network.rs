//! Peer addresses, the peer registry and the HTTP chain source
//!
//! Peers are registered out of band and stored as normalized `host:port`
//! strings. Their chains are pulled over HTTP from `GET http://{peer}/chain`.

use crate::consensus::{ChainSource, PeerChain};
use crate::error::ChainError;
use parking_lot::RwLock;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Normalized peer address (`host` or `host:port`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerAddress(String);

impl PeerAddress {
    /// Accepts `http://host:port/...`, `https://...` or a bare `host:port`.
    pub fn parse(address: &str) -> Result<Self, ChainError> {
        let trimmed = address.trim();
        if trimmed.is_empty() {
            return Err(ChainError::InvalidPeerAddress("empty address".to_string()));
        }

        let url = if trimmed.contains("://") {
            Url::parse(trimmed)
        } else {
            Url::parse(&format!("http://{}", trimmed))
        }
        .map_err(|e| ChainError::InvalidPeerAddress(format!("{}: {}", trimmed, e)))?;

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| ChainError::InvalidPeerAddress(format!("{}: missing host", trimmed)))?;

        // Chains are always fetched over plain http, so only port 80 may be
        // left implicit. `https://host` keeps its 443.
        let normalized = match url.port_or_known_default() {
            Some(port) if port != 80 => format!("{}:{}", host, port),
            _ => host.to_string(),
        };

        Ok(PeerAddress(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn chain_url(&self) -> String {
        format!("http://{}/chain", self.0)
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Deduplicated set of peers, iterated in registration order.
#[derive(Debug, Clone, Default)]
pub struct PeerRegistry {
    inner: Arc<RwLock<Vec<PeerAddress>>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize and add `address`. Returns `false` if it was already known.
    pub fn register(&self, address: &str) -> Result<bool, ChainError> {
        let peer = PeerAddress::parse(address)?;
        let mut peers = self.inner.write();

        if peers.contains(&peer) {
            return Ok(false);
        }

        tracing::info!(peer = %peer, "peer registered");
        peers.push(peer);
        Ok(true)
    }

    pub fn list(&self) -> Vec<PeerAddress> {
        self.inner.read().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

/// Fetches peer chains with a per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpChainSource {
    client: Client,
}

impl HttpChainSource {
    pub fn new(timeout: Duration) -> Result<Self, ChainError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChainError::NetworkError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[derive(Deserialize)]
struct ChainBody {
    chain: Vec<crate::blockchain::Block>,
    length: usize,
}

impl ChainSource for HttpChainSource {
    async fn fetch_chain(&self, peer: &PeerAddress) -> Result<PeerChain, ChainError> {
        let resp = self.client.get(peer.chain_url()).send().await?;

        if !resp.status().is_success() {
            return Err(ChainError::NetworkError(format!(
                "{} answered {}",
                peer,
                resp.status()
            )));
        }

        let body = resp.bytes().await?;
        let body: ChainBody = serde_json::from_slice(&body)
            .map_err(|e| ChainError::MalformedResponse(format!("{}: {}", peer, e)))?;

        Ok(PeerChain {
            chain: body.chain,
            length: body.length,
        })
    }
}
