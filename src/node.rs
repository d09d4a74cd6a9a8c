use crate::blockchain::Block;
use crate::config::Config;
use crate::consensus::{ConsensusResolver, Resolution};
use crate::error::ChainError;
use crate::ledger::Ledger;
use crate::miner::Miner;
use crate::network::{HttpChainSource, PeerRegistry};
use crate::transaction::Transaction;
use rand::RngCore;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Attempts before a mining request gives up on a tip that keeps moving.
const MAX_MINING_ATTEMPTS: usize = 8;

/// One ledger node: the chain, its peers and the miner, shared with the API layer.
pub struct Node {
    pub config: Config,
    pub ledger: Ledger,
    pub peers: PeerRegistry,
    miner: Arc<Miner>,
    resolver: ConsensusResolver<HttpChainSource>,
    node_id: String,
    blocks_mined: AtomicU64,
}

impl Node {
    pub fn new(config: Config) -> Result<Self, ChainError> {
        let miner = Arc::new(Miner::new(config.miner.threads)?);
        let source = HttpChainSource::new(Duration::from_secs(config.network.peer_timeout_secs))?;

        let node_id = match &config.miner.node_identifier {
            Some(id) => id.trim().to_string(),
            None => generate_node_id(),
        };

        let peers = PeerRegistry::new();
        for peer in &config.network.bootstrap_peers {
            if let Err(e) = peers.register(peer) {
                warn!("Ignoring bootstrap peer {}: {}", peer, e);
            }
        }

        Ok(Self {
            config,
            ledger: Ledger::new(),
            peers,
            miner,
            resolver: ConsensusResolver::new(source),
            node_id,
            blocks_mined: AtomicU64::new(0),
        })
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn blocks_mined(&self) -> u64 {
        self.blocks_mined.load(Ordering::Relaxed)
    }

    /// Search a proof for the current tip, then forge a block carrying the pending
    /// transactions plus this node's reward. Retries when the tip moves meanwhile.
    pub async fn mine(&self) -> Result<Block, ChainError> {
        let miner = self.miner.clone();
        self.mine_with(move |last_proof| {
            let miner = miner.clone();
            async move {
                tokio::task::spawn_blocking(move || miner.search(last_proof))
                    .await
                    .unwrap_or_else(|e| Err(ChainError::TaskFailed(e.to_string())))
            }
        })
        .await
    }

    /// [`Node::mine`] with the proof search supplied by the caller.
    async fn mine_with<F, Fut>(&self, mut search: F) -> Result<Block, ChainError>
    where
        F: FnMut(u64) -> Fut,
        Fut: Future<Output = Result<u64, ChainError>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let parent = self.ledger.last_block();
            let parent_hash = parent.hash();

            let proof = search(parent.proof).await?;

            let reward = Transaction::reward(self.node_id.clone(), self.config.miner.reward);
            match self.ledger.forge_on_tip(&parent_hash, proof, Some(reward)) {
                Ok(block) => {
                    self.blocks_mined.fetch_add(1, Ordering::SeqCst);
                    return Ok(block);
                }
                Err(e @ ChainError::StaleTip { .. }) if attempt < MAX_MINING_ATTEMPTS => {
                    warn!(attempt, "Tip moved while mining, retrying: {}", e);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Abort any proof search in flight.
    pub fn cancel_mining(&self) {
        self.miner.cancel();
    }

    pub fn register_peer(&self, address: &str) -> Result<bool, ChainError> {
        self.peers.register(address)
    }

    /// Run one consensus pass against every registered peer.
    pub async fn resolve(&self) -> Resolution {
        let peers = self.peers.list();
        let resolution = self.resolver.resolve(&self.ledger, &peers).await;
        if resolution.replaced {
            info!(length = resolution.chain.len(), "Adopted longer chain from peers");
        }
        resolution
    }

    /// Start the background consensus loop (if configured) and serve the API
    /// until the server stops.
    pub async fn start(self: Arc<Self>) -> Result<(), Box<dyn std::error::Error>> {
        info!(
            node_id = %self.node_id,
            peers = self.peers.len(),
            miner_threads = self.miner.threads(),
            "Starting powledger node"
        );

        let interval_secs = self.config.consensus.interval_secs;
        if interval_secs > 0 {
            let node = self.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
                loop {
                    ticker.tick().await;
                    if node.peers.is_empty() {
                        continue;
                    }
                    node.resolve().await;
                }
            });
        }

        let result = Node::start_api(self.clone()).await;
        self.cancel_mining();
        result
    }

    #[cfg(feature = "api")]
    async fn start_api(node: Arc<Self>) -> Result<(), Box<dyn std::error::Error>> {
        let addr = format!(
            "{}:{}",
            node.config.network.bind_address, node.config.network.api_port
        );
        crate::api::run_api_server(node, &addr).await
    }

    #[cfg(not(feature = "api"))]
    async fn start_api(_node: Arc<Self>) -> Result<(), Box<dyn std::error::Error>> {
        Err("API feature not enabled in this build".into())
    }
}

fn generate_node_id() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
